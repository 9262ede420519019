//! Identity types for Custodia
//!
//! All identity types are strongly typed wrappers around UUIDs to prevent
//! accidental mixing of different ID types. The one exception is [`EscrowId`],
//! which is a monotonically increasing integer assigned by the escrow manager
//! at creation time (starting at 1, never reused).

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Macro to generate ID types with common implementations
macro_rules! define_id_type {
    ($name:ident, $prefix:literal, $doc:literal) => {
        #[doc = $doc]
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new random ID
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Create from an existing UUID
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Parse from a string (with or without prefix)
            pub fn parse(s: &str) -> Result<Self, uuid::Error> {
                let s = s.strip_prefix(concat!($prefix, "_")).unwrap_or(s);
                Ok(Self(Uuid::parse_str(s)?))
            }

            /// Get the inner UUID
            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}_{}", $prefix, self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }
    };
}

define_id_type!(ParticipantId, "party", "Unique identifier for a transacting participant (buyer, seller, arbitrator, administrator)");
define_id_type!(TokenId, "token", "Unique identifier for a registered settlement token");
define_id_type!(EventId, "event", "Unique identifier for an audit event entry");

impl ParticipantId {
    /// The zero identity. Never a valid counterparty.
    pub fn zero() -> Self {
        Self(Uuid::nil())
    }

    /// Check whether this is the zero identity
    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }
}

/// Monotonically increasing escrow identifier, assigned at creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EscrowId(pub u64);

impl EscrowId {
    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for EscrowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "escrow_{}", self.0)
    }
}

impl From<u64> for EscrowId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}
