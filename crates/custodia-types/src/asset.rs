//! Settlement asset types
//!
//! An escrow is denominated either in the native asset of the underlying
//! value-transfer substrate, or in a token registered with the TokenRegistry.

use crate::TokenId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// The asset an escrow is denominated in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SettlementAsset {
    /// The substrate's native asset. Always an eligible settlement asset.
    Native,
    /// A registered token. Must be active at escrow creation.
    Token(TokenId),
}

impl SettlementAsset {
    pub fn is_native(&self) -> bool {
        matches!(self, Self::Native)
    }

    pub fn token_id(&self) -> Option<&TokenId> {
        match self {
            Self::Native => None,
            Self::Token(id) => Some(id),
        }
    }
}

impl fmt::Display for SettlementAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native => write!(f, "NATIVE"),
            Self::Token(id) => write!(f, "{}", id),
        }
    }
}

/// A registered settlement token.
///
/// Created and updated only by the registry administrator. Deactivating a
/// token rejects it for new escrows but does not invalidate escrows that
/// already hold it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenInfo {
    pub token: TokenId,
    /// Network/chain the token settles on
    pub chain_id: u64,
    pub symbol: String,
    pub decimals: u8,
    pub active: bool,
    pub added_at: DateTime<Utc>,
}

impl TokenInfo {
    pub fn new(token: TokenId, chain_id: u64, symbol: impl Into<String>, decimals: u8) -> Self {
        Self {
            token,
            chain_id,
            symbol: symbol.into(),
            decimals,
            active: true,
            added_at: Utc::now(),
        }
    }
}
