//! Protocol events
//!
//! One event per committed state transition, consumed by observability and
//! audit layers. Payloads carry the escrow id, the primary actor(s), and the
//! amount where applicable.

use crate::{Amount, EscrowId, ParticipantId, TokenId};
use serde::{Deserialize, Serialize};

/// An event emitted on a successful state transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProtocolEvent {
    EscrowCreated {
        escrow_id: EscrowId,
        buyer: ParticipantId,
        seller: ParticipantId,
        amount: Amount,
    },
    EscrowFunded {
        escrow_id: EscrowId,
        buyer: ParticipantId,
        /// Principal plus platform fee
        amount: Amount,
    },
    PaymentReleased {
        escrow_id: EscrowId,
        seller: ParticipantId,
        amount: Amount,
        milestone_index: usize,
    },
    EscrowCompleted {
        escrow_id: EscrowId,
        buyer: ParticipantId,
        seller: ParticipantId,
        amount: Amount,
    },
    DisputeFiled {
        escrow_id: EscrowId,
        initiator: ParticipantId,
    },
    DisputeResolved {
        escrow_id: EscrowId,
        arbitrator: ParticipantId,
    },
    EscrowCancelled {
        escrow_id: EscrowId,
        buyer: ParticipantId,
    },
    EscrowExpired {
        escrow_id: EscrowId,
        buyer: ParticipantId,
        /// Amount refunded (principal plus platform fee)
        amount: Amount,
    },
    TokenAdded {
        token: TokenId,
        symbol: String,
    },
    TokenStatusUpdated {
        token: TokenId,
        active: bool,
    },
    UserRegistered {
        participant: ParticipantId,
        is_vendor: bool,
    },
    ArbitratorRegistered {
        participant: ParticipantId,
        stake: Amount,
    },
    ArbitratorDeactivated {
        participant: ParticipantId,
    },
}

impl ProtocolEvent {
    /// The escrow this event concerns, if any.
    pub fn escrow_id(&self) -> Option<EscrowId> {
        match self {
            Self::EscrowCreated { escrow_id, .. }
            | Self::EscrowFunded { escrow_id, .. }
            | Self::PaymentReleased { escrow_id, .. }
            | Self::EscrowCompleted { escrow_id, .. }
            | Self::DisputeFiled { escrow_id, .. }
            | Self::DisputeResolved { escrow_id, .. }
            | Self::EscrowCancelled { escrow_id, .. }
            | Self::EscrowExpired { escrow_id, .. } => Some(*escrow_id),
            _ => None,
        }
    }

    /// Stable label for log lines and external consumers.
    pub fn label(&self) -> &'static str {
        match self {
            Self::EscrowCreated { .. } => "escrow_created",
            Self::EscrowFunded { .. } => "escrow_funded",
            Self::PaymentReleased { .. } => "payment_released",
            Self::EscrowCompleted { .. } => "escrow_completed",
            Self::DisputeFiled { .. } => "dispute_filed",
            Self::DisputeResolved { .. } => "dispute_resolved",
            Self::EscrowCancelled { .. } => "escrow_cancelled",
            Self::EscrowExpired { .. } => "escrow_expired",
            Self::TokenAdded { .. } => "token_added",
            Self::TokenStatusUpdated { .. } => "token_status_updated",
            Self::UserRegistered { .. } => "user_registered",
            Self::ArbitratorRegistered { .. } => "arbitrator_registered",
            Self::ArbitratorDeactivated { .. } => "arbitrator_deactivated",
        }
    }
}
