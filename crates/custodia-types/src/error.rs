//! Error types for Custodia
//!
//! Every rejected call leaves state byte-for-byte unchanged; no error is
//! silently swallowed. Errors carry enough payload for the caller to correct
//! input or re-query state without another round trip.

use crate::{Amount, EscrowId, EscrowStatus, ParticipantId};
use thiserror::Error;

/// Result type for Custodia operations
pub type Result<T> = std::result::Result<T, CustodiaError>;

/// Custodia error types
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CustodiaError {
    // ========================================================================
    // Validation Errors
    // ========================================================================

    /// Seller equals buyer, or a zero identity was supplied
    #[error("Invalid party: {reason}")]
    InvalidParty { reason: String },

    /// Amount rejected before any state change
    #[error("Invalid amount: {message}")]
    InvalidAmount { message: String },

    /// Amount overflow during arithmetic
    #[error("Amount overflow during arithmetic operation")]
    AmountOverflow,

    /// Amount underflow during arithmetic
    #[error("Amount underflow during arithmetic operation")]
    AmountUnderflow,

    /// Milestone amounts do not sum to the principal
    #[error("Milestone amounts sum to {actual}, expected {expected}")]
    MilestoneMismatch { expected: Amount, actual: Amount },

    /// Funding amount differs from principal + platform fee
    #[error("Incorrect funding amount: expected {expected}, supplied {supplied}")]
    IncorrectAmount { expected: Amount, supplied: Amount },

    /// Asset is not the native marker or an active registered token
    #[error("Unsupported settlement asset: {asset}")]
    UnsupportedAsset { asset: String },

    /// Contact identifier already maps to another participant
    #[error("Contact {contact} is already registered")]
    DuplicateContact { contact: String },

    /// Score above the upper bound
    #[error("Score {score} is out of bounds (maximum {max})")]
    ScoreOutOfBounds { score: u16, max: u16 },

    /// Arbitrator stake below the minimum
    #[error("Insufficient stake: required {required}, provided {provided}")]
    InsufficientStake { required: Amount, provided: Amount },

    /// Token already registered
    #[error("Token {token} is already registered")]
    TokenExists { token: String },

    // ========================================================================
    // State-Conflict Errors
    // ========================================================================

    /// Escrow creation is administratively paused
    #[error("Escrow creation is paused")]
    Paused,

    /// Operation requires the Pending state
    #[error("Escrow {escrow_id} is {status}, expected pending")]
    NotPending {
        escrow_id: EscrowId,
        status: EscrowStatus,
    },

    /// Operation requires the Funded state
    #[error("Escrow {escrow_id} is {status}, expected funded")]
    NotFunded {
        escrow_id: EscrowId,
        status: EscrowStatus,
    },

    /// Cancellation is only possible before funding
    #[error("Escrow {escrow_id} is {status} and can no longer be cancelled")]
    CannotCancelFunded {
        escrow_id: EscrowId,
        status: EscrowStatus,
    },

    /// An earlier milestone is still incomplete
    #[error("Milestone {index} of escrow {escrow_id} cannot release before earlier milestones")]
    MilestoneOutOfOrder { escrow_id: EscrowId, index: usize },

    /// Milestone already released
    #[error("Milestone {index} of escrow {escrow_id} is already released")]
    AlreadyCompleted { escrow_id: EscrowId, index: usize },

    /// A dispute is already recorded for this escrow
    #[error("Escrow {escrow_id} already has a dispute")]
    DisputeExists { escrow_id: EscrowId },

    /// Duplicate registration
    #[error("Participant {participant} is already registered")]
    AlreadyRegistered { participant: ParticipantId },

    // ========================================================================
    // Authorization Errors
    // ========================================================================

    /// Caller is not the buyer/seller/administrator the operation requires
    #[error("Unauthorized: {reason}")]
    Unauthorized { reason: String },

    // ========================================================================
    // Timing Errors
    // ========================================================================

    /// Expiry requested before the stored deadline
    #[error("Escrow {escrow_id} does not expire until {expires_at}")]
    NotExpired {
        escrow_id: EscrowId,
        expires_at: String,
    },

    // ========================================================================
    // Not-Found Errors
    // ========================================================================

    #[error("Escrow {escrow_id} not found")]
    EscrowNotFound { escrow_id: EscrowId },

    #[error("Milestone {index} of escrow {escrow_id} not found")]
    MilestoneNotFound { escrow_id: EscrowId, index: usize },

    #[error("Token {token} not found")]
    TokenNotFound { token: String },

    #[error("Participant {participant} has no reputation record")]
    NotRegistered { participant: ParticipantId },

    #[error("Participant {participant} is not a registered arbitrator")]
    ArbitratorNotFound { participant: ParticipantId },

    #[error("Escrow {escrow_id} has no dispute")]
    DisputeNotFound { escrow_id: EscrowId },

    #[error("Account {account} not found")]
    AccountNotFound { account: ParticipantId },

    // ========================================================================
    // Transfer Errors
    // ========================================================================

    /// The substrate refused a debit for lack of funds
    #[error("Insufficient funds in account {account}: requested {requested}, available {available}")]
    InsufficientFunds {
        account: ParticipantId,
        requested: Amount,
        available: Amount,
    },

    /// The substrate reported a failure; the whole transition is aborted
    #[error("Value transfer failed: {reason}")]
    TransferFailed { reason: String },
}

/// Protocol-level error taxonomy, used by callers to decide on retry behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Bad caller input; safe to retry after correcting it
    Validation,
    /// Operation invalid for the current state; re-query before retrying
    StateConflict,
    /// Caller lacks the required role; not retryable by that caller
    Authorization,
    /// Too early; retryable later
    Timing,
    /// Referenced entity does not exist
    NotFound,
    /// The value-transfer substrate failed; the transition was aborted
    Transfer,
}

impl CustodiaError {
    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create an invalid-party error
    pub fn invalid_party(reason: impl Into<String>) -> Self {
        Self::InvalidParty {
            reason: reason.into(),
        }
    }

    /// Classify this error per the protocol's error-handling taxonomy.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidParty { .. }
            | Self::InvalidAmount { .. }
            | Self::AmountOverflow
            | Self::AmountUnderflow
            | Self::MilestoneMismatch { .. }
            | Self::IncorrectAmount { .. }
            | Self::UnsupportedAsset { .. }
            | Self::DuplicateContact { .. }
            | Self::ScoreOutOfBounds { .. }
            | Self::InsufficientStake { .. }
            | Self::TokenExists { .. } => ErrorCategory::Validation,

            Self::Paused
            | Self::NotPending { .. }
            | Self::NotFunded { .. }
            | Self::CannotCancelFunded { .. }
            | Self::MilestoneOutOfOrder { .. }
            | Self::AlreadyCompleted { .. }
            | Self::DisputeExists { .. }
            | Self::AlreadyRegistered { .. } => ErrorCategory::StateConflict,

            Self::Unauthorized { .. } => ErrorCategory::Authorization,

            Self::NotExpired { .. } => ErrorCategory::Timing,

            Self::EscrowNotFound { .. }
            | Self::MilestoneNotFound { .. }
            | Self::TokenNotFound { .. }
            | Self::NotRegistered { .. }
            | Self::ArbitratorNotFound { .. }
            | Self::DisputeNotFound { .. }
            | Self::AccountNotFound { .. } => ErrorCategory::NotFound,

            Self::InsufficientFunds { .. } | Self::TransferFailed { .. } => {
                ErrorCategory::Transfer
            }
        }
    }

    /// Get an error code for API responses
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidParty { .. } => "INVALID_PARTY",
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::AmountOverflow => "AMOUNT_OVERFLOW",
            Self::AmountUnderflow => "AMOUNT_UNDERFLOW",
            Self::MilestoneMismatch { .. } => "MILESTONE_MISMATCH",
            Self::IncorrectAmount { .. } => "INCORRECT_AMOUNT",
            Self::UnsupportedAsset { .. } => "UNSUPPORTED_ASSET",
            Self::DuplicateContact { .. } => "DUPLICATE_CONTACT",
            Self::ScoreOutOfBounds { .. } => "SCORE_OUT_OF_BOUNDS",
            Self::InsufficientStake { .. } => "INSUFFICIENT_STAKE",
            Self::TokenExists { .. } => "TOKEN_EXISTS",
            Self::Paused => "PAUSED",
            Self::NotPending { .. } => "NOT_PENDING",
            Self::NotFunded { .. } => "NOT_FUNDED",
            Self::CannotCancelFunded { .. } => "CANNOT_CANCEL_FUNDED",
            Self::MilestoneOutOfOrder { .. } => "MILESTONE_OUT_OF_ORDER",
            Self::AlreadyCompleted { .. } => "ALREADY_COMPLETED",
            Self::DisputeExists { .. } => "DISPUTE_EXISTS",
            Self::AlreadyRegistered { .. } => "ALREADY_REGISTERED",
            Self::Unauthorized { .. } => "UNAUTHORIZED",
            Self::NotExpired { .. } => "NOT_EXPIRED",
            Self::EscrowNotFound { .. } => "ESCROW_NOT_FOUND",
            Self::MilestoneNotFound { .. } => "MILESTONE_NOT_FOUND",
            Self::TokenNotFound { .. } => "TOKEN_NOT_FOUND",
            Self::NotRegistered { .. } => "NOT_REGISTERED",
            Self::ArbitratorNotFound { .. } => "ARBITRATOR_NOT_FOUND",
            Self::DisputeNotFound { .. } => "DISPUTE_NOT_FOUND",
            Self::AccountNotFound { .. } => "ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::TransferFailed { .. } => "TRANSFER_FAILED",
        }
    }
}
