//! Escrow and milestone records
//!
//! The escrow record is owned exclusively by the escrow manager. It is
//! created on `create_escrow`, mutated only through the manager's state
//! machine, and never deleted — terminal states are retained for audit.

use crate::{Amount, CustodiaError, EscrowId, ParticipantId, Result, SettlementAsset};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Escrow lifecycle state.
///
/// Transitions are one-way:
/// `Pending → Funded → {Completed | Disputed | Expired}` and
/// `Pending → Cancelled`. No state is ever revisited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Created, not yet funded
    Pending,
    /// Principal + platform fee held in custody
    Funded,
    /// All value released to the seller
    Completed,
    /// A dispute has been filed
    Disputed,
    /// Expiry deadline passed, held funds refunded to the buyer
    Expired,
    /// Cancelled by the buyer before funding
    Cancelled,
}

impl EscrowStatus {
    /// Terminal states are retained for audit and accept no transition.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Disputed | Self::Expired | Self::Cancelled
        )
    }
}

impl fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "pending",
            Self::Funded => "funded",
            Self::Completed => "completed",
            Self::Disputed => "disputed",
            Self::Expired => "expired",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Caller-supplied milestone description at escrow creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneSpec {
    pub amount: Amount,
    pub description: String,
}

impl MilestoneSpec {
    pub fn new(amount: Amount, description: impl Into<String>) -> Self {
        Self {
            amount,
            description: description.into(),
        }
    }
}

/// A partial, ordered release unit within a single escrow.
///
/// The milestone list is fixed-size after creation and releases strictly in
/// list order: index 0 first, and no milestone while an earlier one is
/// incomplete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Milestone {
    pub amount: Amount,
    pub description: String,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<MilestoneSpec> for Milestone {
    fn from(spec: MilestoneSpec) -> Self {
        Self {
            amount: spec.amount,
            description: spec.description,
            completed: false,
            completed_at: None,
        }
    }
}

/// Parameters for creating a new escrow. The caller is the buyer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscrowParams {
    pub seller: ParticipantId,
    pub description: String,
    /// Opaque, caller-supplied. Not interpreted by the core.
    pub metadata_hash: String,
    /// Empty means the full principal releases atomically.
    pub milestones: Vec<MilestoneSpec>,
    pub asset: SettlementAsset,
    pub amount: Amount,
}

/// A custodial hold of funds pending buyer/seller agreement or arbitration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Escrow {
    pub id: EscrowId,
    pub buyer: ParticipantId,
    pub seller: ParticipantId,
    pub asset: SettlementAsset,
    /// Principal amount owed to the seller
    pub amount: Amount,
    /// Fee retained by the operator, computed at creation and fixed for the
    /// escrow's lifetime
    pub platform_fee: Amount,
    pub status: EscrowStatus,
    pub created_at: DateTime<Utc>,
    /// Set when funding lands; anchors the expiry deadline
    pub funded_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub description: String,
    pub metadata_hash: String,
    pub milestones: Vec<Milestone>,
}

impl Escrow {
    /// Principal plus platform fee — the amount held in custody once funded.
    pub fn total_held(&self) -> Result<Amount> {
        self.amount.checked_add(self.platform_fee)
    }

    pub fn is_party(&self, participant: &ParticipantId) -> bool {
        participant == &self.buyer || participant == &self.seller
    }

    /// Number of milestones already released
    pub fn released_count(&self) -> usize {
        self.milestones.iter().filter(|m| m.completed).count()
    }

    /// Index of the next milestone eligible for release, if any
    pub fn next_unreleased(&self) -> Option<usize> {
        self.milestones.iter().position(|m| !m.completed)
    }

    /// Sum of milestone amounts. Zero for an empty list.
    pub fn milestone_total(&self) -> Result<Amount> {
        self.milestones
            .iter()
            .try_fold(Amount::zero(), |acc, m| acc.checked_add(m.amount))
    }

    /// Check the expiry deadline against a supplied instant.
    ///
    /// There is no background timer anywhere in the core; expiry is always a
    /// lazy comparison against the stored deadline.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        match self.expires_at {
            Some(deadline) => now >= deadline,
            None => false,
        }
    }
}

/// Validate a milestone list against the escrow principal.
///
/// Non-empty milestones must sum exactly to the principal, and every
/// milestone must carry a positive amount.
pub fn validate_milestones(milestones: &[MilestoneSpec], amount: Amount) -> Result<()> {
    if milestones.is_empty() {
        return Ok(());
    }
    let mut total = Amount::zero();
    for spec in milestones {
        if spec.amount.is_zero() {
            return Err(CustodiaError::InvalidAmount {
                message: "milestone amount must be greater than zero".to_string(),
            });
        }
        total = total.checked_add(spec.amount)?;
    }
    if total != amount {
        return Err(CustodiaError::MilestoneMismatch {
            expected: amount,
            actual: total,
        });
    }
    Ok(())
}
