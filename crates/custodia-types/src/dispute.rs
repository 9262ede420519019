//! Dispute and arbitrator records

use crate::{Amount, EscrowId, ParticipantId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Resolution outcome of a dispute case.
///
/// `Pending` until an arbitrator rules. How a ruling maps back onto the
/// escrow (re-open, split payout, terminal settlement) is operator policy
/// layered above this core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DisputeOutcome {
    Pending,
    BuyerFavored,
    SellerFavored,
    /// Split ruling in basis points; the two sides must total 10000.
    Split { buyer_bps: u16, seller_bps: u16 },
}

/// A dispute case. At most one per escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dispute {
    pub escrow_id: EscrowId,
    pub initiator: ParticipantId,
    pub reason: String,
    pub filed_at: DateTime<Utc>,
    pub outcome: DisputeOutcome,
    pub resolved_at: Option<DateTime<Utc>>,
    /// Arbitrator who recorded the resolution, once resolved
    pub arbitrator: Option<ParticipantId>,
}

impl Dispute {
    pub fn new(escrow_id: EscrowId, initiator: ParticipantId, reason: impl Into<String>) -> Self {
        Self {
            escrow_id,
            initiator,
            reason: reason.into(),
            filed_at: Utc::now(),
            outcome: DisputeOutcome::Pending,
            resolved_at: None,
            arbitrator: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.outcome != DisputeOutcome::Pending
    }
}

/// A stake-backed dispute adjudicator.
///
/// Deactivation refunds the stake and clears the active flag but retains
/// the historical case counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Arbitrator {
    pub participant: ParticipantId,
    pub stake: Amount,
    pub active: bool,
    pub total_cases: u64,
    pub successful_cases: u64,
    pub registered_at: DateTime<Utc>,
}

impl Arbitrator {
    pub fn new(participant: ParticipantId, stake: Amount) -> Self {
        Self {
            participant,
            stake,
            active: true,
            total_cases: 0,
            successful_cases: 0,
            registered_at: Utc::now(),
        }
    }

    /// Fraction of handled cases that resolved successfully; 0 with no cases.
    pub fn success_rate(&self) -> f64 {
        if self.total_cases == 0 {
            0.0
        } else {
            self.successful_cases as f64 / self.total_cases as f64
        }
    }
}

/// Read-model for arbitrator queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArbitratorStats {
    pub total_cases: u64,
    pub successful_cases: u64,
    pub success_rate: f64,
    pub active: bool,
}

impl From<&Arbitrator> for ArbitratorStats {
    fn from(arbitrator: &Arbitrator) -> Self {
        Self {
            total_cases: arbitrator.total_cases,
            successful_cases: arbitrator.successful_cases,
            success_rate: arbitrator.success_rate(),
            active: arbitrator.active,
        }
    }
}
