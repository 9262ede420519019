//! Reputation records
//!
//! One record per participant identity, created on explicit registration
//! (never implicitly on first transaction). Records are mutated only through
//! the reputation registry's entry points and never deleted.

use crate::{Amount, ParticipantId, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Score assigned at registration
pub const INITIAL_SCORE: u16 = 500;

/// Upper bound of the reputation score range
pub const MAX_SCORE: u16 = 1000;

/// Bounded trust metric and transaction counters for one participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReputationRecord {
    pub participant: ParticipantId,
    /// Contact identifier (e.g. email). Unique across the registry.
    pub contact: String,
    pub is_vendor: bool,
    /// Bounded to [0, 1000]
    pub score: u16,
    pub total_transactions: u64,
    pub completed_transactions: u64,
    pub dispute_count: u64,
    /// Cumulative settled volume across completed escrows
    pub total_volume: Amount,
    pub registered_at: DateTime<Utc>,
}

impl ReputationRecord {
    pub fn new(participant: ParticipantId, contact: impl Into<String>, is_vendor: bool) -> Self {
        Self {
            participant,
            contact: contact.into(),
            is_vendor,
            score: INITIAL_SCORE,
            total_transactions: 0,
            completed_transactions: 0,
            dispute_count: 0,
            total_volume: Amount::zero(),
            registered_at: Utc::now(),
        }
    }

    /// Credit a completed escrow: counters, settled volume, and a score
    /// increase clamped to the upper bound.
    pub fn credit_completion(&mut self, volume: Amount, score_delta: u16) -> Result<()> {
        self.total_volume = self.total_volume.checked_add(volume)?;
        self.total_transactions += 1;
        self.completed_transactions += 1;
        self.score = self.score.saturating_add(score_delta).min(MAX_SCORE);
        Ok(())
    }

    /// Note a filed dispute: counter plus a score decay clamped at zero.
    pub fn note_dispute(&mut self, score_delta: u16) {
        self.dispute_count += 1;
        self.score = self.score.saturating_sub(score_delta);
    }
}
