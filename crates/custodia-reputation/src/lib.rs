//! Custodia Reputation - participant trust registry
//!
//! Records are created by explicit registration only and never deleted.
//! Transaction-driven mutation (completion credit, dispute decay) is gated
//! to the one registered escrow-manager identity; direct overrides and bulk
//! corrections are gated to the administrator.

use std::collections::HashMap;

use custodia_types::{
    Amount, CustodiaError, ParticipantId, ReputationRecord, Result, MAX_SCORE,
};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Score increase applied to the seller when an escrow completes
pub const COMPLETION_SCORE_DELTA: u16 = 10;

/// Score decay applied to both parties when a dispute is filed
pub const DISPUTE_SCORE_DELTA: u16 = 25;

/// Arena of reputation records with a contact-uniqueness index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReputationRegistry {
    admin: ParticipantId,
    /// The escrow-manager identity allowed to drive transaction updates
    manager: Option<ParticipantId>,
    records: HashMap<ParticipantId, ReputationRecord>,
    /// Secondary index: contact identifier → participant
    by_contact: HashMap<String, ParticipantId>,
}

impl ReputationRegistry {
    pub fn new(admin: ParticipantId) -> Self {
        Self {
            admin,
            manager: None,
            records: HashMap::new(),
            by_contact: HashMap::new(),
        }
    }

    fn require_admin(&self, caller: &ParticipantId) -> Result<()> {
        if caller != &self.admin {
            return Err(CustodiaError::unauthorized(
                "reputation registry administration requires the administrator",
            ));
        }
        Ok(())
    }

    fn require_manager(&self, caller: &ParticipantId) -> Result<()> {
        if self.manager.as_ref() != Some(caller) {
            return Err(CustodiaError::unauthorized(
                "transaction updates are restricted to the escrow manager",
            ));
        }
        Ok(())
    }

    /// Bind the escrow-manager identity allowed to drive updates.
    pub fn set_manager(&mut self, caller: &ParticipantId, manager: ParticipantId) -> Result<()> {
        self.require_admin(caller)?;
        self.manager = Some(manager);
        Ok(())
    }

    /// Register a participant with the initial score.
    pub fn register_user(
        &mut self,
        caller: &ParticipantId,
        participant: ParticipantId,
        contact: impl Into<String>,
        is_vendor: bool,
    ) -> Result<()> {
        self.require_admin(caller)?;
        if self.records.contains_key(&participant) {
            return Err(CustodiaError::AlreadyRegistered { participant });
        }
        let contact = contact.into();
        if self.by_contact.contains_key(&contact) {
            return Err(CustodiaError::DuplicateContact { contact });
        }

        self.by_contact.insert(contact.clone(), participant.clone());
        self.records.insert(
            participant.clone(),
            ReputationRecord::new(participant.clone(), contact, is_vendor),
        );
        info!("participant registered: {} (vendor: {})", participant, is_vendor);
        Ok(())
    }

    /// Administrator override of a participant's score.
    ///
    /// Zero is the valid floor; only values above the maximum are rejected.
    pub fn set_score(
        &mut self,
        caller: &ParticipantId,
        participant: &ParticipantId,
        score: u16,
    ) -> Result<()> {
        self.require_admin(caller)?;
        if score > MAX_SCORE {
            return Err(CustodiaError::ScoreOutOfBounds {
                score,
                max: MAX_SCORE,
            });
        }
        let record = self.record_mut(participant)?;
        record.score = score;
        Ok(())
    }

    /// Credit a completed escrow to a participant. Escrow-manager only.
    pub fn record_completion(
        &mut self,
        caller: &ParticipantId,
        participant: &ParticipantId,
        volume: Amount,
    ) -> Result<()> {
        self.require_manager(caller)?;
        let record = self.record_mut(participant)?;
        record.credit_completion(volume, COMPLETION_SCORE_DELTA)
    }

    /// Note a filed dispute against a participant. Escrow-manager only.
    pub fn record_dispute(
        &mut self,
        caller: &ParticipantId,
        participant: &ParticipantId,
    ) -> Result<()> {
        self.require_manager(caller)?;
        let record = self.record_mut(participant)?;
        record.note_dispute(DISPUTE_SCORE_DELTA);
        Ok(())
    }

    /// Bulk correction entry point for backfills and migrations.
    pub fn update_transaction_stats(
        &mut self,
        caller: &ParticipantId,
        participant: &ParticipantId,
        total: u64,
        completed: u64,
        disputes: u64,
        volume: Amount,
    ) -> Result<()> {
        self.require_admin(caller)?;
        let record = self.record_mut(participant)?;
        record.total_transactions = total;
        record.completed_transactions = completed;
        record.dispute_count = disputes;
        record.total_volume = volume;
        Ok(())
    }

    fn record_mut(&mut self, participant: &ParticipantId) -> Result<&mut ReputationRecord> {
        self.records
            .get_mut(participant)
            .ok_or_else(|| CustodiaError::NotRegistered {
                participant: participant.clone(),
            })
    }

    // ------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------

    pub fn get_reputation_data(&self, participant: &ParticipantId) -> Option<&ReputationRecord> {
        self.records.get(participant)
    }

    pub fn get_score(&self, participant: &ParticipantId) -> Option<u16> {
        self.records.get(participant).map(|r| r.score)
    }

    pub fn is_registered(&self, participant: &ParticipantId) -> bool {
        self.records.contains_key(participant)
    }

    pub fn is_vendor(&self, participant: &ParticipantId) -> bool {
        self.records
            .get(participant)
            .map(|r| r.is_vendor)
            .unwrap_or(false)
    }

    pub fn get_user_by_contact(&self, contact: &str) -> Option<&ParticipantId> {
        self.by_contact.get(contact)
    }
}
