//! Custodia Disputes - arbitrator staking and case records
//!
//! Arbitrators post a minimum stake to register; the stake lives in this
//! component's vault account on the value-transfer substrate and is refunded
//! on voluntary deactivation. Dispute cases are opened by the escrow manager
//! when a funded hold is contested — at most one case per escrow.
//!
//! Case assignment and voting mechanics beyond registration are operator
//! policy; this component only guarantees stake-backed accountability
//! bookkeeping.

use std::collections::HashMap;

use custodia_ledger::{EntryReason, ValueTransfer};
use custodia_types::{
    Amount, Arbitrator, ArbitratorStats, CustodiaError, Dispute, DisputeOutcome, EscrowId,
    ParticipantId, Result, SettlementAsset,
};
use tracing::{info, warn};

/// Minimum arbitrator stake: one native unit at the reference 9-decimal scale
pub const MIN_ARBITRATOR_STAKE: Amount = Amount::new(1_000_000_000);

/// Arbitrator registry and dispute case arena.
#[derive(Debug)]
pub struct DisputeResolution {
    /// The escrow-manager identity allowed to open and resolve cases
    manager: Option<ParticipantId>,
    admin: ParticipantId,
    /// Vault account holding arbitrator stakes
    vault: ParticipantId,
    min_stake: Amount,
    arbitrators: HashMap<ParticipantId, Arbitrator>,
    cases: HashMap<EscrowId, Dispute>,
}

impl DisputeResolution {
    pub fn new(admin: ParticipantId) -> Self {
        Self {
            manager: None,
            admin,
            vault: ParticipantId::new(),
            min_stake: MIN_ARBITRATOR_STAKE,
            arbitrators: HashMap::new(),
            cases: HashMap::new(),
        }
    }

    fn require_admin(&self, caller: &ParticipantId) -> Result<()> {
        if caller != &self.admin {
            return Err(CustodiaError::unauthorized(
                "dispute resolution administration requires the administrator",
            ));
        }
        Ok(())
    }

    fn require_manager(&self, caller: &ParticipantId) -> Result<()> {
        if self.manager.as_ref() != Some(caller) {
            return Err(CustodiaError::unauthorized(
                "case records are restricted to the escrow manager",
            ));
        }
        Ok(())
    }

    /// Bind the escrow-manager identity allowed to drive case records.
    pub fn set_manager(&mut self, caller: &ParticipantId, manager: ParticipantId) -> Result<()> {
        self.require_admin(caller)?;
        self.manager = Some(manager);
        Ok(())
    }

    /// The vault account stakes are held in.
    pub fn vault(&self) -> &ParticipantId {
        &self.vault
    }

    // ------------------------------------------------------------------
    // Arbitrator staking
    // ------------------------------------------------------------------

    /// Register as an arbitrator by posting stake.
    ///
    /// The stake is pulled from the caller into the vault before the record
    /// is created; a failed pull registers nothing. A previously deactivated
    /// arbitrator may stake again and keeps their historical case counters.
    pub fn register_arbitrator(
        &mut self,
        caller: &ParticipantId,
        stake: Amount,
        ledger: &mut dyn ValueTransfer,
    ) -> Result<()> {
        if stake < self.min_stake {
            return Err(CustodiaError::InsufficientStake {
                required: self.min_stake,
                provided: stake,
            });
        }
        if let Some(existing) = self.arbitrators.get(caller) {
            if existing.active {
                return Err(CustodiaError::AlreadyRegistered {
                    participant: caller.clone(),
                });
            }
        }

        ledger.transfer(
            caller,
            &self.vault,
            &SettlementAsset::Native,
            stake,
            EntryReason::ArbitratorStake,
        )?;

        match self.arbitrators.get_mut(caller) {
            Some(existing) => {
                existing.stake = stake;
                existing.active = true;
            }
            None => {
                self.arbitrators
                    .insert(caller.clone(), Arbitrator::new(caller.clone(), stake));
            }
        }
        info!("arbitrator registered: {} with stake {}", caller, stake);
        Ok(())
    }

    /// Voluntarily withdraw: refunds the stake, clears the active flag,
    /// retains case history.
    pub fn deactivate_arbitrator(
        &mut self,
        caller: &ParticipantId,
        ledger: &mut dyn ValueTransfer,
    ) -> Result<()> {
        let arbitrator =
            self.arbitrators
                .get(caller)
                .ok_or_else(|| CustodiaError::ArbitratorNotFound {
                    participant: caller.clone(),
                })?;
        if !arbitrator.active {
            return Err(CustodiaError::ArbitratorNotFound {
                participant: caller.clone(),
            });
        }
        let stake = arbitrator.stake;

        ledger.transfer(
            &self.vault,
            caller,
            &SettlementAsset::Native,
            stake,
            EntryReason::StakeRefund,
        )?;

        // Refund succeeded; the record update below cannot fail.
        if let Some(arbitrator) = self.arbitrators.get_mut(caller) {
            arbitrator.active = false;
            arbitrator.stake = Amount::zero();
        }
        warn!("arbitrator deactivated: {} (stake refunded {})", caller, stake);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Case records
    // ------------------------------------------------------------------

    /// Open a dispute case for an escrow. Escrow-manager only.
    pub fn open_case(
        &mut self,
        caller: &ParticipantId,
        escrow_id: EscrowId,
        initiator: ParticipantId,
        reason: impl Into<String>,
    ) -> Result<()> {
        self.require_manager(caller)?;
        if self.cases.contains_key(&escrow_id) {
            return Err(CustodiaError::DisputeExists { escrow_id });
        }
        self.cases
            .insert(escrow_id, Dispute::new(escrow_id, initiator, reason));
        Ok(())
    }

    /// Record the resolution of a case: stamps the outcome and updates the
    /// arbitrator's counters. Escrow-manager only.
    ///
    /// What a ruling does to the escrow itself (re-open, split payout,
    /// terminal settlement) is operator policy layered above this core.
    pub fn record_resolution(
        &mut self,
        caller: &ParticipantId,
        escrow_id: EscrowId,
        arbitrator_id: &ParticipantId,
        outcome: DisputeOutcome,
    ) -> Result<()> {
        self.require_manager(caller)?;

        let arbitrator = self.arbitrators.get(arbitrator_id).ok_or_else(|| {
            CustodiaError::ArbitratorNotFound {
                participant: arbitrator_id.clone(),
            }
        })?;
        if !arbitrator.active {
            return Err(CustodiaError::ArbitratorNotFound {
                participant: arbitrator_id.clone(),
            });
        }

        let case = self
            .cases
            .get_mut(&escrow_id)
            .ok_or(CustodiaError::DisputeNotFound { escrow_id })?;
        if case.is_resolved() {
            return Err(CustodiaError::DisputeExists { escrow_id });
        }

        case.outcome = outcome;
        case.resolved_at = Some(chrono::Utc::now());
        case.arbitrator = Some(arbitrator_id.clone());

        // All validation passed above; the lookup cannot miss now.
        if let Some(arbitrator) = self.arbitrators.get_mut(arbitrator_id) {
            arbitrator.total_cases += 1;
            if outcome != DisputeOutcome::Pending {
                arbitrator.successful_cases += 1;
            }
        }
        info!("dispute resolved: {} by {}", escrow_id, arbitrator_id);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Read-only queries
    // ------------------------------------------------------------------

    pub fn has_dispute(&self, escrow_id: EscrowId) -> bool {
        self.cases.contains_key(&escrow_id)
    }

    pub fn get_dispute(&self, escrow_id: EscrowId) -> Option<&Dispute> {
        self.cases.get(&escrow_id)
    }

    pub fn get_arbitrator_stats(&self, participant: &ParticipantId) -> Option<ArbitratorStats> {
        self.arbitrators.get(participant).map(ArbitratorStats::from)
    }

    pub fn is_arbitrator_active(&self, participant: &ParticipantId) -> bool {
        self.arbitrators
            .get(participant)
            .map(|a| a.active)
            .unwrap_or(false)
    }
}
