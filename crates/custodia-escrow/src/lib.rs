//! Custodia Escrow Manager - custodial settlement state machine
//!
//! The EscrowManager owns all escrow and milestone records and is the sole
//! writer into the payment processor, the reputation registry, and dispute
//! resolution. Control flow is always inbound: the sibling components never
//! call back into the manager.
//!
//! # State machine
//!
//! ```text
//! Pending ──fund──▶ Funded ──release(last)──▶ Completed
//!    │                 ├──────file_dispute──▶ Disputed
//!    │                 └──────expire────────▶ Expired
//!    └──cancel──▶ Cancelled
//! ```
//!
//! All transitions are one-way. Every public entry point either fully
//! succeeds (value moved, state persisted, event recorded) or fails with
//! state byte-for-byte unchanged: value moves through the transfer substrate
//! *before* any record is mutated, so a substrate failure aborts the call.

use std::collections::HashMap;

use chrono::{Duration, Utc};
use tracing::{info, warn};

use custodia_audit::EventLog;
use custodia_disputes::DisputeResolution;
use custodia_ledger::{EntryReason, ValueTransfer};
use custodia_payments::PaymentProcessor;
use custodia_reputation::ReputationRegistry;
use custodia_tokens::TokenRegistry;
use custodia_types::{
    validate_milestones, Amount, CustodiaError, Dispute, DisputeOutcome, Escrow, EscrowId,
    EscrowParams, EscrowStatus, Milestone, ParticipantId, ProtocolEvent, Result, TokenId,
    TokenInfo,
};

/// Days from funding until a hold can be expired
pub const ESCROW_EXPIRY_DAYS: i64 = 30;

/// Orchestrator of the escrow lifecycle.
///
/// Generic over the injected value-transfer substrate; production wires a
/// real settlement backend, tests use `custodia_ledger::InMemoryLedger`.
pub struct EscrowManager<L: ValueTransfer> {
    admin: ParticipantId,
    /// Identity this manager presents to the components it drives
    manager_id: ParticipantId,
    /// Custody account holding principal + fee for funded escrows
    custody: ParticipantId,
    /// Destination of swept platform fees
    treasury: ParticipantId,
    paused: bool,
    expiry_window: Duration,
    next_id: u64,
    escrows: HashMap<EscrowId, Escrow>,
    tokens: TokenRegistry,
    payments: PaymentProcessor,
    reputation: ReputationRegistry,
    disputes: DisputeResolution,
    ledger: L,
    events: EventLog,
}

impl<L: ValueTransfer> EscrowManager<L> {
    /// Create a manager with freshly wired components.
    pub fn new(admin: ParticipantId, ledger: L) -> Result<Self> {
        let manager_id = ParticipantId::new();

        let mut payments = PaymentProcessor::new(admin.clone());
        payments.set_authorized_caller(&admin, manager_id.clone())?;

        let mut reputation = ReputationRegistry::new(admin.clone());
        reputation.set_manager(&admin, manager_id.clone())?;

        let mut disputes = DisputeResolution::new(admin.clone());
        disputes.set_manager(&admin, manager_id.clone())?;

        Ok(Self {
            admin: admin.clone(),
            manager_id,
            custody: ParticipantId::new(),
            treasury: admin.clone(),
            paused: false,
            expiry_window: Duration::days(ESCROW_EXPIRY_DAYS),
            next_id: 1,
            escrows: HashMap::new(),
            tokens: TokenRegistry::new(admin),
            payments,
            reputation,
            disputes,
            ledger,
            events: EventLog::new(),
        })
    }

    /// Override the expiry window (primarily for tests and staging).
    pub fn with_expiry_window(mut self, window: Duration) -> Self {
        self.expiry_window = window;
        self
    }

    fn require_admin(&self, caller: &ParticipantId) -> Result<()> {
        if caller != &self.admin {
            return Err(CustodiaError::unauthorized(
                "escrow administration requires the administrator",
            ));
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Escrow lifecycle
    // ------------------------------------------------------------------

    /// Create a new escrow. The caller is the buyer.
    ///
    /// Native-asset escrows start `Pending` and require a separate funding
    /// step; token-denominated escrows pull `principal + platform_fee` from
    /// the buyer immediately and are created already `Funded`.
    pub fn create_escrow(
        &mut self,
        caller: &ParticipantId,
        params: EscrowParams,
    ) -> Result<EscrowId> {
        if self.paused {
            return Err(CustodiaError::Paused);
        }
        if params.seller == *caller {
            return Err(CustodiaError::invalid_party("seller and buyer must differ"));
        }
        if params.seller.is_zero() {
            return Err(CustodiaError::invalid_party(
                "seller cannot be the zero identity",
            ));
        }
        if params.amount.is_zero() {
            return Err(CustodiaError::InvalidAmount {
                message: "escrow principal must be greater than zero".to_string(),
            });
        }
        if !self.tokens.is_asset_allowed(&params.asset) {
            return Err(CustodiaError::UnsupportedAsset {
                asset: params.asset.to_string(),
            });
        }
        validate_milestones(&params.milestones, params.amount)?;

        let platform_fee = self.payments.platform_fee(params.amount)?;
        let total = params.amount.checked_add(platform_fee)?;
        let id = EscrowId(self.next_id);
        let now = Utc::now();
        let auto_fund = !params.asset.is_native();

        if auto_fund {
            self.payments.execute_transfer(
                &self.manager_id,
                &mut self.ledger,
                caller,
                &self.custody,
                &params.asset,
                total,
                EntryReason::EscrowFunding { escrow_id: id },
            )?;
        }

        let seller = params.seller.clone();
        let amount = params.amount;
        let mut escrow = Escrow {
            id,
            buyer: caller.clone(),
            seller: params.seller,
            asset: params.asset,
            amount: params.amount,
            platform_fee,
            status: EscrowStatus::Pending,
            created_at: now,
            funded_at: None,
            expires_at: None,
            description: params.description,
            metadata_hash: params.metadata_hash,
            milestones: params.milestones.into_iter().map(Milestone::from).collect(),
        };
        if auto_fund {
            escrow.status = EscrowStatus::Funded;
            escrow.funded_at = Some(now);
            escrow.expires_at = Some(now + self.expiry_window);
        }

        self.escrows.insert(id, escrow);
        self.next_id += 1;

        self.events.record(ProtocolEvent::EscrowCreated {
            escrow_id: id,
            buyer: caller.clone(),
            seller,
            amount,
        });
        if auto_fund {
            self.events.record(ProtocolEvent::EscrowFunded {
                escrow_id: id,
                buyer: caller.clone(),
                amount: total,
            });
        }
        info!("escrow created: {} for {} ({})", id, amount, if auto_fund { "auto-funded" } else { "pending" });
        Ok(id)
    }

    /// Fund a pending escrow. Buyer only; the supplied amount must equal
    /// `principal + platform_fee` exactly.
    pub fn fund_escrow(
        &mut self,
        caller: &ParticipantId,
        id: EscrowId,
        supplied: Amount,
    ) -> Result<()> {
        let escrow = self
            .escrows
            .get(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        if escrow.status != EscrowStatus::Pending {
            return Err(CustodiaError::NotPending {
                escrow_id: id,
                status: escrow.status,
            });
        }
        if caller != &escrow.buyer {
            return Err(CustodiaError::unauthorized("only the buyer can fund an escrow"));
        }
        let total = escrow.total_held()?;
        if supplied != total {
            return Err(CustodiaError::IncorrectAmount {
                expected: total,
                supplied,
            });
        }
        let asset = escrow.asset.clone();

        self.payments.execute_transfer(
            &self.manager_id,
            &mut self.ledger,
            caller,
            &self.custody,
            &asset,
            total,
            EntryReason::EscrowFunding { escrow_id: id },
        )?;

        let now = Utc::now();
        let escrow = self
            .escrows
            .get_mut(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        escrow.status = EscrowStatus::Funded;
        escrow.funded_at = Some(now);
        escrow.expires_at = Some(now + self.expiry_window);

        self.events.record(ProtocolEvent::EscrowFunded {
            escrow_id: id,
            buyer: caller.clone(),
            amount: total,
        });
        info!("escrow funded: {} holding {}", id, total);
        Ok(())
    }

    /// Release one milestone (or the full principal for an escrow without
    /// milestones, as implicit tranche index 0) to the seller.
    ///
    /// Milestones release strictly in list order. Releasing the last
    /// outstanding tranche completes the escrow, sweeps the platform fee to
    /// the treasury, and credits the seller's reputation.
    pub fn release_payment(
        &mut self,
        caller: &ParticipantId,
        id: EscrowId,
        milestone_index: usize,
    ) -> Result<()> {
        let escrow = self
            .escrows
            .get(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        if escrow.status != EscrowStatus::Funded {
            return Err(CustodiaError::NotFunded {
                escrow_id: id,
                status: escrow.status,
            });
        }
        if !escrow.is_party(caller) {
            return Err(CustodiaError::unauthorized(
                "only the buyer or seller can release payment",
            ));
        }

        let (tranche, is_final) = if escrow.milestones.is_empty() {
            if milestone_index != 0 {
                return Err(CustodiaError::MilestoneNotFound {
                    escrow_id: id,
                    index: milestone_index,
                });
            }
            (escrow.amount, true)
        } else {
            let milestone = escrow.milestones.get(milestone_index).ok_or(
                CustodiaError::MilestoneNotFound {
                    escrow_id: id,
                    index: milestone_index,
                },
            )?;
            if milestone.completed {
                return Err(CustodiaError::AlreadyCompleted {
                    escrow_id: id,
                    index: milestone_index,
                });
            }
            if escrow.milestones[..milestone_index].iter().any(|m| !m.completed) {
                return Err(CustodiaError::MilestoneOutOfOrder {
                    escrow_id: id,
                    index: milestone_index,
                });
            }
            (
                milestone.amount,
                escrow.released_count() == escrow.milestones.len() - 1,
            )
        };

        let buyer = escrow.buyer.clone();
        let seller = escrow.seller.clone();
        let asset = escrow.asset.clone();
        let principal = escrow.amount;
        let fee = escrow.platform_fee;

        // Seller tranche first, then the fee sweep: custody holds exactly
        // principal + fee, so the sweep cannot fail after a partial payout.
        self.payments.execute_transfer(
            &self.manager_id,
            &mut self.ledger,
            &self.custody,
            &seller,
            &asset,
            tranche,
            EntryReason::EscrowRelease { escrow_id: id },
        )?;
        if is_final && !fee.is_zero() {
            self.payments.execute_transfer(
                &self.manager_id,
                &mut self.ledger,
                &self.custody,
                &self.treasury,
                &asset,
                fee,
                EntryReason::FeeSweep { escrow_id: id },
            )?;
        }

        let now = Utc::now();
        let escrow = self
            .escrows
            .get_mut(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        if let Some(milestone) = escrow.milestones.get_mut(milestone_index) {
            milestone.completed = true;
            milestone.completed_at = Some(now);
        }
        if is_final {
            escrow.status = EscrowStatus::Completed;
        }

        self.events.record(ProtocolEvent::PaymentReleased {
            escrow_id: id,
            seller: seller.clone(),
            amount: tranche,
            milestone_index,
        });

        if is_final {
            self.events.record(ProtocolEvent::EscrowCompleted {
                escrow_id: id,
                buyer,
                seller: seller.clone(),
                amount: principal,
            });
            // Reputation records exist only by explicit registration; an
            // unregistered seller simply accrues nothing.
            if self.reputation.is_registered(&seller) {
                self.reputation
                    .record_completion(&self.manager_id, &seller, principal)?;
            }
            info!("escrow completed: {} settled {} to {}", id, principal, seller);
        } else {
            info!("milestone released: {} tranche {} of {}", id, milestone_index, tranche);
        }
        Ok(())
    }

    /// File a dispute against a funded escrow. Buyer or seller only; at most
    /// one dispute per escrow, ever.
    pub fn file_dispute(
        &mut self,
        caller: &ParticipantId,
        id: EscrowId,
        reason: impl Into<String>,
    ) -> Result<()> {
        let escrow = self
            .escrows
            .get(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        // A prior dispute outranks the state check so repeat filings are
        // reported as DisputeExists rather than NotFunded.
        if self.disputes.has_dispute(id) {
            return Err(CustodiaError::DisputeExists { escrow_id: id });
        }
        if escrow.status != EscrowStatus::Funded {
            return Err(CustodiaError::NotFunded {
                escrow_id: id,
                status: escrow.status,
            });
        }
        if !escrow.is_party(caller) {
            return Err(CustodiaError::unauthorized(
                "only the buyer or seller can file a dispute",
            ));
        }
        let buyer = escrow.buyer.clone();
        let seller = escrow.seller.clone();

        self.disputes
            .open_case(&self.manager_id, id, caller.clone(), reason)?;
        for party in [&buyer, &seller] {
            if self.reputation.is_registered(party) {
                self.reputation.record_dispute(&self.manager_id, party)?;
            }
        }

        let escrow = self
            .escrows
            .get_mut(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        escrow.status = EscrowStatus::Disputed;

        self.events.record(ProtocolEvent::DisputeFiled {
            escrow_id: id,
            initiator: caller.clone(),
        });
        warn!("dispute filed: {} by {}", id, caller);
        Ok(())
    }

    /// Cancel an unfunded escrow. Buyer only. Nothing is refunded — a
    /// `Pending` escrow holds no funds.
    pub fn cancel_escrow(&mut self, caller: &ParticipantId, id: EscrowId) -> Result<()> {
        let escrow = self
            .escrows
            .get(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        if escrow.status != EscrowStatus::Pending {
            return Err(CustodiaError::CannotCancelFunded {
                escrow_id: id,
                status: escrow.status,
            });
        }
        if caller != &escrow.buyer {
            return Err(CustodiaError::unauthorized("only the buyer can cancel an escrow"));
        }

        let escrow = self
            .escrows
            .get_mut(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        escrow.status = EscrowStatus::Cancelled;

        self.events.record(ProtocolEvent::EscrowCancelled {
            escrow_id: id,
            buyer: caller.clone(),
        });
        info!("escrow cancelled: {}", id);
        Ok(())
    }

    /// Expire a funded escrow whose deadline has passed. Callable by anyone;
    /// refunds the full held amount (principal + fee) to the buyer.
    ///
    /// There is no timer: this is a lazy check of the current time against
    /// the deadline stored at funding.
    pub fn expire_escrow(&mut self, id: EscrowId) -> Result<()> {
        let escrow = self
            .escrows
            .get(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        if escrow.status != EscrowStatus::Funded {
            return Err(CustodiaError::NotFunded {
                escrow_id: id,
                status: escrow.status,
            });
        }
        let deadline = match escrow.expires_at {
            Some(deadline) => deadline,
            None => {
                return Err(CustodiaError::NotFunded {
                    escrow_id: id,
                    status: escrow.status,
                })
            }
        };
        if !escrow.is_expired_at(Utc::now()) {
            return Err(CustodiaError::NotExpired {
                escrow_id: id,
                expires_at: deadline.to_rfc3339(),
            });
        }
        let buyer = escrow.buyer.clone();
        let asset = escrow.asset.clone();
        let total = escrow.total_held()?;

        self.payments.execute_transfer(
            &self.manager_id,
            &mut self.ledger,
            &self.custody,
            &buyer,
            &asset,
            total,
            EntryReason::EscrowRefund { escrow_id: id },
        )?;

        let escrow = self
            .escrows
            .get_mut(&id)
            .ok_or(CustodiaError::EscrowNotFound { escrow_id: id })?;
        escrow.status = EscrowStatus::Expired;

        self.events.record(ProtocolEvent::EscrowExpired {
            escrow_id: id,
            buyer,
            amount: total,
        });
        warn!("escrow expired: {} refunded {}", id, total);
        Ok(())
    }

    // ------------------------------------------------------------------
    // Arbitration
    // ------------------------------------------------------------------

    /// Register the caller as an arbitrator by posting stake.
    pub fn register_arbitrator(&mut self, caller: &ParticipantId, stake: Amount) -> Result<()> {
        self.disputes
            .register_arbitrator(caller, stake, &mut self.ledger)?;
        self.events.record(ProtocolEvent::ArbitratorRegistered {
            participant: caller.clone(),
            stake,
        });
        Ok(())
    }

    /// Voluntarily withdraw as an arbitrator; the stake is refunded.
    pub fn deactivate_arbitrator(&mut self, caller: &ParticipantId) -> Result<()> {
        self.disputes.deactivate_arbitrator(caller, &mut self.ledger)?;
        self.events.record(ProtocolEvent::ArbitratorDeactivated {
            participant: caller.clone(),
        });
        Ok(())
    }

    /// Record an arbitrator's ruling on a filed dispute. Administrator only.
    ///
    /// Bookkeeping only: the escrow stays `Disputed`; how a ruling settles
    /// the held funds is operator policy layered above this core.
    pub fn resolve_dispute(
        &mut self,
        caller: &ParticipantId,
        id: EscrowId,
        arbitrator: &ParticipantId,
        outcome: DisputeOutcome,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.disputes
            .record_resolution(&self.manager_id, id, arbitrator, outcome)?;
        self.events.record(ProtocolEvent::DisputeResolved {
            escrow_id: id,
            arbitrator: arbitrator.clone(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Pause escrow creation. In-flight escrows keep progressing through
    /// funding, release, dispute, and expiry so buyer funds never strand.
    pub fn pause(&mut self, caller: &ParticipantId) -> Result<()> {
        self.require_admin(caller)?;
        self.paused = true;
        info!("escrow creation paused");
        Ok(())
    }

    pub fn unpause(&mut self, caller: &ParticipantId) -> Result<()> {
        self.require_admin(caller)?;
        self.paused = false;
        info!("escrow creation unpaused");
        Ok(())
    }

    /// Register a settlement token with the registry and the payment
    /// processor's allow-list in one step.
    pub fn add_token(&mut self, caller: &ParticipantId, info: TokenInfo) -> Result<()> {
        let token = info.token.clone();
        let symbol = info.symbol.clone();
        self.tokens.add_token(caller, info)?;
        self.payments
            .set_supported_token(caller, token.clone(), true)?;
        self.events
            .record(ProtocolEvent::TokenAdded { token, symbol });
        Ok(())
    }

    /// Flip a token's active flag in the registry and the processor's
    /// allow-list. Existing escrows in the token are unaffected.
    pub fn update_token_status(
        &mut self,
        caller: &ParticipantId,
        token: TokenId,
        active: bool,
    ) -> Result<()> {
        self.tokens.update_token_status(caller, &token, active)?;
        self.payments
            .set_supported_token(caller, token.clone(), active)?;
        self.events
            .record(ProtocolEvent::TokenStatusUpdated { token, active });
        Ok(())
    }

    /// Replace the wired components, rebinding their manager identities.
    /// The incoming components must share this manager's administrator.
    pub fn set_contracts(
        &mut self,
        caller: &ParticipantId,
        mut payments: PaymentProcessor,
        mut reputation: ReputationRegistry,
        mut disputes: DisputeResolution,
    ) -> Result<()> {
        self.require_admin(caller)?;
        payments.set_authorized_caller(&self.admin, self.manager_id.clone())?;
        reputation.set_manager(&self.admin, self.manager_id.clone())?;
        disputes.set_manager(&self.admin, self.manager_id.clone())?;
        self.payments = payments;
        self.reputation = reputation;
        self.disputes = disputes;
        info!("component wiring replaced");
        Ok(())
    }

    /// Redirect swept platform fees.
    pub fn set_treasury(&mut self, caller: &ParticipantId, treasury: ParticipantId) -> Result<()> {
        self.require_admin(caller)?;
        self.treasury = treasury;
        Ok(())
    }

    /// Register a participant in the reputation registry. Administrator only
    /// (enforced by the registry itself).
    pub fn register_user(
        &mut self,
        caller: &ParticipantId,
        participant: ParticipantId,
        contact: impl Into<String>,
        is_vendor: bool,
    ) -> Result<()> {
        self.reputation
            .register_user(caller, participant.clone(), contact, is_vendor)?;
        self.events.record(ProtocolEvent::UserRegistered {
            participant,
            is_vendor,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn get_escrow(&self, id: EscrowId) -> Option<&Escrow> {
        self.escrows.get(&id)
    }

    pub fn get_milestones(&self, id: EscrowId) -> Option<&[Milestone]> {
        self.escrows.get(&id).map(|e| e.milestones.as_slice())
    }

    pub fn get_dispute(&self, id: EscrowId) -> Option<&Dispute> {
        self.disputes.get_dispute(id)
    }

    pub fn get_token_info(&self, token: &TokenId) -> Option<&TokenInfo> {
        self.tokens.get_token_info(token)
    }

    pub fn escrow_count(&self) -> usize {
        self.escrows.len()
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn reputation(&self) -> &ReputationRegistry {
        &self.reputation
    }

    pub fn disputes(&self) -> &DisputeResolution {
        &self.disputes
    }

    pub fn payments(&self) -> &PaymentProcessor {
        &self.payments
    }

    pub fn events(&self) -> &EventLog {
        &self.events
    }

    pub fn custody(&self) -> &ParticipantId {
        &self.custody
    }

    pub fn treasury(&self) -> &ParticipantId {
        &self.treasury
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn ledger_mut(&mut self) -> &mut L {
        &mut self.ledger
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use custodia_ledger::InMemoryLedger;
    use custodia_payments::PLATFORM_FEE_BPS;
    use custodia_types::{MilestoneSpec, SettlementAsset, INITIAL_SCORE};
    use rand::Rng;

    /// One native unit at the reference 9-decimal scale
    const ONE: u128 = 1_000_000_000;

    fn setup() -> (
        EscrowManager<InMemoryLedger>,
        ParticipantId,
        ParticipantId,
        ParticipantId,
    ) {
        let admin = ParticipantId::new();
        let mut manager = EscrowManager::new(admin.clone(), InMemoryLedger::new()).unwrap();
        let buyer = ParticipantId::new();
        let seller = ParticipantId::new();
        manager
            .ledger_mut()
            .deposit(&buyer, &SettlementAsset::Native, Amount::new(100 * ONE))
            .unwrap();
        (manager, admin, buyer, seller)
    }

    fn native_params(seller: &ParticipantId, amount: u128) -> EscrowParams {
        EscrowParams {
            seller: seller.clone(),
            description: "test service".to_string(),
            metadata_hash: "deadbeef".to_string(),
            milestones: vec![],
            asset: SettlementAsset::Native,
            amount: Amount::new(amount),
        }
    }

    fn fund(
        manager: &mut EscrowManager<InMemoryLedger>,
        buyer: &ParticipantId,
        id: EscrowId,
    ) {
        let total = manager.get_escrow(id).unwrap().total_held().unwrap();
        manager.fund_escrow(buyer, id, total).unwrap();
    }

    #[test]
    fn test_create_escrow_starts_pending_with_fee() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        let escrow = manager.get_escrow(id).unwrap();
        assert_eq!(escrow.id, EscrowId(1));
        assert_eq!(escrow.status, EscrowStatus::Pending);
        assert_eq!(escrow.amount, Amount::new(ONE));
        // 250 bps of 1.0
        assert_eq!(escrow.platform_fee, Amount::new(25_000_000));
        assert_eq!(
            escrow.platform_fee,
            Amount::new(ONE).basis_points(PLATFORM_FEE_BPS).unwrap()
        );
        assert!(escrow.funded_at.is_none());
    }

    #[test]
    fn test_escrow_ids_are_monotonic() {
        let (mut manager, _, buyer, seller) = setup();
        let a = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        let b = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        assert_eq!(a, EscrowId(1));
        assert_eq!(b, EscrowId(2));
    }

    #[test]
    fn test_create_rejects_self_dealing() {
        let (mut manager, _, buyer, _) = setup();
        let result = manager.create_escrow(&buyer, native_params(&buyer, ONE));
        assert!(matches!(result, Err(CustodiaError::InvalidParty { .. })));
    }

    #[test]
    fn test_create_rejects_zero_seller() {
        let (mut manager, _, buyer, _) = setup();
        let result = manager.create_escrow(&buyer, native_params(&ParticipantId::zero(), ONE));
        assert!(matches!(result, Err(CustodiaError::InvalidParty { .. })));
    }

    #[test]
    fn test_create_rejects_unregistered_token() {
        let (mut manager, _, buyer, seller) = setup();
        let mut params = native_params(&seller, ONE);
        params.asset = SettlementAsset::Token(TokenId::new());

        let result = manager.create_escrow(&buyer, params);
        assert!(matches!(result, Err(CustodiaError::UnsupportedAsset { .. })));
    }

    #[test]
    fn test_milestones_must_sum_to_principal() {
        let (mut manager, _, buyer, seller) = setup();
        let mut params = native_params(&seller, 1_000);
        params.milestones = vec![
            MilestoneSpec::new(Amount::new(400), "half"),
            MilestoneSpec::new(Amount::new(500), "rest"),
        ];

        let result = manager.create_escrow(&buyer, params);
        assert!(matches!(result, Err(CustodiaError::MilestoneMismatch { .. })));
    }

    #[test]
    fn test_random_milestone_splits_always_sum() {
        let (mut manager, _, buyer, seller) = setup();
        let mut rng = rand::thread_rng();

        for _ in 0..50 {
            let amount: u128 = rng.gen_range(1_000..1_000_000);
            let parts = rng.gen_range(1..=5usize);
            let mut remaining = amount;
            let mut milestones = Vec::new();
            for i in 0..parts {
                let left = parts - i - 1;
                let take = if left == 0 {
                    remaining
                } else {
                    rng.gen_range(1..=remaining - left as u128)
                };
                milestones.push(MilestoneSpec::new(Amount::new(take), "part"));
                remaining -= take;
            }

            let mut params = native_params(&seller, amount);
            params.milestones = milestones;
            let id = manager.create_escrow(&buyer, params).unwrap();
            let escrow = manager.get_escrow(id).unwrap();
            assert_eq!(escrow.milestone_total().unwrap(), escrow.amount);

            // Perturbing any split must be rejected
            let mut bad = native_params(&seller, amount);
            bad.milestones = vec![MilestoneSpec::new(Amount::new(amount + 1), "too much")];
            assert!(matches!(
                manager.create_escrow(&buyer, bad),
                Err(CustodiaError::MilestoneMismatch { .. })
            ));
        }
    }

    #[test]
    fn test_pause_blocks_creation_only() {
        let (mut manager, admin, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        manager.pause(&admin).unwrap();
        assert!(manager.is_paused());
        assert!(matches!(
            manager.create_escrow(&buyer, native_params(&seller, ONE)),
            Err(CustodiaError::Paused)
        ));

        // In-flight escrows keep progressing while paused
        fund(&mut manager, &buyer, id);
        manager.release_payment(&buyer, id, 0).unwrap();
        assert_eq!(
            manager.get_escrow(id).unwrap().status,
            EscrowStatus::Completed
        );

        manager.unpause(&admin).unwrap();
        manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
    }

    #[test]
    fn test_pause_requires_admin() {
        let (mut manager, _, buyer, _) = setup();
        assert!(matches!(
            manager.pause(&buyer),
            Err(CustodiaError::Unauthorized { .. })
        ));
    }

    #[test]
    fn test_funding_requires_exact_amount() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        let before = manager.ledger().balance(&buyer, &SettlementAsset::Native);

        // principal alone is not enough; principal + fee is required
        let result = manager.fund_escrow(&buyer, id, Amount::new(ONE));
        assert!(matches!(result, Err(CustodiaError::IncorrectAmount { .. })));
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Pending);
        assert_eq!(
            manager.ledger().balance(&buyer, &SettlementAsset::Native),
            before
        );

        manager
            .fund_escrow(&buyer, id, Amount::new(ONE + 25_000_000))
            .unwrap();
        let escrow = manager.get_escrow(id).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert!(escrow.funded_at.is_some());
        assert!(escrow.expires_at.is_some());

        // Funding is once-only
        let result = manager.fund_escrow(&buyer, id, Amount::new(ONE + 25_000_000));
        assert!(matches!(result, Err(CustodiaError::NotPending { .. })));
    }

    #[test]
    fn test_funding_requires_buyer() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        let result = manager.fund_escrow(&seller, id, Amount::new(ONE + 25_000_000));
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_insufficient_funds_abort_funding() {
        let (mut manager, _, _, seller) = setup();
        let poor = ParticipantId::new();
        let id = manager
            .create_escrow(&poor, native_params(&seller, ONE))
            .unwrap();

        let result = manager.fund_escrow(&poor, id, Amount::new(ONE + 25_000_000));
        assert!(matches!(result, Err(CustodiaError::InsufficientFunds { .. })));
        // The whole transition aborted: still pending, nothing held
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Pending);
        assert_eq!(
            manager
                .ledger()
                .balance(manager.custody(), &SettlementAsset::Native),
            Amount::zero()
        );
    }

    #[test]
    fn test_full_release_settles_seller_net_of_fee() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        manager.release_payment(&seller, id, 0).unwrap();

        // Seller receives exactly the principal, net of fee
        assert_eq!(
            manager.ledger().balance(&seller, &SettlementAsset::Native),
            Amount::new(ONE)
        );
        // Treasury receives exactly the platform fee
        let treasury = manager.treasury().clone();
        assert_eq!(
            manager.ledger().balance(&treasury, &SettlementAsset::Native),
            Amount::new(25_000_000)
        );
        // Custody is drained
        assert_eq!(
            manager
                .ledger()
                .balance(manager.custody(), &SettlementAsset::Native),
            Amount::zero()
        );
        assert_eq!(
            manager.get_escrow(id).unwrap().status,
            EscrowStatus::Completed
        );
    }

    #[test]
    fn test_release_requires_funded() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        let result = manager.release_payment(&buyer, id, 0);
        assert!(matches!(result, Err(CustodiaError::NotFunded { .. })));
    }

    #[test]
    fn test_release_requires_party() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        let result = manager.release_payment(&ParticipantId::new(), id, 0);
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_milestones_release_in_order() {
        let (mut manager, _, buyer, seller) = setup();
        let mut params = native_params(&seller, 1_000_000);
        params.milestones = vec![
            MilestoneSpec::new(Amount::new(200_000), "design"),
            MilestoneSpec::new(Amount::new(300_000), "build"),
            MilestoneSpec::new(Amount::new(500_000), "deliver"),
        ];
        let id = manager.create_escrow(&buyer, params).unwrap();
        fund(&mut manager, &buyer, id);

        // Out of order is rejected
        assert!(matches!(
            manager.release_payment(&buyer, id, 1),
            Err(CustodiaError::MilestoneOutOfOrder { .. })
        ));
        assert!(matches!(
            manager.release_payment(&buyer, id, 2),
            Err(CustodiaError::MilestoneOutOfOrder { .. })
        ));

        manager.release_payment(&buyer, id, 0).unwrap();
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Funded);

        // Double release of the same milestone is rejected
        assert!(matches!(
            manager.release_payment(&buyer, id, 0),
            Err(CustodiaError::AlreadyCompleted { .. })
        ));

        manager.release_payment(&buyer, id, 1).unwrap();
        manager.release_payment(&buyer, id, 2).unwrap();

        assert_eq!(
            manager.get_escrow(id).unwrap().status,
            EscrowStatus::Completed
        );
        // In-order release pays the full principal across tranches
        assert_eq!(
            manager.ledger().balance(&seller, &SettlementAsset::Native),
            Amount::new(1_000_000)
        );
        let milestones = manager.get_milestones(id).unwrap();
        assert!(milestones.iter().all(|m| m.completed && m.completed_at.is_some()));
    }

    #[test]
    fn test_unknown_milestone_index() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        let result = manager.release_payment(&buyer, id, 3);
        assert!(matches!(result, Err(CustodiaError::MilestoneNotFound { .. })));
    }

    #[test]
    fn test_completion_credits_seller_reputation() {
        let (mut manager, admin, buyer, seller) = setup();
        manager
            .register_user(&admin, buyer.clone(), "buyer@example.com", false)
            .unwrap();
        manager
            .register_user(&admin, seller.clone(), "seller@example.com", true)
            .unwrap();

        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);
        manager.release_payment(&buyer, id, 0).unwrap();

        let seller_rep = manager.reputation().get_reputation_data(&seller).unwrap();
        assert_eq!(seller_rep.completed_transactions, 1);
        assert_eq!(seller_rep.total_transactions, 1);
        assert_eq!(seller_rep.total_volume, Amount::new(ONE));
        assert!(seller_rep.score > INITIAL_SCORE);

        // Buyer reputation untouched
        let buyer_rep = manager.reputation().get_reputation_data(&buyer).unwrap();
        assert_eq!(buyer_rep.total_transactions, 0);
        assert_eq!(buyer_rep.score, INITIAL_SCORE);
    }

    #[test]
    fn test_completion_with_unregistered_seller() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        manager.release_payment(&buyer, id, 0).unwrap();
        assert!(!manager.reputation().is_registered(&seller));
    }

    #[test]
    fn test_dispute_lifecycle() {
        let (mut manager, admin, buyer, seller) = setup();
        manager
            .register_user(&admin, buyer.clone(), "buyer@example.com", false)
            .unwrap();
        manager
            .register_user(&admin, seller.clone(), "seller@example.com", true)
            .unwrap();

        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        manager.file_dispute(&seller, id, "buyer unreachable").unwrap();

        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Disputed);
        let dispute = manager.get_dispute(id).unwrap();
        assert_eq!(dispute.initiator, seller);
        assert_eq!(dispute.reason, "buyer unreachable");
        assert_eq!(dispute.outcome, DisputeOutcome::Pending);

        // Both parties' dispute counters move
        for party in [&buyer, &seller] {
            let record = manager.reputation().get_reputation_data(party).unwrap();
            assert_eq!(record.dispute_count, 1);
            assert!(record.score < INITIAL_SCORE);
        }

        // A second filing reports the existing dispute
        let result = manager.file_dispute(&buyer, id, "counter-claim");
        assert!(matches!(result, Err(CustodiaError::DisputeExists { .. })));
    }

    #[test]
    fn test_dispute_requires_funded() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        let result = manager.file_dispute(&buyer, id, "too early");
        assert!(matches!(result, Err(CustodiaError::NotFunded { .. })));
    }

    #[test]
    fn test_dispute_requires_party() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        let result = manager.file_dispute(&ParticipantId::new(), id, "bystander");
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_cancel_only_pending() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        // Non-buyer cannot cancel
        assert!(matches!(
            manager.cancel_escrow(&seller, id),
            Err(CustodiaError::Unauthorized { .. })
        ));

        manager.cancel_escrow(&buyer, id).unwrap();
        assert_eq!(
            manager.get_escrow(id).unwrap().status,
            EscrowStatus::Cancelled
        );

        // Cancelled is terminal
        assert!(matches!(
            manager.cancel_escrow(&buyer, id),
            Err(CustodiaError::CannotCancelFunded { .. })
        ));

        // Funded escrows cannot be cancelled
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);
        assert!(matches!(
            manager.cancel_escrow(&buyer, id),
            Err(CustodiaError::CannotCancelFunded { .. })
        ));
    }

    #[test]
    fn test_expiry_before_deadline_rejected() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        // Default window is 30 days out
        let result = manager.expire_escrow(id);
        assert!(matches!(result, Err(CustodiaError::NotExpired { .. })));
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Funded);
    }

    #[test]
    fn test_expiry_refunds_buyer_once() {
        let (manager, _, buyer, seller) = setup();
        let mut manager = manager.with_expiry_window(Duration::zero());
        let before = manager.ledger().balance(&buyer, &SettlementAsset::Native);

        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);

        manager.expire_escrow(id).unwrap();

        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Expired);
        // Full held amount (principal + fee) returned
        assert_eq!(
            manager.ledger().balance(&buyer, &SettlementAsset::Native),
            before
        );

        // Second expiry fails: the escrow is no longer funded
        let result = manager.expire_escrow(id);
        assert!(matches!(result, Err(CustodiaError::NotFunded { .. })));
    }

    #[test]
    fn test_expire_requires_funded() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();

        let result = manager.expire_escrow(id);
        assert!(matches!(result, Err(CustodiaError::NotFunded { .. })));
    }

    #[test]
    fn test_token_escrow_auto_funds() {
        let (mut manager, admin, buyer, seller) = setup();
        let token = TokenId::new();
        manager
            .add_token(&admin, TokenInfo::new(token.clone(), 1, "USDC", 6))
            .unwrap();

        let asset = SettlementAsset::Token(token.clone());
        manager
            .ledger_mut()
            .deposit(&buyer, &asset, Amount::new(10_000_000))
            .unwrap();

        let mut params = native_params(&seller, 1_000_000);
        params.asset = asset.clone();
        let id = manager.create_escrow(&buyer, params).unwrap();

        // Created directly in Funded with principal + fee pulled
        let escrow = manager.get_escrow(id).unwrap();
        assert_eq!(escrow.status, EscrowStatus::Funded);
        assert!(escrow.funded_at.is_some());
        assert_eq!(
            manager.ledger().balance(&buyer, &asset),
            Amount::new(10_000_000 - 1_000_000 - 25_000)
        );
        assert_eq!(
            manager.ledger().balance(manager.custody(), &asset),
            Amount::new(1_025_000)
        );

        // And settles like any funded escrow
        manager.release_payment(&buyer, id, 0).unwrap();
        assert_eq!(manager.ledger().balance(&seller, &asset), Amount::new(1_000_000));
    }

    #[test]
    fn test_deactivated_token_rejected_for_new_escrows() {
        let (mut manager, admin, buyer, seller) = setup();
        let token = TokenId::new();
        manager
            .add_token(&admin, TokenInfo::new(token.clone(), 1, "USDT", 6))
            .unwrap();
        let asset = SettlementAsset::Token(token.clone());
        manager
            .ledger_mut()
            .deposit(&buyer, &asset, Amount::new(10_000_000))
            .unwrap();

        let mut params = native_params(&seller, 1_000_000);
        params.asset = asset.clone();
        let id = manager.create_escrow(&buyer, params.clone()).unwrap();

        manager.update_token_status(&admin, token.clone(), false).unwrap();
        assert!(!manager.get_token_info(&token).unwrap().active);

        // New escrows rejected...
        let result = manager.create_escrow(&buyer, params);
        assert!(matches!(result, Err(CustodiaError::UnsupportedAsset { .. })));

        // ...but the existing hold is not invalidated
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Funded);
    }

    #[test]
    fn test_add_token_requires_admin() {
        let (mut manager, _, buyer, _) = setup();
        let result = manager.add_token(&buyer, TokenInfo::new(TokenId::new(), 1, "DAI", 18));
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_audit_log_chains_transitions() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);
        manager.release_payment(&buyer, id, 0).unwrap();

        let labels: Vec<&str> = manager
            .events()
            .entries_for_escrow(id)
            .iter()
            .map(|e| e.event.label())
            .collect();
        assert_eq!(
            labels,
            vec![
                "escrow_created",
                "escrow_funded",
                "payment_released",
                "escrow_completed"
            ]
        );
        assert!(manager.events().verify_chain());
    }

    #[test]
    fn test_rejected_calls_emit_no_events() {
        let (mut manager, _, buyer, seller) = setup();
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        let events_before = manager.events().len();

        let _ = manager.release_payment(&buyer, id, 0);
        let _ = manager.fund_escrow(&seller, id, Amount::new(1));
        let _ = manager.expire_escrow(id);

        assert_eq!(manager.events().len(), events_before);
    }

    #[test]
    fn test_arbitration_bookkeeping() {
        let (mut manager, admin, buyer, seller) = setup();
        let arbitrator = ParticipantId::new();
        manager
            .ledger_mut()
            .deposit(&arbitrator, &SettlementAsset::Native, Amount::new(5 * ONE))
            .unwrap();

        manager
            .register_arbitrator(&arbitrator, Amount::new(ONE))
            .unwrap();
        assert!(manager.disputes().is_arbitrator_active(&arbitrator));

        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);
        manager.file_dispute(&buyer, id, "undelivered").unwrap();

        manager
            .resolve_dispute(&admin, id, &arbitrator, DisputeOutcome::BuyerFavored)
            .unwrap();

        let stats = manager
            .disputes()
            .get_arbitrator_stats(&arbitrator)
            .unwrap();
        assert_eq!(stats.total_cases, 1);
        assert_eq!(stats.successful_cases, 1);

        // Resolution is bookkeeping; the escrow stays disputed
        assert_eq!(manager.get_escrow(id).unwrap().status, EscrowStatus::Disputed);
        assert!(manager.get_dispute(id).unwrap().is_resolved());
    }

    #[test]
    fn test_resolve_dispute_requires_admin() {
        let (mut manager, _, buyer, _) = setup();
        let result = manager.resolve_dispute(
            &buyer,
            EscrowId(1),
            &ParticipantId::new(),
            DisputeOutcome::BuyerFavored,
        );
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_set_contracts_rewires_components() {
        let (mut manager, admin, buyer, seller) = setup();

        manager
            .set_contracts(
                &admin,
                PaymentProcessor::new(admin.clone()),
                ReputationRegistry::new(admin.clone()),
                DisputeResolution::new(admin.clone()),
            )
            .unwrap();

        // The rewired components accept the manager identity
        let id = manager
            .create_escrow(&buyer, native_params(&seller, ONE))
            .unwrap();
        fund(&mut manager, &buyer, id);
        manager.release_payment(&buyer, id, 0).unwrap();

        // Non-admin cannot rewire
        let result = manager.set_contracts(
            &buyer,
            PaymentProcessor::new(admin.clone()),
            ReputationRegistry::new(admin.clone()),
            DisputeResolution::new(admin),
        );
        assert!(matches!(result, Err(CustodiaError::Unauthorized { .. })));
    }

    #[test]
    fn test_queries_for_unknown_escrow() {
        let (manager, _, _, _) = setup();
        assert!(manager.get_escrow(EscrowId(42)).is_none());
        assert!(manager.get_milestones(EscrowId(42)).is_none());
        assert!(manager.get_dispute(EscrowId(42)).is_none());
        assert!(manager.get_token_info(&TokenId::new()).is_none());
    }

    #[test]
    fn test_operations_on_unknown_escrow() {
        let (mut manager, _, buyer, _) = setup();
        let missing = EscrowId(99);

        assert!(matches!(
            manager.fund_escrow(&buyer, missing, Amount::new(1)),
            Err(CustodiaError::EscrowNotFound { .. })
        ));
        assert!(matches!(
            manager.release_payment(&buyer, missing, 0),
            Err(CustodiaError::EscrowNotFound { .. })
        ));
        assert!(matches!(
            manager.cancel_escrow(&buyer, missing),
            Err(CustodiaError::EscrowNotFound { .. })
        ));
        assert!(matches!(
            manager.expire_escrow(missing),
            Err(CustodiaError::EscrowNotFound { .. })
        ));
    }
}
