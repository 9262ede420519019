//! Custodia Ledger - the value-transfer substrate interface
//!
//! The escrow core never decides how custody of funds is physically achieved;
//! it consumes a single primitive: `transfer(from, to, asset, amount)`,
//! synchronous and atomic per call. This crate defines that interface
//! ([`ValueTransfer`]) plus an in-memory reference ledger used by tests and
//! single-process deployments.
//!
//! # Invariants
//!
//! 1. No negative balances
//! 2. Every entry has a reason
//! 3. Entries are append-only
//! 4. Atomic operations only

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use custodia_types::{Amount, CustodiaError, EscrowId, ParticipantId, Result, SettlementAsset};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

/// Unique identifier for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntryId(pub String);

impl EntryId {
    pub fn new() -> Self {
        Self(format!("entry_{}", Uuid::new_v4()))
    }
}

impl Default for EntryId {
    fn default() -> Self {
        Self::new()
    }
}

/// Type of ledger entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryType {
    /// Credit (increase) to an account
    Credit,
    /// Debit (decrease) from an account
    Debit,
}

/// Reason for a ledger entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryReason {
    /// Operator faucet / external on-ramp
    Deposit,
    /// Funds pulled into escrow custody
    EscrowFunding { escrow_id: EscrowId },
    /// Milestone or full-principal payout to the seller
    EscrowRelease { escrow_id: EscrowId },
    /// Held funds returned to the buyer
    EscrowRefund { escrow_id: EscrowId },
    /// Platform fee swept to the treasury on completion
    FeeSweep { escrow_id: EscrowId },
    /// Arbitrator stake pulled into the dispute vault
    ArbitratorStake,
    /// Arbitrator stake returned on deactivation
    StakeRefund,
    /// Plain transfer between accounts
    Transfer,
}

/// A single ledger entry (one side of a double-entry)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub entry_id: EntryId,
    pub account: ParticipantId,
    pub asset: SettlementAsset,
    pub entry_type: EntryType,
    pub amount: Amount,
    pub balance_after: Amount,
    pub reason: EntryReason,
    pub created_at: DateTime<Utc>,
}

/// Account state in the ledger
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountState {
    pub balances: HashMap<SettlementAsset, Amount>,
    pub entry_count: u64,
}

impl AccountState {
    pub fn balance(&self, asset: &SettlementAsset) -> Amount {
        self.balances.get(asset).copied().unwrap_or(Amount::zero())
    }
}

/// The value-transfer primitive the escrow core consumes.
///
/// A call either fully succeeds (both sides moved) or fails with no change;
/// the core treats any failure as an abort of the whole transition.
pub trait ValueTransfer {
    fn transfer(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<()>;
}

/// In-memory reference ledger.
///
/// Per-account, per-asset balances with an append-only entry log. Suitable
/// for tests and single-process deployments; a production integration would
/// implement [`ValueTransfer`] over its own settlement substrate instead.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: HashMap<ParticipantId, AccountState>,
    entries: Vec<LedgerEntry>,
}

impl InMemoryLedger {
    /// Create a new empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the balance of an account for a specific asset
    pub fn balance(&self, account: &ParticipantId, asset: &SettlementAsset) -> Amount {
        self.accounts
            .get(account)
            .map(|a| a.balance(asset))
            .unwrap_or(Amount::zero())
    }

    /// Seed an account with funds (operator faucet / external on-ramp).
    pub fn deposit(
        &mut self,
        account: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
    ) -> Result<Amount> {
        let (balance, _) = self.credit(account, asset, amount, EntryReason::Deposit)?;
        Ok(balance)
    }

    /// Credit an account (increase balance)
    ///
    /// Returns the new balance and the entry ID.
    pub fn credit(
        &mut self,
        account: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(Amount, EntryId)> {
        if amount.is_zero() {
            return Err(CustodiaError::InvalidAmount {
                message: "amount must be greater than zero".to_string(),
            });
        }

        let account_state = self.accounts.entry(account.clone()).or_default();
        let current_balance = account_state.balance(asset);
        let new_balance = current_balance.checked_add(amount)?;

        let entry = LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            asset: asset.clone(),
            entry_type: EntryType::Credit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        };

        account_state.balances.insert(asset.clone(), new_balance);
        account_state.entry_count += 1;

        let entry_id = entry.entry_id.clone();
        self.entries.push(entry);

        Ok((new_balance, entry_id))
    }

    /// Debit an account (decrease balance)
    ///
    /// Returns the new balance and the entry ID.
    /// Fails if balance would go negative (invariant: no negative balances).
    pub fn debit(
        &mut self,
        account: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<(Amount, EntryId)> {
        if amount.is_zero() {
            return Err(CustodiaError::InvalidAmount {
                message: "amount must be greater than zero".to_string(),
            });
        }

        let account_state =
            self.accounts
                .get_mut(account)
                .ok_or_else(|| CustodiaError::AccountNotFound {
                    account: account.clone(),
                })?;

        let current_balance = account_state.balance(asset);
        if current_balance < amount {
            return Err(CustodiaError::InsufficientFunds {
                account: account.clone(),
                requested: amount,
                available: current_balance,
            });
        }
        let new_balance = current_balance.checked_sub(amount)?;

        let entry = LedgerEntry {
            entry_id: EntryId::new(),
            account: account.clone(),
            asset: asset.clone(),
            entry_type: EntryType::Debit,
            amount,
            balance_after: new_balance,
            reason,
            created_at: Utc::now(),
        };

        account_state.balances.insert(asset.clone(), new_balance);
        account_state.entry_count += 1;

        let entry_id = entry.entry_id.clone();
        self.entries.push(entry);

        Ok((new_balance, entry_id))
    }

    /// Get all entries for an account
    pub fn account_entries(&self, account: &ParticipantId) -> Vec<LedgerEntry> {
        self.entries
            .iter()
            .filter(|e| &e.account == account)
            .cloned()
            .collect()
    }

    /// Get the total number of entries
    pub fn entry_count(&self) -> usize {
        self.entries.len()
    }

    /// Get recent entries (newest first)
    pub fn recent_entries(&self, limit: usize) -> Vec<LedgerEntry> {
        self.entries.iter().rev().take(limit).cloned().collect()
    }

    /// Get account state
    pub fn account_state(&self, account: &ParticipantId) -> Option<&AccountState> {
        self.accounts.get(account)
    }
}

impl ValueTransfer for InMemoryLedger {
    fn transfer(
        &mut self,
        from: &ParticipantId,
        to: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<()> {
        // Debit first: it carries all the failure modes, and a failed debit
        // must leave the recipient untouched.
        self.debit(from, asset, amount, reason.clone())?;
        self.credit(to, asset, amount, reason)?;
        info!("transfer executed: {} from {} to {}", amount, from, to);
        Ok(())
    }
}
