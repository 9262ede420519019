//! Custodia Payments - fee computation and transfer execution
//!
//! The payment processor is stateless aside from a supported-token
//! allow-list and the identity of its one authorized caller (the escrow
//! manager). It carries two independent fee schedules:
//!
//! | Schedule  | Rate    | Applied                                  |
//! |-----------|---------|------------------------------------------|
//! | Platform  | 2.5%    | At escrow creation, fixed for its lifetime |
//! | Protocol  | 2.0%    | Per `calculate_fees` request             |
//! | Referrer  | 0.5%    | Only when a referrer is supplied         |
//!
//! The schedules never mix: the platform fee is what escrow holds retain,
//! the protocol/referrer split is what fee-quoting consumers ask for.

use custodia_ledger::{EntryReason, ValueTransfer};
use custodia_types::{Amount, CustodiaError, ParticipantId, Result, SettlementAsset, TokenId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::info;

/// Protocol fee in basis points (2%)
pub const PROTOCOL_FEE_BPS: u32 = 200;

/// Referrer fee in basis points (0.5%)
pub const REFERRER_FEE_BPS: u32 = 50;

/// Platform fee in basis points (2.5%), applied at escrow creation
pub const PLATFORM_FEE_BPS: u32 = 250;

/// Result of a fee computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeeBreakdown {
    pub protocol_fee: Amount,
    pub referrer_fee: Amount,
    /// Echoes the input referrer; `None` when no referrer was supplied
    pub referrer: Option<ParticipantId>,
}

/// Fee schedules plus the authorized transfer-execution delegate.
#[derive(Debug, Clone)]
pub struct PaymentProcessor {
    admin: ParticipantId,
    /// The one caller allowed to execute transfers through this processor
    authorized_caller: Option<ParticipantId>,
    supported_tokens: HashSet<TokenId>,
    protocol_fee_bps: u32,
    referrer_fee_bps: u32,
    platform_fee_bps: u32,
}

impl PaymentProcessor {
    pub fn new(admin: ParticipantId) -> Self {
        Self {
            admin,
            authorized_caller: None,
            supported_tokens: HashSet::new(),
            protocol_fee_bps: PROTOCOL_FEE_BPS,
            referrer_fee_bps: REFERRER_FEE_BPS,
            platform_fee_bps: PLATFORM_FEE_BPS,
        }
    }

    fn require_admin(&self, caller: &ParticipantId) -> Result<()> {
        if caller != &self.admin {
            return Err(CustodiaError::unauthorized(
                "payment processor configuration requires the administrator",
            ));
        }
        Ok(())
    }

    /// Bind the caller identity allowed to execute transfers.
    pub fn set_authorized_caller(
        &mut self,
        caller: &ParticipantId,
        authorized: ParticipantId,
    ) -> Result<()> {
        self.require_admin(caller)?;
        self.authorized_caller = Some(authorized);
        Ok(())
    }

    /// Add or remove a token from the supported set.
    pub fn set_supported_token(
        &mut self,
        caller: &ParticipantId,
        token: TokenId,
        supported: bool,
    ) -> Result<()> {
        self.require_admin(caller)?;
        if supported {
            self.supported_tokens.insert(token);
        } else {
            self.supported_tokens.remove(&token);
        }
        Ok(())
    }

    /// The native asset is always implicitly supported.
    pub fn is_asset_supported(&self, asset: &SettlementAsset) -> bool {
        match asset {
            SettlementAsset::Native => true,
            SettlementAsset::Token(id) => self.supported_tokens.contains(id),
        }
    }

    /// Compute the protocol/referrer fee split for an amount.
    ///
    /// Pure and deterministic: never mutates state, and the same inputs
    /// always produce the same breakdown.
    pub fn calculate_fees(
        &self,
        amount: Amount,
        referrer: Option<&ParticipantId>,
    ) -> Result<FeeBreakdown> {
        let protocol_fee = amount.basis_points(self.protocol_fee_bps)?;
        match referrer {
            Some(referrer) => Ok(FeeBreakdown {
                protocol_fee,
                referrer_fee: amount.basis_points(self.referrer_fee_bps)?,
                referrer: Some(referrer.clone()),
            }),
            None => Ok(FeeBreakdown {
                protocol_fee,
                referrer_fee: Amount::zero(),
                referrer: None,
            }),
        }
    }

    /// The platform fee retained by an escrow hold, fixed at creation.
    pub fn platform_fee(&self, amount: Amount) -> Result<Amount> {
        amount.basis_points(self.platform_fee_bps)
    }

    /// Execute a transfer on behalf of the escrow manager.
    ///
    /// Rejects any caller other than the registered manager identity and any
    /// asset outside the supported set before touching the substrate.
    pub fn execute_transfer(
        &self,
        caller: &ParticipantId,
        ledger: &mut dyn ValueTransfer,
        from: &ParticipantId,
        to: &ParticipantId,
        asset: &SettlementAsset,
        amount: Amount,
        reason: EntryReason,
    ) -> Result<()> {
        if self.authorized_caller.as_ref() != Some(caller) {
            return Err(CustodiaError::unauthorized(
                "transfer execution is restricted to the escrow manager",
            ));
        }
        if !self.is_asset_supported(asset) {
            return Err(CustodiaError::UnsupportedAsset {
                asset: asset.to_string(),
            });
        }
        ledger.transfer(from, to, asset, amount, reason)?;
        info!("payment executed: {} {} from {} to {}", amount, asset, from, to);
        Ok(())
    }
}
