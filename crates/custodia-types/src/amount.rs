//! Amount type with checked arithmetic
//!
//! Custodia amounts are raw integer base units (the smallest denomination of
//! whatever settlement asset the escrow is denominated in). Using u128 keeps
//! fee splitting and milestone accounting exact; all arithmetic is checked
//! and overflow is an explicit error.

use crate::{CustodiaError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};

/// Basis-point denominator (100 bps = 1%)
pub const BPS_DENOMINATOR: u128 = 10_000;

/// An amount in raw base units of some settlement asset.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Amount(pub u128);

impl Amount {
    /// Create a new amount from raw base units
    pub const fn new(value: u128) -> Self {
        Self(value)
    }

    /// The zero amount
    pub const fn zero() -> Self {
        Self(0)
    }

    /// Raw value in base units
    pub const fn value(&self) -> u128 {
        self.0
    }

    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    pub fn checked_add(self, other: Self) -> Result<Self> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(CustodiaError::AmountOverflow)
    }

    /// Checked subtraction
    pub fn checked_sub(self, other: Self) -> Result<Self> {
        self.0
            .checked_sub(other.0)
            .map(Self)
            .ok_or(CustodiaError::AmountUnderflow)
    }

    /// Compute a basis-point fraction of this amount (100 bps = 1%).
    ///
    /// Truncates toward zero, matching how fee schedules are applied
    /// everywhere in the protocol.
    pub fn basis_points(self, bps: u32) -> Result<Self> {
        let value = self
            .0
            .checked_mul(bps as u128)
            .ok_or(CustodiaError::AmountOverflow)?
            / BPS_DENOMINATOR;
        Ok(Self(value))
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// Implement Add trait for convenience (panics on error)
impl Add for Amount {
    type Output = Self;

    fn add(self, other: Self) -> Self::Output {
        self.checked_add(other).expect("Amount addition overflow")
    }
}

// Implement Sub trait for convenience (panics on error)
impl Sub for Amount {
    type Output = Self;

    fn sub(self, other: Self) -> Self::Output {
        self.checked_sub(other).expect("Amount subtraction underflow")
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Self(value)
    }
}
