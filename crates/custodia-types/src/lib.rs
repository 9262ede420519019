//! Custodia Types - Canonical domain types for escrow settlement
//!
//! This crate contains all foundational types for Custodia with zero
//! dependencies on other custodia crates. It defines the complete type
//! system for:
//!
//! - Identity types (ParticipantId, TokenId, EscrowId, etc.)
//! - Raw-unit amounts with checked arithmetic and basis-point fee math
//! - Settlement assets and registered token records
//! - Escrow, milestone, reputation, dispute, and arbitrator records
//! - Protocol events emitted on committed transitions
//! - The unified error enum
//!
//! # Architectural Invariants
//!
//! These types support the core Custodia settlement invariants:
//!
//! 1. Escrow state transitions are one-way; no state is revisited
//! 2. Milestone amounts always sum exactly to the escrow principal
//! 3. Reputation scores stay inside [0, 1000]
//! 4. Every rejected call leaves state byte-for-byte unchanged

pub mod identity;
pub mod amount;
pub mod asset;
pub mod escrow;
pub mod reputation;
pub mod dispute;
pub mod event;
pub mod error;

pub use identity::*;
pub use amount::*;
pub use asset::*;
pub use escrow::*;
pub use reputation::*;
pub use dispute::*;
pub use event::*;
pub use error::*;

/// Version of the Custodia types schema
pub const TYPES_VERSION: &str = "0.1.0";
