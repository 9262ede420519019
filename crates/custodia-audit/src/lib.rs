//! Custodia Audit - Immutable audit log
//!
//! Every committed state transition produces an event entry. The log is
//! append-only and hash-chained: each entry commits to its predecessor, so
//! tampering anywhere breaks verification of everything after it.

use chrono::{DateTime, Utc};
use custodia_types::{EscrowId, EventId, ProtocolEvent};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Hash of the (empty) chain before the first entry
const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// An audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEntry {
    /// Entry ID
    pub id: EventId,
    /// Previous entry hash (for chain)
    pub previous_hash: String,
    /// Entry hash
    pub hash: String,
    /// Timestamp
    pub recorded_at: DateTime<Utc>,
    /// The protocol event
    pub event: ProtocolEvent,
}

impl EventEntry {
    /// Compute hash of this entry
    pub fn compute_hash(&self) -> String {
        let content = format!(
            "{}:{}:{:?}",
            self.previous_hash,
            self.recorded_at.timestamp_millis(),
            self.event
        );
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Verify the entry hash
    pub fn verify(&self) -> bool {
        self.hash == self.compute_hash()
    }
}

/// Append-only, hash-chained event log.
#[derive(Debug, Default)]
pub struct EventLog {
    entries: Vec<EventEntry>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event, chaining it to the previous entry.
    pub fn record(&mut self, event: ProtocolEvent) -> &EventEntry {
        let previous_hash = self
            .entries
            .last()
            .map(|e| e.hash.clone())
            .unwrap_or_else(|| GENESIS_HASH.to_string());

        let mut entry = EventEntry {
            id: EventId::new(),
            previous_hash,
            hash: String::new(),
            recorded_at: Utc::now(),
            event,
        };
        entry.hash = entry.compute_hash();

        self.entries.push(entry);
        // last() cannot fail after the push above
        self.entries.last().expect("entry just appended")
    }

    /// All entries, oldest first
    pub fn entries(&self) -> &[EventEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries concerning one escrow
    pub fn entries_for_escrow(&self, escrow_id: EscrowId) -> Vec<&EventEntry> {
        self.entries
            .iter()
            .filter(|e| e.event.escrow_id() == Some(escrow_id))
            .collect()
    }

    /// Verify the whole chain: every hash correct, every link intact.
    pub fn verify_chain(&self) -> bool {
        let mut previous = GENESIS_HASH.to_string();
        for entry in &self.entries {
            if entry.previous_hash != previous || !entry.verify() {
                return false;
            }
            previous = entry.hash.clone();
        }
        true
    }
}
