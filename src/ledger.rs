//! Hash-chained decision ledger.
//!
//! Each [`LedgerEntry`] commits to its decision, the health state at
//! decision time, the previous entry's hash and its own timestamp:
//!
//! ```text
//! hash_n = SHA-256( postcard(LedgerPayload { decision_n, health_n, hash_{n-1}, ts_n }) )
//! ```
//!
//! `postcard` writes struct fields in declaration order without keys, so
//! the encoding is fixed by the [`LedgerPayload`] schema and cannot drift
//! with construction order.  The genesis entry chains from
//! [`GENESIS_PREV_HASH`].
//!
//! The ledger is in-process and append-only.  Durable storage belongs to
//! whoever consumes the entries; [`DecisionLedger::resume`] continues a
//! chain from a persisted tail hash.

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::firewall::ActuationDecision;
use crate::health::HealthState;

/// Previous-hash sentinel for the first entry of a chain.
pub const GENESIS_PREV_HASH: &str = "";

/// Hash input.  Field order here *is* the canonical encoding.
#[derive(Serialize)]
struct LedgerPayload<'a> {
    decision: &'a ActuationDecision,
    health: &'a HealthState,
    prev_hash: &'a str,
    timestamp_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntry {
    pub decision: ActuationDecision,
    pub health: HealthState,
    pub prev_hash: String,
    pub hash: String,
    pub timestamp_ms: u64,
}

impl LedgerEntry {
    /// Short identifier: the first 16 hex characters of the hash.
    pub fn id(&self) -> &str {
        self.hash.get(..16).unwrap_or(&self.hash)
    }

    /// Recompute the hash from this entry's payload chained onto `prev_hash`.
    pub fn compute_hash(&self, prev_hash: &str) -> Result<String> {
        hash_payload(&self.decision, &self.health, prev_hash, self.timestamp_ms)
    }
}

fn hash_payload(
    decision: &ActuationDecision,
    health: &HealthState,
    prev_hash: &str,
    timestamp_ms: u64,
) -> Result<String> {
    let payload = LedgerPayload {
        decision,
        health,
        prev_hash,
        timestamp_ms,
    };
    let bytes = postcard::to_allocvec(&payload)?;
    Ok(hex::encode(hmac_sha256::Hash::hash(&bytes)))
}

/// Build the entry that follows `prev_hash`.  Pure; the caller threads the
/// returned hash into the next call.
pub fn append(
    decision: ActuationDecision,
    health: HealthState,
    prev_hash: &str,
    timestamp_ms: u64,
) -> Result<LedgerEntry> {
    let hash = hash_payload(&decision, &health, prev_hash, timestamp_ms)?;
    Ok(LedgerEntry {
        decision,
        health,
        prev_hash: prev_hash.to_owned(),
        hash,
        timestamp_ms,
    })
}

/// Outcome of [`verify_chain`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainVerification {
    pub checked: usize,
    /// Indices of entries whose hash no longer verifies.  Once one entry
    /// breaks, every later entry is listed too.
    pub invalid: Vec<usize>,
}

impl ChainVerification {
    pub fn is_intact(&self) -> bool {
        self.invalid.is_empty()
    }

    pub fn first_invalid(&self) -> Option<usize> {
        self.invalid.first().copied()
    }
}

/// Verify a chain that starts at genesis.
pub fn verify_chain(entries: &[LedgerEntry]) -> ChainVerification {
    verify_chain_from(entries, GENESIS_PREV_HASH)
}

/// Verify a chain segment whose first entry follows `anchor_hash`.
///
/// Each entry is recomputed over its payload and the *recomputed* hash of
/// its predecessor, so a mutation anywhere invalidates that entry and every
/// entry after it.
pub fn verify_chain_from(entries: &[LedgerEntry], anchor_hash: &str) -> ChainVerification {
    let mut invalid = Vec::new();
    let mut expected_prev = anchor_hash.to_owned();

    for (i, entry) in entries.iter().enumerate() {
        let recomputed = entry.compute_hash(&expected_prev).ok();
        let ok = entry.prev_hash == expected_prev && recomputed.as_deref() == Some(&entry.hash);
        if !ok {
            invalid.push(i);
        }
        // Chain on what the entry *should* hash to, so a break propagates.
        expected_prev = recomputed.unwrap_or_default();
    }

    if let Some(first) = invalid.first() {
        warn!(
            "ledger: chain broken at entry {first} ({} of {} entries invalid)",
            invalid.len(),
            entries.len()
        );
    }

    ChainVerification {
        checked: entries.len(),
        invalid,
    }
}

/// A ledger that owns its chain and tail hash.
#[derive(Debug, Clone, Default)]
pub struct DecisionLedger {
    anchor: String,
    entries: Vec<LedgerEntry>,
}

impl DecisionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue a chain whose last persisted entry hashed to `tail_hash`.
    pub fn resume(tail_hash: impl Into<String>) -> Self {
        Self {
            anchor: tail_hash.into(),
            entries: Vec::new(),
        }
    }

    /// Hash the next entry will chain onto.
    pub fn tail_hash(&self) -> &str {
        self.entries.last().map_or(self.anchor.as_str(), |e| e.hash.as_str())
    }

    pub fn append(
        &mut self,
        decision: ActuationDecision,
        health: HealthState,
        timestamp_ms: u64,
    ) -> Result<&LedgerEntry> {
        let entry = append(decision, health, self.tail_hash(), timestamp_ms)?;
        self.entries.push(entry);
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Append one entry per decision, all stamped `timestamp_ms` and chained
    /// in order.  Either every entry is appended or none is.
    pub fn append_batch(
        &mut self,
        decisions: &[ActuationDecision],
        health: HealthState,
        timestamp_ms: u64,
    ) -> Result<&[LedgerEntry]> {
        let mut prev = self.tail_hash().to_owned();
        let mut staged = Vec::with_capacity(decisions.len());
        for d in decisions {
            let entry = append(d.clone(), health, &prev, timestamp_ms)?;
            prev.clone_from(&entry.hash);
            staged.push(entry);
        }
        let start = self.entries.len();
        self.entries.extend(staged);
        Ok(&self.entries[start..])
    }

    pub fn entries(&self) -> &[LedgerEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn verify(&self) -> ChainVerification {
        verify_chain_from(&self.entries, &self.anchor)
    }
}
