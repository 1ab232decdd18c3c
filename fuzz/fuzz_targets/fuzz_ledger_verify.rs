//! Fuzz target: ledger chain verification
//!
//! Two modes, selected by the first byte:
//! - arbitrary JSON decoded as a list of entries must verify without
//!   panicking, with sorted in-range invalid indices
//! - a known-good chain with one field mutated must report the mutated
//!   entry as the first invalid one
//!
//! cargo fuzz run fuzz_ledger_verify

#![no_main]

use hivegate::firewall::{ActuationRequest, ActuatorKind, enforce};
use hivegate::health::{Band, Bioload, HealthState};
use hivegate::ledger::{DecisionLedger, LedgerEntry, verify_chain};
use hivegate::policy::ActuationCaps;
use libfuzzer_sys::fuzz_target;

fn known_chain() -> Vec<LedgerEntry> {
    let health = HealthState::new(Band::Green, Bioload::Nominal);
    let reqs: Vec<ActuationRequest> = (0..4u64)
        .map(|i| ActuationRequest {
            subject_id: "hive-fuzz".into(),
            actuator: ActuatorKind::ALL[(i % 3) as usize],
            magnitude: 10.0 * i as f64,
            duration_ms: 1000,
            location: "box".into(),
            requested_at_ms: i,
        })
        .collect();
    let Ok(decisions) = enforce(&reqs, &health, &ActuationCaps::default(), 0) else {
        return Vec::new();
    };
    let mut ledger = DecisionLedger::new();
    let _ = ledger.append_batch(&decisions, health, 1_000);
    ledger.entries().to_vec()
}

fuzz_target!(|data: &[u8]| {
    let Some((&mode, rest)) = data.split_first() else {
        return;
    };

    if mode % 2 == 0 {
        if let Ok(entries) = serde_json::from_slice::<Vec<LedgerEntry>>(rest) {
            let v = verify_chain(&entries);
            assert_eq!(v.checked, entries.len());
            assert!(v.invalid.windows(2).all(|w| w[0] < w[1]));
            assert!(v.invalid.iter().all(|&i| i < entries.len()));
        }
        return;
    }

    let mut entries = known_chain();
    if entries.is_empty() {
        return;
    }
    let idx = (mode as usize / 2) % entries.len();
    let location = String::from_utf8_lossy(rest).into_owned();
    if location == entries[idx].decision.request.location {
        return;
    }
    entries[idx].decision.request.location = location;
    let v = verify_chain(&entries);
    assert_eq!(v.first_invalid(), Some(idx));
    assert_eq!(v.invalid.len(), entries.len() - idx);
});
