//! Outbound application events.
//!
//! The [`HiveService`](super::service::HiveService) emits these through the
//! [`EventSink`](super::ports::EventSink) port.  Within one tick the order
//! is fixed: `Telemetry`, `HealthChanged` (only when the state moved), one
//! `Decision` per request in input order, one `LedgerAppended` per entry,
//! then `TickCompleted`.

use serde::Serialize;

use crate::config::GateConfig;
use crate::firewall::{ActuationDecision, RateExcursion};
use crate::health::HealthState;
use crate::intel::ArchivedSnapshot;
use crate::ledger::LedgerEntry;
use crate::policy::ActuationCaps;
use crate::telemetry::{Metric, NormalizedTelemetry};

/// Structured events emitted by the gate core.
#[derive(Debug, Clone)]
pub enum AppEvent {
    /// Normalized reading for this tick.
    Telemetry(NormalizedTelemetry),

    /// Health classification differs from the previous tick.  `from` is
    /// `None` on the first tick.
    HealthChanged {
        from: Option<HealthState>,
        to: HealthState,
    },

    /// One firewall verdict.
    Decision(ActuationDecision),

    /// One entry appended to the ledger.
    LedgerAppended(LedgerEntry),

    /// The tick finished; carries the same report `tick` returns.
    TickCompleted(TickReport),

    /// A policy bundle was loaded and caps re-derived.
    CapsChanged(ActuationCaps),

    /// Configuration swapped at runtime.
    ConfigUpdated(GateConfig),
}

/// Summary of one tick.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    pub tick: u64,
    pub captured_at_ms: u64,
    pub health: HealthState,
    pub missing_fields: Vec<Metric>,
    pub decisions: Vec<ActuationDecision>,
    pub entry_hashes: Vec<String>,
    pub tail_hash: String,
    pub snapshot: ArchivedSnapshot,
    pub rate_excursions: Vec<RateExcursion>,
    /// Any heater change in this tick ramped faster than the caps allow.
    pub rate_warning: bool,
}
