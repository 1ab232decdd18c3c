//! Inbound commands to the application service.
//!
//! These represent actions requested by the outside world (operator
//! console, policy distribution, dashboards) that the
//! [`HiveService`](super::service::HiveService) interprets and acts upon.

use serde::Serialize;

use crate::config::GateConfig;
use crate::intel::anomaly::RankedAnomaly;
use crate::intel::archive::{ArchivedSnapshot, PatternQuery};
use crate::intel::meter::VolumeEstimate;
use crate::intel::risk::{CooldownAdvice, RiskAssessment};
use crate::ledger::ChainVerification;
use crate::policy::{ActuationCaps, PolicyBundle};

/// Commands that external adapters can send into the gate core.
#[derive(Debug, Clone)]
pub enum AppCommand {
    /// Re-derive caps from a freshly received policy bundle.
    LoadPolicy(PolicyBundle),

    /// Hot-swap configuration.  Rejected if it fails validation.
    UpdateConfig(GateConfig),

    /// Assess risk over the held health history.
    AssessRisk,

    /// Cooldown advice from the most recent health sample.
    SuggestCooldown,

    /// Verify the held ledger chain.
    VerifyLedger,

    /// Flag and rank outliers in the held telemetry history.
    DetectAnomalies,

    /// Search the pattern archive.
    FindSimilar(PatternQuery),

    /// Data-volume estimate for the run so far.
    EstimateVolume,
}

/// Result of a successfully handled [`AppCommand`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", content = "data", rename_all = "snake_case")]
pub enum CommandOutcome {
    CapsLoaded(ActuationCaps),
    ConfigApplied,
    Risk(RiskAssessment),
    Cooldown(CooldownAdvice),
    Ledger(ChainVerification),
    Anomalies(Vec<RankedAnomaly>),
    Matches(Vec<ArchivedSnapshot>),
    Volume(VolumeEstimate),
}
