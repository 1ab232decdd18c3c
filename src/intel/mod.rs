//! Analysis over accumulated history: anomalies, archived patterns, risk
//! windows and run metering.

pub mod anomaly;
pub mod archive;
pub mod meter;
pub mod risk;

pub use anomaly::{AnomalyDetector, RankedAnomaly, SampleAnomaly, detect_anomalies, rank_anomalies_by_risk};
pub use archive::{ArchivedSnapshot, Descriptor, PatternArchivist, PatternQuery, SnapshotInput};
pub use meter::{RunStats, estimate_volume, score_uncertainty};
pub use risk::{CooldownAdvice, RiskAssessment, RiskLevel, assess_window, suggest_cooldown};
