//! HiveGate: habitat safety enforcement and audit core.
//!
//! Raw hive telemetry is normalized and classified into a health band and
//! bioload; every actuation request then passes the firewall, which denies,
//! caps or allows it against policy-derived limits.  Each decision lands in
//! a hash-chained ledger, and coarse state snapshots feed the pattern
//! archive, anomaly detector and risk advisor.
//!
//! Everything here is synchronous and free of I/O apart from the
//! [`adapters`].  The library never installs a logger.

#![deny(unused_must_use)]

pub mod app;
pub mod config;
pub mod error;
pub mod firewall;
pub mod health;
pub mod intel;
pub mod ledger;
pub mod policy;
pub mod telemetry;

pub mod adapters;

pub use config::GateConfig;
pub use error::{Error, Result, ValidationError};
pub use firewall::{ActuationDecision, ActuationFirewall, ActuationRequest, enforce};
pub use health::{Band, Bioload, HealthState, classify};
pub use ledger::{DecisionLedger, LedgerEntry, verify_chain};
pub use policy::{ActuationCaps, PolicyBundle, derive_caps};
pub use telemetry::{NormalizedTelemetry, normalize};
