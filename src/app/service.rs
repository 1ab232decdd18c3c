//! Application service: the hexagonal core.
//!
//! [`HiveService`] owns every piece of state that crosses ticks for one
//! hive: caps and firewall sequence, the ledger chain, the pattern archive,
//! the rate guard and the rolling histories.  All I/O flows through port
//! traits injected at call sites, making the service testable with mock
//! adapters.
//!
//! ```text
//!  ClockPort ──▶ ┌──────────────────────────────┐ ──▶ EventSink
//!                │          HiveService          │
//!  telemetry ──▶ │ classify · firewall · ledger  │
//!  requests  ──▶ │ archive · risk · anomalies    │
//!                └──────────────────────────────┘
//! ```

use std::collections::VecDeque;

use log::{debug, error, info, warn};
use serde_json::Value;

use crate::config::GateConfig;
use crate::error::{Result, ValidationError};
use crate::firewall::{self, ActuationFirewall, RateGuard};
use crate::health::{self, Band, HealthState};
use crate::intel::anomaly::AnomalyDetector;
use crate::intel::archive::{PatternArchivist, SnapshotInput};
use crate::intel::meter::{self, RunStats};
use crate::intel::risk;
use crate::ledger::DecisionLedger;
use crate::policy::{ActuationCaps, derive_caps};
use crate::telemetry::{self, NormalizedTelemetry};

use super::commands::{AppCommand, CommandOutcome};
use super::events::{AppEvent, TickReport};
use super::ports::{ClockPort, EventSink};

// ───────────────────────────────────────────────────────────────
// HiveService
// ───────────────────────────────────────────────────────────────

/// Orchestrates the gate pipeline for a single hive.
pub struct HiveService {
    subject_id: String,
    config: GateConfig,
    firewall: ActuationFirewall,
    ledger: DecisionLedger,
    archivist: PatternArchivist,
    rate_guard: RateGuard,
    health_history: VecDeque<HealthState>,
    telemetry_history: VecDeque<NormalizedTelemetry>,
    last_health: Option<HealthState>,
    run: RunStats,
    tick_count: u64,
}

impl HiveService {
    /// Construct with default caps.  Fails on an empty subject id or an
    /// invalid configuration.
    pub fn new(subject_id: impl Into<String>, config: GateConfig) -> Result<Self> {
        Self::with_ledger(subject_id, config, DecisionLedger::new())
    }

    /// Construct around an existing ledger (e.g. one resumed from a
    /// persisted tail hash).
    pub fn with_ledger(
        subject_id: impl Into<String>,
        config: GateConfig,
        ledger: DecisionLedger,
    ) -> Result<Self> {
        let subject_id = subject_id.into();
        if subject_id.trim().is_empty() {
            return Err(ValidationError::EmptySubject.into());
        }
        config.validate()?;

        let history_len = config.risk.history_len;
        info!("HiveService for {subject_id} ready (history {history_len})");

        Ok(Self {
            archivist: PatternArchivist::new(config.archive),
            firewall: ActuationFirewall::new(ActuationCaps::default()),
            ledger,
            rate_guard: RateGuard::new(),
            health_history: VecDeque::with_capacity(history_len),
            telemetry_history: VecDeque::with_capacity(history_len),
            last_health: None,
            run: RunStats::default(),
            tick_count: 0,
            subject_id,
            config,
        })
    }

    // ── Per-tick orchestration ────────────────────────────────

    /// Run one pipeline pass: normalize → classify → firewall → ledger →
    /// archive, then emit events.
    ///
    /// Every validation error surfaces before any state is touched.
    pub fn tick(
        &mut self,
        raw_telemetry: &Value,
        requests: &[Value],
        clock: &impl ClockPort,
        sink: &mut impl EventSink,
    ) -> Result<TickReport> {
        let now_ms = clock.now_ms();

        // 1. Validate and normalize inputs
        let telemetry = telemetry::normalize(raw_telemetry, now_ms)?;
        let requests = firewall::parse_requests(requests)?;

        // 2. Classify
        let health = health::classify(&telemetry, &self.config.band, &self.config.bioload);

        // 3. Firewall (validates the batch before advancing the sequence)
        let decisions = self.firewall.evaluate(&requests, &health)?;

        // 4. Ledger: one entry per decision, all or nothing
        let entries = self.ledger.append_batch(&decisions, health, now_ms)?.to_vec();

        // 5. Archive
        let snapshot = self
            .archivist
            .record(&self.subject_id, &SnapshotInput::from_telemetry(&telemetry, health))?;

        let rate_excursions = self.rate_guard.observe(&decisions, self.firewall.caps());

        self.tick_count += 1;
        self.run.telemetry_samples += 1;
        self.run.decisions += decisions.len() as u64;
        self.run.virtual_objects += 1;
        push_bounded(&mut self.health_history, health, self.config.risk.history_len);
        push_bounded(
            &mut self.telemetry_history,
            telemetry.clone(),
            self.config.risk.history_len,
        );

        if !telemetry.missing_fields.is_empty() {
            debug!(
                "tick {}: {} metric(s) missing",
                self.tick_count,
                telemetry.missing_fields.len()
            );
        }

        let report = TickReport {
            tick: self.tick_count,
            captured_at_ms: now_ms,
            health,
            missing_fields: telemetry.missing_fields.clone(),
            entry_hashes: entries.iter().map(|e| e.hash.clone()).collect(),
            tail_hash: self.ledger.tail_hash().to_owned(),
            rate_warning: !rate_excursions.is_empty(),
            decisions,
            snapshot,
            rate_excursions,
        };

        info!(
            "{}: tick {} {}/{}, {} decision(s), tail {}",
            self.subject_id,
            report.tick,
            health.band,
            health.bioload,
            report.decisions.len(),
            report.tail_hash.get(..16).unwrap_or(&report.tail_hash)
        );

        // 6. Emit, in pipeline order
        sink.emit(&AppEvent::Telemetry(telemetry));

        let prev = self.last_health.replace(health);
        if prev != Some(health) {
            let entered_red =
                health.band == Band::Red && prev.is_none_or(|p| p.band != Band::Red);
            if entered_red {
                error!("{}: band now RED ({})", self.subject_id, health.bioload);
            } else if health.is_lockout() {
                warn!("{}: health now {}/{}", self.subject_id, health.band, health.bioload);
            }
            sink.emit(&AppEvent::HealthChanged {
                from: prev,
                to: health,
            });
        }

        for d in &report.decisions {
            sink.emit(&AppEvent::Decision(d.clone()));
        }
        for e in entries {
            sink.emit(&AppEvent::LedgerAppended(e));
        }
        sink.emit(&AppEvent::TickCompleted(report.clone()));

        Ok(report)
    }

    // ── Command handling ──────────────────────────────────────

    /// Process an external command.  A rejected command leaves the service
    /// unchanged.
    pub fn handle_command(
        &mut self,
        cmd: AppCommand,
        sink: &mut impl EventSink,
    ) -> Result<CommandOutcome> {
        match cmd {
            AppCommand::LoadPolicy(bundle) => {
                let caps = derive_caps(&bundle);
                caps.validate()?;
                self.firewall.set_caps(caps);
                info!(
                    "policy v{} loaded: heater<={} fan<={} led<={}",
                    bundle.version.unwrap_or(0),
                    caps.max_heater_celsius,
                    caps.max_fan_duty_pct,
                    caps.max_led_lux
                );
                sink.emit(&AppEvent::CapsChanged(caps));
                Ok(CommandOutcome::CapsLoaded(caps))
            }
            AppCommand::UpdateConfig(new_config) => {
                new_config.validate()?;
                let history_len = new_config.risk.history_len;
                truncate_front(&mut self.health_history, history_len);
                truncate_front(&mut self.telemetry_history, history_len);
                self.archivist.set_bands(new_config.archive);
                self.config = new_config;
                info!("Configuration updated at runtime");
                sink.emit(&AppEvent::ConfigUpdated(self.config.clone()));
                Ok(CommandOutcome::ConfigApplied)
            }
            AppCommand::AssessRisk => {
                let window = self.health_history.make_contiguous();
                risk::assess_window(window, &self.config.risk).map(CommandOutcome::Risk)
            }
            AppCommand::SuggestCooldown => {
                let window = self.health_history.make_contiguous();
                risk::suggest_cooldown(window).map(CommandOutcome::Cooldown)
            }
            AppCommand::VerifyLedger => Ok(CommandOutcome::Ledger(self.ledger.verify())),
            AppCommand::DetectAnomalies => {
                let detector = AnomalyDetector::new(self.config.anomaly);
                let found = detector.detect(self.telemetry_history.make_contiguous())?;
                Ok(CommandOutcome::Anomalies(detector.rank_by_risk(found)))
            }
            AppCommand::FindSimilar(query) => {
                Ok(CommandOutcome::Matches(self.archivist.find_similar(&query)))
            }
            AppCommand::EstimateVolume => {
                Ok(CommandOutcome::Volume(meter::estimate_volume(self.run)))
            }
        }
    }

    // ── Queries ───────────────────────────────────────────────

    pub fn subject_id(&self) -> &str {
        &self.subject_id
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn caps(&self) -> &ActuationCaps {
        self.firewall.caps()
    }

    pub fn ledger(&self) -> &DecisionLedger {
        &self.ledger
    }

    pub fn archivist(&self) -> &PatternArchivist {
        &self.archivist
    }

    /// Health samples held for risk assessment, oldest first.
    pub fn health_history(&self) -> impl Iterator<Item = &HealthState> {
        self.health_history.iter()
    }

    /// Most recent classification, if any tick has run.
    pub fn last_health(&self) -> Option<HealthState> {
        self.last_health
    }

    pub fn run_stats(&self) -> RunStats {
        self.run
    }

    /// Completed ticks since construction.
    pub fn tick_count(&self) -> u64 {
        self.tick_count
    }
}

fn push_bounded<T>(buf: &mut VecDeque<T>, item: T, cap: usize) {
    if buf.len() >= cap {
        buf.pop_front();
    }
    buf.push_back(item);
}

fn truncate_front<T>(buf: &mut VecDeque<T>, cap: usize) {
    while buf.len() > cap {
        buf.pop_front();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Fixed(u64);
    impl ClockPort for Fixed {
        fn now_ms(&self) -> u64 {
            self.0
        }
    }

    #[derive(Default)]
    struct Collect(Vec<AppEvent>);
    impl EventSink for Collect {
        fn emit(&mut self, event: &AppEvent) {
            self.0.push(event.clone());
        }
    }

    #[test]
    fn empty_subject_is_rejected() {
        assert!(HiveService::new("  ", GateConfig::default()).is_err());
    }

    #[test]
    fn invalid_config_is_rejected() {
        let mut cfg = GateConfig::default();
        cfg.risk.history_len = 0;
        assert!(HiveService::new("hive-1", cfg).is_err());
    }

    #[test]
    fn history_is_bounded() {
        let mut cfg = GateConfig::default();
        cfg.risk.history_len = 3;
        let mut svc = HiveService::new("hive-1", cfg).unwrap();
        let mut sink = Collect::default();
        for t in 0..5 {
            svc.tick(&json!({"brood_temp_c": 34.0}), &[], &Fixed(t), &mut sink)
                .unwrap();
        }
        assert_eq!(svc.health_history().count(), 3);
        assert_eq!(svc.tick_count(), 5);
    }

    #[test]
    fn shrinking_history_len_truncates_oldest() {
        let mut svc = HiveService::new("hive-1", GateConfig::default()).unwrap();
        let mut sink = Collect::default();
        for t in 0..6 {
            svc.tick(&json!({}), &[], &Fixed(t), &mut sink).unwrap();
        }
        let mut cfg = GateConfig::default();
        cfg.risk.history_len = 2;
        svc.handle_command(AppCommand::UpdateConfig(cfg), &mut sink).unwrap();
        assert_eq!(svc.health_history().count(), 2);
    }

    #[test]
    fn health_changed_only_on_change() {
        let mut svc = HiveService::new("hive-1", GateConfig::default()).unwrap();
        let mut sink = Collect::default();
        let raw = json!({"brood_temp_c": 34.0});
        svc.tick(&raw, &[], &Fixed(1), &mut sink).unwrap();
        svc.tick(&raw, &[], &Fixed(2), &mut sink).unwrap();
        let changes = sink
            .0
            .iter()
            .filter(|e| matches!(e, AppEvent::HealthChanged { .. }))
            .count();
        assert_eq!(changes, 1);
    }

    #[test]
    fn volume_counts_the_run() {
        let mut svc = HiveService::new("hive-1", GateConfig::default()).unwrap();
        let mut sink = Collect::default();
        let req = json!({
            "subjectId": "hive-1", "actuator": "Fan", "magnitude": 10,
            "durationMs": 1000, "location": "lid", "requestedAtMs": 1
        });
        svc.tick(&json!({}), &[req], &Fixed(1), &mut sink).unwrap();
        let CommandOutcome::Volume(v) = svc
            .handle_command(AppCommand::EstimateVolume, &mut sink)
            .unwrap()
        else {
            panic!("expected volume");
        };
        assert_eq!(v.approx_bytes, 256 + 192 + 128);
    }

    // Records every log line so tests can assert on level and text.
    struct Capture(std::sync::Mutex<Vec<(log::Level, String)>>);

    impl log::Log for Capture {
        fn enabled(&self, _: &log::Metadata) -> bool {
            true
        }
        fn log(&self, record: &log::Record) {
            if let Ok(mut lines) = self.0.lock() {
                lines.push((record.level(), record.args().to_string()));
            }
        }
        fn flush(&self) {}
    }

    static CAPTURE: Capture = Capture(std::sync::Mutex::new(Vec::new()));

    fn captured(subject: &str) -> Vec<(log::Level, String)> {
        let _ = log::set_logger(&CAPTURE);
        log::set_max_level(log::LevelFilter::Trace);
        CAPTURE
            .0
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, line)| line.starts_with(subject))
            .cloned()
            .collect()
    }

    #[test]
    fn entering_red_logs_error_and_ticks_log_info() {
        captured("hive-red");
        let mut svc = HiveService::new("hive-red", GateConfig::default()).unwrap();
        let mut sink = Collect::default();
        let hot = json!({"brood_temp_c": 39.5});
        svc.tick(&json!({"brood_temp_c": 34.0}), &[], &Fixed(1), &mut sink).unwrap();
        svc.tick(&hot, &[], &Fixed(2), &mut sink).unwrap();
        svc.tick(&json!({"brood_temp_c": 40.0}), &[], &Fixed(3), &mut sink).unwrap();

        let lines = captured("hive-red");
        let errors: Vec<_> = lines.iter().filter(|(l, _)| *l == log::Level::Error).collect();
        assert_eq!(errors.len(), 1, "one error per entry into red: {lines:?}");
        assert!(errors[0].1.contains("RED"));
        let summaries = lines
            .iter()
            .filter(|(l, line)| *l == log::Level::Info && line.contains(": tick "))
            .count();
        assert_eq!(summaries, 3);
    }
}
