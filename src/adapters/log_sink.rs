//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing structured application events to
//! the `log` facade.  Whoever embeds the gate installs the logger; a
//! ledger-persistence or dashboard adapter would implement the same trait.

use log::{info, warn};

use crate::app::events::AppEvent;
use crate::app::ports::EventSink;
use crate::firewall::DecisionKind;

/// Adapter that logs every [`AppEvent`].
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

fn short(hash: &str) -> &str {
    hash.get(..16).unwrap_or(hash)
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_owned(), |v| format!("{v:.1}"))
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &AppEvent) {
        use crate::telemetry::Metric;

        match event {
            AppEvent::Telemetry(t) => {
                info!(
                    "TELEM | T={}\u{00b0}C | RH={}% | dB+={} | mort={}% | mites={} | missing={}",
                    fmt_opt(t.get(Metric::BroodTempC)),
                    fmt_opt(t.get(Metric::BroodHumidityPct)),
                    fmt_opt(t.get(Metric::AcousticSurplusDb)),
                    fmt_opt(t.get(Metric::DailyMortalityPct)),
                    fmt_opt(t.get(Metric::VarroaMitesPer100Bees)),
                    t.missing_fields.len(),
                );
            }
            AppEvent::HealthChanged { from, to } => match from {
                Some(f) => info!("HEALTH | {}/{} -> {}/{}", f.band, f.bioload, to.band, to.bioload),
                None => info!("HEALTH | initial {}/{}", to.band, to.bioload),
            },
            AppEvent::Decision(d) => {
                let line = format!(
                    "DECISION | {} #{} | {} {} | {} ({}) | {} -> {}",
                    d.decision_id,
                    d.sequence,
                    d.request.subject_id,
                    d.request.actuator,
                    d.kind,
                    d.reason,
                    d.request.magnitude,
                    d.modified_magnitude,
                );
                if d.kind == DecisionKind::Allow {
                    info!("{line}");
                } else {
                    warn!("{line}");
                }
            }
            AppEvent::LedgerAppended(e) => {
                info!("LEDGER | {} <- {}", e.id(), short(&e.prev_hash));
            }
            AppEvent::TickCompleted(r) => {
                info!(
                    "TICK | #{} @{} | {}/{} | decisions={} | tail={} | rate_warning={}",
                    r.tick,
                    r.captured_at_ms,
                    r.health.band,
                    r.health.bioload,
                    r.decisions.len(),
                    short(&r.tail_hash),
                    r.rate_warning,
                );
            }
            AppEvent::CapsChanged(c) => {
                info!(
                    "CAPS | heater<={}\u{00b0}C fan<={}% led<={}lx dT<={}/h dB<={}/h",
                    c.max_heater_celsius,
                    c.max_fan_duty_pct,
                    c.max_led_lux,
                    c.max_delta_t_c_per_hour,
                    c.max_delta_db_per_hour,
                );
            }
            AppEvent::ConfigUpdated(c) => {
                info!(
                    "CONFIG | z>={} yellow_limit={} history={}",
                    c.anomaly.z_threshold, c.risk.yellow_fraction_limit, c.risk.history_len
                );
            }
        }
    }
}
