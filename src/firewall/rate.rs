//! Advisory rate-of-change tracking for heater setpoints.
//!
//! The caps carry `max_delta_t_c_per_hour`.  [`RateGuard`] remembers the
//! last heater magnitude that left the firewall (Allow or Modify) per
//! subject and reports when a new one would move faster than that.  It
//! never changes a decision; it only raises an excursion for the caller.
//!
//! At most [`MAX_TRACKED_SUBJECTS`] subjects are remembered.  A new subject
//! past that bound evicts the one with the oldest setpoint.

use std::collections::HashMap;

use log::warn;
use serde::Serialize;

use super::{ActuationDecision, ActuatorKind, DecisionKind};
use crate::policy::ActuationCaps;

const MS_PER_HOUR: f64 = 3_600_000.0;

/// Default bound on remembered subjects.
pub const MAX_TRACKED_SUBJECTS: usize = 64;

/// A heater change that exceeds the permitted ramp.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateExcursion {
    pub subject_id: String,
    pub decision_id: String,
    pub from_celsius: f64,
    pub to_celsius: f64,
    pub elapsed_ms: u64,
    pub limit_c_per_hour: f64,
}

#[derive(Debug, Clone, Copy)]
struct LastSetpoint {
    celsius: f64,
    at_ms: u64,
}

#[derive(Debug, Clone)]
pub struct RateGuard {
    last: HashMap<String, LastSetpoint>,
    capacity: usize,
}

impl Default for RateGuard {
    fn default() -> Self {
        Self::with_capacity(MAX_TRACKED_SUBJECTS)
    }
}

impl RateGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// A guard remembering at most `capacity` subjects (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            last: HashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Number of subjects with a remembered setpoint.
    pub fn tracked(&self) -> usize {
        self.last.len()
    }

    /// Check each heater decision against the previous setpoint for its
    /// subject, then record it.  Denied decisions are ignored.
    pub fn observe(
        &mut self,
        decisions: &[ActuationDecision],
        caps: &ActuationCaps,
    ) -> Vec<RateExcursion> {
        let mut excursions = Vec::new();
        for d in decisions {
            if d.request.actuator != ActuatorKind::Heater || d.kind == DecisionKind::Deny {
                continue;
            }
            let now = LastSetpoint {
                celsius: d.modified_magnitude,
                at_ms: d.request.requested_at_ms,
            };
            if let Some(prev) = self.last.get(&d.request.subject_id) {
                if let Some(x) = check(prev, &now, caps.max_delta_t_c_per_hour) {
                    warn!(
                        "rate: {} heater {:.2} -> {:.2} C over {} ms exceeds {} C/h",
                        d.request.subject_id, x.0, x.1, x.2, caps.max_delta_t_c_per_hour
                    );
                    excursions.push(RateExcursion {
                        subject_id: d.request.subject_id.clone(),
                        decision_id: d.decision_id.clone(),
                        from_celsius: x.0,
                        to_celsius: x.1,
                        elapsed_ms: x.2,
                        limit_c_per_hour: caps.max_delta_t_c_per_hour,
                    });
                }
            }
            self.record(&d.request.subject_id, now);
        }
        excursions
    }

    fn record(&mut self, subject_id: &str, now: LastSetpoint) {
        if let Some(slot) = self.last.get_mut(subject_id) {
            *slot = now;
            return;
        }
        if self.last.len() >= self.capacity {
            let oldest = self
                .last
                .iter()
                .min_by_key(|(_, s)| s.at_ms)
                .map(|(k, _)| k.clone());
            if let Some(k) = oldest {
                self.last.remove(&k);
            }
        }
        self.last.insert(subject_id.to_owned(), now);
    }
}

fn check(prev: &LastSetpoint, now: &LastSetpoint, limit: f64) -> Option<(f64, f64, u64)> {
    let delta = (now.celsius - prev.celsius).abs();
    if delta == 0.0 {
        return None;
    }
    let elapsed_ms = now.at_ms.saturating_sub(prev.at_ms);
    let exceeds = if elapsed_ms == 0 {
        true
    } else {
        delta / (elapsed_ms as f64 / MS_PER_HOUR) > limit
    };
    exceeds.then_some((prev.celsius, now.celsius, elapsed_ms))
}
