//! Actuation firewall.
//!
//! Every actuation request passes through [`enforce`] before it may reach
//! hardware.  Requests in a batch are decided independently and in input
//! order:
//!
//! 1. Shape validation for the whole batch.  One malformed request fails
//!    the call; no partial decisions are produced.
//! 2. Red band or critical bioload → `Deny` (`band_or_bioload_red`),
//!    magnitude 0.  Unconditional, checked before any cap.
//! 3. Negative magnitude → `Deny` (`negative_magnitude`), magnitude 0.
//! 4. Magnitude above the actuator's cap → `Modify`
//!    (`capped_to_policy_limit`), magnitude = cap exactly.
//! 5. Otherwise `Allow` with the requested magnitude unchanged.
//!
//! Decision ids are a deterministic hash of `(subject, actuator,
//! requested_at_ms)` plus a kind suffix.  Two requests for the same subject
//! and actuator at the same millisecond share a base id; the monotonic
//! [`ActuationDecision::sequence`] tells them apart.

pub mod rate;
pub mod request;

pub use rate::{RateExcursion, RateGuard};
pub use request::{ActuationDecision, ActuationRequest, ActuatorKind, DecisionKind, ReasonCode};

use log::{debug, warn};
use serde_json::Value;

use crate::error::Result;
use crate::health::HealthState;
use crate::policy::ActuationCaps;

/// Stateful front end over [`enforce`] that owns the caps and the decision
/// sequence counter.
#[derive(Debug, Clone)]
pub struct ActuationFirewall {
    caps: ActuationCaps,
    next_sequence: u64,
}

impl ActuationFirewall {
    pub fn new(caps: ActuationCaps) -> Self {
        Self {
            caps,
            next_sequence: 0,
        }
    }

    pub fn caps(&self) -> &ActuationCaps {
        &self.caps
    }

    /// Swap in freshly derived caps (policy bundle changed).
    pub fn set_caps(&mut self, caps: ActuationCaps) {
        self.caps = caps;
    }

    /// Sequence number the next decision will carry.
    pub fn next_sequence(&self) -> u64 {
        self.next_sequence
    }

    /// Decide a batch.  The sequence counter only advances on success.
    pub fn evaluate(
        &mut self,
        requests: &[ActuationRequest],
        health: &HealthState,
    ) -> Result<Vec<ActuationDecision>> {
        let decisions = enforce(requests, health, &self.caps, self.next_sequence)?;
        self.next_sequence += decisions.len() as u64;
        Ok(decisions)
    }
}

/// Parse a batch of wire requests.  Fails on the first malformed entry.
pub fn parse_requests(values: &[Value]) -> Result<Vec<ActuationRequest>> {
    values
        .iter()
        .enumerate()
        .map(|(i, v)| ActuationRequest::from_value(v, i))
        .collect()
}

/// Decide every request in `requests` against `health` and `caps`.
///
/// `first_sequence` is assigned to the first decision and incremented per
/// request.
pub fn enforce(
    requests: &[ActuationRequest],
    health: &HealthState,
    caps: &ActuationCaps,
    first_sequence: u64,
) -> Result<Vec<ActuationDecision>> {
    caps.validate()?;
    for (i, req) in requests.iter().enumerate() {
        req.validate(i)?;
    }

    let decisions: Vec<ActuationDecision> = requests
        .iter()
        .zip(first_sequence..)
        .map(|(req, seq)| decide(req, health, caps, seq))
        .collect();

    for d in &decisions {
        match d.kind {
            DecisionKind::Allow => debug!(
                "firewall: {} {} {} allowed at {}",
                d.decision_id, d.request.subject_id, d.request.actuator, d.modified_magnitude
            ),
            DecisionKind::Modify => warn!(
                "firewall: {} {} {} capped {} -> {}",
                d.decision_id,
                d.request.subject_id,
                d.request.actuator,
                d.request.magnitude,
                d.modified_magnitude
            ),
            DecisionKind::Deny => warn!(
                "firewall: {} {} {} denied ({})",
                d.decision_id, d.request.subject_id, d.request.actuator, d.reason
            ),
        }
    }

    Ok(decisions)
}

fn decide(
    req: &ActuationRequest,
    health: &HealthState,
    caps: &ActuationCaps,
    sequence: u64,
) -> ActuationDecision {
    let (kind, reason, magnitude) = if health.is_lockout() {
        (DecisionKind::Deny, ReasonCode::BandOrBioloadRed, 0.0)
    } else if req.magnitude < 0.0 {
        (DecisionKind::Deny, ReasonCode::NegativeMagnitude, 0.0)
    } else {
        let capped = req.magnitude.min(caps.ceiling(req.actuator));
        if capped < req.magnitude {
            (DecisionKind::Modify, ReasonCode::CappedToPolicyLimit, capped)
        } else {
            (DecisionKind::Allow, ReasonCode::WithinLimits, req.magnitude)
        }
    };

    ActuationDecision {
        kind,
        reason,
        request: req.clone(),
        modified_magnitude: magnitude,
        decision_id: format!("{}-{}", base_decision_id(req), reason.id_suffix()),
        sequence,
    }
}

/// First 16 hex chars of SHA-256 over `subject-actuator-requested_at_ms`.
pub fn base_decision_id(req: &ActuationRequest) -> String {
    let base = format!(
        "{}-{}-{}",
        req.subject_id, req.actuator, req.requested_at_ms
    );
    let digest = hmac_sha256::Hash::hash(base.as_bytes());
    hex::encode(&digest[..8])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ValidationError};
    use crate::health::{Band, Bioload};

    fn req(actuator: ActuatorKind, magnitude: f64, at: u64) -> ActuationRequest {
        ActuationRequest {
            subject_id: "hive-1".into(),
            actuator,
            magnitude,
            duration_ms: 60_000,
            location: "brood-box".into(),
            requested_at_ms: at,
        }
    }

    fn green() -> HealthState {
        HealthState::new(Band::Green, Bioload::Nominal)
    }

    #[test]
    fn red_band_denies_everything() {
        let caps = ActuationCaps::default();
        let reqs = [req(ActuatorKind::Heater, 1.0, 1), req(ActuatorKind::Led, 5000.0, 2)];
        let out = enforce(&reqs, &HealthState::new(Band::Red, Bioload::Nominal), &caps, 0).unwrap();
        for d in &out {
            assert_eq!(d.kind, DecisionKind::Deny);
            assert_eq!(d.reason, ReasonCode::BandOrBioloadRed);
            assert_eq!(d.modified_magnitude, 0.0);
            assert!(d.decision_id.ends_with("-deny-red"));
        }
    }

    #[test]
    fn critical_bioload_denies_even_when_green() {
        let out = enforce(
            &[req(ActuatorKind::Fan, 10.0, 1)],
            &HealthState::new(Band::Green, Bioload::Critical),
            &ActuationCaps::default(),
            0,
        )
        .unwrap();
        assert_eq!(out[0].reason, ReasonCode::BandOrBioloadRed);
    }

    #[test]
    fn lockout_precedes_negative_magnitude() {
        let out = enforce(
            &[req(ActuatorKind::Fan, -5.0, 1)],
            &HealthState::new(Band::Red, Bioload::Unknown),
            &ActuationCaps::default(),
            0,
        )
        .unwrap();
        assert_eq!(out[0].reason, ReasonCode::BandOrBioloadRed);
    }

    #[test]
    fn negative_magnitude_denied() {
        let out = enforce(&[req(ActuatorKind::Fan, -1.0, 1)], &green(), &ActuationCaps::default(), 0)
            .unwrap();
        assert_eq!(out[0].kind, DecisionKind::Deny);
        assert_eq!(out[0].reason, ReasonCode::NegativeMagnitude);
        assert_eq!(out[0].modified_magnitude, 0.0);
        assert!(out[0].decision_id.ends_with("-deny-negative"));
    }

    #[test]
    fn over_cap_is_modified_to_exact_ceiling() {
        let caps = ActuationCaps::default();
        let out = enforce(&[req(ActuatorKind::Fan, 95.0, 1)], &green(), &caps, 0).unwrap();
        assert_eq!(out[0].kind, DecisionKind::Modify);
        assert_eq!(out[0].reason, ReasonCode::CappedToPolicyLimit);
        assert_eq!(out[0].modified_magnitude, caps.max_fan_duty_pct);
        assert!(out[0].decision_id.ends_with("-modify-cap"));
    }

    #[test]
    fn at_cap_is_allowed_unchanged() {
        let caps = ActuationCaps::default();
        let out = enforce(
            &[req(ActuatorKind::Heater, caps.max_heater_celsius, 1)],
            &HealthState::new(Band::Yellow, Bioload::Elevated),
            &caps,
            0,
        )
        .unwrap();
        assert_eq!(out[0].kind, DecisionKind::Allow);
        assert_eq!(out[0].reason, ReasonCode::WithinLimits);
        assert_eq!(out[0].modified_magnitude, caps.max_heater_celsius);
    }

    #[test]
    fn output_order_matches_input() {
        let reqs = [
            req(ActuatorKind::Led, 100.0, 3),
            req(ActuatorKind::Fan, 99.0, 1),
            req(ActuatorKind::Heater, -1.0, 2),
        ];
        let out = enforce(&reqs, &green(), &ActuationCaps::default(), 10).unwrap();
        let kinds: Vec<_> = out.iter().map(|d| d.kind).collect();
        assert_eq!(kinds, [DecisionKind::Allow, DecisionKind::Modify, DecisionKind::Deny]);
        let seqs: Vec<_> = out.iter().map(|d| d.sequence).collect();
        assert_eq!(seqs, [10, 11, 12]);
    }

    #[test]
    fn one_malformed_request_fails_the_batch() {
        let mut bad = req(ActuatorKind::Fan, 1.0, 2);
        bad.duration_ms = 0;
        let r = enforce(
            &[req(ActuatorKind::Fan, 1.0, 1), bad],
            &green(),
            &ActuationCaps::default(),
            0,
        );
        assert_eq!(
            r,
            Err(Error::Validation(ValidationError::NonPositiveDuration { index: 1 }))
        );
    }

    #[test]
    fn nan_magnitude_fails() {
        let r = enforce(
            &[req(ActuatorKind::Fan, f64::NAN, 1)],
            &green(),
            &ActuationCaps::default(),
            0,
        );
        assert!(r.is_err());
    }

    #[test]
    fn base_id_is_deterministic() {
        let a = req(ActuatorKind::Fan, 1.0, 42);
        let b = req(ActuatorKind::Fan, 77.0, 42);
        assert_eq!(base_decision_id(&a), base_decision_id(&b));
        assert_eq!(base_decision_id(&a).len(), 16);
        assert_ne!(base_decision_id(&a), base_decision_id(&req(ActuatorKind::Fan, 1.0, 43)));
    }

    #[test]
    fn firewall_sequence_advances_only_on_success() {
        let mut fw = ActuationFirewall::new(ActuationCaps::default());
        fw.evaluate(&[req(ActuatorKind::Fan, 1.0, 1), req(ActuatorKind::Fan, 1.0, 1)], &green())
            .unwrap();
        assert_eq!(fw.next_sequence(), 2);

        let mut bad = req(ActuatorKind::Fan, 1.0, 2);
        bad.subject_id.clear();
        assert!(fw.evaluate(&[bad], &green()).is_err());
        assert_eq!(fw.next_sequence(), 2);
    }

    #[test]
    fn colliding_base_ids_get_distinct_sequences() {
        let mut fw = ActuationFirewall::new(ActuationCaps::default());
        let out = fw
            .evaluate(&[req(ActuatorKind::Fan, 1.0, 5), req(ActuatorKind::Fan, 2.0, 5)], &green())
            .unwrap();
        assert_eq!(out[0].decision_id, out[1].decision_id);
        assert_ne!(out[0].sequence, out[1].sequence);
    }
}
