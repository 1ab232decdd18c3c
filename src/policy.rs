//! Policy bundle → actuation caps.
//!
//! A [`PolicyBundle`] is retrieved by an external collaborator (file,
//! ledger, network) and handed to the core as JSON.  [`derive_caps`] is a
//! pure arithmetic transform from its baseline and SPG sections into
//! per-actuator ceilings, using fixed conservative offsets.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Result, ValidationError};
use crate::firewall::ActuatorKind;

// Fallbacks applied when a bundle omits a value.
const DEFAULT_BASELINE_BROOD_TEMP_C: f64 = 34.0;
const DEFAULT_MAX_COLONY_STRENGTH_LOSS_PCT: f64 = 10.0;
const DEFAULT_MAX_DAILY_MORTALITY_PCT: f64 = 5.0;
const DEFAULT_MAX_MITES_PER_100_BEES: f64 = 3.0;

// Fixed envelopes.
const MAX_HEATER_DELTA_C: f64 = 2.0;
const STRENGTH_LOSS_RELAXED_ABOVE_PCT: f64 = 15.0;
const FAN_DUTY_RELAXED_PCT: f64 = 70.0;
const FAN_DUTY_STRICT_PCT: f64 = 60.0;
const MAX_LED_LUX: f64 = 800.0;
const MAX_DELTA_T_C_PER_HOUR: f64 = 1.0;
const MAX_DELTA_DB_PER_HOUR: f64 = 3.0;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SiteBaseline {
    pub baseline_brood_temp_c: Option<f64>,
    pub baseline_brood_humidity_pct: Option<f64>,
    pub baseline_acoustic_db: Option<f64>,
}

/// Safety-performance-goal limits.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpgLimits {
    pub max_colony_strength_loss_pct: Option<f64>,
    pub max_daily_mortality_pct: Option<f64>,
    pub max_mites_per_100_bees: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HabitatPolicy {
    pub subject_id: Option<String>,
    pub baseline: SiteBaseline,
    pub efsa_spg: SpgLimits,
}

/// Versioned policy document.  Immutable once loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyBundle {
    pub version: Option<u64>,
    pub policy: HabitatPolicy,
}

impl PolicyBundle {
    pub fn from_json_str(s: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(s).map_err(|_| ValidationError::NotARecord("policy bundle"))?;
        Self::from_value(&value)
    }

    /// Parse a bundle document.  Requires a `policy` object; the
    /// `baseline` and `efsa_spg` sections and their fields are optional but
    /// must be numbers when present.
    pub fn from_value(value: &Value) -> Result<Self> {
        let Value::Object(root) = value else {
            return Err(ValidationError::NotARecord("policy bundle").into());
        };
        let Some(Value::Object(policy)) = root.get("policy") else {
            return Err(ValidationError::MissingPolicySection.into());
        };

        let baseline = section(policy, "baseline")?;
        let spg = section(policy, "efsa_spg")?;

        Ok(Self {
            version: root.get("version").and_then(Value::as_u64),
            policy: HabitatPolicy {
                subject_id: policy
                    .get("hive_id")
                    .or_else(|| policy.get("subject_id"))
                    .and_then(Value::as_str)
                    .map(str::to_owned),
                baseline: SiteBaseline {
                    baseline_brood_temp_c: number(baseline, "baseline_brood_temp_c")?,
                    baseline_brood_humidity_pct: number(baseline, "baseline_brood_humidity_pct")?,
                    baseline_acoustic_db: number(baseline, "baseline_acoustic_db")?,
                },
                efsa_spg: SpgLimits {
                    max_colony_strength_loss_pct: number(spg, "max_colony_strength_loss_pct")?,
                    max_daily_mortality_pct: number(spg, "max_daily_mortality_pct")?,
                    max_mites_per_100_bees: number(spg, "max_mites_per_100_bees")?,
                },
            },
        })
    }
}

fn section<'a>(policy: &'a Map<String, Value>, key: &'static str) -> Result<Option<&'a Map<String, Value>>> {
    match policy.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(m)) => Ok(Some(m)),
        Some(_) => Err(ValidationError::InvalidPolicyField(key).into()),
    }
}

fn number(section: Option<&Map<String, Value>>, key: &'static str) -> Result<Option<f64>> {
    match section.and_then(|s| s.get(key)) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .filter(|n| n.is_finite())
            .map(Some)
            .ok_or_else(|| ValidationError::InvalidPolicyField(key).into()),
    }
}

/// SPG values the caps were derived from, after defaults.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CapsProvenance {
    pub max_colony_strength_loss_pct: f64,
    pub max_daily_mortality_pct: f64,
    pub max_mites_per_100_bees: f64,
}

/// Per-actuator ceilings plus rate-of-change limits.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ActuationCaps {
    pub max_heater_celsius: f64,
    pub max_fan_duty_pct: f64,
    pub max_led_lux: f64,
    pub max_delta_t_c_per_hour: f64,
    pub max_delta_db_per_hour: f64,
    pub derived_from: CapsProvenance,
}

impl ActuationCaps {
    /// Ceiling for one actuator kind.
    pub fn ceiling(&self, kind: ActuatorKind) -> f64 {
        match kind {
            ActuatorKind::Heater => self.max_heater_celsius,
            ActuatorKind::Fan => self.max_fan_duty_pct,
            ActuatorKind::Led => self.max_led_lux,
        }
    }

    /// Every cap must be a finite number.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            (self.max_heater_celsius, "max_heater_celsius"),
            (self.max_fan_duty_pct, "max_fan_duty_pct"),
            (self.max_led_lux, "max_led_lux"),
            (self.max_delta_t_c_per_hour, "max_delta_t_c_per_hour"),
            (self.max_delta_db_per_hour, "max_delta_db_per_hour"),
        ];
        for (v, name) in fields {
            if !v.is_finite() {
                return Err(ValidationError::InvalidPolicyField(name).into());
            }
        }
        Ok(())
    }
}

impl Default for ActuationCaps {
    /// Caps for an empty bundle (all fallbacks applied).
    fn default() -> Self {
        derive_caps(&PolicyBundle::default())
    }
}

/// Derive actuation caps.  Deterministic: the same bundle always yields the
/// same caps.
pub fn derive_caps(bundle: &PolicyBundle) -> ActuationCaps {
    let p = &bundle.policy;
    let baseline_temp = p
        .baseline
        .baseline_brood_temp_c
        .unwrap_or(DEFAULT_BASELINE_BROOD_TEMP_C);
    let strength_loss = p
        .efsa_spg
        .max_colony_strength_loss_pct
        .unwrap_or(DEFAULT_MAX_COLONY_STRENGTH_LOSS_PCT);

    let max_fan_duty_pct = if strength_loss > STRENGTH_LOSS_RELAXED_ABOVE_PCT {
        FAN_DUTY_RELAXED_PCT
    } else {
        FAN_DUTY_STRICT_PCT
    };

    ActuationCaps {
        max_heater_celsius: baseline_temp + MAX_HEATER_DELTA_C,
        max_fan_duty_pct,
        max_led_lux: MAX_LED_LUX,
        max_delta_t_c_per_hour: MAX_DELTA_T_C_PER_HOUR,
        max_delta_db_per_hour: MAX_DELTA_DB_PER_HOUR,
        derived_from: CapsProvenance {
            max_colony_strength_loss_pct: strength_loss,
            max_daily_mortality_pct: p
                .efsa_spg
                .max_daily_mortality_pct
                .unwrap_or(DEFAULT_MAX_DAILY_MORTALITY_PCT),
            max_mites_per_100_bees: p
                .efsa_spg
                .max_mites_per_100_bees
                .unwrap_or(DEFAULT_MAX_MITES_PER_100_BEES),
        },
    }
}

/// Parse and derive in one step.
pub fn derive_caps_from_value(value: &Value) -> Result<ActuationCaps> {
    Ok(derive_caps(&PolicyBundle::from_value(value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[test]
    fn heater_is_baseline_plus_delta() {
        let caps = derive_caps_from_value(&json!({
            "policy": {"baseline": {"baseline_brood_temp_c": 35}, "efsa_spg": {}}
        }))
        .unwrap();
        assert_eq!(caps.max_heater_celsius, 37.0);
        assert_eq!(caps.ceiling(ActuatorKind::Heater), 37.0);
    }

    #[test]
    fn fan_cap_depends_on_strength_loss() {
        let strict = derive_caps_from_value(&json!({
            "policy": {"efsa_spg": {"max_colony_strength_loss_pct": 15}}
        }))
        .unwrap();
        let relaxed = derive_caps_from_value(&json!({
            "policy": {"efsa_spg": {"max_colony_strength_loss_pct": 20}}
        }))
        .unwrap();
        assert_eq!(strict.max_fan_duty_pct, 60.0);
        assert_eq!(relaxed.max_fan_duty_pct, 70.0);
    }

    #[test]
    fn empty_policy_uses_fallbacks() {
        let caps = derive_caps_from_value(&json!({"policy": {}})).unwrap();
        assert_eq!(caps, ActuationCaps::default());
        assert_eq!(caps.max_heater_celsius, 36.0);
        assert_eq!(caps.max_led_lux, 800.0);
        assert_eq!(caps.max_delta_t_c_per_hour, 1.0);
        assert_eq!(caps.max_delta_db_per_hour, 3.0);
        assert_eq!(caps.derived_from.max_mites_per_100_bees, 3.0);
    }

    #[test]
    fn missing_policy_section_is_rejected() {
        assert_eq!(
            PolicyBundle::from_value(&json!({"version": 3})),
            Err(Error::Validation(ValidationError::MissingPolicySection))
        );
        assert!(PolicyBundle::from_value(&json!({"policy": "yes"})).is_err());
        assert!(PolicyBundle::from_value(&json!([])).is_err());
    }

    #[test]
    fn non_numeric_field_is_rejected() {
        let r = PolicyBundle::from_value(&json!({
            "policy": {"baseline": {"baseline_brood_temp_c": "warm"}}
        }));
        assert_eq!(
            r,
            Err(Error::Validation(ValidationError::InvalidPolicyField(
                "baseline_brood_temp_c"
            )))
        );
    }

    #[test]
    fn parses_version_and_subject() {
        let b = PolicyBundle::from_json_str(
            r#"{"version": 4, "policy": {"hive_id": "hive-7", "baseline": {"baseline_brood_humidity_pct": 60}}}"#,
        )
        .unwrap();
        assert_eq!(b.version, Some(4));
        assert_eq!(b.policy.subject_id.as_deref(), Some("hive-7"));
        assert_eq!(b.policy.baseline.baseline_brood_humidity_pct, Some(60.0));
    }

    #[test]
    fn non_finite_caps_fail_validation() {
        let caps = ActuationCaps {
            max_led_lux: f64::NAN,
            ..ActuationCaps::default()
        };
        assert!(caps.validate().is_err());
        assert!(ActuationCaps::default().validate().is_ok());
    }
}
