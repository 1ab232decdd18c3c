//! Actuation request and decision types.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// The fixed set of actuators the firewall governs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ActuatorKind {
    Heater,
    Fan,
    Led,
}

impl ActuatorKind {
    pub const ALL: [ActuatorKind; 3] = [Self::Heater, Self::Fan, Self::Led];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Heater => "Heater",
            Self::Fan => "Fan",
            Self::Led => "Led",
        }
    }
}

impl fmt::Display for ActuatorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActuatorKind {
    type Err = ();

    fn from_str(s: &str) -> core::result::Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|k| k.as_str() == s).ok_or(())
    }
}

/// One actuation request.  Immutable once submitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuationRequest {
    pub subject_id: String,
    pub actuator: ActuatorKind,
    pub magnitude: f64,
    pub duration_ms: u64,
    pub location: String,
    pub requested_at_ms: u64,
}

impl ActuationRequest {
    /// Parse a wire request.  `index` is the position in its batch and is
    /// reported in any validation error.
    pub fn from_value(value: &Value, index: usize) -> Result<Self> {
        let Value::Object(obj) = value else {
            return Err(ValidationError::MalformedRequest {
                index,
                field: "request",
            }
            .into());
        };
        let malformed = |field| ValidationError::MalformedRequest { index, field };

        let subject_id = obj
            .get("subjectId")
            .and_then(Value::as_str)
            .ok_or(malformed("subjectId"))?
            .to_owned();
        let actuator = obj
            .get("actuator")
            .and_then(Value::as_str)
            .ok_or(malformed("actuator"))?
            .parse::<ActuatorKind>()
            .map_err(|()| ValidationError::UnknownActuator { index })?;
        let magnitude = obj
            .get("magnitude")
            .and_then(Value::as_f64)
            .ok_or(malformed("magnitude"))?;
        let duration = obj
            .get("durationMs")
            .and_then(Value::as_f64)
            .ok_or(malformed("durationMs"))?;
        if !(duration.is_finite() && duration > 0.0) {
            return Err(ValidationError::NonPositiveDuration { index }.into());
        }
        let location = match obj.get("location") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(s)) => s.clone(),
            Some(_) => return Err(malformed("location").into()),
        };
        let requested_at_ms = obj
            .get("requestedAtMs")
            .and_then(Value::as_u64)
            .ok_or(malformed("requestedAtMs"))?;

        Ok(Self {
            subject_id,
            actuator,
            magnitude,
            // Sub-millisecond durations round up so they stay positive.
            duration_ms: duration.ceil() as u64,
            location,
            requested_at_ms,
        })
    }

    /// Shape check applied to every request before any decision is made.
    pub fn validate(&self, index: usize) -> Result<()> {
        if self.subject_id.trim().is_empty() {
            return Err(ValidationError::EmptySubjectId { index }.into());
        }
        if self.duration_ms == 0 {
            return Err(ValidationError::NonPositiveDuration { index }.into());
        }
        if !self.magnitude.is_finite() {
            return Err(ValidationError::NonFiniteMagnitude { index }.into());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DecisionKind {
    Allow,
    Modify,
    Deny,
}

impl DecisionKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Allow => "Allow",
            Self::Modify => "Modify",
            Self::Deny => "Deny",
        }
    }
}

impl fmt::Display for DecisionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasonCode {
    BandOrBioloadRed,
    NegativeMagnitude,
    CappedToPolicyLimit,
    WithinLimits,
}

impl ReasonCode {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::BandOrBioloadRed => "band_or_bioload_red",
            Self::NegativeMagnitude => "negative_magnitude",
            Self::CappedToPolicyLimit => "capped_to_policy_limit",
            Self::WithinLimits => "within_limits",
        }
    }

    /// Suffix appended to the base decision identifier.
    pub(crate) const fn id_suffix(self) -> &'static str {
        match self {
            Self::BandOrBioloadRed => "deny-red",
            Self::NegativeMagnitude => "deny-negative",
            Self::CappedToPolicyLimit => "modify-cap",
            Self::WithinLimits => "allow",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The firewall's verdict on one request.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActuationDecision {
    pub kind: DecisionKind,
    pub reason: ReasonCode,
    pub request: ActuationRequest,
    pub modified_magnitude: f64,
    pub decision_id: String,
    /// Monotonic per-firewall sequence; disambiguates colliding ids.
    pub sequence: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    fn wire() -> Value {
        json!({
            "subjectId": "hive-1",
            "actuator": "Fan",
            "magnitude": 40,
            "durationMs": 60000,
            "location": "north",
            "requestedAtMs": 1_700_000_000_000u64,
        })
    }

    #[test]
    fn parses_wire_request() {
        let r = ActuationRequest::from_value(&wire(), 0).unwrap();
        assert_eq!(r.actuator, ActuatorKind::Fan);
        assert_eq!(r.magnitude, 40.0);
        assert_eq!(r.duration_ms, 60_000);
        assert!(r.validate(0).is_ok());
    }

    #[test]
    fn unknown_actuator_rejected() {
        let mut v = wire();
        v["actuator"] = json!("Sprinkler");
        assert_eq!(
            ActuationRequest::from_value(&v, 3),
            Err(Error::Validation(ValidationError::UnknownActuator { index: 3 }))
        );
    }

    #[test]
    fn actuator_names_are_exact() {
        assert!("heater".parse::<ActuatorKind>().is_err());
        assert_eq!("Led".parse::<ActuatorKind>(), Ok(ActuatorKind::Led));
    }

    #[test]
    fn non_positive_duration_rejected() {
        for d in [json!(0), json!(-10), json!(-0.5)] {
            let mut v = wire();
            v["durationMs"] = d;
            assert_eq!(
                ActuationRequest::from_value(&v, 0),
                Err(Error::Validation(ValidationError::NonPositiveDuration { index: 0 }))
            );
        }
    }

    #[test]
    fn string_or_missing_magnitude_is_malformed() {
        let expected = Err(Error::Validation(ValidationError::MalformedRequest {
            index: 2,
            field: "magnitude",
        }));
        let mut v = wire();
        v["magnitude"] = json!("40");
        assert_eq!(ActuationRequest::from_value(&v, 2), expected);
        v["magnitude"] = Value::Null;
        assert_eq!(ActuationRequest::from_value(&v, 2), expected);
        if let Some(obj) = v.as_object_mut() {
            obj.remove("magnitude");
        }
        assert_eq!(ActuationRequest::from_value(&v, 2), expected);
    }

    #[test]
    fn non_finite_magnitude_fails_validation() {
        let mut r = ActuationRequest::from_value(&wire(), 0).unwrap();
        r.magnitude = f64::NAN;
        assert_eq!(
            r.validate(4),
            Err(Error::Validation(ValidationError::NonFiniteMagnitude { index: 4 }))
        );
    }

    #[test]
    fn blank_subject_fails_validation() {
        let mut r = ActuationRequest::from_value(&wire(), 0).unwrap();
        r.subject_id = "  ".into();
        assert_eq!(
            r.validate(1),
            Err(Error::Validation(ValidationError::EmptySubjectId { index: 1 }))
        );
    }

    #[test]
    fn serialises_with_wire_names() {
        let r = ActuationRequest::from_value(&wire(), 0).unwrap();
        let v = serde_json::to_value(&r).unwrap();
        assert_eq!(v["subjectId"], json!("hive-1"));
        assert_eq!(v["actuator"], json!("Fan"));
        assert_eq!(v["requestedAtMs"], json!(1_700_000_000_000u64));
    }
}
