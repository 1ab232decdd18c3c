//! Telemetry normalisation.
//!
//! Raw sensor records arrive loosely typed (numbers, numeric strings,
//! nulls, garbage) from the ingestion adapters.  [`normalize`] coerces the
//! fixed set of expected metrics into finite `f64`s and marks everything
//! else as absent.  Absent is a first-class value here: the classifier
//! treats it as "not evaluable", never as an alarm.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, ValidationError};

/// The metrics the normaliser recognises.  Extra keys in a raw record are
/// ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    BroodTempC,
    BroodHumidityPct,
    AcousticSurplusDb,
    DailyMortalityPct,
    HiveWeightKgX10,
    ForagerReturnDeltaPct,
    VarroaMitesPer100Bees,
}

impl Metric {
    pub const ALL: [Metric; 7] = [
        Metric::BroodTempC,
        Metric::BroodHumidityPct,
        Metric::AcousticSurplusDb,
        Metric::DailyMortalityPct,
        Metric::HiveWeightKgX10,
        Metric::ForagerReturnDeltaPct,
        Metric::VarroaMitesPer100Bees,
    ];

    /// Wire key used in raw telemetry records.
    pub const fn key(self) -> &'static str {
        match self {
            Self::BroodTempC => "brood_temp_c",
            Self::BroodHumidityPct => "brood_humidity_pct",
            Self::AcousticSurplusDb => "acoustic_surplus_db",
            Self::DailyMortalityPct => "daily_mortality_pct",
            Self::HiveWeightKgX10 => "hive_weight_kg_x10",
            Self::ForagerReturnDeltaPct => "forager_return_delta_pct",
            Self::VarroaMitesPer100Bees => "varroa_mites_per_100_bees",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.key() == key)
    }
}

impl core::fmt::Display for Metric {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.key())
    }
}

/// Canonical metric set for one tick.
///
/// Every [`Metric`] has an entry; each is either a finite number or `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedTelemetry {
    pub metrics: BTreeMap<Metric, Option<f64>>,
    pub missing_fields: Vec<Metric>,
    pub captured_at_ms: u64,
}

impl NormalizedTelemetry {
    /// Build from already-typed readings.  Non-finite values become absent.
    pub fn from_readings(
        readings: impl IntoIterator<Item = (Metric, f64)>,
        captured_at_ms: u64,
    ) -> Self {
        let mut metrics: BTreeMap<Metric, Option<f64>> =
            Metric::ALL.into_iter().map(|m| (m, None)).collect();
        for (m, v) in readings {
            metrics.insert(m, Some(v).filter(|v| v.is_finite()));
        }
        Self::finish(metrics, captured_at_ms)
    }

    /// Value of `metric`, or `None` if absent.
    pub fn get(&self, metric: Metric) -> Option<f64> {
        self.metrics.get(&metric).copied().flatten()
    }

    pub fn is_missing(&self, metric: Metric) -> bool {
        self.get(metric).is_none()
    }

    fn finish(metrics: BTreeMap<Metric, Option<f64>>, captured_at_ms: u64) -> Self {
        let missing_fields = metrics
            .iter()
            .filter(|(_, v)| v.is_none())
            .map(|(m, _)| *m)
            .collect();
        Self {
            metrics,
            missing_fields,
            captured_at_ms,
        }
    }
}

/// Normalise a raw telemetry record.
///
/// Fails only when `raw` is not a JSON object.
pub fn normalize(raw: &Value, captured_at_ms: u64) -> Result<NormalizedTelemetry> {
    let Value::Object(record) = raw else {
        return Err(ValidationError::NotARecord("raw telemetry").into());
    };

    let metrics = Metric::ALL
        .into_iter()
        .map(|m| (m, record.get(m.key()).and_then(number_or_absent)))
        .collect();

    Ok(NormalizedTelemetry::finish(metrics, captured_at_ms))
}

/// Coerce a JSON value to a finite number.
///
/// Numbers pass through; non-blank strings that parse as finite numbers are
/// converted; everything else (null, bool, arrays, "NaN", "inf") is absent.
fn number_or_absent(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                return None;
            }
            s.parse::<f64>().ok()?
        }
        _ => return None,
    };
    n.is_finite().then_some(n)
}

// ---------------------------------------------------------------------------
// EFSA-style metric view
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColonyStrengthProxy {
    pub daily_mortality_pct: Option<f64>,
    pub forager_return_delta_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StressProxies {
    pub brood_temp_c: Option<f64>,
    pub brood_humidity_pct: Option<f64>,
    pub acoustic_surplus_db: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParasiteLoad {
    pub varroa_mites_per_100_bees: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceProxy {
    pub hive_weight_kg: Option<f64>,
}

/// Normalised metrics regrouped the way safety-performance goals are
/// expressed, ready for comparison against SPG limits.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfsaMetricView {
    pub colony_strength_proxy: ColonyStrengthProxy,
    pub stress_proxies: StressProxies,
    pub parasite_load: ParasiteLoad,
    pub resource_proxy: ResourceProxy,
    pub missing_fields: Vec<Metric>,
    pub captured_at_ms: u64,
}

impl From<&NormalizedTelemetry> for EfsaMetricView {
    fn from(t: &NormalizedTelemetry) -> Self {
        Self {
            colony_strength_proxy: ColonyStrengthProxy {
                daily_mortality_pct: t.get(Metric::DailyMortalityPct),
                forager_return_delta_pct: t.get(Metric::ForagerReturnDeltaPct),
            },
            stress_proxies: StressProxies {
                brood_temp_c: t.get(Metric::BroodTempC),
                brood_humidity_pct: t.get(Metric::BroodHumidityPct),
                acoustic_surplus_db: t.get(Metric::AcousticSurplusDb),
            },
            parasite_load: ParasiteLoad {
                varroa_mites_per_100_bees: t.get(Metric::VarroaMitesPer100Bees),
            },
            resource_proxy: ResourceProxy {
                // Raw weight arrives in tenths of a kilogram.
                hive_weight_kg: t.get(Metric::HiveWeightKgX10).map(|w| w / 10.0),
            },
            missing_fields: t.missing_fields.clone(),
            captured_at_ms: t.captured_at_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_and_null_fields() {
        let t = normalize(&json!({"brood_temp_c": 35, "brood_humidity_pct": null}), 0).unwrap();
        assert_eq!(t.get(Metric::BroodTempC), Some(35.0));
        assert!(t.missing_fields.contains(&Metric::BroodHumidityPct));
        assert!(!t.missing_fields.contains(&Metric::BroodTempC));
    }

    #[test]
    fn every_metric_is_present_in_output() {
        let t = normalize(&json!({}), 7).unwrap();
        assert_eq!(t.metrics.len(), Metric::ALL.len());
        assert_eq!(t.missing_fields.len(), Metric::ALL.len());
        assert_eq!(t.captured_at_ms, 7);
    }

    #[test]
    fn numeric_strings_are_coerced() {
        let t = normalize(
            &json!({"acoustic_surplus_db": " 4.5 ", "daily_mortality_pct": "1e0"}),
            0,
        )
        .unwrap();
        assert_eq!(t.get(Metric::AcousticSurplusDb), Some(4.5));
        assert_eq!(t.get(Metric::DailyMortalityPct), Some(1.0));
    }

    #[test]
    fn garbage_becomes_absent_never_nan() {
        let t = normalize(
            &json!({
                "brood_temp_c": "NaN",
                "brood_humidity_pct": "warm",
                "acoustic_surplus_db": true,
                "daily_mortality_pct": "",
                "hive_weight_kg_x10": [1, 2],
                "forager_return_delta_pct": "inf",
            }),
            0,
        )
        .unwrap();
        for v in t.metrics.values().flatten() {
            assert!(v.is_finite());
        }
        assert_eq!(t.missing_fields.len(), Metric::ALL.len());
    }

    #[test]
    fn extra_keys_are_ignored() {
        let t = normalize(&json!({"brood_temp_c": 34, "lid_colour": "blue"}), 0).unwrap();
        assert_eq!(t.metrics.len(), Metric::ALL.len());
    }

    #[test]
    fn non_record_is_rejected() {
        for raw in [json!(null), json!(3), json!("x"), json!([1, 2])] {
            assert!(normalize(&raw, 0).is_err(), "{raw} should be rejected");
        }
    }

    #[test]
    fn serialises_with_wire_names() {
        let t = normalize(&json!({"brood_temp_c": 35}), 1).unwrap();
        let v = serde_json::to_value(&t).unwrap();
        assert_eq!(v["metrics"]["brood_temp_c"], json!(35.0));
        assert_eq!(v["metrics"]["brood_humidity_pct"], Value::Null);
        assert_eq!(v["missingFields"][0], json!("brood_humidity_pct"));
    }

    #[test]
    fn efsa_view_converts_weight_to_kg() {
        let t = normalize(&json!({"hive_weight_kg_x10": 425, "varroa_mites_per_100_bees": 1}), 0)
            .unwrap();
        let view = EfsaMetricView::from(&t);
        assert_eq!(view.resource_proxy.hive_weight_kg, Some(42.5));
        assert_eq!(view.parasite_load.varroa_mites_per_100_bees, Some(1.0));
        assert_eq!(view.stress_proxies.brood_temp_c, None);
    }

    #[test]
    fn from_readings_drops_non_finite() {
        let t = NormalizedTelemetry::from_readings(
            [(Metric::BroodTempC, f64::NAN), (Metric::BroodHumidityPct, 60.0)],
            0,
        );
        assert!(t.is_missing(Metric::BroodTempC));
        assert_eq!(t.get(Metric::BroodHumidityPct), Some(60.0));
    }
}
