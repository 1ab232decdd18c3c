//! Z-score anomaly detection over a telemetry series.
//!
//! For each tracked metric the population mean and standard deviation are
//! computed over the samples that have a value for it.  A value is flagged
//! when `|value - mean| / std >= z_threshold`, within [`Z_TOLERANCE`] so a
//! z that is exactly the threshold in real arithmetic still flags after
//! rounding.  Metrics with zero spread never flag.

use serde::Serialize;

use crate::config::AnomalyConfig;
use crate::error::{Result, ValidationError};
use crate::telemetry::{Metric, NormalizedTelemetry};

pub const MIN_SERIES_LEN: usize = 3;

/// Slack applied to the threshold comparison.
pub const Z_TOLERANCE: f64 = 1e-9;

/// Metrics examined by default.
pub const DEFAULT_TRACKED: [Metric; 5] = [
    Metric::BroodTempC,
    Metric::BroodHumidityPct,
    Metric::AcousticSurplusDb,
    Metric::DailyMortalityPct,
    Metric::VarroaMitesPer100Bees,
];

/// Risk weight for a metric; `None` falls back to the configured default.
pub fn risk_weight(metric: Metric) -> Option<f64> {
    match metric {
        Metric::BroodTempC => Some(1.0),
        Metric::BroodHumidityPct => Some(0.8),
        Metric::AcousticSurplusDb => Some(0.6),
        Metric::DailyMortalityPct => Some(1.2),
        Metric::VarroaMitesPer100Bees => Some(1.4),
        Metric::HiveWeightKgX10 | Metric::ForagerReturnDeltaPct => None,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricAnomaly {
    pub metric: Metric,
    pub value: f64,
    pub z_score: f64,
}

/// One sample with at least one flagged metric.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SampleAnomaly {
    pub index: usize,
    pub timestamp_ms: u64,
    pub anomalies: Vec<MetricAnomaly>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedAnomaly {
    #[serde(flatten)]
    pub anomaly: SampleAnomaly,
    pub risk_score: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Stats {
    mean: f64,
    std: f64,
}

fn mean_std(values: &[f64]) -> Stats {
    if values.is_empty() {
        return Stats { mean: 0.0, std: 0.0 };
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / n;
    Stats {
        mean,
        std: variance.sqrt(),
    }
}

#[derive(Debug, Clone)]
pub struct AnomalyDetector {
    config: AnomalyConfig,
    tracked: Vec<Metric>,
}

impl Default for AnomalyDetector {
    fn default() -> Self {
        Self::new(AnomalyConfig::default())
    }
}

impl AnomalyDetector {
    pub fn new(config: AnomalyConfig) -> Self {
        Self {
            config,
            tracked: DEFAULT_TRACKED.to_vec(),
        }
    }

    /// Replace the tracked metric set.
    #[must_use]
    pub fn with_tracked(mut self, metrics: impl IntoIterator<Item = Metric>) -> Self {
        self.tracked = metrics.into_iter().collect();
        self
    }

    /// Flag outliers.  Samples with nothing flagged are omitted.
    pub fn detect(&self, series: &[NormalizedTelemetry]) -> Result<Vec<SampleAnomaly>> {
        if series.len() < MIN_SERIES_LEN {
            return Err(ValidationError::SeriesTooShort { len: series.len() }.into());
        }

        let stats: Vec<(Metric, Stats)> = self
            .tracked
            .iter()
            .map(|&m| {
                let values: Vec<f64> = series.iter().filter_map(|s| s.get(m)).collect();
                (m, mean_std(&values))
            })
            .collect();

        let mut out = Vec::new();
        for (index, sample) in series.iter().enumerate() {
            let anomalies: Vec<MetricAnomaly> = stats
                .iter()
                .filter(|(_, st)| st.std > 0.0)
                .filter_map(|&(metric, st)| {
                    let value = sample.get(metric)?;
                    let z_score = ((value - st.mean) / st.std).abs();
                    (z_score >= self.config.z_threshold - Z_TOLERANCE).then_some(MetricAnomaly {
                        metric,
                        value,
                        z_score,
                    })
                })
                .collect();
            if !anomalies.is_empty() {
                out.push(SampleAnomaly {
                    index,
                    timestamp_ms: sample.captured_at_ms,
                    anomalies,
                });
            }
        }
        Ok(out)
    }

    /// Score = Σ weight × z over flagged metrics, sorted descending.
    /// Equal scores keep their input order (ascending sample index when fed
    /// straight from [`detect`](Self::detect)).
    pub fn rank_by_risk(&self, anomalies: Vec<SampleAnomaly>) -> Vec<RankedAnomaly> {
        let mut ranked: Vec<RankedAnomaly> = anomalies
            .into_iter()
            .map(|a| {
                let risk_score = a
                    .anomalies
                    .iter()
                    .map(|m| risk_weight(m.metric).unwrap_or(self.config.default_weight) * m.z_score)
                    .sum();
                RankedAnomaly {
                    anomaly: a,
                    risk_score,
                }
            })
            .collect();
        // Stable sort: ties retain input order.
        ranked.sort_by(|a, b| b.risk_score.total_cmp(&a.risk_score));
        ranked
    }
}

/// Detect with the default configuration.
pub fn detect_anomalies(series: &[NormalizedTelemetry]) -> Result<Vec<SampleAnomaly>> {
    AnomalyDetector::default().detect(series)
}

/// Rank with the default configuration.
pub fn rank_anomalies_by_risk(anomalies: Vec<SampleAnomaly>) -> Vec<RankedAnomaly> {
    AnomalyDetector::default().rank_by_risk(anomalies)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(metric: Metric, values: &[f64]) -> Vec<NormalizedTelemetry> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| NormalizedTelemetry::from_readings([(metric, v)], i as u64 * 1000))
            .collect()
    }

    #[test]
    fn too_short_series_is_rejected() {
        assert!(detect_anomalies(&series(Metric::BroodTempC, &[1.0, 2.0])).is_err());
    }

    #[test]
    fn spike_is_flagged() {
        // Nine readings at 30.0 and one at 40.0: mean 31, std 3, z = 3.
        let mut v = vec![30.0; 10];
        v[6] = 40.0;
        let out = detect_anomalies(&series(Metric::BroodTempC, &v)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 6);
        assert_eq!(out[0].timestamp_ms, 6000);
        assert_eq!(out[0].anomalies[0].metric, Metric::BroodTempC);
        assert!(out[0].anomalies[0].z_score >= 3.0);
    }

    #[test]
    fn lone_spike_at_exact_threshold_is_flagged() {
        // z is exactly 3 in real arithmetic but rounds to 2.999... in f64.
        let mut v = vec![35.3; 10];
        v[3] = 45.3;
        let out = detect_anomalies(&series(Metric::BroodTempC, &v)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].index, 3);
        assert!((out[0].anomalies[0].z_score - 3.0).abs() < 1e-9);
    }

    #[test]
    fn just_under_threshold_is_quiet() {
        let det = AnomalyDetector::new(AnomalyConfig {
            z_threshold: 3.0 + 1e-6,
            ..AnomalyConfig::default()
        });
        let mut v = vec![30.0; 10];
        v[6] = 40.0;
        assert!(det.detect(&series(Metric::BroodTempC, &v)).unwrap().is_empty());
    }

    #[test]
    fn constant_series_has_no_anomalies() {
        let out = detect_anomalies(&series(Metric::BroodHumidityPct, &[55.0; 12])).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn absent_values_are_excluded() {
        let mut s = series(Metric::DailyMortalityPct, &[1.0; 10]);
        s.push(NormalizedTelemetry::from_readings(Vec::new(), 99));
        assert!(detect_anomalies(&s).unwrap().is_empty());
    }

    #[test]
    fn untracked_metrics_use_default_weight() {
        let mut v = vec![400.0; 10];
        v[2] = 900.0;
        let det = AnomalyDetector::default().with_tracked([Metric::HiveWeightKgX10]);
        let found = det.detect(&series(Metric::HiveWeightKgX10, &v)).unwrap();
        let ranked = det.rank_by_risk(found);
        let z = ranked[0].anomaly.anomalies[0].z_score;
        assert!((ranked[0].risk_score - 0.5 * z).abs() < 1e-9);
    }

    #[test]
    fn ranking_is_descending_with_stable_ties() {
        let mk = |index, metric, z| SampleAnomaly {
            index,
            timestamp_ms: 0,
            anomalies: vec![MetricAnomaly {
                metric,
                value: 0.0,
                z_score: z,
            }],
        };
        let ranked = rank_anomalies_by_risk(vec![
            mk(0, Metric::BroodTempC, 3.0),
            mk(1, Metric::VarroaMitesPer100Bees, 3.0),
            mk(2, Metric::BroodTempC, 3.0),
        ]);
        let order: Vec<_> = ranked.iter().map(|r| r.anomaly.index).collect();
        assert_eq!(order, [1, 0, 2]);
        assert!((ranked[0].risk_score - 4.2).abs() < 1e-9);
    }
}
