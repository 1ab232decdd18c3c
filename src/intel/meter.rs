//! Data-volume and uncertainty metering for a run.

use serde::{Deserialize, Serialize};

const BYTES_PER_VIRTUAL_OBJECT: u64 = 256;
const BYTES_PER_DECISION: u64 = 192;
const BYTES_PER_TELEMETRY_SAMPLE: u64 = 128;

/// Counters accumulated over a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunStats {
    pub virtual_objects: u64,
    pub decisions: u64,
    pub telemetry_samples: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VolumeEstimate {
    pub stats: RunStats,
    pub approx_bytes: u64,
    pub approx_kib: f64,
    pub approx_mib: f64,
}

pub fn estimate_volume(stats: RunStats) -> VolumeEstimate {
    let approx_bytes = stats
        .virtual_objects
        .saturating_mul(BYTES_PER_VIRTUAL_OBJECT)
        .saturating_add(stats.decisions.saturating_mul(BYTES_PER_DECISION))
        .saturating_add(stats.telemetry_samples.saturating_mul(BYTES_PER_TELEMETRY_SAMPLE));
    let approx_kib = approx_bytes as f64 / 1024.0;
    VolumeEstimate {
        stats,
        approx_bytes,
        approx_kib,
        approx_mib: approx_kib / 1024.0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UncertaintyScore {
    pub stability: f64,
    pub drift: f64,
    pub uncertainty: f64,
}

/// Higher drift and lower stability mean higher uncertainty, in [0, 1].
///
/// Absent stability counts as 0.5, absent drift as 0.  Inputs are clamped
/// to [0, 1]; NaN clamps to 0.
pub fn score_uncertainty(stability: Option<f64>, drift: Option<f64>) -> UncertaintyScore {
    let s = clamp01(stability.unwrap_or(0.5));
    let d = clamp01(drift.unwrap_or(0.0));
    UncertaintyScore {
        stability: s,
        drift: d,
        uncertainty: clamp01(0.6 * (1.0 - s) + 0.4 * d),
    }
}

fn clamp01(x: f64) -> f64 {
    if x.is_nan() { 0.0 } else { x.clamp(0.0, 1.0) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn volume_sums_per_kind_sizes() {
        let v = estimate_volume(RunStats {
            virtual_objects: 4,
            decisions: 8,
            telemetry_samples: 16,
        });
        assert_eq!(v.approx_bytes, 4 * 256 + 8 * 192 + 16 * 128);
        assert!((v.approx_kib - 4.5).abs() < 1e-12);
        assert!((v.approx_mib - 4.5 / 1024.0).abs() < 1e-12);
    }

    #[test]
    fn empty_run_is_zero() {
        assert_eq!(estimate_volume(RunStats::default()).approx_bytes, 0);
    }

    #[test]
    fn uncertainty_defaults_and_clamps() {
        assert!((score_uncertainty(None, None).uncertainty - 0.3).abs() < 1e-12);
        assert_eq!(score_uncertainty(Some(1.0), Some(0.0)).uncertainty, 0.0);
        assert!((score_uncertainty(Some(0.0), Some(1.0)).uncertainty - 1.0).abs() < 1e-12);
        let clamped = score_uncertainty(Some(-3.0), Some(7.0));
        assert_eq!(clamped.stability, 0.0);
        assert_eq!(clamped.drift, 1.0);
        assert_eq!(score_uncertainty(Some(f64::NAN), None).stability, 0.0);
    }
}
