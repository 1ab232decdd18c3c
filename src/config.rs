//! Gate configuration parameters
//!
//! Every threshold the core consults lives here, in explicit structs with
//! one field per recognised setting.  Configuration is validated eagerly:
//! [`GateConfig::validate`] runs when the service is built and on every
//! hot reload, never lazily at classification time.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Band classification thresholds.
///
/// Each bound is optional; an unset bound disables the rule that uses it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandThresholds {
    // --- Brood temperature (°C) ---
    pub red_min_temp_c: Option<f64>,
    pub red_max_temp_c: Option<f64>,
    pub yellow_min_temp_c: Option<f64>,
    pub yellow_max_temp_c: Option<f64>,

    // --- Brood humidity (%) ---
    pub red_min_humidity_pct: Option<f64>,
    pub red_max_humidity_pct: Option<f64>,
    pub yellow_min_humidity_pct: Option<f64>,
    pub yellow_max_humidity_pct: Option<f64>,

    // --- Ceilings ---
    pub red_max_acoustic_surplus_db: Option<f64>,
    pub yellow_max_acoustic_surplus_db: Option<f64>,
    pub red_max_daily_mortality_pct: Option<f64>,
    pub yellow_max_daily_mortality_pct: Option<f64>,
}

impl Default for BandThresholds {
    fn default() -> Self {
        Self {
            red_min_temp_c: Some(30.0),
            red_max_temp_c: Some(38.0),
            yellow_min_temp_c: Some(32.0),
            yellow_max_temp_c: Some(36.0),

            red_min_humidity_pct: Some(40.0),
            red_max_humidity_pct: Some(80.0),
            yellow_min_humidity_pct: Some(50.0),
            yellow_max_humidity_pct: Some(70.0),

            red_max_acoustic_surplus_db: Some(12.0),
            yellow_max_acoustic_surplus_db: Some(6.0),
            red_max_daily_mortality_pct: Some(5.0),
            yellow_max_daily_mortality_pct: Some(2.0),
        }
    }
}

/// Parasite-load thresholds (mites per 100 bees).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BioloadThresholds {
    pub elevated_mites_per_100_bees: f64,
    pub critical_mites_per_100_bees: f64,
}

impl Default for BioloadThresholds {
    fn default() -> Self {
        Self {
            elevated_mites_per_100_bees: 2.0,
            critical_mites_per_100_bees: 3.0,
        }
    }
}

/// Low/high cut points for the archivist's three-level coarse banding.
///
/// A value below `low_red` or above `high_red` bands red; below
/// `low_yellow` or above `high_yellow` bands yellow; anything else green.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CutPoints {
    pub low_red: f64,
    pub low_yellow: f64,
    pub high_yellow: f64,
    pub high_red: f64,
}

impl CutPoints {
    fn is_ordered(&self) -> bool {
        self.low_red <= self.low_yellow
            && self.low_yellow <= self.high_yellow
            && self.high_yellow <= self.high_red
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArchiveBands {
    pub temperature: CutPoints,
    pub humidity: CutPoints,
}

impl Default for ArchiveBands {
    fn default() -> Self {
        Self {
            temperature: CutPoints {
                low_red: 30.0,
                low_yellow: 32.0,
                high_yellow: 36.0,
                high_red: 38.0,
            },
            humidity: CutPoints {
                low_red: 40.0,
                low_yellow: 50.0,
                high_yellow: 70.0,
                high_red: 80.0,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnomalyConfig {
    /// Minimum |z| for a value to be flagged.
    pub z_threshold: f64,
    /// Risk weight for metrics without an entry in the weight table.
    pub default_weight: f64,
}

impl Default for AnomalyConfig {
    fn default() -> Self {
        Self {
            z_threshold: 3.0,
            default_weight: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Fraction of yellow samples above which the window is `moderate`.
    pub yellow_fraction_limit: f64,
    /// Number of health samples the service keeps for risk assessment.
    pub history_len: usize,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            yellow_fraction_limit: 0.2,
            history_len: 72,
        }
    }
}

/// Complete gate configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GateConfig {
    pub band: BandThresholds,
    pub bioload: BioloadThresholds,
    pub archive: ArchiveBands,
    pub anomaly: AnomalyConfig,
    pub risk: RiskConfig,
}

impl GateConfig {
    /// Reject configurations that would make classification meaningless.
    ///
    /// Invalid values are rejected, never clamped.
    pub fn validate(&self) -> Result<()> {
        let b = &self.band;
        let all_bounds = [
            b.red_min_temp_c,
            b.red_max_temp_c,
            b.yellow_min_temp_c,
            b.yellow_max_temp_c,
            b.red_min_humidity_pct,
            b.red_max_humidity_pct,
            b.yellow_min_humidity_pct,
            b.yellow_max_humidity_pct,
            b.red_max_acoustic_surplus_db,
            b.yellow_max_acoustic_surplus_db,
            b.red_max_daily_mortality_pct,
            b.yellow_max_daily_mortality_pct,
        ];
        if all_bounds.iter().flatten().any(|v| !v.is_finite()) {
            return Err(Error::Config("band thresholds must be finite"));
        }

        check_range(b.red_min_temp_c, b.red_max_temp_c, "red temperature range inverted")?;
        check_range(
            b.yellow_min_temp_c,
            b.yellow_max_temp_c,
            "yellow temperature range inverted",
        )?;
        check_range(
            b.red_min_humidity_pct,
            b.red_max_humidity_pct,
            "red humidity range inverted",
        )?;
        check_range(
            b.yellow_min_humidity_pct,
            b.yellow_max_humidity_pct,
            "yellow humidity range inverted",
        )?;

        // The yellow envelope must sit inside the red one.
        check_range(b.red_min_temp_c, b.yellow_min_temp_c, "yellow min temp below red min")?;
        check_range(b.yellow_max_temp_c, b.red_max_temp_c, "yellow max temp above red max")?;
        check_range(
            b.red_min_humidity_pct,
            b.yellow_min_humidity_pct,
            "yellow min humidity below red min",
        )?;
        check_range(
            b.yellow_max_humidity_pct,
            b.red_max_humidity_pct,
            "yellow max humidity above red max",
        )?;
        check_range(
            b.yellow_max_acoustic_surplus_db,
            b.red_max_acoustic_surplus_db,
            "yellow acoustic ceiling above red",
        )?;
        check_range(
            b.yellow_max_daily_mortality_pct,
            b.red_max_daily_mortality_pct,
            "yellow mortality ceiling above red",
        )?;

        let bio = &self.bioload;
        if !bio.elevated_mites_per_100_bees.is_finite() || !bio.critical_mites_per_100_bees.is_finite()
        {
            return Err(Error::Config("bioload thresholds must be finite"));
        }
        if bio.elevated_mites_per_100_bees > bio.critical_mites_per_100_bees {
            return Err(Error::Config("elevated bioload threshold above critical"));
        }

        if !self.archive.temperature.is_ordered() || !self.archive.humidity.is_ordered() {
            return Err(Error::Config("archive cut points must be ascending"));
        }

        if !(self.anomaly.z_threshold.is_finite() && self.anomaly.z_threshold > 0.0) {
            return Err(Error::Config("anomaly z threshold must be positive"));
        }
        if !(self.anomaly.default_weight.is_finite() && self.anomaly.default_weight >= 0.0) {
            return Err(Error::Config("anomaly default weight must be non-negative"));
        }

        let limit = self.risk.yellow_fraction_limit;
        if !(limit > 0.0 && limit < 1.0) {
            return Err(Error::Config("yellow fraction limit must be in (0, 1)"));
        }
        if self.risk.history_len == 0 {
            return Err(Error::Config("risk history length must be positive"));
        }

        Ok(())
    }
}

fn check_range(lo: Option<f64>, hi: Option<f64>, msg: &'static str) -> Result<()> {
    match (lo, hi) {
        (Some(lo), Some(hi)) if lo > hi => Err(Error::Config(msg)),
        _ => Ok(()),
    }
}
