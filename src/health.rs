//! Health-state classification.
//!
//! Two independent judgments over one [`NormalizedTelemetry`]:
//!
//! - **Band**: ordered red conditions, then yellow conditions, else green.
//!   Red evaluation fully precedes yellow.
//! - **Bioload**: parasite load only.
//!
//! ## Missing data
//!
//! An absent metric never satisfies a condition.  A hive with no
//! temperature probe classifies green on temperature, not red.  This is a
//! fail-open posture on missing data and it is deliberate: escalation must
//! come from an observed value.

use core::fmt;
use core::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::{BandThresholds, BioloadThresholds};
use crate::telemetry::{Metric, NormalizedTelemetry};

/// Coarse habitat health, red being most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Green,
    Yellow,
    Red,
}

impl Band {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Red => "red",
        }
    }
}

/// Parasite-load severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Bioload {
    Nominal,
    Elevated,
    Critical,
    Unknown,
}

impl Bioload {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Nominal => "nominal",
            Self::Elevated => "elevated",
            Self::Critical => "critical",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for Bioload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Case-insensitive parse; used for externally supplied history and queries.
impl FromStr for Band {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "green" => Ok(Self::Green),
            "yellow" => Ok(Self::Yellow),
            "red" => Ok(Self::Red),
            _ => Err(()),
        }
    }
}

impl FromStr for Bioload {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "nominal" => Ok(Self::Nominal),
            "elevated" => Ok(Self::Elevated),
            "critical" => Ok(Self::Critical),
            "unknown" => Ok(Self::Unknown),
            _ => Err(()),
        }
    }
}

/// Point-in-time health classification.  Recomputed every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HealthState {
    pub band: Band,
    pub bioload: Bioload,
}

impl HealthState {
    pub const fn new(band: Band, bioload: Bioload) -> Self {
        Self { band, bioload }
    }

    /// True when every actuation must be denied.
    pub fn is_lockout(&self) -> bool {
        self.band == Band::Red || self.bioload == Bioload::Critical
    }
}

/// Classify both band and bioload.
pub fn classify(
    telemetry: &NormalizedTelemetry,
    band: &BandThresholds,
    bioload: &BioloadThresholds,
) -> HealthState {
    HealthState {
        band: classify_band(telemetry, band),
        bioload: classify_bioload(telemetry, bioload),
    }
}

/// Band judgment.  Red conditions are OR-ed and checked before yellow.
pub fn classify_band(t: &NormalizedTelemetry, bt: &BandThresholds) -> Band {
    let temp = t.get(Metric::BroodTempC);
    let humidity = t.get(Metric::BroodHumidityPct);
    let acoustic = t.get(Metric::AcousticSurplusDb);
    let mortality = t.get(Metric::DailyMortalityPct);

    let red = out_of_range(temp, bt.red_min_temp_c, bt.red_max_temp_c)
        || out_of_range(humidity, bt.red_min_humidity_pct, bt.red_max_humidity_pct)
        || exceeds(acoustic, bt.red_max_acoustic_surplus_db)
        || exceeds(mortality, bt.red_max_daily_mortality_pct);
    if red {
        return Band::Red;
    }

    let yellow = out_of_range(temp, bt.yellow_min_temp_c, bt.yellow_max_temp_c)
        || out_of_range(humidity, bt.yellow_min_humidity_pct, bt.yellow_max_humidity_pct)
        || exceeds(acoustic, bt.yellow_max_acoustic_surplus_db)
        || exceeds(mortality, bt.yellow_max_daily_mortality_pct);
    if yellow {
        return Band::Yellow;
    }

    Band::Green
}

/// Bioload judgment from the varroa count alone.  Critical wins over
/// elevated.
pub fn classify_bioload(t: &NormalizedTelemetry, bt: &BioloadThresholds) -> Bioload {
    match t.get(Metric::VarroaMitesPer100Bees) {
        None => Bioload::Unknown,
        Some(mites) if mites >= bt.critical_mites_per_100_bees => Bioload::Critical,
        Some(mites) if mites >= bt.elevated_mites_per_100_bees => Bioload::Elevated,
        Some(_) => Bioload::Nominal,
    }
}

fn out_of_range(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> bool {
    let Some(v) = value else { return false };
    min.is_some_and(|min| v < min) || max.is_some_and(|max| v > max)
}

fn exceeds(value: Option<f64>, limit: Option<f64>) -> bool {
    match (value, limit) {
        (Some(v), Some(limit)) => v > limit,
        _ => false,
    }
}
