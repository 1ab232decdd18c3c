//! Rolling-window risk assessment and cooldown advice.

use core::fmt;

use serde::Serialize;

use crate::config::RiskConfig;
use crate::error::{Result, ValidationError};
use crate::health::{Band, Bioload, HealthState};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Moderate,
    Severe,
}

impl RiskLevel {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Moderate => "moderate",
            Self::Severe => "severe",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowStats {
    pub total_samples: usize,
    pub green: usize,
    pub yellow: usize,
    pub red: usize,
    pub elevated_bioload: usize,
    pub critical_bioload: usize,
    pub pct_yellow: f64,
    pub pct_red: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskAssessment {
    pub risk_level: RiskLevel,
    pub stats: WindowStats,
    pub reasons: Vec<&'static str>,
}

/// Aggregate a window of health samples into a risk level.
///
/// `severe` if any sample is red or critical; `moderate` if the yellow
/// fraction exceeds the configured limit or any sample is elevated;
/// otherwise `low`.
pub fn assess_window(window: &[HealthState], config: &RiskConfig) -> Result<RiskAssessment> {
    if window.is_empty() {
        return Err(ValidationError::EmptyWindow.into());
    }

    let mut stats = WindowStats {
        total_samples: window.len(),
        ..WindowStats::default()
    };
    for s in window {
        match s.band {
            Band::Green => stats.green += 1,
            Band::Yellow => stats.yellow += 1,
            Band::Red => stats.red += 1,
        }
        match s.bioload {
            Bioload::Elevated => stats.elevated_bioload += 1,
            Bioload::Critical => stats.critical_bioload += 1,
            Bioload::Nominal | Bioload::Unknown => {}
        }
    }
    let total = stats.total_samples as f64;
    stats.pct_yellow = stats.yellow as f64 / total;
    stats.pct_red = stats.red as f64 / total;

    let (risk_level, reason) = if stats.red > 0 || stats.critical_bioload > 0 {
        (RiskLevel::Severe, "Red band or critical bioload periods detected.")
    } else if stats.pct_yellow > config.yellow_fraction_limit || stats.elevated_bioload > 0 {
        (RiskLevel::Moderate, "Extended yellow band or elevated bioload.")
    } else {
        (RiskLevel::Low, "Bands mostly green and bioload nominal.")
    };

    Ok(RiskAssessment {
        risk_level,
        stats,
        reasons: vec![reason],
    })
}

/// Cooldown tier, chosen from the most recent sample only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CooldownTier {
    ObservationOnly,
    Tighten,
    Maintain,
}

impl CooldownTier {
    pub const fn actions(self) -> &'static [&'static str] {
        match self {
            Self::ObservationOnly => &[
                "Force observation-only mode for at least 24 hours.",
                "Suspend all non-essential heating, cooling, and lighting.",
                "Notify human operator for veterinary inspection.",
            ],
            Self::Tighten => &[
                "Reduce maximum heater and fan duty cycles by 25%.",
                "Lower allowed LED lux ceiling near brood frames.",
                "Increase telemetry sampling to refine band estimation.",
            ],
            Self::Maintain => &[
                "Maintain current conservative envelopes.",
                "Keep actuation ceilings as per policy bundle.",
            ],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CooldownAdvice {
    pub band: Band,
    pub bioload: Bioload,
    pub tier: CooldownTier,
    pub actions: &'static [&'static str],
}

/// Recommend actions from the last entry of `history` (most recent last).
pub fn suggest_cooldown(history: &[HealthState]) -> Result<CooldownAdvice> {
    let last = history.last().ok_or(ValidationError::EmptyWindow)?;

    let tier = if last.is_lockout() {
        CooldownTier::ObservationOnly
    } else if last.band == Band::Yellow || last.bioload == Bioload::Elevated {
        CooldownTier::Tighten
    } else {
        CooldownTier::Maintain
    };

    Ok(CooldownAdvice {
        band: last.band,
        bioload: last.bioload,
        tier,
        actions: tier.actions(),
    })
}
