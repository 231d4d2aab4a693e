//! Dysphonia Severity Index.
//!
//! `DSI = 0.13·MPT + 0.0053·F0-High − 0.26·I-Low − 1.18·Jitter% + 12.4`
//! (Wuyts et al. 2000). +5 is a normal voice, −5 severe dysphonia.

use serde::{Deserialize, Serialize};

use crate::features::{Feature, FeatureVector};

/// Linear DSI weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DsiCoefficients {
    pub version: String,
    pub mpt: f64,
    pub f0_high: f64,
    pub i_low: f64,
    pub jitter: f64,
    pub intercept: f64,
}

impl Default for DsiCoefficients {
    fn default() -> Self {
        Self {
            version: "wuyts2000".to_string(),
            mpt: 0.13,
            f0_high: 0.0053,
            i_low: -0.26,
            jitter: -1.18,
            intercept: 12.4,
        }
    }
}

impl DsiCoefficients {
    pub fn evaluate(&self, mpt_sec: f64, f0_high_hz: f64, i_low_db: f64, jitter_percent: f64) -> f64 {
        self.mpt * mpt_sec + self.f0_high * f0_high_hz + self.i_low * i_low_db + self.jitter * jitter_percent
            + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DsiRange {
    /// DSI >= 2
    Normal,
    /// 0 <= DSI < 2
    MildDysphonia,
    /// -2 <= DSI < 0
    ModerateDysphonia,
    /// DSI < -2
    SevereDysphonia,
}

impl DsiRange {
    pub fn of(score: f64) -> Self {
        if score >= 2.0 {
            Self::Normal
        } else if score >= 0.0 {
            Self::MildDysphonia
        } else if score >= -2.0 {
            Self::ModerateDysphonia
        } else {
            Self::SevereDysphonia
        }
    }
}

/// Clinical reading of a single DSI input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterStatus {
    Low,
    Reduced,
    Normal,
    Elevated,
    High,
}

/// The four sub-parameters as reported.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DsiBreakdown {
    pub mpt_sec: f64,
    pub f0_high_hz: f64,
    pub i_low_db: f64,
    pub jitter_percent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DsiInterpretation {
    pub mpt_status: ParameterStatus,
    pub f0_high_status: ParameterStatus,
    pub i_low_status: ParameterStatus,
    pub jitter_status: ParameterStatus,
}

impl DsiInterpretation {
    pub fn of(breakdown: &DsiBreakdown) -> Self {
        let mpt = breakdown.mpt_sec;
        let f0_high = breakdown.f0_high_hz;
        let jitter = breakdown.jitter_percent;
        Self {
            mpt_status: if mpt < 10.0 {
                ParameterStatus::Low
            } else if mpt >= 15.0 {
                ParameterStatus::Normal
            } else {
                ParameterStatus::Reduced
            },
            f0_high_status: if f0_high < 300.0 {
                ParameterStatus::Low
            } else if f0_high >= 400.0 {
                ParameterStatus::Normal
            } else {
                ParameterStatus::Reduced
            },
            i_low_status: if breakdown.i_low_db < 45.0 {
                ParameterStatus::Normal
            } else {
                ParameterStatus::Elevated
            },
            jitter_status: if jitter > 1.5 {
                ParameterStatus::High
            } else if jitter < 1.0 {
                ParameterStatus::Normal
            } else {
                ParameterStatus::Elevated
            },
        }
    }
}

/// DSI of one analysis. `score` is `None` when a sub-parameter is missing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DsiResult {
    pub score: Option<f64>,
    pub range: Option<DsiRange>,
    pub breakdown: DsiBreakdown,
    pub interpretation: Option<DsiInterpretation>,
    /// Set when the score could not be computed
    pub insufficient_data: bool,
}

impl DsiResult {
    pub fn is_available(&self) -> bool {
        self.score.is_some()
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Compute the DSI from a finished feature vector.
///
/// MPT, F0-High and I-Low must all be non-zero; otherwise the sub-parameters
/// are still reported but the score is absent.
pub fn compute(features: &FeatureVector, coefficients: &DsiCoefficients) -> DsiResult {
    let mpt = features.get(Feature::MptSec);
    let f0_high = features.get(Feature::F0HighHz);
    let i_low = features.get(Feature::ILowDb);
    let jitter = features.get(Feature::JitterPercent);

    let breakdown = DsiBreakdown {
        mpt_sec: round_to(mpt, 2),
        f0_high_hz: round_to(f0_high, 1),
        i_low_db: round_to(i_low, 1),
        jitter_percent: round_to(jitter, 2),
    };

    if mpt == 0.0 || f0_high == 0.0 || i_low == 0.0 {
        return DsiResult {
            score: None,
            range: None,
            breakdown,
            interpretation: None,
            insufficient_data: true,
        };
    }

    let score = coefficients.evaluate(mpt, f0_high, i_low, jitter);
    DsiResult {
        score: Some(round_to(score, 2)),
        range: Some(DsiRange::of(score)),
        breakdown,
        interpretation: Some(DsiInterpretation::of(&breakdown)),
        insufficient_data: false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(mpt: f64, f0_high: f64, i_low: f64, jitter: f64) -> FeatureVector {
        let mut f = FeatureVector::neutral();
        f.set(Feature::MptSec, mpt);
        f.set(Feature::F0HighHz, f0_high);
        f.set(Feature::ILowDb, i_low);
        f.set(Feature::JitterPercent, jitter);
        f
    }

    #[test]
    fn test_reference_computation() {
        let result = compute(&features(20.0, 450.0, 35.0, 0.5), &DsiCoefficients::default());
        let score = result.score.unwrap();
        // 2.6 + 2.385 - 9.1 - 0.59 + 12.4 = 7.695
        assert!((score - 7.70).abs() <= 0.01 + 1e-9, "DSI {}", score);
        assert_eq!(result.range, Some(DsiRange::Normal));

        let interpretation = result.interpretation.unwrap();
        assert_eq!(interpretation.mpt_status, ParameterStatus::Normal);
        assert_eq!(interpretation.f0_high_status, ParameterStatus::Normal);
        assert_eq!(interpretation.i_low_status, ParameterStatus::Normal);
        assert_eq!(interpretation.jitter_status, ParameterStatus::Normal);
    }

    #[test]
    fn test_missing_parameter_is_insufficient() {
        let result = compute(&features(12.0, 0.0, 40.0, 0.8), &DsiCoefficients::default());
        assert!(result.insufficient_data);
        assert_eq!(result.score, None);
        assert_eq!(result.breakdown.mpt_sec, 12.0);
        assert_eq!(result.breakdown.jitter_percent, 0.8);
    }

    #[test]
    fn test_range_bands() {
        assert_eq!(DsiRange::of(2.0), DsiRange::Normal);
        assert_eq!(DsiRange::of(1.99), DsiRange::MildDysphonia);
        assert_eq!(DsiRange::of(0.0), DsiRange::MildDysphonia);
        assert_eq!(DsiRange::of(-0.5), DsiRange::ModerateDysphonia);
        assert_eq!(DsiRange::of(-2.0), DsiRange::ModerateDysphonia);
        assert_eq!(DsiRange::of(-2.01), DsiRange::SevereDysphonia);
    }

    #[test]
    fn test_parameter_statuses() {
        let breakdown = DsiBreakdown {
            mpt_sec: 12.0,
            f0_high_hz: 250.0,
            i_low_db: 50.0,
            jitter_percent: 1.2,
        };
        let interpretation = DsiInterpretation::of(&breakdown);
        assert_eq!(interpretation.mpt_status, ParameterStatus::Reduced);
        assert_eq!(interpretation.f0_high_status, ParameterStatus::Low);
        assert_eq!(interpretation.i_low_status, ParameterStatus::Elevated);
        assert_eq!(interpretation.jitter_status, ParameterStatus::Elevated);
    }

    #[test]
    fn test_dysphonic_voice_scores_low() {
        let result = compute(&features(4.0, 220.0, 60.0, 3.0), &DsiCoefficients::default());
        // 0.52 + 1.166 - 15.6 - 3.54 + 12.4 = -5.054
        assert_eq!(result.range, Some(DsiRange::SevereDysphonia));
    }
}
