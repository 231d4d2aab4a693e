//! Clinical threshold table.
//!
//! Reference values from Little et al. 2004 and Daoudi 2022: healthy voices
//! show jitter 0.2-0.7%, shimmer 2-4%, HNR 20-25 dB; Parkinsonian voices
//! jitter >1.5-3%, shimmer >6-12%, HNR <12-18 dB.

use serde::{Deserialize, Serialize};

/// Cut points for a feature where lower values are worse.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeverityBands {
    pub severe: f64,
    pub moderate: f64,
    pub mild: f64,
}

impl SeverityBands {
    /// 3 below `severe`, 2 below `moderate`, 1 below `mild`, else 0.
    pub fn grade_below(&self, value: f64) -> u8 {
        if value < self.severe {
            3
        } else if value < self.moderate {
            2
        } else if value < self.mild {
            1
        } else {
            0
        }
    }
}

/// Versioned, immutable threshold table injected into the symptom model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClinicalThresholds {
    pub version: String,

    // Perturbation and noise: (threshold, marked pathology)
    pub jitter_percent: f64,
    pub jitter_marked_percent: f64,
    pub shimmer_percent: f64,
    pub shimmer_marked_percent: f64,
    pub hnr_db: f64,
    pub hnr_marked_db: f64,

    // Prosody
    pub f0_sd_hz: f64,
    pub f0_cv_percent: f64,
    pub amplitude_db_variation: f64,

    // Articulation
    pub rate_syl_sec: f64,
    pub rate_marked_syl_sec: f64,
    pub pause_ratio: f64,
    pub pause_marked_ratio: f64,

    // Symptom grading
    pub rms_bands: SeverityBands,
    pub f0_sd_bands: SeverityBands,
    pub db_variation_bands: SeverityBands,
    pub db_range_bands: SeverityBands,

    // Values past these are computation artifacts and never count
    pub max_plausible_jitter_percent: f64,
    pub max_plausible_shimmer_percent: f64,
    pub min_plausible_hnr_db: f64,
}

impl Default for ClinicalThresholds {
    fn default() -> Self {
        Self {
            version: "little2004-daoudi2022.1".to_string(),
            jitter_percent: 1.5,
            jitter_marked_percent: 2.5,
            shimmer_percent: 6.0,
            shimmer_marked_percent: 9.0,
            hnr_db: 18.0,
            hnr_marked_db: 15.0,
            f0_sd_hz: 10.0,
            f0_cv_percent: 8.0,
            amplitude_db_variation: 6.0,
            rate_syl_sec: 4.5,
            rate_marked_syl_sec: 3.0,
            pause_ratio: 0.30,
            pause_marked_ratio: 0.40,
            rms_bands: SeverityBands {
                severe: 0.02,
                moderate: 0.04,
                mild: 0.05,
            },
            f0_sd_bands: SeverityBands {
                severe: 20.0,
                moderate: 35.0,
                mild: 50.0,
            },
            db_variation_bands: SeverityBands {
                severe: 2.0,
                moderate: 4.0,
                mild: 6.0,
            },
            db_range_bands: SeverityBands {
                severe: 10.0,
                moderate: 15.0,
                mild: 20.0,
            },
            max_plausible_jitter_percent: 50.0,
            max_plausible_shimmer_percent: 50.0,
            min_plausible_hnr_db: 5.0,
        }
    }
}

impl ClinicalThresholds {
    /// Number of perturbation measures past their marked-pathology level.
    pub fn marked_deviations(&self, jitter: f64, shimmer: f64, hnr: f64) -> usize {
        [
            jitter > self.jitter_marked_percent,
            shimmer > self.shimmer_marked_percent,
            hnr < self.hnr_marked_db,
        ]
        .iter()
        .filter(|b| **b)
        .count()
    }
}

/// The seven canonical acoustic thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExceededThreshold {
    Jitter,
    Shimmer,
    Hnr,
    F0Variability,
    Rate,
    PauseRatio,
    AmplitudeVariation,
}

impl ExceededThreshold {
    pub const ALL: [ExceededThreshold; 7] = [
        ExceededThreshold::Jitter,
        ExceededThreshold::Shimmer,
        ExceededThreshold::Hnr,
        ExceededThreshold::F0Variability,
        ExceededThreshold::Rate,
        ExceededThreshold::PauseRatio,
        ExceededThreshold::AmplitudeVariation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Jitter => "jitter",
            Self::Shimmer => "shimmer",
            Self::Hnr => "hnr",
            Self::F0Variability => "f0_variability",
            Self::Rate => "rate",
            Self::PauseRatio => "pause_ratio",
            Self::AmplitudeVariation => "amplitude_variation",
        }
    }
}

impl std::fmt::Display for ExceededThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_below() {
        let bands = ClinicalThresholds::default().rms_bands;
        assert_eq!(bands.grade_below(0.01), 3);
        assert_eq!(bands.grade_below(0.03), 2);
        assert_eq!(bands.grade_below(0.045), 1);
        assert_eq!(bands.grade_below(0.05), 0);
    }

    #[test]
    fn test_marked_deviations() {
        let t = ClinicalThresholds::default();
        assert_eq!(t.marked_deviations(0.5, 3.0, 22.0), 0);
        assert_eq!(t.marked_deviations(3.0, 10.0, 22.0), 2);
        assert_eq!(t.marked_deviations(3.0, 10.0, 12.0), 3);
    }

    #[test]
    fn test_names_match_serde() {
        for threshold in ExceededThreshold::ALL {
            let json = serde_json::to_string(&threshold).unwrap();
            assert_eq!(json, format!("\"{}\"", threshold.as_str()));
        }
    }

    #[test]
    fn test_partial_table_fills_defaults() {
        let t: ClinicalThresholds = serde_json::from_str(r#"{"jitter_percent": 1.2}"#).unwrap();
        assert_eq!(t.jitter_percent, 1.2);
        assert_eq!(t.shimmer_percent, 6.0);
    }
}
