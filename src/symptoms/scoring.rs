//! Symptom severities and threshold flags derived from a feature vector.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use super::thresholds::{ClinicalThresholds, ExceededThreshold};
use crate::features::{Feature, FeatureVector};

/// Perceptual symptoms of hypokinetic dysarthria.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Symptom {
    /// Reduced loudness
    Hypophonia,
    /// Reduced pitch variation
    Monopitch,
    /// Reduced loudness variation
    Monoloudness,
    Hoarseness,
    ImpreciseArticulation,
}

impl Symptom {
    pub const ALL: [Symptom; 5] = [
        Symptom::Hypophonia,
        Symptom::Monopitch,
        Symptom::Monoloudness,
        Symptom::Hoarseness,
        Symptom::ImpreciseArticulation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hypophonia => "hypophonia",
            Self::Monopitch => "monopitch",
            Self::Monoloudness => "monoloudness",
            Self::Hoarseness => "hoarseness",
            Self::ImpreciseArticulation => "imprecise_articulation",
        }
    }
}

/// Ordinal severity, serialized as 0-3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Severity {
    #[default]
    None,
    Mild,
    Moderate,
    Severe,
}

impl Severity {
    /// Saturating conversion from a point total.
    pub fn from_points(points: u8) -> Self {
        match points {
            0 => Self::None,
            1 => Self::Mild,
            2 => Self::Moderate,
            _ => Self::Severe,
        }
    }

    pub fn level(&self) -> u8 {
        *self as u8
    }
}

impl From<Severity> for u8 {
    fn from(severity: Severity) -> Self {
        severity.level()
    }
}

impl TryFrom<u8> for Severity {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if value > 3 {
            return Err(format!("Severity must be 0-3 (got {})", value));
        }
        Ok(Self::from_points(value))
    }
}

/// Severity of every symptom.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SymptomScores(BTreeMap<Symptom, Severity>);

impl Default for SymptomScores {
    fn default() -> Self {
        Self(Symptom::ALL.iter().map(|s| (*s, Severity::None)).collect())
    }
}

impl SymptomScores {
    pub fn get(&self, symptom: Symptom) -> Severity {
        self.0.get(&symptom).copied().unwrap_or_default()
    }

    pub fn set(&mut self, symptom: Symptom, severity: Severity) {
        self.0.insert(symptom, severity);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Symptom, Severity)> + '_ {
        self.0.iter().map(|(s, v)| (*s, *v))
    }

    /// Symptoms at severity 3
    pub fn severe_count(&self) -> usize {
        self.0.values().filter(|s| **s == Severity::Severe).count()
    }

    /// Symptoms at exactly severity 2
    pub fn moderate_count(&self) -> usize {
        self.0.values().filter(|s| **s == Severity::Moderate).count()
    }
}

fn points_above(value: f64, threshold: f64, marked: f64) -> u8 {
    if value > marked {
        2
    } else if value > threshold {
        1
    } else {
        0
    }
}

fn points_below(value: f64, threshold: f64, marked: f64) -> u8 {
    if value < marked {
        2
    } else if value < threshold {
        1
    } else {
        0
    }
}

/// Grade all five symptoms.
pub fn score(features: &FeatureVector, t: &ClinicalThresholds) -> SymptomScores {
    let mut scores = SymptomScores::default();

    let hypophonia = t.rms_bands.grade_below(features.get(Feature::RmsMean));
    scores.set(Symptom::Hypophonia, Severity::from_points(hypophonia));

    let monopitch = t.f0_sd_bands.grade_below(features.get(Feature::F0SdHz));
    scores.set(Symptom::Monopitch, Severity::from_points(monopitch));

    // Either measure alone can establish monoloudness
    let monoloudness = t
        .db_variation_bands
        .grade_below(features.get(Feature::AmplitudeDbVariation))
        .max(t.db_range_bands.grade_below(features.get(Feature::AmplitudeDbRange)));
    scores.set(Symptom::Monoloudness, Severity::from_points(monoloudness));

    let hoarseness = points_above(features.get(Feature::JitterPercent), t.jitter_percent, t.jitter_marked_percent)
        + points_above(features.get(Feature::ShimmerPercent), t.shimmer_percent, t.shimmer_marked_percent)
        + points_below(features.get(Feature::HnrDb), t.hnr_db, t.hnr_marked_db);
    scores.set(Symptom::Hoarseness, Severity::from_points(hoarseness));

    let articulation = points_below(features.get(Feature::RateSylSec), t.rate_syl_sec, t.rate_marked_syl_sec)
        + points_above(features.get(Feature::PauseRatio), t.pause_ratio, t.pause_marked_ratio);
    scores.set(Symptom::ImpreciseArticulation, Severity::from_points(articulation));

    scores
}

/// Which of the seven canonical thresholds the features breach.
pub fn exceeded_thresholds(features: &FeatureVector, t: &ClinicalThresholds) -> BTreeSet<ExceededThreshold> {
    let mut exceeded = BTreeSet::new();

    let jitter = features.get(Feature::JitterPercent);
    if jitter > t.jitter_percent && jitter < t.max_plausible_jitter_percent {
        exceeded.insert(ExceededThreshold::Jitter);
    }

    let shimmer = features.get(Feature::ShimmerPercent);
    if shimmer > t.shimmer_percent && shimmer < t.max_plausible_shimmer_percent {
        exceeded.insert(ExceededThreshold::Shimmer);
    }

    let hnr = features.get(Feature::HnrDb);
    if hnr < t.hnr_db && hnr > t.min_plausible_hnr_db {
        exceeded.insert(ExceededThreshold::Hnr);
    }

    let f0_mean = features.get(Feature::F0MeanHz);
    let f0_sd = features.get(Feature::F0SdHz);
    let flat_pitch = if f0_mean > 0.0 {
        f0_sd / f0_mean * 100.0 < t.f0_cv_percent || f0_sd < t.f0_sd_hz
    } else {
        f0_sd < t.f0_sd_hz
    };
    if flat_pitch {
        exceeded.insert(ExceededThreshold::F0Variability);
    }

    if features.get(Feature::RateSylSec) < t.rate_syl_sec {
        exceeded.insert(ExceededThreshold::Rate);
    }
    if features.get(Feature::PauseRatio) > t.pause_ratio {
        exceeded.insert(ExceededThreshold::PauseRatio);
    }
    if features.get(Feature::AmplitudeDbVariation) < t.amplitude_db_variation {
        exceeded.insert(ExceededThreshold::AmplitudeVariation);
    }

    exceeded
}
