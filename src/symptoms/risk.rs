//! Staged risk heuristic.
//!
//! The probability starts from a base keyed by the number of exceeded
//! thresholds, gains small increments for severe/moderate symptoms and for
//! perturbation measures past their thresholds, and is capped. Guardrails
//! keep near-normal voices below the Medium boundary. All constants live in
//! [`RiskCalibration`] so they can be refitted against clinical data.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::scoring::SymptomScores;
use super::thresholds::{ClinicalThresholds, ExceededThreshold};
use crate::features::{Feature, FeatureVector};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Low => write!(f, "Low"),
            Self::Medium => write!(f, "Medium"),
            Self::High => write!(f, "High"),
        }
    }
}

/// Empirical risk constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskCalibration {
    pub version: String,

    // Base probability by exceeded-threshold count
    pub base_none: f64,
    pub base_one: f64,
    pub base_two: f64,
    /// Three or more, fewer than two marked perturbation deviations
    pub base_many: f64,
    /// Three or more with at least two marked deviations
    pub base_many_marked: f64,

    // Symptom increments
    pub severe_single_step: f64,
    pub severe_multiple_step: f64,
    pub moderate_single_step: f64,
    pub moderate_multiple_step: f64,

    // Per-feature increments for jitter, shimmer and HNR
    pub exceeded_step: f64,
    pub marked_step: f64,

    pub max_probability: f64,

    // Guardrails
    pub healthy_floor: f64,
    pub healthy_ceiling: f64,
    pub single_ceiling: f64,
    pub two_mild_ceiling: f64,

    // Classification
    pub high_probability: f64,
    pub high_min_exceeded: usize,
    pub medium_probability: f64,
    pub low_confidence_floor: f64,
}

impl Default for RiskCalibration {
    fn default() -> Self {
        Self {
            version: "daoudi2022-staged.1".to_string(),
            base_none: 0.20,
            base_one: 0.45,
            base_two: 0.70,
            base_many: 0.75,
            base_many_marked: 0.89,
            severe_single_step: 0.03,
            severe_multiple_step: 0.05,
            moderate_single_step: 0.01,
            moderate_multiple_step: 0.03,
            exceeded_step: 0.02,
            marked_step: 0.04,
            max_probability: 0.95,
            healthy_floor: 0.15,
            healthy_ceiling: 0.40,
            single_ceiling: 0.65,
            two_mild_ceiling: 0.68,
            high_probability: 0.89,
            high_min_exceeded: 3,
            medium_probability: 0.70,
            low_confidence_floor: 0.20,
        }
    }
}

/// Risk probability, level and confidence for one voice.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    /// Rounded to three decimals
    pub probability: f64,
    pub level: RiskLevel,
    pub confidence: f64,
    pub exceeded: BTreeSet<ExceededThreshold>,
    pub exceeded_count: usize,
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

/// Probability in `[0, max_probability]`.
///
/// Never decreases when `exceeded` grows while the scores and features stay
/// the same.
pub fn risk_probability(
    exceeded: &BTreeSet<ExceededThreshold>,
    scores: &SymptomScores,
    features: &FeatureVector,
    thresholds: &ClinicalThresholds,
    c: &RiskCalibration,
) -> f64 {
    let count = exceeded.len();
    let jitter = features.get(Feature::JitterPercent);
    let shimmer = features.get(Feature::ShimmerPercent);
    let hnr = features.get(Feature::HnrDb);
    let marked = thresholds.marked_deviations(jitter, shimmer, hnr);

    let mut probability = match count {
        0 => c.base_none,
        1 => c.base_one,
        2 => c.base_two,
        _ if marked >= 2 => c.base_many_marked,
        _ => c.base_many,
    };

    let severe = scores.severe_count();
    let moderate = scores.moderate_count();
    probability += match severe {
        0 => 0.0,
        1 => c.severe_single_step,
        _ => c.severe_multiple_step,
    };
    probability += match moderate {
        0 => 0.0,
        1 => c.moderate_single_step,
        _ => c.moderate_multiple_step,
    };

    let step = |is_marked: bool| if is_marked { c.marked_step } else { c.exceeded_step };
    if exceeded.contains(&ExceededThreshold::Jitter) {
        probability += step(jitter > thresholds.jitter_marked_percent);
    }
    if exceeded.contains(&ExceededThreshold::Shimmer) {
        probability += step(shimmer > thresholds.shimmer_marked_percent);
    }
    if exceeded.contains(&ExceededThreshold::Hnr) {
        probability += step(hnr < thresholds.hnr_marked_db);
    }

    probability = probability.min(c.max_probability);

    if severe == 0 && moderate == 0 {
        match count {
            0 => probability = probability.clamp(c.healthy_floor, c.healthy_ceiling),
            1 => probability = probability.min(c.single_ceiling),
            2 if marked < 2 => probability = probability.min(c.two_mild_ceiling),
            _ => {}
        }
    }

    probability.clamp(0.0, 1.0)
}

/// High needs both a high probability and corroborating thresholds.
pub fn classify(probability: f64, exceeded_count: usize, c: &RiskCalibration) -> RiskLevel {
    if probability >= c.high_probability && exceeded_count >= c.high_min_exceeded {
        RiskLevel::High
    } else if probability >= c.medium_probability {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

pub fn confidence(probability: f64, level: RiskLevel, c: &RiskCalibration) -> f64 {
    match level {
        RiskLevel::Low => probability.max(c.low_confidence_floor),
        RiskLevel::Medium => probability,
        RiskLevel::High => probability.min(c.max_probability),
    }
}

pub fn assess(
    exceeded: BTreeSet<ExceededThreshold>,
    scores: &SymptomScores,
    features: &FeatureVector,
    thresholds: &ClinicalThresholds,
    c: &RiskCalibration,
) -> RiskAssessment {
    let probability = risk_probability(&exceeded, scores, features, thresholds, c);
    let level = classify(probability, exceeded.len(), c);
    RiskAssessment {
        probability: round3(probability),
        level,
        confidence: round3(confidence(probability, level, c)),
        exceeded_count: exceeded.len(),
        exceeded,
    }
}
