//! Symptom & risk model.
//!
//! Pure functions of a [`FeatureVector`] and the injected threshold and
//! calibration tables; nothing here keeps state between calls.

pub mod risk;
pub mod scoring;
pub mod thresholds;

use std::collections::BTreeSet;

use serde::Serialize;
use tracing::debug;

use crate::features::FeatureVector;

pub use risk::{classify, RiskAssessment, RiskCalibration, RiskLevel};
pub use scoring::{Severity, Symptom, SymptomScores};
pub use thresholds::{ClinicalThresholds, ExceededThreshold};

/// Symptom grading plus risk for one feature vector.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SymptomAnalysis {
    pub scores: SymptomScores,
    pub risk: RiskAssessment,
}

/// Threshold and calibration tables bound together.
#[derive(Debug, Clone, Default)]
pub struct SymptomModel {
    thresholds: ClinicalThresholds,
    calibration: RiskCalibration,
}

impl SymptomModel {
    pub fn new(thresholds: ClinicalThresholds, calibration: RiskCalibration) -> Self {
        Self {
            thresholds,
            calibration,
        }
    }

    pub fn thresholds(&self) -> &ClinicalThresholds {
        &self.thresholds
    }

    pub fn calibration(&self) -> &RiskCalibration {
        &self.calibration
    }

    pub fn score(&self, features: &FeatureVector) -> SymptomScores {
        scoring::score(features, &self.thresholds)
    }

    pub fn exceeded_thresholds(&self, features: &FeatureVector) -> BTreeSet<ExceededThreshold> {
        scoring::exceeded_thresholds(features, &self.thresholds)
    }

    /// Risk for features whose symptoms were already scored.
    pub fn assess(&self, features: &FeatureVector, scores: &SymptomScores) -> RiskAssessment {
        let exceeded = self.exceeded_thresholds(features);
        risk::assess(exceeded, scores, features, &self.thresholds, &self.calibration)
    }

    pub fn analyze(&self, features: &FeatureVector) -> SymptomAnalysis {
        let scores = self.score(features);
        let risk = self.assess(features, &scores);
        debug!(
            "Symptoms: {} severe, {} moderate; {} thresholds exceeded; risk {} ({:.3}, tables {}/{})",
            scores.severe_count(),
            scores.moderate_count(),
            risk.exceeded_count,
            risk.level,
            risk.probability,
            self.thresholds.version,
            self.calibration.version
        );
        SymptomAnalysis { scores, risk }
    }
}
