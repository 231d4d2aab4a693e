//! Acoustic feature extraction.
//!
//! [`FeatureExtractor::extract`] turns one mono 16kHz recording into a
//! [`FeatureVector`] holding every key of the fixed vocabulary ([`Feature`]),
//! each guaranteed finite. Pitch and intensity contours come from the
//! selected [`AnalysisEngine`]; everything else is computed here:
//!
//! | Module          | Features                                          |
//! |-----------------|---------------------------------------------------|
//! | `perturbation`  | jitter (local, RAP, PPQ5), shimmer (local, APQ5)  |
//! | `harmonicity`   | HNR                                               |
//! | `voice_range`   | MPT, F0-High, I-Low                               |
//! | `amplitude`     | RMS, dB variation/range, speech rate, pause ratio |
//! | `formants`      | F1, F2                                            |
//! | `spectral`      | centroid, roll-off, turbulence                    |
//!
//! Individual feature failures never abort extraction: the feature keeps its
//! neutral value and a [`Degradation`] is recorded.

pub mod amplitude;
pub mod engine;
pub mod formants;
pub mod harmonicity;
pub mod perturbation;
pub mod spectral;
pub mod stats;
pub mod voice_range;

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::audio::{normalize_peak, peak_abs};
use crate::config::EnginePreference;

pub use amplitude::Articulation;
pub use engine::{select_engine, AnalysisEngine, AutocorrelationEngine, Contour, EngineError, McLeodEngine};
pub use spectral::Spectrogram;

use harmonicity::HnrSource;
use stats::IqrRelaxation;

/// Peak amplitude below which a recording is treated as silence
pub const SILENCE_PEAK: f32 = 1e-5;

/// Shortest analysable recording, in seconds (one pitch window)
pub const MIN_ANALYSIS_SEC: f64 = 0.04;

/// Neutral values used when a feature cannot be measured. They sit on the
/// normal side of every clinical threshold.
pub const NEUTRAL_HNR_DB: f64 = harmonicity::NEUTRAL_HNR_DB;
pub const NEUTRAL_RMS_MEAN: f64 = 0.05;
pub const NEUTRAL_AMPLITUDE_DB_VARIATION: f64 = 6.0;
pub const NEUTRAL_AMPLITUDE_DB_RANGE: f64 = 20.0;
pub const NEUTRAL_RATE_SYL_SEC: f64 = 4.5;
pub const NEUTRAL_PAUSE_RATIO: f64 = 0.2;

/// Errors that end extraction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExtractError {
    #[error("Cannot extract features from an empty signal")]
    EmptySignal,
}

/// The fixed feature vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    F0MeanHz,
    F0SdHz,
    F0HighHz,
    JitterPercent,
    JitterRapPercent,
    JitterPpq5Percent,
    ShimmerPercent,
    ShimmerApq5Percent,
    HnrDb,
    RmsMean,
    AmplitudeDbVariation,
    AmplitudeDbRange,
    RateSylSec,
    PauseRatio,
    F1MeanHz,
    F2MeanHz,
    SpectralCentroidHz,
    SpectralRolloffHz,
    TurbulenceRatio,
    MptSec,
    ILowDb,
}

impl Feature {
    pub const ALL: [Feature; 21] = [
        Feature::F0MeanHz,
        Feature::F0SdHz,
        Feature::F0HighHz,
        Feature::JitterPercent,
        Feature::JitterRapPercent,
        Feature::JitterPpq5Percent,
        Feature::ShimmerPercent,
        Feature::ShimmerApq5Percent,
        Feature::HnrDb,
        Feature::RmsMean,
        Feature::AmplitudeDbVariation,
        Feature::AmplitudeDbRange,
        Feature::RateSylSec,
        Feature::PauseRatio,
        Feature::F1MeanHz,
        Feature::F2MeanHz,
        Feature::SpectralCentroidHz,
        Feature::SpectralRolloffHz,
        Feature::TurbulenceRatio,
        Feature::MptSec,
        Feature::ILowDb,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::F0MeanHz => "f0_mean_hz",
            Self::F0SdHz => "f0_sd_hz",
            Self::F0HighHz => "f0_high_hz",
            Self::JitterPercent => "jitter_percent",
            Self::JitterRapPercent => "jitter_rap_percent",
            Self::JitterPpq5Percent => "jitter_ppq5_percent",
            Self::ShimmerPercent => "shimmer_percent",
            Self::ShimmerApq5Percent => "shimmer_apq5_percent",
            Self::HnrDb => "hnr_db",
            Self::RmsMean => "rms_mean",
            Self::AmplitudeDbVariation => "amplitude_db_variation",
            Self::AmplitudeDbRange => "amplitude_db_range",
            Self::RateSylSec => "rate_syl_sec",
            Self::PauseRatio => "pause_ratio",
            Self::F1MeanHz => "f1_mean_hz",
            Self::F2MeanHz => "f2_mean_hz",
            Self::SpectralCentroidHz => "spectral_centroid_hz",
            Self::SpectralRolloffHz => "spectral_rolloff_hz",
            Self::TurbulenceRatio => "turbulence_ratio",
            Self::MptSec => "mpt_sec",
            Self::ILowDb => "i_low_db",
        }
    }

    /// Value used when the feature cannot be measured.
    ///
    /// Pitch-derived, formant and spectral features read 0.0 ("not
    /// measured"); loudness, articulation and HNR take values on the normal
    /// side of their clinical thresholds.
    pub fn neutral_value(&self) -> f64 {
        match self {
            Self::HnrDb => NEUTRAL_HNR_DB,
            Self::RmsMean => NEUTRAL_RMS_MEAN,
            Self::AmplitudeDbVariation => NEUTRAL_AMPLITUDE_DB_VARIATION,
            Self::AmplitudeDbRange => NEUTRAL_AMPLITUDE_DB_RANGE,
            Self::RateSylSec => NEUTRAL_RATE_SYL_SEC,
            Self::PauseRatio => NEUTRAL_PAUSE_RATIO,
            _ => 0.0,
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Feature {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| format!("Unknown feature: {}", s))
    }
}

/// Every feature of the vocabulary with a finite value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureVector(BTreeMap<Feature, f64>);

impl Default for FeatureVector {
    fn default() -> Self {
        Self::neutral()
    }
}

impl FeatureVector {
    /// All features at their neutral values.
    pub fn neutral() -> Self {
        Self(Feature::ALL.iter().map(|f| (*f, f.neutral_value())).collect())
    }

    pub fn get(&self, feature: Feature) -> f64 {
        self.0.get(&feature).copied().unwrap_or_else(|| feature.neutral_value())
    }

    pub fn set(&mut self, feature: Feature, value: f64) {
        self.0.insert(feature, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (Feature, f64)> + '_ {
        self.0.iter().map(|(f, v)| (*f, *v))
    }

    /// Restore missing keys and replace non-finite values with neutral ones.
    /// Returns the features that had to be replaced.
    pub fn sanitize(&mut self) -> Vec<Feature> {
        let mut replaced = Vec::new();
        for feature in Feature::ALL {
            match self.0.get(&feature) {
                Some(v) if v.is_finite() => {}
                _ => {
                    self.0.insert(feature, feature.neutral_value());
                    replaced.push(feature);
                }
            }
        }
        replaced
    }

    /// All keys present and every value finite.
    pub fn is_complete(&self) -> bool {
        Feature::ALL
            .iter()
            .all(|f| self.0.get(f).map_or(false, |v| v.is_finite()))
    }

    /// String-keyed view for consumers outside the crate.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        self.iter().map(|(f, v)| (f.as_str().to_string(), v)).collect()
    }
}

/// Non-terminal problems met during extraction, reported as warnings.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
    /// Silence or too little audio: neutral values were used throughout
    InsufficientSignal { reason: String },
    /// One computation failed and a fallback path supplied the value
    ComputationDegraded { component: String, detail: String },
}

impl Degradation {
    fn computation(component: impl Into<String>, detail: impl Into<String>) -> Self {
        Self::ComputationDegraded {
            component: component.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for Degradation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientSignal { reason } => write!(f, "insufficient signal: {}", reason),
            Self::ComputationDegraded { component, detail } => write!(f, "{} degraded: {}", component, detail),
        }
    }
}

/// Result of one extraction.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub features: FeatureVector,
    pub warnings: Vec<Degradation>,
    /// Name of the engine whose contours were used
    pub engine: &'static str,
    pub pitch: Contour,
    pub intensity: Contour,
}

impl Extraction {
    pub fn is_insufficient(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, Degradation::InsufficientSignal { .. }))
    }
}

/// Computes feature vectors with a fixed engine selection.
///
/// Holds no per-analysis state; `extract` can run concurrently from many
/// threads on one extractor.
pub struct FeatureExtractor {
    sample_rate: u32,
    engine: Box<dyn AnalysisEngine>,
    fallback: Option<Box<dyn AnalysisEngine>>,
    relaxation: IqrRelaxation,
}

impl FeatureExtractor {
    /// Select an engine for `preference` (probing when `Auto`).
    pub fn new(sample_rate: u32, preference: EnginePreference) -> Self {
        Self::with_engine(sample_rate, select_engine(preference))
    }

    /// Use a specific engine; McLeod backs it up unless it is McLeod itself.
    pub fn with_engine(sample_rate: u32, engine: Box<dyn AnalysisEngine>) -> Self {
        let fallback: Option<Box<dyn AnalysisEngine>> = if engine.name() == McLeodEngine.name() {
            None
        } else {
            Some(Box::new(McLeodEngine))
        };
        debug!(
            "Feature extractor: engine {}, fallback {}",
            engine.name(),
            fallback.as_ref().map_or("none", |f| f.name())
        );
        Self {
            sample_rate,
            engine,
            fallback,
            relaxation: IqrRelaxation::default(),
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn min_analysis_samples(&self) -> usize {
        (MIN_ANALYSIS_SEC * self.sample_rate as f64).round() as usize
    }

    /// Compute the full feature vector of a recording.
    ///
    /// # Errors
    /// Only an empty signal is an error. Silence and very short input yield
    /// neutral features with an [`Degradation::InsufficientSignal`] warning.
    pub fn extract(&self, samples: &[f32]) -> Result<Extraction, ExtractError> {
        if samples.is_empty() {
            return Err(ExtractError::EmptySignal);
        }

        let sr = self.sample_rate;
        let duration = samples.len() as f64 / sr as f64;
        let peak = peak_abs(samples);
        let min_samples = self.min_analysis_samples();

        if samples.len() < min_samples || !(peak >= SILENCE_PEAK) {
            let reason = if samples.len() < min_samples {
                format!("{} samples, need at least {}", samples.len(), min_samples)
            } else {
                format!("peak amplitude {:.2e} below {:.0e}", peak, SILENCE_PEAK)
            };
            warn!("Insufficient signal: {}", reason);
            let mut features = FeatureVector::neutral();
            features.set(Feature::MptSec, duration);
            return Ok(Extraction {
                features,
                warnings: vec![Degradation::InsufficientSignal { reason }],
                engine: self.engine.name(),
                pitch: Contour::default(),
                intensity: Contour::default(),
            });
        }

        let normalized = normalize_peak(samples);
        let mut warnings = Vec::new();
        let (pitch, intensity, engine) = self.contours(&normalized, &mut warnings);
        let mut features = FeatureVector::neutral();

        // Pitch
        let voiced = pitch.voiced_values();
        features.set(Feature::F0MeanHz, stats::mean(&voiced));
        features.set(Feature::F0SdHz, stats::std_dev(&voiced));

        let perturbation = perturbation::measure(&pitch, &intensity, self.relaxation);
        features.set(Feature::JitterPercent, perturbation.jitter_local);
        features.set(Feature::JitterRapPercent, perturbation.jitter_rap);
        features.set(Feature::JitterPpq5Percent, perturbation.jitter_ppq5);
        features.set(Feature::ShimmerPercent, perturbation.shimmer_local);
        features.set(Feature::ShimmerApq5Percent, perturbation.shimmer_apq5);

        // Harmonicity
        let secondary = engine.harmonicity_db(&normalized, sr, &pitch);
        let primary = harmonicity::autocorrelation_hnr(&normalized, sr);
        let (hnr, source) = harmonicity::reconcile(secondary, primary);
        match source {
            HnrSource::Neutral => warnings.push(Degradation::computation(
                Feature::HnrDb.as_str(),
                "no periodic frames, neutral value used",
            )),
            HnrSource::Autocorrelation if secondary.is_some() => {
                debug!(
                    "Harmonicity {:.1} dB disagrees with autocorrelation {:.1} dB",
                    secondary.unwrap_or_default(),
                    hnr
                );
            }
            _ => {}
        }
        features.set(Feature::HnrDb, hnr);

        // Loudness and articulation use the unnormalized signal
        let amplitude = amplitude::amplitude_stats(samples, sr);
        features.set(Feature::RmsMean, amplitude.rms_mean);
        features.set(Feature::AmplitudeDbVariation, amplitude.db_variation);
        features.set(Feature::AmplitudeDbRange, amplitude.db_range);

        let articulation = amplitude::articulation(samples, sr);
        features.set(Feature::RateSylSec, articulation.rate_syl_sec);
        features.set(Feature::PauseRatio, articulation.pause_ratio);

        match formants::estimate(samples, sr) {
            Some(f) => {
                features.set(Feature::F1MeanHz, f.f1_hz);
                features.set(Feature::F2MeanHz, f.f2_hz);
            }
            None => warnings.push(Degradation::computation("formants", "no stable LPC resonances")),
        }

        match spectral::spectral_stats(&spectral::stft(samples, sr)) {
            Some(s) => {
                features.set(Feature::SpectralCentroidHz, s.centroid_hz);
                features.set(Feature::SpectralRolloffHz, s.rolloff_hz);
                features.set(Feature::TurbulenceRatio, s.turbulence_ratio);
            }
            None => warnings.push(Degradation::computation("spectrum", "no spectral energy")),
        }

        // DSI sub-parameters
        features.set(Feature::MptSec, voice_range::max_phonation_time(&intensity, duration));
        features.set(Feature::F0HighHz, voice_range::f0_high(&pitch));
        features.set(Feature::ILowDb, voice_range::i_low(&pitch, &intensity));

        for feature in features.sanitize() {
            warn!("Non-finite {} replaced with {}", feature, feature.neutral_value());
            warnings.push(Degradation::computation(feature.as_str(), "non-finite value replaced"));
        }

        debug!(
            "Extracted features with {}: F0 {:.1} Hz, jitter {:.3}%, shimmer {:.3}%, HNR {:.1} dB, {} warnings",
            engine.name(),
            features.get(Feature::F0MeanHz),
            features.get(Feature::JitterPercent),
            features.get(Feature::ShimmerPercent),
            features.get(Feature::HnrDb),
            warnings.len()
        );

        Ok(Extraction {
            features,
            warnings,
            engine: engine.name(),
            pitch,
            intensity,
        })
    }

    /// Speech-rate and pause measures of one segment.
    pub fn articulation(&self, samples: &[f32]) -> Articulation {
        amplitude::articulation(samples, self.sample_rate)
    }

    /// Contours from the selected engine, or from the fallback when it fails.
    fn contours(&self, samples: &[f32], warnings: &mut Vec<Degradation>) -> (Contour, Contour, &dyn AnalysisEngine) {
        let primary = self.engine.as_ref();
        let error = match run_engine(primary, samples, self.sample_rate) {
            Ok((pitch, intensity)) => return (pitch, intensity, primary),
            Err(e) => e,
        };

        let Some(fallback) = self.fallback.as_deref() else {
            warn!("{} engine failed: {}", primary.name(), error);
            warnings.push(Degradation::computation("pitch", format!("{} failed: {}", primary.name(), error)));
            return (Contour::default(), Contour::default(), primary);
        };

        warn!("{} engine failed ({}), falling back to {}", primary.name(), error, fallback.name());
        warnings.push(Degradation::computation(
            "pitch",
            format!("{} failed: {}; used {}", primary.name(), error, fallback.name()),
        ));

        match run_engine(fallback, samples, self.sample_rate) {
            Ok((pitch, intensity)) => (pitch, intensity, fallback),
            Err(e) => {
                warn!("{} engine failed too: {}", fallback.name(), e);
                warnings.push(Degradation::computation("pitch", format!("{} failed: {}", fallback.name(), e)));
                (Contour::default(), Contour::default(), fallback)
            }
        }
    }
}

fn run_engine(engine: &dyn AnalysisEngine, samples: &[f32], sample_rate: u32) -> Result<(Contour, Contour), EngineError> {
    let pitch = engine.pitch_contour(samples, sample_rate)?;
    let intensity = engine.intensity_contour(samples, sample_rate)?;
    Ok((pitch, intensity))
}
