//! Analysis orchestrator.
//!
//! One pass per recording, no retries:
//!
//! ```text
//! Load -> Denoise -> Segment -> ExtractWhole -> ExtractPerSegment
//!      -> MergeFeatures -> ScoreSymptoms -> ComputeDsi -> ComputeRisk -> AssembleResult
//! ```
//!
//! Any stage failure ends the run with an [`AnalysisResult`] whose `error` is
//! set and whose sections are empty.

pub mod dsi;
pub mod intermediates;
pub mod report;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::audio::{self, DecodeError, SampleSequence, FRAME_HOP_SEC};
use crate::config::{AnalyzerConfig, ReportLanguage};
use crate::features::amplitude::merge_articulation;
use crate::features::{spectral, Degradation, Feature, FeatureExtractor};
use crate::symptoms::{RiskAssessment, SymptomAnalysis, SymptomModel, SymptomScores};

pub use dsi::{DsiCoefficients, DsiResult};
pub use intermediates::Intermediates;

/// Terminal pipeline failures
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Failed to decode audio: {0}")]
    Decode(#[from] DecodeError),

    #[error("Preprocessing failed: {0}")]
    Preprocess(String),

    #[error("Analysis failed: {0}")]
    Pipeline(String),
}

/// Where the recording comes from
#[derive(Debug, Clone)]
pub enum AudioInput {
    Path(PathBuf),
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, Default)]
pub struct AnalysisOptions {
    /// Keep waveform, segments, contours and spectrogram on the result
    pub save_intermediates: bool,
    /// Generated (UUID v4) when absent
    pub run_id: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AudioSummary {
    pub duration_sec: f64,
    pub sample_rate: u32,
    pub segments: usize,
}

/// Outcome of one analysis, handed to the caller by value.
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisResult {
    pub run_id: String,
    pub analyzed_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub audio_summary: AudioSummary,
    pub features: BTreeMap<String, f64>,
    pub dsi: Option<DsiResult>,
    pub symptom_scores: Option<SymptomScores>,
    pub risk: Option<RiskAssessment>,
    pub risk_text: String,
    pub report: Vec<String>,
    pub warnings: Vec<Degradation>,
    pub engine: String,
    #[serde(skip)]
    pub intermediates: Option<Intermediates>,
}

impl AnalysisResult {
    fn failed(run_id: String, analyzed_at: DateTime<Utc>, err: &AnalysisError, language: ReportLanguage) -> Self {
        let line = match language {
            ReportLanguage::En => format!("Analysis error: {}", err),
            ReportLanguage::Ru => format!("Ошибка анализа: {}", err),
        };
        Self {
            run_id,
            analyzed_at,
            error: Some(err.to_string()),
            audio_summary: AudioSummary::default(),
            features: BTreeMap::new(),
            dsi: None,
            symptom_scores: None,
            risk: None,
            risk_text: String::new(),
            report: vec![line],
            warnings: Vec::new(),
            engine: String::new(),
            intermediates: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Runs the full pipeline with one configuration.
///
/// Holds only immutable tables and stateless engines, so `analyze` may be
/// called from many threads at once.
pub struct Analyzer {
    config: AnalyzerConfig,
    extractor: FeatureExtractor,
    model: SymptomModel,
}

impl Analyzer {
    pub fn new(config: AnalyzerConfig) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.target_sample_rate, config.engine);
        let model = SymptomModel::new(config.thresholds.clone(), config.risk.clone());
        info!(
            "Analyzer ready: engine {}, thresholds {}, language {:?}",
            extractor.engine_name(),
            config.thresholds.version,
            config.report_language
        );
        Ok(Self {
            config,
            extractor,
            model,
        })
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    pub fn engine_name(&self) -> &'static str {
        self.extractor.engine_name()
    }

    /// Analyse a recording file or in-memory container.
    pub fn analyze(&self, input: AudioInput, options: AnalysisOptions) -> AnalysisResult {
        let audio = match &input {
            AudioInput::Path(path) => {
                info!("Analyzing {:?}", path);
                audio::load(path)
            }
            AudioInput::Bytes(bytes) => {
                info!("Analyzing {} bytes of audio", bytes.len());
                audio::load_bytes(bytes)
            }
        };

        match audio {
            Ok(audio) => self.analyze_samples(audio, options),
            Err(e) => self.fail(options, AnalysisError::from(e)),
        }
    }

    /// Analyse already decoded mono audio at the target rate.
    pub fn analyze_samples(&self, audio: SampleSequence, options: AnalysisOptions) -> AnalysisResult {
        let run_id = options.run_id.clone().unwrap_or_else(|| Uuid::new_v4().to_string());
        let analyzed_at = Utc::now();

        match self.run(&audio, &run_id, analyzed_at, options.save_intermediates) {
            Ok(result) => {
                info!(
                    "Run {} complete: risk {}, {} warnings",
                    run_id,
                    result.risk_text,
                    result.warnings.len()
                );
                result
            }
            Err(e) => {
                error!("Run {} failed: {}", run_id, e);
                AnalysisResult::failed(run_id, analyzed_at, &e, self.config.report_language)
            }
        }
    }

    fn fail(&self, options: AnalysisOptions, err: AnalysisError) -> AnalysisResult {
        let run_id = options.run_id.unwrap_or_else(|| Uuid::new_v4().to_string());
        error!("Run {} failed: {}", run_id, err);
        AnalysisResult::failed(run_id, Utc::now(), &err, self.config.report_language)
    }

    fn run(
        &self,
        audio: &SampleSequence,
        run_id: &str,
        analyzed_at: DateTime<Utc>,
        save_intermediates: bool,
    ) -> Result<AnalysisResult, AnalysisError> {
        let sr = audio.sample_rate;
        if sr != self.config.target_sample_rate {
            return Err(AnalysisError::Pipeline(format!(
                "expected {} Hz audio, got {} Hz",
                self.config.target_sample_rate, sr
            )));
        }
        if audio.is_empty() {
            return Err(AnalysisError::Decode(DecodeError::Empty));
        }
        let duration = audio.duration_sec();

        // Denoise
        let denoised = audio::denoise(&audio.samples, sr, self.config.highpass_cutoff_hz)
            .map_err(|e| AnalysisError::Preprocess(e.to_string()))?;

        // Segment
        let segments = audio::segment(
            &denoised,
            sr,
            self.config.min_segment_duration_sec,
            self.config.silence_threshold,
        );
        debug!("{} segments over {:.2}s", segments.len(), duration);

        // ExtractWhole
        let extraction = self
            .extractor
            .extract(&denoised)
            .map_err(|e| AnalysisError::Pipeline(e.to_string()))?;
        let insufficient = extraction.is_insufficient();
        let mut features = extraction.features.clone();
        let mut warnings = extraction.warnings.clone();

        // ExtractPerSegment
        let per_segment: Vec<_> = segments
            .iter()
            .map(|s| self.extractor.articulation(s.slice(&denoised)))
            .collect();

        // MergeFeatures
        if !insufficient {
            if let Some(merged) = merge_articulation(&per_segment, duration, FRAME_HOP_SEC) {
                debug!(
                    "Merged articulation: {:.2} syl/s, pause ratio {:.3}",
                    merged.rate_syl_sec, merged.pause_ratio
                );
                features.set(Feature::RateSylSec, merged.rate_syl_sec);
                features.set(Feature::PauseRatio, merged.pause_ratio);
            }
        }
        for feature in features.sanitize() {
            warnings.push(Degradation::ComputationDegraded {
                component: feature.as_str().to_string(),
                detail: "non-finite merged value replaced".to_string(),
            });
        }

        // ScoreSymptoms, ComputeDsi, ComputeRisk
        let scores = self.model.score(&features);
        let dsi = dsi::compute(&features, &self.config.dsi);
        let risk = self.model.assess(&features, &scores);
        debug!("DSI {:?}, risk {} ({:.3})", dsi.score, risk.level, risk.probability);

        // AssembleResult
        let language = self.config.report_language;
        let symptoms = SymptomAnalysis { scores, risk };
        let report = report::build(
            &report::ReportInput {
                features: &features,
                symptoms: &symptoms,
                dsi: &dsi,
                thresholds: self.model.thresholds(),
                insufficient_signal: insufficient,
            },
            language,
        );
        let risk_text = report::risk_text(&symptoms.risk, language);

        let intermediates = save_intermediates.then(|| Intermediates {
            waveform: intermediates::waveform(&denoised, sr),
            segments: segments
                .iter()
                .zip(&per_segment)
                .map(|(s, a)| intermediates::SegmentArtifact::new(s, sr, a))
                .collect(),
            pitch_contour: extraction.pitch.clone(),
            intensity_contour: extraction.intensity.clone(),
            spectrogram: spectral::spectrogram(&denoised, sr),
        });

        Ok(AnalysisResult {
            run_id: run_id.to_string(),
            analyzed_at,
            error: None,
            audio_summary: AudioSummary {
                duration_sec: (duration * 100.0).round() / 100.0,
                sample_rate: sr,
                segments: segments.len(),
            },
            features: features.to_map(),
            dsi: Some(dsi),
            symptom_scores: Some(symptoms.scores),
            risk: Some(symptoms.risk),
            risk_text,
            report,
            warnings,
            engine: extraction.engine.to_string(),
            intermediates,
        })
    }
}
