//! Dysphonia analysis core.
//!
//! Turns a short speech recording into acoustic voice biomarkers and a
//! clinical-style screening report:
//!
//! ```text
//!   audio file / bytes
//!          |
//!      [audio]      decode -> mono 16 kHz -> high-pass -> segments
//!          |
//!      [features]   pitch/intensity contours -> jitter, shimmer, HNR, MPT, ...
//!          |
//!      [symptoms]   severities 0-3, exceeded thresholds, risk probability
//!          |
//!      [analyzer]   DSI, report lines, AnalysisResult
//! ```
//!
//! Data flows strictly downward. Every analysis owns its working buffers, so
//! one [`Analyzer`] can be shared across threads.

pub mod analyzer;
pub mod audio;
pub mod config;
pub mod features;
pub mod symptoms;

#[cfg(test)]
mod pipeline_tests;

pub use analyzer::{AnalysisError, AnalysisOptions, AnalysisResult, Analyzer, AudioInput};
pub use audio::{DecodeError, SampleSequence, Segment, TARGET_SAMPLE_RATE};
pub use config::{AnalyzerConfig, EnginePreference, ReportLanguage};
pub use features::{Feature, FeatureExtractor, FeatureVector};
pub use symptoms::{RiskAssessment, RiskLevel, Severity, Symptom, SymptomScores};
