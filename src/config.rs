use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::analyzer::dsi::DsiCoefficients;
use crate::audio::{HighPassFilter, TARGET_SAMPLE_RATE};
use crate::symptoms::risk::RiskCalibration;
use crate::symptoms::thresholds::ClinicalThresholds;

/// Analyzer configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyzerConfig {
    pub schema_version: u32,

    // Ingestion
    pub target_sample_rate: u32,
    pub highpass_cutoff_hz: u32,

    // Segmentation
    pub min_segment_duration_sec: f64,
    /// Fraction of the loudest frame's RMS below which a frame is silent
    pub silence_threshold: f32,

    pub engine: EnginePreference,
    pub report_language: ReportLanguage,

    // Clinical tables
    pub thresholds: ClinicalThresholds,
    pub risk: RiskCalibration,
    pub dsi: DsiCoefficients,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            target_sample_rate: TARGET_SAMPLE_RATE,
            highpass_cutoff_hz: HighPassFilter::DEFAULT_CUTOFF_HZ,
            min_segment_duration_sec: 0.5,
            silence_threshold: 0.05,
            engine: EnginePreference::Auto,
            report_language: ReportLanguage::En,
            thresholds: ClinicalThresholds::default(),
            risk: RiskCalibration::default(),
            dsi: DsiCoefficients::default(),
        }
    }
}

impl AnalyzerConfig {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path).context("Failed to read config file")?;
            let config: Self = serde_json::from_str(&content).context("Failed to parse config file")?;
            config.validate()?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".dysphonia-analyzer"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    /// Reject settings the pipeline cannot honour.
    pub fn validate(&self) -> Result<()> {
        if self.target_sample_rate != TARGET_SAMPLE_RATE {
            anyhow::bail!(
                "target_sample_rate must be {} Hz (got {})",
                TARGET_SAMPLE_RATE,
                self.target_sample_rate
            );
        }
        if !(self.min_segment_duration_sec > 0.0) {
            anyhow::bail!(
                "min_segment_duration_sec must be positive (got {})",
                self.min_segment_duration_sec
            );
        }
        if !(self.silence_threshold > 0.0 && self.silence_threshold < 1.0) {
            anyhow::bail!(
                "silence_threshold must be a fraction in (0, 1) (got {})",
                self.silence_threshold
            );
        }
        if self.highpass_cutoff_hz == 0 || self.highpass_cutoff_hz >= TARGET_SAMPLE_RATE / 2 {
            anyhow::bail!(
                "highpass_cutoff_hz must be between 0 and {} Hz (got {})",
                TARGET_SAMPLE_RATE / 2,
                self.highpass_cutoff_hz
            );
        }
        Ok(())
    }
}

/// Which pitch/intensity engine the extractor should use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EnginePreference {
    /// Probe the autocorrelation engine, fall back to McLeod if it fails
    #[default]
    Auto,
    Autocorrelation,
    Mcleod,
}

impl std::str::FromStr for EnginePreference {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "autocorrelation" | "praat" => Ok(Self::Autocorrelation),
            "mcleod" => Ok(Self::Mcleod),
            _ => Err(format!("Unknown engine: {}", s)),
        }
    }
}

/// Language of the human-readable report lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ReportLanguage {
    #[default]
    En,
    Ru,
}

impl std::str::FromStr for ReportLanguage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "en" | "english" => Ok(Self::En),
            "ru" | "russian" => Ok(Self::Ru),
            _ => Err(format!("Unknown report language: {}", s)),
        }
    }
}
