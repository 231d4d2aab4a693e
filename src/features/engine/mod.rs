//! Pitch and intensity analysis engines.
//!
//! Two interchangeable strategies produce the 10ms contours every voice
//! feature is computed from:
//!
//! - [`AutocorrelationEngine`]: windowed, window-normalized autocorrelation
//!   pitch tracking with an octave cost, plus a cross-correlation harmonicity
//!   estimate. This is the high-precision primary engine.
//! - [`McLeodEngine`]: the `pitch-detection` McLeod NSDF tracker. Coarser, but
//!   robust on short or odd inputs; used when the primary engine cannot run.
//!
//! [`select_engine`] picks one once, up front, by probing the primary engine
//! with a calibration tone.

mod autocorrelation;
mod mcleod;

pub use autocorrelation::AutocorrelationEngine;
pub(crate) use autocorrelation::Autocorrelator;
pub use mcleod::McLeodEngine;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::EnginePreference;

/// Contour frame step in seconds
pub const TIME_STEP_SEC: f64 = 0.01;

/// Reference pressure squared for dB conversion (2e-5 Pa)^2
const REFERENCE_POWER: f64 = 4.0e-10;

/// Calibration tone used to probe the primary engine
const PROBE_FREQUENCY_HZ: f64 = 200.0;
const PROBE_DURATION_SEC: f64 = 0.3;
const PROBE_TOLERANCE: f64 = 0.05;

/// Errors an engine reports when it cannot analyse a signal
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("Signal too short: {got} samples, need at least {needed}")]
    TooShort { needed: usize, got: usize },

    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine failed: {0}")]
    Failed(String),
}

/// A time series sampled every [`TIME_STEP_SEC`].
///
/// Pitch contours hold 0.0 for unvoiced frames.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Contour {
    /// Frame centre times in seconds
    pub times: Vec<f64>,
    pub values: Vec<f64>,
}

impl Contour {
    pub fn new(times: Vec<f64>, values: Vec<f64>) -> Self {
        debug_assert_eq!(times.len(), values.len());
        Self { times, values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Values of frames with a positive value (voiced frames of a pitch contour).
    pub fn voiced_values(&self) -> Vec<f64> {
        self.values.iter().copied().filter(|v| *v > 0.0).collect()
    }

    /// `(time, value)` pairs of frames with a positive value.
    pub fn voiced_frames(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.times
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .filter(|(_, v)| *v > 0.0)
    }

    /// Value of the frame nearest to `time`, if one lies within half a step.
    pub fn value_at(&self, time: f64) -> Option<f64> {
        let first = *self.times.first()?;
        let index = ((time - first) / TIME_STEP_SEC).round();
        if index < 0.0 {
            return None;
        }
        let index = index as usize;
        let frame_time = *self.times.get(index)?;
        if (frame_time - time).abs() <= TIME_STEP_SEC / 2.0 + 1e-9 {
            self.values.get(index).copied()
        } else {
            None
        }
    }
}

/// A pitch/intensity analysis strategy.
///
/// Implementations keep no mutable state between calls, so one engine can
/// serve concurrent analyses.
pub trait AnalysisEngine: Send + Sync {
    fn name(&self) -> &'static str;

    /// F0 in Hz per 10ms frame, 0.0 where unvoiced.
    fn pitch_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError>;

    /// Intensity in dB per 10ms frame.
    fn intensity_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError>;

    /// Mean harmonics-to-noise ratio in dB over the voiced frames of `pitch`,
    /// if this engine has its own estimator.
    fn harmonicity_db(&self, _samples: &[f32], _sample_rate: u32, _pitch: &Contour) -> Option<f64> {
        None
    }
}

/// Choose the engine for a preference.
///
/// `Auto` probes the autocorrelation engine with a calibration tone and falls
/// back to McLeod when the probe fails or lands too far from the tone.
pub fn select_engine(preference: EnginePreference) -> Box<dyn AnalysisEngine> {
    match preference {
        EnginePreference::Autocorrelation => Box::new(AutocorrelationEngine::default()),
        EnginePreference::Mcleod => Box::new(McLeodEngine),
        EnginePreference::Auto => {
            let primary = AutocorrelationEngine::default();
            match probe(&primary) {
                Ok(estimate) => {
                    debug!(
                        "Engine probe passed: {} estimated {:.1} Hz for {:.0} Hz tone",
                        primary.name(),
                        estimate,
                        PROBE_FREQUENCY_HZ
                    );
                    Box::new(primary)
                }
                Err(e) => {
                    warn!("Primary engine probe failed ({}), using {}", e, McLeodEngine.name());
                    Box::new(McLeodEngine)
                }
            }
        }
    }
}

/// Run an engine on a pure calibration tone and check its median F0.
pub fn probe(engine: &dyn AnalysisEngine) -> Result<f64, EngineError> {
    let sample_rate = crate::audio::TARGET_SAMPLE_RATE;
    let n = (PROBE_DURATION_SEC * sample_rate as f64) as usize;
    let tone: Vec<f32> = (0..n)
        .map(|i| {
            let t = i as f64 / sample_rate as f64;
            (0.5 * (2.0 * std::f64::consts::PI * PROBE_FREQUENCY_HZ * t).sin()) as f32
        })
        .collect();

    let contour = engine.pitch_contour(&tone, sample_rate)?;
    let voiced = contour.voiced_values();
    if voiced.is_empty() {
        return Err(EngineError::Failed("no voiced frames in calibration tone".to_string()));
    }

    let estimate = super::stats::median(&voiced);
    let error = (estimate - PROBE_FREQUENCY_HZ).abs() / PROBE_FREQUENCY_HZ;
    if error > PROBE_TOLERANCE {
        return Err(EngineError::Failed(format!(
            "calibration tone estimated at {:.1} Hz",
            estimate
        )));
    }
    Ok(estimate)
}

/// Hann window that never touches zero at its ends.
pub(crate) fn hann(len: usize) -> Vec<f64> {
    (0..len)
        .map(|i| {
            let phase = 2.0 * std::f64::consts::PI * (i as f64 + 0.5) / len as f64;
            0.5 - 0.5 * phase.cos()
        })
        .collect()
}

/// Mean-square amplitude to dB re 2e-5.
pub(crate) fn power_to_db(mean_square: f64) -> f64 {
    10.0 * (mean_square.max(1e-20) / REFERENCE_POWER).log10()
}

/// Weighted, mean-removed intensity contour shared by both engines.
///
/// Inputs shorter than `window` are analysed as one frame.
pub(crate) fn intensity_contour_with(samples: &[f32], sample_rate: u32, window: &[f64]) -> Contour {
    let step = (TIME_STEP_SEC * sample_rate as f64).round() as usize;
    let len = window.len().min(samples.len());
    if len == 0 {
        return Contour::default();
    }
    let weights = &window[..len];
    let weight_sum: f64 = weights.iter().sum();

    let n_frames = crate::audio::segmentation::frame_count(samples.len(), len, step);
    let mut times = Vec::with_capacity(n_frames);
    let mut values = Vec::with_capacity(n_frames);

    for k in 0..n_frames {
        let start = k * step;
        let frame = &samples[start..start + len];
        let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / len as f64;
        let power: f64 = frame
            .iter()
            .zip(weights)
            .map(|(&s, w)| w * (s as f64 - mean).powi(2))
            .sum::<f64>()
            / weight_sum;

        times.push((start as f64 + len as f64 / 2.0) / sample_rate as f64);
        values.push(power_to_db(power));
    }

    Contour::new(times, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contour_value_at_matches_nearest_frame() {
        let contour = Contour::new(vec![0.02, 0.03, 0.04], vec![1.0, 2.0, 3.0]);
        assert_eq!(contour.value_at(0.031), Some(2.0));
        assert_eq!(contour.value_at(0.04), Some(3.0));
        assert_eq!(contour.value_at(0.0), None);
        assert_eq!(contour.value_at(0.2), None);
    }

    #[test]
    fn test_voiced_values_skip_zeros() {
        let contour = Contour::new(vec![0.0, 0.01, 0.02], vec![0.0, 150.0, 0.0]);
        assert_eq!(contour.voiced_values(), vec![150.0]);
        assert_eq!(contour.voiced_frames().collect::<Vec<_>>(), vec![(0.01, 150.0)]);
    }

    #[test]
    fn test_power_to_db_reference() {
        assert!((power_to_db(4.0e-10)).abs() < 1e-9);
        assert!((power_to_db(0.5) - 90.969).abs() < 0.01);
        assert!(power_to_db(0.0).is_finite());
    }

    #[test]
    fn test_intensity_contour_short_input_is_single_frame() {
        let window = hann(683);
        let samples = vec![0.5f32; 300];
        let contour = intensity_contour_with(&samples, 16000, &window);
        assert_eq!(contour.len(), 1);
        assert!(contour.values[0].is_finite());
    }

    #[test]
    fn test_select_engine_honours_forced_preference() {
        assert_eq!(select_engine(EnginePreference::Mcleod).name(), "mcleod");
        assert_eq!(select_engine(EnginePreference::Autocorrelation).name(), "autocorrelation");
    }

    #[test]
    fn test_auto_selects_primary_when_probe_passes() {
        assert_eq!(select_engine(EnginePreference::Auto).name(), "autocorrelation");
    }

    #[test]
    fn test_probe_accepts_both_engines() {
        let estimate = probe(&AutocorrelationEngine::default()).unwrap();
        assert!((estimate - 200.0).abs() < 2.0);
        let estimate = probe(&McLeodEngine).unwrap();
        assert!((estimate - 200.0).abs() < 10.0);
    }
}
