//! Fallback engine built on the McLeod pitch method.
//!
//! Uses the normalized square difference function from `pitch-detection`
//! on 64ms frames at the shared 10ms step. Intensity is the plain mean
//! square of each frame in dB. No harmonicity estimate is offered, so the
//! extractor relies on its own autocorrelation HNR.

use pitch_detection::detector::mcleod::McLeodDetector;
use pitch_detection::detector::PitchDetector;

use super::{intensity_contour_with, AnalysisEngine, Contour, EngineError, TIME_STEP_SEC};

/// Frame size for pitch detection (~64ms at 16kHz)
const FRAME_SIZE: usize = 1024;

/// Zero padding used by the detector's FFT
const PADDING: usize = FRAME_SIZE / 2;

/// Minimum pitch in Hz
const MIN_PITCH: f32 = 50.0;

/// Maximum pitch in Hz
const MAX_PITCH: f32 = 600.0;

/// Power threshold for pitch detection
const POWER_THRESHOLD: f32 = 0.8;

/// Clarity threshold for pitch detection
const CLARITY_THRESHOLD: f32 = 0.5;

/// Intensity frame length in seconds
const INTENSITY_WINDOW_SEC: f64 = 0.04;

#[derive(Debug, Clone, Copy, Default)]
pub struct McLeodEngine;

impl AnalysisEngine for McLeodEngine {
    fn name(&self) -> &'static str {
        "mcleod"
    }

    fn pitch_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError> {
        if samples.len() < FRAME_SIZE {
            return Err(EngineError::TooShort {
                needed: FRAME_SIZE,
                got: samples.len(),
            });
        }

        let hop = (TIME_STEP_SEC * sample_rate as f64).round() as usize;
        let mut detector = McLeodDetector::new(FRAME_SIZE, PADDING);
        let mut times = Vec::new();
        let mut values = Vec::new();

        let mut start = 0;
        while start + FRAME_SIZE <= samples.len() {
            let frame = &samples[start..start + FRAME_SIZE];
            times.push((start as f64 + FRAME_SIZE as f64 / 2.0) / sample_rate as f64);

            let f0 = detector
                .get_pitch(frame, sample_rate as usize, POWER_THRESHOLD, CLARITY_THRESHOLD)
                .map(|pitch| pitch.frequency)
                .filter(|f| f.is_finite() && *f >= MIN_PITCH && *f <= MAX_PITCH)
                .map_or(0.0, |f| f as f64);
            values.push(f0);

            start += hop;
        }

        Ok(Contour::new(times, values))
    }

    fn intensity_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError> {
        if samples.is_empty() {
            return Err(EngineError::TooShort { needed: 1, got: 0 });
        }
        let window_len = (INTENSITY_WINDOW_SEC * sample_rate as f64).round() as usize;
        let rectangular = vec![1.0; window_len];
        Ok(intensity_contour_with(samples, sample_rate, &rectangular))
    }
}
