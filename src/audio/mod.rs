//! Audio ingestion and segmentation.
//!
//! Decodes a recording to mono 16 kHz, removes low-frequency drift and splits
//! it into utterances separated by silence.

pub mod decoder;
pub mod preprocessing;
pub mod resampler;
pub mod segmentation;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use decoder::{load, load_bytes};
pub use preprocessing::{denoise, HighPassFilter};
pub use resampler::{resample_to_target, AudioResampler, TARGET_SAMPLE_RATE};
pub use segmentation::{segment, FRAME_HOP_SEC, FRAME_WINDOW_SEC};

/// Errors that can occur while decoding a recording
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Failed to read audio: {0}")]
    Io(#[from] std::io::Error),

    #[error("Unsupported or malformed audio: {0}")]
    Unsupported(String),

    #[error("No audio track found")]
    NoAudioTrack,

    #[error("Audio contains no samples")]
    Empty,

    #[error("Resampling failed: {0}")]
    Resample(String),
}

/// Mono samples at a fixed sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSequence {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl SampleSequence {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_sec(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Peak absolute amplitude.
    pub fn peak(&self) -> f32 {
        peak_abs(&self.samples)
    }
}

/// A contiguous utterance within a [`SampleSequence`], as sample offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First sample (inclusive)
    pub start: usize,
    /// Last sample (exclusive)
    pub end: usize,
}

impl Segment {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration_sec(&self, sample_rate: u32) -> f64 {
        self.len() as f64 / sample_rate as f64
    }

    pub fn start_sec(&self, sample_rate: u32) -> f64 {
        self.start as f64 / sample_rate as f64
    }

    pub fn end_sec(&self, sample_rate: u32) -> f64 {
        self.end as f64 / sample_rate as f64
    }

    /// Borrow the segment's samples out of the full signal.
    pub fn slice<'a>(&self, samples: &'a [f32]) -> &'a [f32] {
        let end = self.end.min(samples.len());
        let start = self.start.min(end);
        &samples[start..end]
    }
}

/// Peak absolute amplitude of a buffer.
pub fn peak_abs(samples: &[f32]) -> f32 {
    samples.iter().fold(0.0f32, |acc, &s| acc.max(s.abs()))
}

/// Scale a buffer so its peak absolute amplitude is (just under) 1.0.
pub fn normalize_peak(samples: &[f32]) -> Vec<f32> {
    let peak = peak_abs(samples);
    let scale = 1.0 / (peak + 1e-10);
    samples.iter().map(|&s| s * scale).collect()
}
