use anyhow::{Context, Result};
use rubato::{FftFixedIn, Resampler};
use tracing::debug;

use super::DecodeError;

/// Sample rate every analysis runs at
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Input chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Mono resampler from a file's native rate to 16kHz
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    input_frames: usize,
}

impl AudioResampler {
    /// Create a new resampler from `source_sample_rate` to 16kHz
    pub fn new(source_sample_rate: u32) -> Result<Self> {
        let ratio = TARGET_SAMPLE_RATE as f64 / source_sample_rate as f64;

        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_sample_rate, TARGET_SAMPLE_RATE, ratio
        );

        let channels = 1;
        let resampler = FftFixedIn::new(
            source_sample_rate as usize,
            TARGET_SAMPLE_RATE as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            channels,
        )
        .context("Failed to create resampler")?;

        let input_buffer = vec![vec![0.0f32; CHUNK_FRAMES]; channels];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            input_frames: CHUNK_FRAMES,
        })
    }

    /// Number of input frames needed for the next process call
    pub fn input_frames_next(&self) -> usize {
        self.input_frames
    }

    /// Output frames the resampler holds back before the first real sample
    pub fn output_delay(&self) -> usize {
        self.resampler.output_delay()
    }

    /// Resample exactly `input_frames_next()` samples.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.len() != self.input_frames {
            anyhow::bail!(
                "Input length {} doesn't match expected {}",
                input.len(),
                self.input_frames
            );
        }

        self.input_buffer[0].copy_from_slice(input);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .context("Resampling failed")?;

        Ok(self.output_buffer[0][..output_frames].to_vec())
    }

    /// Resample a whole recording, compensating for the resampler delay so the
    /// output lines up with the input and has `ceil(len * ratio)` samples.
    pub fn process_all(&mut self, samples: &[f32], source_sample_rate: u32) -> Result<Vec<f32>> {
        let expected =
            (samples.len() as f64 * TARGET_SAMPLE_RATE as f64 / source_sample_rate as f64).ceil() as usize;
        let delay = self.output_delay();

        let mut output = Vec::with_capacity(expected + delay + self.input_frames);
        let mut chunk = vec![0.0f32; self.input_frames];

        for block in samples.chunks(self.input_frames) {
            chunk[..block.len()].copy_from_slice(block);
            chunk[block.len()..].fill(0.0);
            output.extend(self.process(&chunk)?);
        }

        // Flush the delay line with silence
        chunk.fill(0.0);
        while output.len() < expected + delay {
            output.extend(self.process(&chunk)?);
        }

        let mut aligned: Vec<f32> = output.into_iter().skip(delay).collect();
        aligned.truncate(expected);
        Ok(aligned)
    }
}

/// Resample a mono buffer to 16kHz. Buffers already at 16kHz pass through.
pub fn resample_to_target(samples: Vec<f32>, source_sample_rate: u32) -> Result<Vec<f32>, DecodeError> {
    if source_sample_rate == TARGET_SAMPLE_RATE || samples.is_empty() {
        return Ok(samples);
    }
    if source_sample_rate == 0 {
        return Err(DecodeError::Unsupported("sample rate of 0 Hz".to_string()));
    }

    let mut resampler =
        AudioResampler::new(source_sample_rate).map_err(|e| DecodeError::Resample(format!("{:#}", e)))?;
    resampler
        .process_all(&samples, source_sample_rate)
        .map_err(|e| DecodeError::Resample(format!("{:#}", e)))
}
