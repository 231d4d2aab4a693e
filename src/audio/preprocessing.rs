//! # Audio Preprocessing
//!
//! Removes breathing noise, handling rumble and DC drift below the voice band
//! before any pitch or perturbation analysis.
//!
//! The filter is a 3rd-order Butterworth high-pass built from two sections:
//!
//! 1. **2nd-order section** - `biquad` high-pass with Q = 1.0 (the complex pole
//!    pair of a 3rd-order Butterworth)
//! 2. **1st-order section** - bilinear-transform single-pole high-pass
//!
//! Both sections run forward and then backward over the buffer (filtfilt),
//! so the output has zero phase shift. Glottal period boundaries therefore
//! stay where they were in the recording.

use anyhow::Result;
use biquad::{Biquad, Coefficients, DirectForm2Transposed, ToHertz, Type};
use tracing::debug;

/// Q of the complex pole pair in a 3rd-order Butterworth filter
const BUTTERWORTH_ORDER3_Q: f32 = 1.0;

/// Odd-extension padding applied at both ends before filtfilt
const EDGE_PADDING: usize = 12;

/// Single-pole high-pass from the bilinear transform.
///
/// Implements: y[n] = b0 * (x[n] - x[n-1]) - a1 * y[n-1]
#[derive(Debug, Clone, Copy)]
struct FirstOrderHighPass {
    b0: f32,
    a1: f32,
    x_prev: f32,
    y_prev: f32,
}

impl FirstOrderHighPass {
    fn new(sample_rate: u32, cutoff_hz: f32) -> Self {
        let k = (std::f32::consts::PI * cutoff_hz / sample_rate as f32).tan();
        Self {
            b0: 1.0 / (1.0 + k),
            a1: (k - 1.0) / (k + 1.0),
            x_prev: 0.0,
            y_prev: 0.0,
        }
    }

    #[inline]
    fn process_sample(&mut self, x: f32) -> f32 {
        let y = self.b0 * (x - self.x_prev) - self.a1 * self.y_prev;
        self.x_prev = x;
        self.y_prev = y;
        y
    }
}

/// Zero-phase 3rd-order Butterworth high-pass filter.
///
/// Holds only coefficients; every call to [`HighPassFilter::filtfilt`] starts
/// from fresh filter state, so one filter can be shared between analyses.
#[derive(Debug, Clone)]
pub struct HighPassFilter {
    second_order: Coefficients<f32>,
    sample_rate: u32,
    cutoff_hz: u32,
}

impl HighPassFilter {
    /// Default cutoff frequency in Hz (just below the lowest adult F0)
    pub const DEFAULT_CUTOFF_HZ: u32 = 80;

    /// Create a new high-pass filter.
    ///
    /// # Errors
    /// Returns an error if the cutoff is not below Nyquist.
    pub fn new(sample_rate: u32, cutoff_hz: u32) -> Result<Self> {
        if cutoff_hz == 0 || cutoff_hz as f32 >= sample_rate as f32 / 2.0 {
            anyhow::bail!(
                "High-pass cutoff {}Hz must be between 0 and Nyquist ({}Hz)",
                cutoff_hz,
                sample_rate / 2
            );
        }

        let second_order = Coefficients::<f32>::from_params(
            Type::HighPass,
            sample_rate.hz(),
            cutoff_hz.hz(),
            BUTTERWORTH_ORDER3_Q,
        )
        .map_err(|e| anyhow::anyhow!("Failed to create high-pass filter coefficients: {:?}", e))?;

        debug!(
            "High-pass filter initialized: {}Hz sample rate, {}Hz cutoff, order 3 zero-phase",
            sample_rate, cutoff_hz
        );

        Ok(Self {
            second_order,
            sample_rate,
            cutoff_hz,
        })
    }

    /// Get the cutoff frequency.
    pub fn cutoff_hz(&self) -> u32 {
        self.cutoff_hz
    }

    /// Run both sections once over `samples` in place, from fresh state.
    fn run_forward(&self, samples: &mut [f32]) {
        let mut biquad = DirectForm2Transposed::<f32>::new(self.second_order);
        let mut first = FirstOrderHighPass::new(self.sample_rate, self.cutoff_hz as f32);
        for sample in samples.iter_mut() {
            *sample = first.process_sample(biquad.run(*sample));
        }
    }

    /// Filter forward and backward, returning a zero-phase copy.
    pub fn filtfilt(&self, samples: &[f32]) -> Vec<f32> {
        if samples.is_empty() {
            return Vec::new();
        }

        let pad = EDGE_PADDING.min(samples.len() - 1);
        let mut padded = odd_extend(samples, pad);

        self.run_forward(&mut padded);
        padded.reverse();
        self.run_forward(&mut padded);
        padded.reverse();

        padded[pad..pad + samples.len()].to_vec()
    }
}

/// Reflect the signal around its end points (point symmetry) by `pad` samples.
fn odd_extend(samples: &[f32], pad: usize) -> Vec<f32> {
    let n = samples.len();
    let first = samples[0];
    let last = samples[n - 1];

    let mut out = Vec::with_capacity(n + 2 * pad);
    out.extend((1..=pad).rev().map(|i| 2.0 * first - samples[i]));
    out.extend_from_slice(samples);
    out.extend((1..=pad).map(|i| 2.0 * last - samples[n - 1 - i]));
    out
}

/// Apply the zero-phase high-pass to a whole recording.
pub fn denoise(samples: &[f32], sample_rate: u32, cutoff_hz: u32) -> Result<Vec<f32>> {
    let filter = HighPassFilter::new(sample_rate, cutoff_hz)?;
    Ok(filter.filtfilt(samples))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn calculate_rms(samples: &[f32]) -> f32 {
        if samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f32 = samples.iter().map(|x| x * x).sum();
        (sum_sq / samples.len() as f32).sqrt()
    }

    fn generate_sine(freq_hz: f32, sample_rate: u32, duration_samples: usize, amplitude: f32) -> Vec<f32> {
        (0..duration_samples)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amplitude * (2.0 * std::f32::consts::PI * freq_hz * t).sin()
            })
            .collect()
    }

    #[test]
    fn test_filter_creation() {
        let filter = HighPassFilter::new(16000, 80).unwrap();
        assert_eq!(filter.cutoff_hz(), 80);
    }

    #[test]
    fn test_cutoff_above_nyquist_rejected() {
        assert!(HighPassFilter::new(16000, 8000).is_err());
        assert!(HighPassFilter::new(16000, 0).is_err());
    }

    #[test]
    fn test_removes_dc_offset() {
        let samples: Vec<f32> = generate_sine(300.0, 16000, 16000, 0.3)
            .into_iter()
            .map(|s| s + 0.4)
            .collect();
        let filtered = denoise(&samples, 16000, 80).unwrap();

        let mean = filtered[2000..14000].iter().sum::<f32>() / 12000.0;
        assert!(mean.abs() < 0.01, "DC should be removed, mean = {}", mean);
    }

    #[test]
    fn test_attenuates_low_frequencies() {
        let low = generate_sine(30.0, 16000, 16000, 0.5);
        let high = generate_sine(500.0, 16000, 16000, 0.5);

        let low_out = denoise(&low, 16000, 80).unwrap();
        let high_out = denoise(&high, 16000, 80).unwrap();

        let low_ratio = calculate_rms(&low_out[4000..12000]) / calculate_rms(&low[4000..12000]);
        let high_ratio = calculate_rms(&high_out[4000..12000]) / calculate_rms(&high[4000..12000]);

        assert!(low_ratio < 0.1, "30Hz should be attenuated, ratio: {}", low_ratio);
        assert!(high_ratio > 0.95, "500Hz should pass through, ratio: {}", high_ratio);
    }

    #[test]
    fn test_zero_phase() {
        // A passband tone must come out aligned with the input, not delayed
        let input = generate_sine(400.0, 16000, 8000, 0.5);
        let output = denoise(&input, 16000, 80).unwrap();

        let max_err = input[1000..7000]
            .iter()
            .zip(&output[1000..7000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0f32, f32::max);
        assert!(max_err < 0.02, "zero-phase output drifted by {}", max_err);
    }

    #[test]
    fn test_length_preserved_and_empty_input() {
        let filter = HighPassFilter::new(16000, 80).unwrap();
        assert_eq!(filter.filtfilt(&[0.1; 5]).len(), 5);
        assert_eq!(filter.filtfilt(&[0.3]).len(), 1);
        assert!(filter.filtfilt(&[]).is_empty());
    }

    #[test]
    fn test_odd_extend() {
        let extended = odd_extend(&[1.0, 2.0, 4.0], 2);
        assert_eq!(extended, vec![-2.0, 0.0, 1.0, 2.0, 4.0, 6.0, 7.0]);
    }

    proptest! {
        #[test]
        fn prop_filter_produces_finite_output(
            samples in proptest::collection::vec(-1.0f32..1.0, 1..2000)
        ) {
            let output = denoise(&samples, 16000, 80).unwrap();
            prop_assert_eq!(output.len(), samples.len());
            for sample in &output {
                prop_assert!(sample.is_finite());
                prop_assert!(sample.abs() < 10.0);
            }
        }

        #[test]
        fn prop_passband_energy_preserved(
            freq in 300.0f32..4000.0,
            amplitude in 0.1f32..0.9
        ) {
            let signal = generate_sine(freq, 16000, 4800, amplitude);
            let output = denoise(&signal, 16000, 80).unwrap();
            let ratio = calculate_rms(&output[1600..3200]) / calculate_rms(&signal[1600..3200]);
            prop_assert!(ratio > 0.9, "Frequency {}Hz should pass through, ratio: {}", freq, ratio);
        }
    }
}
