//! Short-time spectrum: centroid, roll-off, high-frequency turbulence and
//! the dB spectrogram kept as an intermediate artifact.

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;

use super::engine::hann;

/// STFT frame length
pub const N_FFT: usize = 2048;

/// STFT hop
pub const HOP: usize = 512;

/// Fraction of spectral magnitude below the roll-off frequency
const ROLLOFF_FRACTION: f64 = 0.85;

/// Energy above this frequency counts as turbulent (breathy) noise
const TURBULENCE_CUTOFF_HZ: f64 = 3000.0;

/// Spectrogram floor relative to its maximum
pub const SPECTROGRAM_FLOOR_DB: f32 = -80.0;

/// Magnitude spectra of overlapping frames.
#[derive(Debug, Clone)]
pub struct Stft {
    pub sample_rate: u32,
    /// One `N_FFT / 2 + 1` bin magnitude spectrum per frame
    pub frames: Vec<Vec<f64>>,
}

impl Stft {
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / N_FFT as f64
    }

    pub fn n_bins(&self) -> usize {
        N_FFT / 2 + 1
    }
}

/// Hann-windowed STFT. Inputs shorter than one frame are zero-padded.
pub fn stft(samples: &[f32], sample_rate: u32) -> Stft {
    if samples.is_empty() {
        return Stft {
            sample_rate,
            frames: Vec::new(),
        };
    }

    let window = hann(N_FFT);
    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let mut buffer = vec![Complex::new(0.0, 0.0); N_FFT];

    let n_frames = crate::audio::segmentation::frame_count(samples.len(), N_FFT, HOP);
    let mut frames = Vec::with_capacity(n_frames);

    for k in 0..n_frames {
        let start = k * HOP;
        let end = (start + N_FFT).min(samples.len());
        for (i, slot) in buffer.iter_mut().enumerate() {
            let s = if start + i < end { samples[start + i] as f64 } else { 0.0 };
            *slot = Complex::new(s * window[i], 0.0);
        }
        fft.process(&mut buffer);
        frames.push(buffer[..=N_FFT / 2].iter().map(|c| c.norm()).collect());
    }

    Stft { sample_rate, frames }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralStats {
    pub centroid_hz: f64,
    pub rolloff_hz: f64,
    /// Mean magnitude above 3 kHz over mean magnitude overall
    pub turbulence_ratio: f64,
}

/// Frame-averaged spectral descriptors; `None` when every frame is silent.
pub fn spectral_stats(stft: &Stft) -> Option<SpectralStats> {
    let mut centroids = Vec::new();
    let mut rolloffs = Vec::new();
    let mut high_sum = 0.0;
    let mut high_count = 0usize;
    let mut total_sum = 0.0;
    let mut total_count = 0usize;

    for frame in &stft.frames {
        let energy: f64 = frame.iter().sum();
        total_sum += energy;
        total_count += frame.len();
        for (bin, &mag) in frame.iter().enumerate() {
            if stft.bin_frequency(bin) > TURBULENCE_CUTOFF_HZ {
                high_sum += mag;
                high_count += 1;
            }
        }

        if energy <= 0.0 {
            continue;
        }

        let weighted: f64 = frame
            .iter()
            .enumerate()
            .map(|(bin, &mag)| stft.bin_frequency(bin) * mag)
            .sum();
        centroids.push(weighted / energy);

        let target = ROLLOFF_FRACTION * energy;
        let mut cumulative = 0.0;
        let rolloff_bin = frame
            .iter()
            .position(|&mag| {
                cumulative += mag;
                cumulative >= target
            })
            .unwrap_or(frame.len() - 1);
        rolloffs.push(stft.bin_frequency(rolloff_bin));
    }

    if centroids.is_empty() || total_count == 0 || high_count == 0 {
        return None;
    }

    let total_mean = total_sum / total_count as f64;
    let high_mean = high_sum / high_count as f64;
    Some(SpectralStats {
        centroid_hz: super::stats::mean(&centroids),
        rolloff_hz: super::stats::mean(&rolloffs),
        turbulence_ratio: high_mean / (total_mean + 1e-10),
    })
}

/// Log-magnitude spectrogram for visualisation by an outer layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Spectrogram {
    /// Frame start times in seconds
    pub times: Vec<f64>,
    /// Bin centre frequencies in Hz
    pub frequencies: Vec<f64>,
    /// `[frame][bin]` magnitude in dB relative to the loudest bin, floored
    pub db: Vec<Vec<f32>>,
}

pub fn spectrogram(samples: &[f32], sample_rate: u32) -> Spectrogram {
    let stft = stft(samples, sample_rate);
    let peak = stft
        .frames
        .iter()
        .flat_map(|f| f.iter().copied())
        .fold(0.0f64, f64::max);

    let db = stft
        .frames
        .iter()
        .map(|frame| {
            frame
                .iter()
                .map(|&mag| {
                    if peak > 0.0 && mag > 0.0 {
                        ((20.0 * (mag / peak).log10()) as f32).max(SPECTROGRAM_FLOOR_DB)
                    } else {
                        SPECTROGRAM_FLOOR_DB
                    }
                })
                .collect()
        })
        .collect();

    Spectrogram {
        times: (0..stft.frames.len())
            .map(|k| (k * HOP) as f64 / sample_rate as f64)
            .collect(),
        frequencies: (0..stft.n_bins()).map(|b| stft.bin_frequency(b)).collect(),
        db,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SR: u32 = 16000;

    fn sine(freq: f32, duration_sec: f32) -> Vec<f32> {
        let n = (SR as f32 * duration_sec) as usize;
        (0..n).map(|i| (2.0 * PI * freq * i as f32 / SR as f32).sin() * 0.5).collect()
    }

    #[test]
    fn test_stft_shape() {
        let stft = stft(&sine(440.0, 1.0), SR);
        assert_eq!(stft.frames.len(), 1 + (16000 - N_FFT) / HOP);
        assert!(stft.frames.iter().all(|f| f.len() == N_FFT / 2 + 1));
    }

    #[test]
    fn test_centroid_and_rolloff_of_pure_tone() {
        let stats = spectral_stats(&stft(&sine(1000.0, 1.0), SR)).unwrap();
        assert!((stats.centroid_hz - 1000.0).abs() < 50.0, "centroid {}", stats.centroid_hz);
        assert!((stats.rolloff_hz - 1000.0).abs() < 20.0, "rolloff {}", stats.rolloff_hz);
        assert!(stats.turbulence_ratio < 0.05);
    }

    #[test]
    fn test_high_tone_is_turbulent() {
        let low = spectral_stats(&stft(&sine(500.0, 1.0), SR)).unwrap();
        let high = spectral_stats(&stft(&sine(5000.0, 1.0), SR)).unwrap();
        assert!(high.turbulence_ratio > 10.0 * low.turbulence_ratio);
    }

    #[test]
    fn test_silence_has_no_stats() {
        assert!(spectral_stats(&stft(&vec![0.0; 8000], SR)).is_none());
        assert!(spectral_stats(&stft(&[], SR)).is_none());
    }

    #[test]
    fn test_spectrogram_is_relative_and_floored() {
        let spec = spectrogram(&sine(440.0, 0.5), SR);
        let max = spec.db.iter().flatten().copied().fold(f32::MIN, f32::max);
        let min = spec.db.iter().flatten().copied().fold(f32::MAX, f32::min);
        assert!(max.abs() < 1e-4);
        assert!(min >= SPECTROGRAM_FLOOR_DB);
        assert_eq!(spec.frequencies.len(), N_FFT / 2 + 1);
        assert_eq!(spec.times.len(), spec.db.len());
    }

    #[test]
    fn test_short_clip_is_one_padded_frame() {
        let stft = stft(&sine(300.0, 0.05), SR);
        assert_eq!(stft.frames.len(), 1);
    }
}
