//! Autocorrelation pitch tracker.
//!
//! ## Algorithm (per 10ms frame)
//! 1. Take a window of 3 periods of the pitch floor, remove its mean
//! 2. Apply a Hann window and compute the autocorrelation via FFT
//! 3. Divide by the autocorrelation of the window itself, which undoes the
//!    taper so a perfectly periodic frame scores 1.0 at its period
//! 4. Take local maxima between the ceiling and floor lags, refine them with
//!    parabolic interpolation and penalise long lags with an octave cost
//! 5. Compare the best candidate against an unvoiced strength that rises for
//!    quiet frames; the winner decides voiced F0 or 0.0

use std::sync::Arc;

use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use super::{hann, intensity_contour_with, AnalysisEngine, Contour, EngineError, TIME_STEP_SEC};

/// Pitch floor in Hz
const PITCH_FLOOR_HZ: f64 = 75.0;

/// Pitch ceiling in Hz
const PITCH_CEILING_HZ: f64 = 600.0;

/// Analysis window length in periods of the pitch floor
const PERIODS_PER_WINDOW: f64 = 3.0;

/// Intensity window length in periods of the pitch floor
const INTENSITY_PERIODS_PER_WINDOW: f64 = 3.2;

/// Minimum normalized correlation for a voiced frame
const VOICING_THRESHOLD: f64 = 0.45;

/// Frames quieter than this fraction of the global peak tend toward unvoiced
const SILENCE_THRESHOLD: f64 = 0.03;

/// Preference for higher pitch candidates, per octave
const OCTAVE_COST: f64 = 0.01;

/// Search range, in samples, around one period for the cross-correlation HNR
const HARMONICITY_LAG_SLACK: usize = 2;

/// Largest correlation used when converting to dB
const MAX_CORRELATION: f64 = 0.999_999;

/// FFT-based autocorrelation with reusable plans and scratch buffer.
pub(crate) struct Autocorrelator {
    fft: Arc<dyn Fft<f64>>,
    ifft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
}

impl Autocorrelator {
    /// Plans an FFT large enough for linear (not circular) correlation of
    /// signals up to `max_len` samples.
    pub(crate) fn new(max_len: usize) -> Self {
        let fft_len = (2 * max_len).next_power_of_two();
        let mut planner = FftPlanner::new();
        Self {
            fft: planner.plan_fft_forward(fft_len),
            ifft: planner.plan_fft_inverse(fft_len),
            buffer: vec![Complex::new(0.0, 0.0); fft_len],
        }
    }

    /// `r[tau] = sum_n x[n] * x[n + tau]` for `tau` in `0..signal.len()`.
    pub(crate) fn compute(&mut self, signal: &[f64]) -> Vec<f64> {
        let fft_len = self.buffer.len();
        let n = signal.len().min(fft_len / 2);

        for (slot, &x) in self.buffer.iter_mut().zip(signal.iter().take(n)) {
            *slot = Complex::new(x, 0.0);
        }
        self.buffer[n..].fill(Complex::new(0.0, 0.0));

        self.fft.process(&mut self.buffer);
        for c in self.buffer.iter_mut() {
            *c = Complex::new(c.norm_sqr(), 0.0);
        }
        self.ifft.process(&mut self.buffer);

        let scale = 1.0 / fft_len as f64;
        self.buffer[..n].iter().map(|c| c.re * scale).collect()
    }
}

/// Primary engine: windowed autocorrelation pitch, weighted intensity and
/// cross-correlation harmonicity.
#[derive(Debug, Clone, Copy)]
pub struct AutocorrelationEngine {
    pub pitch_floor_hz: f64,
    pub pitch_ceiling_hz: f64,
    pub voicing_threshold: f64,
    pub silence_threshold: f64,
    pub octave_cost: f64,
}

impl Default for AutocorrelationEngine {
    fn default() -> Self {
        Self {
            pitch_floor_hz: PITCH_FLOOR_HZ,
            pitch_ceiling_hz: PITCH_CEILING_HZ,
            voicing_threshold: VOICING_THRESHOLD,
            silence_threshold: SILENCE_THRESHOLD,
            octave_cost: OCTAVE_COST,
        }
    }
}

/// Best pitch candidate of one frame.
#[derive(Debug, Clone, Copy)]
struct Candidate {
    lag: f64,
    correlation: f64,
    strength: f64,
}

impl AutocorrelationEngine {
    /// Pitch analysis window in samples.
    pub fn window_len(&self, sample_rate: u32) -> usize {
        (PERIODS_PER_WINDOW / self.pitch_floor_hz * sample_rate as f64).round() as usize
    }

    fn best_candidate(&self, r: &[f64], min_lag: usize, max_lag: usize, sample_rate: f64) -> Option<Candidate> {
        let mut best: Option<Candidate> = None;

        for tau in min_lag.max(1)..=max_lag {
            if tau + 1 >= r.len() {
                break;
            }
            let (prev, here, next) = (r[tau - 1], r[tau], r[tau + 1]);
            if !(here > prev && here >= next) || here <= 0.0 {
                continue;
            }

            let curvature = prev - 2.0 * here + next;
            let (lag, mut correlation) = if curvature < 0.0 {
                let offset = 0.5 * (prev - next) / curvature;
                (tau as f64 + offset, here - 0.25 * (prev - next) * offset)
            } else {
                (tau as f64, here)
            };
            if correlation > 1.0 {
                correlation = 1.0 / correlation;
            }

            let strength =
                correlation - self.octave_cost * (self.pitch_floor_hz * lag / sample_rate).log2();
            if best.map_or(true, |b| strength > b.strength) {
                best = Some(Candidate {
                    lag,
                    correlation,
                    strength,
                });
            }
        }

        best
    }
}

impl AnalysisEngine for AutocorrelationEngine {
    fn name(&self) -> &'static str {
        "autocorrelation"
    }

    fn pitch_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError> {
        if !(self.pitch_floor_hz > 0.0 && self.pitch_ceiling_hz > self.pitch_floor_hz) {
            return Err(EngineError::Unavailable(format!(
                "invalid pitch range {}-{} Hz",
                self.pitch_floor_hz, self.pitch_ceiling_hz
            )));
        }

        let window_len = self.window_len(sample_rate);
        if samples.len() < window_len {
            return Err(EngineError::TooShort {
                needed: window_len,
                got: samples.len(),
            });
        }

        let sr = sample_rate as f64;
        let step = (TIME_STEP_SEC * sr).round() as usize;
        let min_lag = (sr / self.pitch_ceiling_hz).floor() as usize;
        let max_lag = ((sr / self.pitch_floor_hz).ceil() as usize).min(window_len.saturating_sub(2));

        let global_peak = samples.iter().fold(0.0f64, |acc, &s| acc.max((s as f64).abs()));

        let window = hann(window_len);
        let mut autocorrelator = Autocorrelator::new(window_len);
        let window_ac = autocorrelator.compute(&window);
        let window_energy = window_ac[0];

        let n_frames = crate::audio::segmentation::frame_count(samples.len(), window_len, step);
        let mut times = Vec::with_capacity(n_frames);
        let mut values = Vec::with_capacity(n_frames);
        let mut windowed = vec![0.0f64; window_len];

        for k in 0..n_frames {
            let start = k * step;
            let frame = &samples[start..start + window_len];
            times.push((start as f64 + window_len as f64 / 2.0) / sr);

            let mean = frame.iter().map(|&s| s as f64).sum::<f64>() / window_len as f64;
            let local_peak = frame
                .iter()
                .fold(0.0f64, |acc, &s| acc.max((s as f64 - mean).abs()));

            for ((w, &s), &h) in windowed.iter_mut().zip(frame).zip(&window) {
                *w = (s as f64 - mean) * h;
            }
            let ac = autocorrelator.compute(&windowed);
            if global_peak <= 0.0 || ac[0] <= 0.0 {
                values.push(0.0);
                continue;
            }

            let normalized: Vec<f64> = ac
                .iter()
                .zip(&window_ac)
                .take(max_lag + 2)
                .map(|(&a, &w)| {
                    let w = w / window_energy;
                    if w > 1e-9 {
                        (a / ac[0]) / w
                    } else {
                        0.0
                    }
                })
                .collect();

            let unvoiced_strength = self.voicing_threshold
                + (2.0 - (local_peak / global_peak) / (self.silence_threshold / (1.0 + self.voicing_threshold)))
                    .max(0.0);

            let f0 = match self.best_candidate(&normalized, min_lag, max_lag, sr) {
                Some(c) if c.strength > unvoiced_strength && c.correlation >= self.voicing_threshold => {
                    let f0 = sr / c.lag;
                    if f0 >= self.pitch_floor_hz && f0 <= self.pitch_ceiling_hz {
                        f0
                    } else {
                        0.0
                    }
                }
                _ => 0.0,
            };
            values.push(f0);
        }

        Ok(Contour::new(times, values))
    }

    fn intensity_contour(&self, samples: &[f32], sample_rate: u32) -> Result<Contour, EngineError> {
        if samples.is_empty() {
            return Err(EngineError::TooShort { needed: 1, got: 0 });
        }
        let window_len =
            (INTENSITY_PERIODS_PER_WINDOW / self.pitch_floor_hz * sample_rate as f64).round() as usize;
        Ok(intensity_contour_with(samples, sample_rate, &hann(window_len)))
    }

    /// Normalized cross-correlation between consecutive periods around each
    /// voiced frame, converted to dB and averaged.
    fn harmonicity_db(&self, samples: &[f32], sample_rate: u32, pitch: &Contour) -> Option<f64> {
        let sr = sample_rate as f64;
        let mut values = Vec::new();

        for (time, f0) in pitch.voiced_frames() {
            let period = (sr / f0).round() as usize;
            let center = (time * sr).round() as usize;
            if period < 2 || center < period || center + period + HARMONICITY_LAG_SLACK > samples.len() {
                continue;
            }

            let first = &samples[center - period..center];
            let first_energy: f64 = first.iter().map(|&s| (s as f64).powi(2)).sum();
            if first_energy <= 1e-12 {
                continue;
            }

            let best = (period.saturating_sub(HARMONICITY_LAG_SLACK).max(1)..=period + HARMONICITY_LAG_SLACK)
                .filter_map(|lag| {
                    let second = &samples[center - period + lag..center + lag];
                    let second_energy: f64 = second.iter().map(|&s| (s as f64).powi(2)).sum();
                    if second_energy <= 1e-12 {
                        return None;
                    }
                    let cross: f64 = first
                        .iter()
                        .zip(second)
                        .map(|(&a, &b)| a as f64 * b as f64)
                        .sum();
                    Some(cross / (first_energy * second_energy).sqrt())
                })
                .fold(f64::NEG_INFINITY, f64::max);

            if best.is_finite() && best > 0.0 {
                let r = best.min(MAX_CORRELATION);
                values.push(10.0 * (r / (1.0 - r)).log10());
            }
        }

        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }
}
