//! Formant estimation by linear prediction.
//!
//! ## Algorithm
//! 1. Split into 25ms Hamming-windowed frames; skip frames quieter than 10%
//!    of the loudest frame
//! 2. Fit an all-pole model of order `2 + sample_rate / 1000` with the
//!    autocorrelation method (Levinson-Durbin)
//! 3. Find the roots of the prediction polynomial (Durand-Kerner)
//! 4. Keep upper-half-plane roots between 90 Hz and Nyquist whose bandwidth
//!    is below 400 Hz; the two lowest are F1 and F2
//! 5. Aggregate per-frame values with the median, so an isolated spurious
//!    root in a few frames does not drag the estimate

use rustfft::num_complex::Complex;

use super::stats::median;
use crate::audio::segmentation::{frame_count, frame_geometry};

const MIN_FORMANT_HZ: f64 = 90.0;
const MAX_BANDWIDTH_HZ: f64 = 400.0;

/// Frames below this fraction of the loudest frame's energy are skipped
const MIN_RELATIVE_ENERGY: f64 = 0.1;

const ROOT_ITERATIONS: usize = 500;
const ROOT_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Formants {
    pub f1_hz: f64,
    pub f2_hz: f64,
}

/// Prediction order rule of thumb: two poles per kHz plus two.
pub fn lpc_order(sample_rate: u32) -> usize {
    2 + (sample_rate / 1000) as usize
}

/// Levinson-Durbin recursion. Returns `[1, a1, ..., a_order]` for
/// `A(z) = 1 + a1 z^-1 + ...`, or `None` for a degenerate autocorrelation.
pub fn levinson_durbin(r: &[f64], order: usize) -> Option<Vec<f64>> {
    if r.len() <= order || r[0] <= 0.0 {
        return None;
    }

    let mut a = vec![0.0; order + 1];
    a[0] = 1.0;
    let mut error = r[0];

    for i in 1..=order {
        let acc: f64 = r[i] + (1..i).map(|j| a[j] * r[i - j]).sum::<f64>();
        let k = -acc / error;

        let previous = a.clone();
        for j in 1..i {
            a[j] = previous[j] + k * previous[i - j];
        }
        a[i] = k;

        error *= 1.0 - k * k;
        if error <= 0.0 {
            return None;
        }
    }

    Some(a)
}

/// Roots of the monic polynomial `z^n + c[1] z^(n-1) + ... + c[n]`
/// (`coeffs[0]` must be 1).
pub fn polynomial_roots(coeffs: &[f64]) -> Vec<Complex<f64>> {
    let degree = coeffs.len().saturating_sub(1);
    if degree == 0 {
        return Vec::new();
    }

    let seed = Complex::new(0.4, 0.9);
    let mut roots: Vec<Complex<f64>> = (0..degree).map(|k| seed.powu(k as u32)).collect();

    for _ in 0..ROOT_ITERATIONS {
        let mut max_step = 0.0f64;
        for i in 0..degree {
            let z = roots[i];
            let value = coeffs
                .iter()
                .fold(Complex::new(0.0, 0.0), |acc, &c| acc * z + c);
            let denominator = roots
                .iter()
                .enumerate()
                .filter(|(j, _)| *j != i)
                .fold(Complex::new(1.0, 0.0), |acc, (_, &other)| acc * (z - other));
            if denominator.norm() == 0.0 {
                continue;
            }
            let step = value / denominator;
            roots[i] = z - step;
            max_step = max_step.max(step.norm());
        }
        if max_step < ROOT_TOLERANCE {
            break;
        }
    }

    roots
}

/// Candidate formant frequencies of one frame, ascending.
fn frame_formants(frame: &[f64], order: usize, sample_rate: f64) -> Vec<f64> {
    let r: Vec<f64> = (0..=order)
        .map(|lag| frame.iter().zip(&frame[lag..]).map(|(a, b)| a * b).sum())
        .collect();
    let Some(a) = levinson_durbin(&r, order) else {
        return Vec::new();
    };

    let mut formants: Vec<f64> = polynomial_roots(&a)
        .into_iter()
        .filter(|z| z.im > 0.0 && z.is_finite())
        .filter_map(|z| {
            let frequency = z.arg() * sample_rate / (2.0 * std::f64::consts::PI);
            let bandwidth = -(sample_rate / std::f64::consts::PI) * z.norm().ln();
            (frequency > MIN_FORMANT_HZ && frequency < sample_rate / 2.0 && bandwidth < MAX_BANDWIDTH_HZ)
                .then_some(frequency)
        })
        .collect();
    formants.sort_by(|a, b| a.total_cmp(b));
    formants
}

/// F1 and F2 over the loud frames of a recording, if any frame has two formants.
pub fn estimate(samples: &[f32], sample_rate: u32) -> Option<Formants> {
    let (window, hop) = frame_geometry(sample_rate);
    let order = lpc_order(sample_rate);
    if samples.len() < window || window <= order {
        return None;
    }

    let hamming: Vec<f64> = (0..window)
        .map(|i| 0.54 - 0.46 * (2.0 * std::f64::consts::PI * i as f64 / (window - 1) as f64).cos())
        .collect();

    let n_frames = frame_count(samples.len(), window, hop);
    let energies: Vec<f64> = (0..n_frames)
        .map(|k| {
            samples[k * hop..k * hop + window]
                .iter()
                .map(|&s| (s as f64).powi(2))
                .sum()
        })
        .collect();
    let loudest = energies.iter().copied().fold(0.0f64, f64::max);
    if loudest <= 0.0 {
        return None;
    }

    let mut f1 = Vec::new();
    let mut f2 = Vec::new();
    let mut frame = vec![0.0f64; window];

    for (k, &energy) in energies.iter().enumerate() {
        if energy < MIN_RELATIVE_ENERGY * loudest {
            continue;
        }
        let raw = &samples[k * hop..k * hop + window];
        for ((dst, &s), &w) in frame.iter_mut().zip(raw).zip(&hamming) {
            *dst = s as f64 * w;
        }

        let candidates = frame_formants(&frame, order, sample_rate as f64);
        if candidates.len() >= 2 {
            f1.push(candidates[0]);
            f2.push(candidates[1]);
        }
    }

    if f1.is_empty() {
        return None;
    }
    Some(Formants {
        f1_hz: median(&f1),
        f2_hz: median(&f2),
    })
}
