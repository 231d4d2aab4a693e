//! Cycle-to-cycle perturbation: jitter (period) and shimmer (amplitude).
//!
//! Periods come from the voiced frames of the pitch contour, amplitudes from
//! the intensity contour sampled at the same timestamps. "Consecutive" means
//! consecutive among voiced frames.

use super::engine::Contour;
use super::stats::{mean, relaxed_iqr_filter, IqrRelaxation};

/// Jitter outside this band is a tracking artifact, not physiology
pub const JITTER_RANGE: (f64, f64) = (0.01, 5.0);

/// Upper bound for shimmer measures
pub const MAX_SHIMMER: f64 = 50.0;

/// Period and amplitude perturbation of one recording, all in percent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Perturbation {
    pub jitter_local: f64,
    pub jitter_rap: f64,
    pub jitter_ppq5: f64,
    pub shimmer_local: f64,
    pub shimmer_apq5: f64,
}

/// Mean absolute difference of consecutive values over their mean, in percent.
pub fn local_perturbation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let average = mean(values);
    if average <= 0.0 {
        return None;
    }
    let diffs: Vec<f64> = values.windows(2).map(|w| (w[1] - w[0]).abs()).collect();
    Some(mean(&diffs) / average * 100.0)
}

/// Mean absolute deviation of each value from the average of its
/// `points`-wide neighbourhood, over the overall mean, in percent.
///
/// `points = 3` on periods is RAP, `points = 5` is PPQ5 (or APQ5 on amplitudes).
pub fn smoothed_perturbation(values: &[f64], points: usize) -> Option<f64> {
    if points == 0 || values.len() < points {
        return None;
    }
    let average = mean(values);
    if average <= 0.0 {
        return None;
    }
    let deviations: Vec<f64> = values
        .windows(points)
        .map(|w| (w[points / 2] - mean(w)).abs())
        .collect();
    Some(mean(&deviations) / average * 100.0)
}

/// Glottal periods (seconds) of the voiced frames, after outlier removal.
pub fn periods(pitch: &Contour, relaxation: IqrRelaxation) -> Vec<f64> {
    relaxed_iqr_filter(&pitch.voiced_values(), relaxation)
        .into_iter()
        .filter(|f0| *f0 > 0.0)
        .map(|f0| 1.0 / f0)
        .collect()
}

/// Intensity at each voiced pitch frame.
pub fn voiced_amplitudes(pitch: &Contour, intensity: &Contour) -> Vec<f64> {
    pitch
        .voiced_frames()
        .filter_map(|(time, _)| intensity.value_at(time))
        .filter(|a| a.is_finite() && *a > 0.0)
        .collect()
}

/// All perturbation measures. Unvoiced input yields zeros.
pub fn measure(pitch: &Contour, intensity: &Contour, relaxation: IqrRelaxation) -> Perturbation {
    let periods = periods(pitch, relaxation);
    let amplitudes = voiced_amplitudes(pitch, intensity);

    let (jitter_min, jitter_max) = JITTER_RANGE;
    let jitter = |value: Option<f64>| value.map_or(0.0, |v| v.clamp(jitter_min, jitter_max));
    let shimmer = |value: Option<f64>| value.map_or(0.0, |v| v.clamp(0.0, MAX_SHIMMER));

    Perturbation {
        jitter_local: jitter(local_perturbation(&periods)),
        jitter_rap: jitter(smoothed_perturbation(&periods, 3)),
        jitter_ppq5: jitter(smoothed_perturbation(&periods, 5)),
        shimmer_local: shimmer(local_perturbation(&amplitudes)),
        shimmer_apq5: shimmer(smoothed_perturbation(&amplitudes, 5)),
    }
}
