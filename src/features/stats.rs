//! Small descriptive statistics over `f64` slices.
//!
//! Percentiles use linear interpolation between closest ranks, matching the
//! convention most published voice-analysis numbers are reported with.

/// Arithmetic mean; 0.0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation; 0.0 for fewer than two values.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Largest value; 0.0 for an empty slice.
pub fn max_of(values: &[f64]) -> f64 {
    values
        .iter()
        .copied()
        .filter(|v| !v.is_nan())
        .reduce(f64::max)
        .unwrap_or(0.0)
}

fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted: Vec<f64> = values.iter().copied().filter(|v| !v.is_nan()).collect();
    sorted.sort_by(|a, b| a.total_cmp(b));
    sorted
}

fn percentile_of_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let rank = (p.clamp(0.0, 100.0) / 100.0) * (n - 1) as f64;
            let lo = rank.floor() as usize;
            let hi = rank.ceil() as usize;
            let frac = rank - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

/// `p`-th percentile (0-100); NaNs are ignored, empty input yields 0.0.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    percentile_of_sorted(&sorted(values), p)
}

pub fn median(values: &[f64]) -> f64 {
    percentile(values, 50.0)
}

/// Keep values inside `[Q1 - k*IQR, Q3 + k*IQR]`.
pub fn iqr_filter(values: &[f64], k: f64) -> Vec<f64> {
    let sorted = sorted(values);
    let q1 = percentile_of_sorted(&sorted, 25.0);
    let q3 = percentile_of_sorted(&sorted, 75.0);
    let iqr = q3 - q1;
    let (lower, upper) = (q1 - k * iqr, q3 + k * iqr);
    values
        .iter()
        .copied()
        .filter(|v| *v >= lower && *v <= upper)
        .collect()
}

/// Tolerance schedule for [`relaxed_iqr_filter`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IqrRelaxation {
    /// First IQR multiplier tried
    pub k_start: f64,
    /// Added to `k` on each retry
    pub k_step: f64,
    /// Number of retries after the first attempt
    pub retries: u32,
    /// Largest fraction of values a filter pass may discard
    pub max_removed_fraction: f64,
}

impl Default for IqrRelaxation {
    /// k = 2.5, 3.0, 3.5; accept a pass that removes at most 40%.
    fn default() -> Self {
        Self {
            k_start: 2.5,
            k_step: 0.5,
            retries: 2,
            max_removed_fraction: 0.4,
        }
    }
}

/// IQR outlier removal that widens the fence until it keeps enough data.
///
/// Tries `k_start`, `k_start + k_step`, ... and returns the first pass that
/// discards no more than `max_removed_fraction` of the values. When every
/// tolerance discards too much, the distribution has no meaningful core and
/// the values are returned unfiltered.
pub fn relaxed_iqr_filter(values: &[f64], relaxation: IqrRelaxation) -> Vec<f64> {
    if values.len() < 4 {
        return values.to_vec();
    }

    (0..=relaxation.retries)
        .map(|attempt| relaxation.k_start + relaxation.k_step * attempt as f64)
        .map(|k| iqr_filter(values, k))
        .find(|kept| {
            let removed = 1.0 - kept.len() as f64 / values.len() as f64;
            removed <= relaxation.max_removed_fraction
        })
        .unwrap_or_else(|| values.to_vec())
}

/// Drop values more than `n_sd` standard deviations above the mean.
pub fn remove_upper_outliers(values: &[f64], n_sd: f64) -> Vec<f64> {
    let limit = mean(values) + n_sd * std_dev(values);
    values.iter().copied().filter(|v| *v <= limit).collect()
}
