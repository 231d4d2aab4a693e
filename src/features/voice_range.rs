//! Dysphonia Severity Index sub-parameters: maximum phonation time, highest
//! sustainable F0 and lowest sustained intensity.

use super::engine::{Contour, TIME_STEP_SEC};
use super::stats::{max_of, mean, median, percentile, remove_upper_outliers};

/// Voices with a mean F0 below this are treated as low-pitched
pub const LOW_PITCH_MEAN_HZ: f64 = 165.0;

/// For low-pitched voices only values above this are discarded
pub const LOW_PITCH_CUTOFF_HZ: f64 = 500.0;

/// Outlier fence for F0-High, in standard deviations above the mean
const F0_HIGH_OUTLIER_SD: f64 = 3.0;

const F0_HIGH_PERCENTILE: f64 = 98.0;
const I_LOW_PERCENTILE: f64 = 5.0;

/// Display range I-Low is rescaled into, in dB
pub const I_LOW_DISPLAY_RANGE: (f64, f64) = (25.0, 65.0);

/// Longest unbroken run of phonation, in seconds.
///
/// A frame phonates when its intensity reaches
/// `max(20% of peak intensity, 50% of median positive intensity)`.
/// Falls back to `duration_sec` when no frame qualifies.
pub fn max_phonation_time(intensity: &Contour, duration_sec: f64) -> f64 {
    let positive: Vec<f64> = intensity.values.iter().copied().filter(|v| *v > 0.0).collect();
    if positive.is_empty() {
        return duration_sec;
    }

    let threshold = (0.2 * max_of(&positive)).max(0.5 * median(&positive));

    let mut longest = 0usize;
    let mut current = 0usize;
    for &value in &intensity.values {
        if value >= threshold {
            current += 1;
            longest = longest.max(current);
        } else {
            current = 0;
        }
    }

    if longest == 0 {
        duration_sec
    } else {
        longest as f64 * TIME_STEP_SEC
    }
}

/// 98th percentile of voiced F0 after discarding upward outliers; 0.0 when unvoiced.
pub fn f0_high(pitch: &Contour) -> f64 {
    let voiced = pitch.voiced_values();
    if voiced.is_empty() {
        return 0.0;
    }

    let kept = if mean(&voiced) < LOW_PITCH_MEAN_HZ {
        voiced.iter().copied().filter(|f| *f <= LOW_PITCH_CUTOFF_HZ).collect()
    } else {
        remove_upper_outliers(&voiced, F0_HIGH_OUTLIER_SD)
    };

    let values = if kept.is_empty() { &voiced } else { &kept };
    percentile(values, F0_HIGH_PERCENTILE)
}

/// Lowest sustained intensity, rescaled into [`I_LOW_DISPLAY_RANGE`].
///
/// Takes the 5th percentile of intensity over voiced frames (or, without
/// voicing, over frames within 20% of the peak) and maps its ratio to the
/// peak linearly onto 25-65 dB. This is a relative remap, not a calibrated
/// sound pressure level. Returns 0.0 when the peak is not positive.
pub fn i_low(pitch: &Contour, intensity: &Contour) -> f64 {
    let peak = max_of(&intensity.values);
    if !(peak > 0.0) {
        return 0.0;
    }

    let mut selected: Vec<f64> = pitch
        .voiced_frames()
        .filter_map(|(time, _)| intensity.value_at(time))
        .filter(|v| v.is_finite())
        .collect();
    if selected.is_empty() {
        selected = intensity
            .values
            .iter()
            .copied()
            .filter(|v| *v >= 0.2 * peak)
            .collect();
    }

    let (lo, hi) = I_LOW_DISPLAY_RANGE;
    let ratio = (percentile(&selected, I_LOW_PERCENTILE) / peak).clamp(0.0, 1.0);
    lo + (hi - lo) * ratio
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contour(values: Vec<f64>) -> Contour {
        let times = (0..values.len()).map(|i| 0.02 + i as f64 * TIME_STEP_SEC).collect();
        Contour::new(times, values)
    }

    #[test]
    fn test_mpt_longest_run() {
        let mut values = vec![80.0; 120];
        values.extend(vec![5.0; 30]);
        values.extend(vec![80.0; 300]);
        values.extend(vec![5.0; 10]);
        let mpt = max_phonation_time(&contour(values), 4.6);
        assert!((mpt - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_mpt_falls_back_to_duration() {
        assert_eq!(max_phonation_time(&contour(vec![-90.0; 50]), 0.5), 0.5);
        assert_eq!(max_phonation_time(&Contour::default(), 1.25), 1.25);
    }

    #[test]
    fn test_f0_high_high_voice_drops_spike() {
        let mut values: Vec<f64> = (0..200).map(|i| 200.0 + (i % 40) as f64).collect();
        values.push(1200.0);
        let high = f0_high(&contour(values));
        assert!(high > 235.0 && high <= 239.0, "F0-High {}", high);
    }

    #[test]
    fn test_f0_high_low_voice_keeps_everything_under_500() {
        let mut values: Vec<f64> = vec![110.0; 100];
        values.extend(vec![300.0; 5]);
        values.push(700.0);
        let high = f0_high(&contour(values));
        assert_eq!(high, 300.0);
    }

    #[test]
    fn test_f0_high_unvoiced_is_zero() {
        assert_eq!(f0_high(&contour(vec![0.0; 30])), 0.0);
    }

    #[test]
    fn test_i_low_rescale() {
        let pitch = contour(vec![150.0; 100]);
        let intensity = contour(vec![80.0; 100]);
        assert!((i_low(&pitch, &intensity) - 65.0).abs() < 1e-9);

        let intensity = contour((0..100).map(|i| if i < 50 { 40.0 } else { 80.0 }).collect());
        assert!((i_low(&pitch, &intensity) - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_i_low_without_voicing_uses_loud_frames() {
        let pitch = contour(vec![0.0; 10]);
        let intensity = contour(vec![10.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0, 60.0]);
        assert!((i_low(&pitch, &intensity) - 65.0).abs() < 1e-9);
    }

    #[test]
    fn test_i_low_nonpositive_peak_is_zero() {
        let pitch = contour(vec![150.0; 10]);
        assert_eq!(i_low(&pitch, &contour(vec![-20.0; 10])), 0.0);
    }
}
