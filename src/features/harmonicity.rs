//! Harmonics-to-noise ratio from short-time autocorrelation.
//!
//! Each 25ms frame is correlated with itself; the correlation at lag `tau`
//! is normalised by the energies of the two overlapping parts, so a periodic
//! frame scores close to 1.0 at its period regardless of lag. The peak `r`
//! in the 50-500 Hz lag range splits the frame energy into a harmonic part
//! `r` and a noise part `1 - r`, giving `HNR = 10 * log10(r / (1 - r))`.

use tracing::debug;

use super::engine::Autocorrelator;
use super::stats::median;
use crate::audio::segmentation::{frame_count, frame_geometry};

/// Lowest F0 searched, in Hz
const MIN_F0_HZ: f64 = 50.0;

/// Highest F0 searched, in Hz
const MAX_F0_HZ: f64 = 500.0;

/// Physiologically plausible HNR band in dB
pub const HNR_RANGE: (f64, f64) = (5.0, 30.0);

/// Substitute when no frame yields a usable estimate
pub const NEUTRAL_HNR_DB: f64 = 20.0;

/// Largest gap between the two estimators before the secondary one is distrusted
pub const AGREEMENT_TOLERANCE_DB: f64 = 6.0;

/// Frames with less energy than this are treated as silence
const MIN_FRAME_ENERGY: f64 = 1e-8;

const MAX_CORRELATION: f64 = 0.999_999;

/// Median per-frame HNR in dB (unclamped), or `None` if no frame is periodic.
pub fn autocorrelation_hnr(samples: &[f32], sample_rate: u32) -> Option<f64> {
    let (window, hop) = frame_geometry(sample_rate);
    if samples.len() < window {
        return None;
    }

    let sr = sample_rate as f64;
    let min_lag = (sr / MAX_F0_HZ).floor() as usize;
    let max_lag = ((sr / MIN_F0_HZ).ceil() as usize).min(window - 1);

    let mut autocorrelator = Autocorrelator::new(window);
    let mut frame = vec![0.0f64; window];
    let mut prefix = vec![0.0f64; window + 1];
    let mut per_frame = Vec::new();

    for k in 0..frame_count(samples.len(), window, hop) {
        let start = k * hop;
        let raw = &samples[start..start + window];
        let mean = raw.iter().map(|&s| s as f64).sum::<f64>() / window as f64;
        for (dst, &s) in frame.iter_mut().zip(raw) {
            *dst = s as f64 - mean;
        }

        // prefix[i] = energy of frame[..i]
        for i in 0..window {
            prefix[i + 1] = prefix[i] + frame[i] * frame[i];
        }
        if prefix[window] < MIN_FRAME_ENERGY {
            continue;
        }

        let ac = autocorrelator.compute(&frame);
        let peak = (min_lag..=max_lag)
            .filter_map(|tau| {
                let head = prefix[window - tau];
                let tail = prefix[window] - prefix[tau];
                let denom = (head * tail).sqrt();
                (denom > 0.0).then(|| ac[tau] / denom)
            })
            .fold(f64::NEG_INFINITY, f64::max);

        if peak.is_finite() && peak > 0.5 {
            let r = peak.min(MAX_CORRELATION);
            per_frame.push(10.0 * (r / (1.0 - r)).log10());
        }
    }

    debug!("Autocorrelation HNR: {} periodic frames", per_frame.len());
    if per_frame.is_empty() {
        None
    } else {
        Some(median(&per_frame))
    }
}

/// Which estimator produced the final HNR.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HnrSource {
    Harmonicity,
    Autocorrelation,
    Neutral,
}

/// Reconcile the engine's harmonicity estimate with the autocorrelation one.
///
/// Both are clamped to [`HNR_RANGE`]. The harmonicity value wins when the two
/// agree within [`AGREEMENT_TOLERANCE_DB`]; otherwise the autocorrelation
/// value is used. With neither available the neutral value is returned.
pub fn reconcile(harmonicity: Option<f64>, autocorrelation: Option<f64>) -> (f64, HnrSource) {
    let (lo, hi) = HNR_RANGE;
    let clamp = |v: f64| v.clamp(lo, hi);

    match (harmonicity.filter(|v| v.is_finite()), autocorrelation.filter(|v| v.is_finite())) {
        (Some(h), Some(a)) if (clamp(h) - clamp(a)).abs() <= AGREEMENT_TOLERANCE_DB => {
            (clamp(h), HnrSource::Harmonicity)
        }
        (_, Some(a)) => (clamp(a), HnrSource::Autocorrelation),
        (Some(h), None) => (clamp(h), HnrSource::Harmonicity),
        (None, None) => (NEUTRAL_HNR_DB, HnrSource::Neutral),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SR: u32 = 16000;

    fn harmonic_tone(freq: f64, duration_sec: f64) -> Vec<f32> {
        let n = (SR as f64 * duration_sec) as usize;
        (0..n)
            .map(|i| {
                let t = i as f64 / SR as f64;
                let w = 2.0 * std::f64::consts::PI * freq * t;
                (0.5 * w.sin() + 0.25 * (2.0 * w).sin() + 0.1 * (3.0 * w).sin()) as f32
            })
            .collect()
    }

    fn add_noise(samples: &mut [f32], level: f32, seed: u64) {
        let mut state = seed;
        for s in samples.iter_mut() {
            state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
            let n = ((state >> 33) as f32 / (1u64 << 31) as f32) - 0.5;
            *s += n * level;
        }
    }

    #[test]
    fn test_clean_tone_has_high_hnr() {
        let hnr = autocorrelation_hnr(&harmonic_tone(150.0, 1.0), SR).unwrap();
        assert!(hnr > 28.0, "clean HNR {}", hnr);
    }

    #[test]
    fn test_noise_lowers_hnr() {
        let clean = autocorrelation_hnr(&harmonic_tone(150.0, 1.0), SR).unwrap();
        let mut noisy = harmonic_tone(150.0, 1.0);
        add_noise(&mut noisy, 0.6, 11);
        let noisy_hnr = autocorrelation_hnr(&noisy, SR).unwrap_or(0.0);
        assert!(noisy_hnr < clean - 10.0, "noisy {} vs clean {}", noisy_hnr, clean);
    }

    #[test]
    fn test_silence_and_short_input_have_no_estimate() {
        assert!(autocorrelation_hnr(&vec![0.0; 8000], SR).is_none());
        assert!(autocorrelation_hnr(&[0.3; 100], SR).is_none());
    }

    #[test]
    fn test_reconcile_prefers_agreeing_harmonicity() {
        assert_eq!(reconcile(Some(21.0), Some(24.0)), (21.0, HnrSource::Harmonicity));
    }

    #[test]
    fn test_reconcile_disagreement_uses_autocorrelation() {
        assert_eq!(reconcile(Some(8.0), Some(25.0)), (25.0, HnrSource::Autocorrelation));
    }

    #[test]
    fn test_reconcile_clamps_and_falls_back() {
        assert_eq!(reconcile(Some(45.0), Some(38.0)), (30.0, HnrSource::Harmonicity));
        assert_eq!(reconcile(None, Some(-3.0)), (5.0, HnrSource::Autocorrelation));
        assert_eq!(reconcile(Some(12.0), None), (12.0, HnrSource::Harmonicity));
        assert_eq!(reconcile(None, None), (NEUTRAL_HNR_DB, HnrSource::Neutral));
        assert_eq!(reconcile(Some(f64::NAN), None), (NEUTRAL_HNR_DB, HnrSource::Neutral));
    }
}
