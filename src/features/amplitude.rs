//! Loudness statistics and energy-based articulation measures.
//!
//! Both work on 25ms/10ms frame RMS, the same framing the segmenter uses.

use crate::audio::segmentation::{frame_geometry, frame_rms};

use super::stats::{max_of, percentile, std_dev};

/// Frames below this percentile of frame RMS count as pauses
const PAUSE_PERCENTILE: f64 = 20.0;

/// The pause threshold never exceeds this fraction of the loudest frame, so
/// steady phonation is not split into pseudo-syllables
const PAUSE_CEILING_FRACTION: f64 = 0.3;

/// Syllables per speech/pause transition
const SYLLABLES_PER_TRANSITION: f64 = 0.5;

/// Overall RMS and frame-level dB spread.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AmplitudeStats {
    pub rms_mean: f64,
    /// Standard deviation of frame RMS in dB
    pub db_variation: f64,
    /// Loudest minus quietest frame in dB
    pub db_range: f64,
}

pub fn amplitude_stats(samples: &[f32], sample_rate: u32) -> AmplitudeStats {
    if samples.is_empty() {
        return AmplitudeStats::default();
    }

    let rms_mean = (samples.iter().map(|&s| (s as f64).powi(2)).sum::<f64>() / samples.len() as f64).sqrt();

    let (window, hop) = frame_geometry(sample_rate);
    let frame_db: Vec<f64> = frame_rms(samples, window, hop)
        .into_iter()
        .map(|rms| 20.0 * (rms as f64 + 1e-10).log10())
        .collect();

    let lowest = frame_db.iter().copied().fold(f64::INFINITY, f64::min);
    AmplitudeStats {
        rms_mean,
        db_variation: std_dev(&frame_db),
        db_range: max_of(&frame_db) - lowest,
    }
}

/// Speech-rate and pause measures of one stretch of audio.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Articulation {
    /// Estimated syllables per second
    pub rate_syl_sec: f64,
    /// Fraction of frames classified as pause
    pub pause_ratio: f64,
    pub pause_frames: usize,
    pub total_frames: usize,
    pub duration_sec: f64,
}

/// Approximate syllable rate and pause ratio from energy transitions.
///
/// A frame is a pause when its RMS falls below the 20th percentile of frame
/// RMS (capped at 30% of the loudest frame). Every change between speech and
/// pause counts as half a syllable.
pub fn articulation(samples: &[f32], sample_rate: u32) -> Articulation {
    let duration_sec = samples.len() as f64 / sample_rate as f64;
    let (window, hop) = frame_geometry(sample_rate);
    let rms: Vec<f64> = frame_rms(samples, window, hop).into_iter().map(f64::from).collect();
    if rms.is_empty() {
        return Articulation::default();
    }

    let threshold = percentile(&rms, PAUSE_PERCENTILE).min(PAUSE_CEILING_FRACTION * max_of(&rms));
    let speech: Vec<bool> = rms.iter().map(|&r| r >= threshold && r > 0.0).collect();

    let transitions = speech.windows(2).filter(|w| w[0] != w[1]).count();
    let pause_frames = speech.iter().filter(|s| !**s).count();

    let rate_syl_sec = if duration_sec > 0.0 {
        transitions as f64 * SYLLABLES_PER_TRANSITION / duration_sec
    } else {
        0.0
    };

    Articulation {
        rate_syl_sec,
        pause_ratio: pause_frames as f64 / rms.len() as f64,
        pause_frames,
        total_frames: rms.len(),
        duration_sec,
    }
}

/// Combine per-segment articulation into whole-recording values.
///
/// The rate is the duration-weighted mean of the segment rates. Pauses are
/// the within-segment pause time plus all audio outside the segments, over
/// the total duration.
pub fn merge_articulation(segments: &[Articulation], total_duration_sec: f64, hop_sec: f64) -> Option<Articulation> {
    let voiced_duration: f64 = segments.iter().map(|s| s.duration_sec).sum();
    if segments.is_empty() || voiced_duration <= 0.0 || total_duration_sec <= 0.0 {
        return None;
    }

    let rate_syl_sec = segments
        .iter()
        .map(|s| s.rate_syl_sec * s.duration_sec)
        .sum::<f64>()
        / voiced_duration;

    let within_pause_sec: f64 = segments.iter().map(|s| s.pause_frames as f64 * hop_sec).sum();
    let between_pause_sec = (total_duration_sec - voiced_duration).max(0.0);
    let pause_ratio = ((within_pause_sec + between_pause_sec) / total_duration_sec).clamp(0.0, 1.0);

    Some(Articulation {
        rate_syl_sec,
        pause_ratio,
        pause_frames: segments.iter().map(|s| s.pause_frames).sum(),
        total_frames: segments.iter().map(|s| s.total_frames).sum(),
        duration_sec: total_duration_sec,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SR: u32 = 16000;

    fn tone(duration_sec: f32, amplitude: f32) -> Vec<f32> {
        let n = (SR as f32 * duration_sec) as usize;
        (0..n)
            .map(|i| (2.0 * PI * 160.0 * i as f32 / SR as f32).sin() * amplitude)
            .collect()
    }

    /// Alternating 150ms bursts and 100ms gaps
    fn syllable_train(count: usize) -> Vec<f32> {
        let mut samples = Vec::new();
        for _ in 0..count {
            samples.extend(tone(0.15, 0.5));
            samples.extend(vec![0.0; (SR as f32 * 0.1) as usize]);
        }
        samples
    }

    #[test]
    fn test_amplitude_of_steady_tone() {
        let stats = amplitude_stats(&tone(1.0, 0.5), SR);
        assert!((stats.rms_mean - 0.5 / 2f64.sqrt()).abs() < 1e-3);
        assert!(stats.db_variation < 0.5);
        assert!(stats.db_range < 1.0);
    }

    #[test]
    fn test_amplitude_of_loud_and_quiet_halves() {
        let mut samples = tone(0.5, 0.5);
        samples.extend(tone(0.5, 0.05));
        let stats = amplitude_stats(&samples, SR);
        assert!((stats.db_range - 20.0).abs() < 1.0, "range {}", stats.db_range);
        assert!(stats.db_variation > 8.0);
    }

    #[test]
    fn test_empty_amplitude_is_zero() {
        assert_eq!(amplitude_stats(&[], SR), AmplitudeStats::default());
    }

    #[test]
    fn test_steady_tone_has_no_pauses_or_syllables() {
        let result = articulation(&tone(1.0, 0.5), SR);
        assert_eq!(result.pause_frames, 0);
        assert_eq!(result.rate_syl_sec, 0.0);
    }

    #[test]
    fn test_syllable_train_rate_and_pauses() {
        let samples = syllable_train(8);
        let result = articulation(&samples, SR);
        // 8 bursts -> ~15 transitions over 2 s
        assert!(result.rate_syl_sec > 3.0 && result.rate_syl_sec < 4.5, "rate {}", result.rate_syl_sec);
        assert!(result.pause_ratio > 0.2 && result.pause_ratio < 0.5, "pause {}", result.pause_ratio);
    }

    #[test]
    fn test_merge_weights_by_duration() {
        let a = Articulation {
            rate_syl_sec: 4.0,
            pause_ratio: 0.1,
            pause_frames: 10,
            total_frames: 100,
            duration_sec: 1.0,
        };
        let b = Articulation {
            rate_syl_sec: 1.0,
            pause_ratio: 0.0,
            pause_frames: 0,
            total_frames: 200,
            duration_sec: 2.0,
        };
        let merged = merge_articulation(&[a, b], 4.0, 0.01).unwrap();
        assert!((merged.rate_syl_sec - 2.0).abs() < 1e-9);
        // 0.1 s inside segments + 1.0 s between them, over 4 s
        assert!((merged.pause_ratio - 0.275).abs() < 1e-9);
    }

    #[test]
    fn test_merge_empty_is_none() {
        assert!(merge_articulation(&[], 3.0, 0.01).is_none());
    }
}
