//! Utterance segmentation by short-time energy.
//!
//! Frames are 25ms windows on a 10ms hop. Frame `i` analyses
//! `[i*hop, i*hop + window)` but *owns* only `[i*hop, (i+1)*hop)` (the last
//! frame owns through the end of the buffer), so segments plus discarded
//! silence always partition the input exactly.

use tracing::debug;

use super::Segment;

/// Analysis window length in seconds
pub const FRAME_WINDOW_SEC: f64 = 0.025;

/// Hop between frames in seconds
pub const FRAME_HOP_SEC: f64 = 0.010;

/// Window and hop lengths in samples for a sample rate.
pub fn frame_geometry(sample_rate: u32) -> (usize, usize) {
    let window = ((FRAME_WINDOW_SEC * sample_rate as f64) as usize).max(1);
    let hop = ((FRAME_HOP_SEC * sample_rate as f64) as usize).max(1);
    (window, hop)
}

/// Number of frames for a buffer. A buffer shorter than one window is one frame.
pub fn frame_count(len: usize, window: usize, hop: usize) -> usize {
    if len == 0 {
        0
    } else if len <= window {
        1
    } else {
        1 + (len - window) / hop
    }
}

/// Root-mean-square energy per frame.
pub fn frame_rms(samples: &[f32], window: usize, hop: usize) -> Vec<f32> {
    let n_frames = frame_count(samples.len(), window, hop);
    (0..n_frames)
        .map(|i| {
            let start = i * hop;
            let end = (start + window).min(samples.len());
            let frame = &samples[start..end];
            // Short final frames are zero-padded to the window length
            let sum_sq: f32 = frame.iter().map(|s| s * s).sum();
            (sum_sq / window as f32).sqrt()
        })
        .collect()
}

/// Sample range owned by a run of frames `[first, last]`.
fn owned_range(first: usize, last: usize, n_frames: usize, hop: usize, len: usize) -> Segment {
    let start = (first * hop).min(len);
    let end = if last + 1 == n_frames {
        len
    } else {
        ((last + 1) * hop).min(len)
    };
    Segment::new(start, end)
}

/// Split a recording into utterances separated by silence.
///
/// A frame is silent when its RMS is below `silence_threshold` times the
/// loudest frame's RMS. Maximal non-silent runs lasting at least
/// `min_duration` seconds become segments. When no run qualifies, the whole
/// input is returned as a single segment; only empty input yields no segments.
pub fn segment(samples: &[f32], sample_rate: u32, min_duration: f64, silence_threshold: f32) -> Vec<Segment> {
    if samples.is_empty() {
        return Vec::new();
    }

    let whole = vec![Segment::new(0, samples.len())];
    let (window, hop) = frame_geometry(sample_rate);
    let rms = frame_rms(samples, window, hop);
    let n_frames = rms.len();

    let max_rms = rms.iter().cloned().fold(0.0f32, f32::max);
    if max_rms <= 0.0 {
        debug!("Segmentation: silent input, returning whole signal");
        return whole;
    }
    let threshold = silence_threshold * max_rms;

    let mut segments = Vec::new();
    let mut run_start: Option<usize> = None;

    for (i, &energy) in rms.iter().enumerate() {
        let voiced = energy >= threshold;
        match (voiced, run_start) {
            (true, None) => run_start = Some(i),
            (false, Some(first)) => {
                let seg = owned_range(first, i - 1, n_frames, hop, samples.len());
                if seg.duration_sec(sample_rate) >= min_duration {
                    segments.push(seg);
                }
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(first) = run_start {
        let seg = owned_range(first, n_frames - 1, n_frames, hop, samples.len());
        if seg.duration_sec(sample_rate) >= min_duration {
            segments.push(seg);
        }
    }

    debug!(
        "Segmentation: {} frames, threshold {:.5}, {} segments",
        n_frames,
        threshold,
        segments.len()
    );

    if segments.is_empty() {
        whole
    } else {
        segments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::f32::consts::PI;

    const SR: u32 = 16000;

    fn tone(duration_sec: f32) -> Vec<f32> {
        let n = (SR as f32 * duration_sec) as usize;
        (0..n)
            .map(|i| (2.0 * PI * 180.0 * i as f32 / SR as f32).sin() * 0.5)
            .collect()
    }

    fn silence(duration_sec: f32) -> Vec<f32> {
        vec![0.0; (SR as f32 * duration_sec) as usize]
    }

    #[test]
    fn test_frame_geometry_16k() {
        assert_eq!(frame_geometry(16000), (400, 160));
    }

    #[test]
    fn test_frame_count() {
        assert_eq!(frame_count(0, 400, 160), 0);
        assert_eq!(frame_count(100, 400, 160), 1);
        assert_eq!(frame_count(400, 400, 160), 1);
        assert_eq!(frame_count(560, 400, 160), 2);
    }

    #[test]
    fn test_two_utterances_split_on_pause() {
        let mut samples = silence(0.2);
        samples.extend(tone(1.0));
        samples.extend(silence(0.4));
        samples.extend(tone(0.8));
        samples.extend(silence(0.2));

        let segments = segment(&samples, SR, 0.5, 0.05);
        assert_eq!(segments.len(), 2);

        let first = segments[0];
        assert!((first.start_sec(SR) - 0.2).abs() < 0.03, "start {}", first.start_sec(SR));
        assert!((first.duration_sec(SR) - 1.0).abs() < 0.05);

        let second = segments[1];
        assert!((second.start_sec(SR) - 1.6).abs() < 0.03);
        assert!((second.duration_sec(SR) - 0.8).abs() < 0.05);
    }

    #[test]
    fn test_short_bursts_fall_back_to_whole_signal() {
        let mut samples = tone(0.2);
        samples.extend(silence(0.3));
        samples.extend(tone(0.2));

        let segments = segment(&samples, SR, 0.5, 0.05);
        assert_eq!(segments, vec![Segment::new(0, samples.len())]);
    }

    #[test]
    fn test_silence_returns_whole_signal() {
        let samples = silence(1.0);
        let segments = segment(&samples, SR, 0.5, 0.05);
        assert_eq!(segments, vec![Segment::new(0, samples.len())]);
    }

    #[test]
    fn test_empty_input_returns_no_segments() {
        assert!(segment(&[], SR, 0.5, 0.05).is_empty());
    }

    #[test]
    fn test_segments_and_silence_partition_input() {
        let mut samples = silence(0.33);
        samples.extend(tone(0.71));
        samples.extend(silence(0.27));
        samples.extend(tone(0.64));
        samples.extend(silence(0.05));

        let segments = segment(&samples, SR, 0.5, 0.05);
        let (_, hop) = frame_geometry(SR);

        let covered: usize = segments.iter().map(|s| s.len()).sum();
        let discarded = samples.len() - covered;

        // Boundaries land on hop multiples, so discarded silence is close to
        // the true silence with at most one hop of error per boundary
        let true_silence = (SR as f32 * (0.33 + 0.27 + 0.05)) as usize;
        let boundaries = segments.len() * 2;
        assert!(
            (discarded as i64 - true_silence as i64).unsigned_abs() as usize <= hop * boundaries + window_slack(),
            "discarded {} vs silence {}",
            discarded,
            true_silence
        );
    }

    fn window_slack() -> usize {
        // A frame straddling a tone edge is non-silent for part of its window
        let (window, hop) = frame_geometry(SR);
        (window / hop + 1) * hop
    }

    proptest! {
        #[test]
        fn prop_segments_are_ordered_disjoint_and_in_bounds(
            samples in proptest::collection::vec(-1.0f32..1.0, 1..20000),
            threshold in 0.01f32..0.9
        ) {
            let segments = segment(&samples, SR, 0.05, threshold);
            prop_assert!(!segments.is_empty());
            let mut last_end = 0;
            for seg in &segments {
                prop_assert!(seg.start >= last_end);
                prop_assert!(seg.end <= samples.len());
                prop_assert!(seg.start < seg.end);
                last_end = seg.end;
            }
        }
    }
}
