//! End-to-end tests of the analysis pipeline on synthetic recordings.

use std::f64::consts::PI;
use std::path::Path;

use proptest::prelude::*;

use crate::analyzer::{AnalysisOptions, Analyzer, AudioInput};
use crate::audio::SampleSequence;
use crate::config::{AnalyzerConfig, EnginePreference, ReportLanguage};
use crate::features::{Degradation, Feature, FeatureExtractor};
use crate::symptoms::RiskLevel;

const SR: u32 = 16000;

/// Sustained vowel: F0 plus two weaker harmonics
fn vowel(freq: f64, duration_sec: f64, sample_rate: u32, amplitude: f64) -> Vec<f32> {
    let n = (sample_rate as f64 * duration_sec) as usize;
    (0..n)
        .map(|i| {
            let w = 2.0 * PI * freq * i as f64 / sample_rate as f64;
            (amplitude * (0.7 * w.sin() + 0.2 * (2.0 * w).sin() + 0.1 * (3.0 * w).sin())) as f32
        })
        .collect()
}

/// Voiced bursts separated by silence
fn utterances(count: usize, burst_sec: f64, gap_sec: f64) -> Vec<f32> {
    let mut samples = Vec::new();
    for k in 0..count {
        samples.extend(vowel(160.0 + 10.0 * k as f64, burst_sec, SR, 0.5));
        samples.extend(vec![0.0; (SR as f64 * gap_sec) as usize]);
    }
    samples
}

fn write_wav(path: &Path, samples: &[f32], sample_rate: u32, channels: u16) {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        for _ in 0..channels {
            writer.write_sample((s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16).unwrap();
        }
    }
    writer.finalize().unwrap();
}

fn analyzer() -> Analyzer {
    Analyzer::new(AnalyzerConfig::default()).unwrap()
}

#[test]
fn test_sustained_vowel_from_wav() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("vowel.wav");
    write_wav(&path, &vowel(180.0, 1.5, SR, 0.6), SR, 1);

    let result = analyzer().analyze(AudioInput::Path(path), AnalysisOptions::default());
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.audio_summary.sample_rate, 16000);
    assert!((result.audio_summary.duration_sec - 1.5).abs() < 0.01);
    assert_eq!(result.features.len(), Feature::ALL.len());
    assert!(result.features.values().all(|v| v.is_finite()));

    let f0 = result.features["f0_mean_hz"];
    assert!((f0 - 180.0).abs() / 180.0 < 0.03, "F0 {}", f0);
    assert!(result.features["jitter_percent"] < 0.5);

    let dsi = result.dsi.as_ref().unwrap();
    assert!(dsi.score.is_some(), "DSI breakdown {:?}", dsi.breakdown);
    assert!(result.symptom_scores.is_some());
    assert!(result.risk.is_some());
    assert!(!result.report.is_empty());
    assert!(uuid::Uuid::parse_str(&result.run_id).is_ok());
}

#[test]
fn test_stereo_44k_is_downmixed_and_resampled() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stereo.wav");
    write_wav(&path, &vowel(200.0, 1.0, 44100, 0.5), 44100, 2);

    let result = analyzer().analyze(AudioInput::Path(path), AnalysisOptions::default());
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.audio_summary.sample_rate, 16000);
    assert!((result.audio_summary.duration_sec - 1.0).abs() < 0.02);
    let f0 = result.features["f0_mean_hz"];
    assert!((f0 - 200.0).abs() < 6.0, "F0 {}", f0);
}

#[test]
fn test_wav_bytes_input() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bytes.wav");
    write_wav(&path, &vowel(150.0, 1.0, SR, 0.5), SR, 1);
    let bytes = std::fs::read(&path).unwrap();

    let result = analyzer().analyze(AudioInput::Bytes(bytes), AnalysisOptions::default());
    assert!(result.error.is_none(), "{:?}", result.error);
    assert!((result.features["f0_mean_hz"] - 150.0).abs() < 4.0);
}

#[test]
fn test_silence_is_low_risk_without_error() {
    let result = analyzer().analyze_samples(SampleSequence::new(vec![0.0; 32000], SR), AnalysisOptions::default());
    assert!(result.error.is_none());
    assert_eq!(result.features["f0_mean_hz"], 0.0);
    assert_eq!(result.features["jitter_percent"], 0.0);
    assert_eq!(result.risk.as_ref().unwrap().level, RiskLevel::Low);
    assert!(result.dsi.as_ref().unwrap().insufficient_data);
    assert!(result
        .warnings
        .iter()
        .any(|w| matches!(w, Degradation::InsufficientSignal { .. })));
    assert!(result.report[0].contains("silent or too short"));
}

#[test]
fn test_undecodable_bytes_give_structured_error() {
    let result = analyzer().analyze(
        AudioInput::Bytes(b"definitely not audio".to_vec()),
        AnalysisOptions {
            run_id: Some("broken-run".to_string()),
            ..Default::default()
        },
    );
    assert!(result.is_error());
    assert_eq!(result.run_id, "broken-run");
    assert!(result.features.is_empty());
    assert!(result.risk.is_none());
    assert_eq!(result.report.len(), 1);

    let json = serde_json::to_value(&result).unwrap();
    assert!(json["error"].is_string());
}

#[test]
fn test_missing_file_gives_structured_error() {
    let result = analyzer().analyze(
        AudioInput::Path("/nonexistent/recording.wav".into()),
        AnalysisOptions::default(),
    );
    assert!(result.error.as_deref().unwrap_or_default().contains("Failed to decode audio"));
}

#[test]
fn test_wrong_sample_rate_is_pipeline_error() {
    let result = analyzer().analyze_samples(
        SampleSequence::new(vowel(200.0, 0.5, 8000, 0.5), 8000),
        AnalysisOptions::default(),
    );
    assert!(result.error.unwrap().contains("16000"));
}

#[test]
fn test_utterances_are_segmented_and_merged() {
    let samples = utterances(4, 0.6, 0.3);
    let options = AnalysisOptions {
        save_intermediates: true,
        run_id: Some("segments".to_string()),
    };
    let result = analyzer().analyze_samples(SampleSequence::new(samples, SR), options);
    assert!(result.error.is_none(), "{:?}", result.error);
    assert_eq!(result.audio_summary.segments, 4);

    // 1.2 s of the 3.6 s recording is silence between utterances
    let pause = result.features["pause_ratio"];
    assert!(pause > 0.3 && pause < 0.45, "pause ratio {}", pause);

    let intermediates = result.intermediates.as_ref().unwrap();
    assert_eq!(intermediates.segments.len(), 4);
    assert!(intermediates.segments.windows(2).all(|w| w[0].end_sec <= w[1].start_sec));
    assert!(!intermediates.spectrogram.db.is_empty());
    assert_eq!(intermediates.waveform.amplitude.len(), (3.6 * SR as f64) as usize);
    assert_eq!(intermediates.pitch_contour.len(), intermediates.intensity_contour.len());
}

#[test]
fn test_intermediates_absent_by_default() {
    let result = analyzer().analyze_samples(SampleSequence::new(vowel(200.0, 1.0, SR, 0.5), SR), AnalysisOptions::default());
    assert!(result.intermediates.is_none());
    let json = serde_json::to_value(&result).unwrap();
    assert!(json.get("intermediates").is_none());
}

#[test]
fn test_russian_report_language() {
    let config = AnalyzerConfig {
        report_language: ReportLanguage::Ru,
        ..Default::default()
    };
    let analyzer = Analyzer::new(config).unwrap();
    let result = analyzer.analyze_samples(SampleSequence::new(vowel(200.0, 1.0, SR, 0.5), SR), AnalysisOptions::default());
    assert!(result.risk_text.contains("согласно"));
    assert!(result.report.last().unwrap().starts_with("Риск ПД"));
}

#[test]
fn test_forced_mcleod_engine() {
    let config = AnalyzerConfig {
        engine: EnginePreference::Mcleod,
        ..Default::default()
    };
    let analyzer = Analyzer::new(config).unwrap();
    assert_eq!(analyzer.engine_name(), "mcleod");
    let result = analyzer.analyze_samples(SampleSequence::new(vowel(220.0, 1.0, SR, 0.5), SR), AnalysisOptions::default());
    assert_eq!(result.engine, "mcleod");
    let f0 = result.features["f0_mean_hz"];
    assert!((f0 - 220.0).abs() < 8.0, "F0 {}", f0);
}

#[test]
fn test_concurrent_analyses_share_one_analyzer() {
    let analyzer = analyzer();
    let samples = vowel(170.0, 1.0, SR, 0.5);
    let reference = analyzer.analyze_samples(SampleSequence::new(samples.clone(), SR), AnalysisOptions::default());

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let samples = samples.clone();
                let analyzer = &analyzer;
                scope.spawn(move || analyzer.analyze_samples(SampleSequence::new(samples, SR), AnalysisOptions::default()))
            })
            .collect();
        for handle in handles {
            let result = handle.join().unwrap();
            assert_eq!(result.features, reference.features);
            assert_ne!(result.run_id, reference.run_id);
        }
    });
}

#[test]
fn test_result_is_idempotent() {
    let analyzer = analyzer();
    let samples = utterances(3, 0.7, 0.2);
    let a = analyzer.analyze_samples(SampleSequence::new(samples.clone(), SR), AnalysisOptions::default());
    let b = analyzer.analyze_samples(SampleSequence::new(samples, SR), AnalysisOptions::default());
    assert_eq!(a.features, b.features);
    assert_eq!(a.report, b.report);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_features_always_finite(
        freq in 60.0f64..700.0,
        duration in 0.005f64..0.6,
        gain in 0.0f64..4.0,
        noise_seed in any::<u64>(),
    ) {
        // Clipped tone plus noise, from silence to saturation
        let mut state = noise_seed | 1;
        let samples: Vec<f32> = vowel(freq, duration, SR, gain)
            .into_iter()
            .map(|s| {
                state ^= state << 13;
                state ^= state >> 7;
                state ^= state << 17;
                let noise = ((state >> 40) as f32 / (1u64 << 24) as f32 - 0.5) * 0.05 * gain as f32;
                (s + noise).clamp(-1.0, 1.0)
            })
            .collect();
        prop_assume!(!samples.is_empty());

        let extractor = FeatureExtractor::new(SR, EnginePreference::Autocorrelation);
        let extraction = extractor.extract(&samples).unwrap();
        prop_assert!(extraction.features.is_complete());
        for (feature, value) in extraction.features.iter() {
            prop_assert!(value.is_finite(), "{} = {}", feature, value);
        }
    }
}
