//! Fuzz testing for feature extraction
//!
//! Any finite sample buffer must yield a complete, finite feature vector.
//!
//! Run with: cargo +nightly fuzz run fuzz_extract

#![no_main]

use libfuzzer_sys::fuzz_target;
use dysphonia_analyzer::config::EnginePreference;
use dysphonia_analyzer::features::FeatureExtractor;

fuzz_target!(|data: &[u8]| {
    let samples: Vec<f32> = data
        .chunks_exact(4)
        .map(|chunk| {
            let sample = f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
            if sample.is_finite() {
                sample.clamp(-1.0, 1.0)
            } else {
                0.0
            }
        })
        .collect();

    if samples.is_empty() {
        return;
    }

    for preference in [EnginePreference::Autocorrelation, EnginePreference::Mcleod] {
        let extractor = FeatureExtractor::new(16000, preference);
        let extraction = extractor.extract(&samples).unwrap();
        assert!(extraction.features.is_complete());
    }
});
