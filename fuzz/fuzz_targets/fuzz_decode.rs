//! Fuzz testing for the container decoder
//!
//! Arbitrary bytes must decode or fail with an error, never panic.
//!
//! Run with: cargo +nightly fuzz run fuzz_decode

#![no_main]

use libfuzzer_sys::fuzz_target;
use dysphonia_analyzer::audio::load_bytes;

fuzz_target!(|data: &[u8]| {
    if let Ok(audio) = load_bytes(data) {
        assert_eq!(audio.sample_rate, 16000);
    }
});
