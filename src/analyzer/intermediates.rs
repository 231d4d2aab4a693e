//! Intermediate artifacts of one analysis run.
//!
//! Plain serde structures; persisting them is up to the caller.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;
use tracing::info;

use crate::audio::Segment;
use crate::features::{Articulation, Contour, Spectrogram};

/// Denoised signal as analysed.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Waveform {
    pub sample_rate: u32,
    pub duration_sec: f64,
    pub amplitude: Vec<f32>,
}

pub fn waveform(samples: &[f32], sample_rate: u32) -> Waveform {
    Waveform {
        sample_rate,
        duration_sec: samples.len() as f64 / sample_rate as f64,
        amplitude: samples.to_vec(),
    }
}

/// One utterance segment with its articulation measures.
#[derive(Debug, Clone, Serialize)]
pub struct SegmentArtifact {
    pub start_sec: f64,
    pub end_sec: f64,
    pub rate_syl_sec: f64,
    pub pause_ratio: f64,
    pub pause_frames: usize,
    pub total_frames: usize,
}

impl SegmentArtifact {
    pub fn new(segment: &Segment, sample_rate: u32, articulation: &Articulation) -> Self {
        Self {
            start_sec: segment.start_sec(sample_rate),
            end_sec: segment.end_sec(sample_rate),
            rate_syl_sec: articulation.rate_syl_sec,
            pause_ratio: articulation.pause_ratio,
            pause_frames: articulation.pause_frames,
            total_frames: articulation.total_frames,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Intermediates {
    pub waveform: Waveform,
    pub segments: Vec<SegmentArtifact>,
    pub pitch_contour: Contour,
    pub intensity_contour: Contour,
    pub spectrogram: Spectrogram,
}

impl Intermediates {
    /// Write `intermediates.json` and `denoised.wav` into `dir`.
    pub fn save(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir).with_context(|| format!("Failed to create {:?}", dir))?;

        let json = serde_json::to_string(self).context("Failed to serialize intermediates")?;
        std::fs::write(dir.join("intermediates.json"), json).context("Failed to write intermediates.json")?;

        let wav_path = dir.join("denoised.wav");
        write_wav(&wav_path, &self.waveform)?;
        info!("Saved intermediates to {:?}", dir);
        Ok(())
    }
}

/// Write a waveform as 32-bit float mono WAV.
pub fn write_wav(path: &Path, waveform: &Waveform) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: waveform.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(path, spec).with_context(|| format!("Failed to create {:?}", path))?;
    for &sample in &waveform.amplitude {
        writer.write_sample(sample).context("Failed to write sample")?;
    }
    writer.finalize().context("Failed to finalize WAV")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_waveform_duration() {
        let wf = waveform(&vec![0.0; 8000], 16000);
        assert_eq!(wf.duration_sec, 0.5);
        assert_eq!(wf.amplitude.len(), 8000);
    }

    #[test]
    fn test_save_writes_both_files() {
        let dir = tempfile::tempdir().unwrap();
        let samples: Vec<f32> = (0..1600).map(|i| (i as f32 * 0.05).sin() * 0.3).collect();
        let intermediates = Intermediates {
            waveform: waveform(&samples, 16000),
            ..Default::default()
        };
        intermediates.save(dir.path()).unwrap();

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(dir.path().join("intermediates.json")).unwrap()).unwrap();
        assert_eq!(json["waveform"]["sample_rate"], 16000);

        let reader = hound::WavReader::open(dir.path().join("denoised.wav")).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        assert_eq!(reader.len(), 1600);
    }
}
