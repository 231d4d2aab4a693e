//! Recording decoder.
//!
//! WAV goes through `hound`; anything else (MP3, FLAC, OGG/Vorbis, AAC/M4A)
//! is probed and decoded with symphonia. Output is always mono at 16kHz.

use std::io::Cursor;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

use super::resampler::{resample_to_target, TARGET_SAMPLE_RATE};
use super::{DecodeError, SampleSequence};

/// Decode a recording from disk.
pub fn load(path: &Path) -> Result<SampleSequence, DecodeError> {
    let bytes = std::fs::read(path)?;
    let extension = path.extension().and_then(|e| e.to_str());
    debug!("Loading {:?} ({} bytes)", path, bytes.len());
    decode(bytes, extension)
}

/// Decode a recording already held in memory.
pub fn load_bytes(bytes: &[u8]) -> Result<SampleSequence, DecodeError> {
    decode(bytes.to_vec(), None)
}

fn decode(bytes: Vec<u8>, extension: Option<&str>) -> Result<SampleSequence, DecodeError> {
    let (mono, native_rate) = if is_wav(&bytes, extension) {
        match decode_wav(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                // e.g. ADPCM payloads hound doesn't read
                warn!("hound could not read WAV ({}), retrying with symphonia", e);
                decode_with_symphonia(bytes, extension)?
            }
        }
    } else {
        decode_with_symphonia(bytes, extension)?
    };

    if mono.is_empty() {
        return Err(DecodeError::Empty);
    }

    debug!(
        "Decoded {} mono samples at {} Hz ({:.2}s)",
        mono.len(),
        native_rate,
        mono.len() as f64 / native_rate as f64
    );

    let samples = resample_to_target(mono, native_rate)?;
    Ok(SampleSequence::new(samples, TARGET_SAMPLE_RATE))
}

fn is_wav(bytes: &[u8], extension: Option<&str>) -> bool {
    let header = bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE";
    let named = extension
        .map(|e| e.eq_ignore_ascii_case("wav") || e.eq_ignore_ascii_case("wave"))
        .unwrap_or(false);
    header || (named && bytes.len() >= 4 && &bytes[0..4] == b"RIFF")
}

fn decode_wav(bytes: &[u8]) -> Result<(Vec<f32>, u32), DecodeError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| DecodeError::Unsupported(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = 1.0 / (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| DecodeError::Unsupported(e.to_string()))?
        }
    };

    Ok((downmix(&interleaved, channels), spec.sample_rate))
}

fn decode_with_symphonia(bytes: Vec<u8>, extension: Option<&str>) -> Result<(Vec<f32>, u32), DecodeError> {
    let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = extension {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or(DecodeError::NoAudioTrack)?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Unsupported(e.to_string()))?;

    let mut native_rate = codec_params.sample_rate.unwrap_or(0);
    let mut mono = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt frame: skip it, keep the rest of the stream
                warn!("Skipping undecodable packet: {}", e);
                continue;
            }
            Err(e) => return Err(DecodeError::Unsupported(e.to_string())),
        };

        let spec = *decoded.spec();
        if native_rate == 0 {
            native_rate = spec.rate;
        }
        let channels = spec.channels.count().max(1);

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
        buffer.copy_interleaved_ref(decoded);
        mono.extend(downmix(buffer.samples(), channels));
    }

    if native_rate == 0 {
        return Err(DecodeError::Unsupported("unknown sample rate".to_string()));
    }

    Ok((mono, native_rate))
}

/// Average interleaved channels into one.
fn downmix(interleaved: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
