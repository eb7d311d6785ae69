use std::io::Cursor;

use anyhow::{Context, Result};
use base64::Engine;

/// A finalized audio artifact: complete WAV bytes plus the format facts the
/// rest of the session needs without re-parsing the header.
///
/// Clips are produced by [`crate::audio::AnswerRecorder`] when a recording
/// stops, and received from the peer as question audio. They cross the wire
/// base64-encoded.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Complete WAV file bytes (header + PCM data)
    pub wav_bytes: Vec<u8>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Playback duration in milliseconds
    pub duration_ms: u64,
}

impl AudioClip {
    /// Encode interleaved i16 PCM samples into a WAV clip.
    pub fn from_samples(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Self> {
        let spec = hound::WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };

        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec)
                .context("Failed to create WAV writer")?;
            for &sample in samples {
                writer.write_sample(sample).context("Failed to write WAV sample")?;
            }
            writer.finalize().context("Failed to finalize WAV clip")?;
        }

        let frames = samples.len() as u64 / channels.max(1) as u64;
        let duration_ms = frames * 1000 / sample_rate.max(1) as u64;

        Ok(Self {
            wav_bytes: cursor.into_inner(),
            sample_rate,
            channels,
            duration_ms,
        })
    }

    /// Parse WAV bytes back into a clip, validating the header.
    pub fn from_wav_bytes(wav_bytes: Vec<u8>) -> Result<Self> {
        let reader = hound::WavReader::new(Cursor::new(&wav_bytes))
            .context("Failed to parse WAV header")?;
        let spec = reader.spec();
        let frames = reader.duration() as u64;
        let duration_ms = frames * 1000 / spec.sample_rate.max(1) as u64;

        Ok(Self {
            wav_bytes,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            duration_ms,
        })
    }

    /// Encode the clip for a wire payload.
    pub fn to_b64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(&self.wav_bytes)
    }

    /// Decode a wire payload into a validated clip.
    pub fn from_b64(audio_b64: &str) -> Result<Self> {
        let wav_bytes = base64::engine::general_purpose::STANDARD
            .decode(audio_b64)
            .context("Failed to decode base64 audio artifact")?;
        Self::from_wav_bytes(wav_bytes)
    }

    pub fn is_empty(&self) -> bool {
        self.duration_ms == 0
    }
}
