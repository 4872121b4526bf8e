//! PCM-to-WAV encoder
//!
//! Turns a finished mono `f32` sample buffer into a canonical 16-bit PCM WAV
//! file: a 44-byte RIFF header followed by little-endian `i16` samples.

use std::io::Cursor;
use std::time::Duration;

use crate::error::{Result, SerError};

/// File name used when uploading a recorded clip
pub const WAV_FILE_NAME: &str = "recording.wav";

/// MIME type of an encoded recording
pub const WAV_MIME: &str = "audio/wav";

/// Size of the canonical PCM header
pub const WAV_HEADER_LEN: usize = 44;

/// Quantize one sample to signed 16-bit PCM
///
/// Values are clipped to [-1.0, 1.0]. Negative values scale by 32768 and
/// non-negative values by 32767, so +1.0 maps to `i16::MAX` without overflow.
pub fn quantize(sample: f32) -> i16 {
    let v = sample.clamp(-1.0, 1.0);
    if v < 0.0 {
        (v * 32768.0) as i16
    } else {
        (v * 32767.0) as i16
    }
}

/// An encoded WAV file, immutable once produced
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavBuffer {
    bytes: Vec<u8>,
    sample_rate: u32,
    sample_count: usize,
}

/// Fields recovered from a WAV header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WavHeader {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
    /// Byte length of the PCM data section
    pub data_len: u32,
}

/// Encode mono samples captured at `sample_rate` into a WAV buffer
///
/// A zero sample rate cannot describe playable audio and is rejected.
pub fn encode_wav(samples: &[f32], sample_rate: u32) -> Result<WavBuffer> {
    if sample_rate == 0 {
        return Err(SerError::InvalidAudio("sample rate must be non-zero".to_string()));
    }

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(WAV_HEADER_LEN + samples.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in samples {
            writer.write_sample(quantize(sample))?;
        }
        writer.finalize()?;
    }

    Ok(WavBuffer {
        bytes: cursor.into_inner(),
        sample_rate,
        sample_count: samples.len(),
    })
}

impl WavBuffer {
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sample_count == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn sample_count(&self) -> usize {
        self.sample_count
    }

    /// Audio length implied by the sample count
    pub fn duration(&self) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(self.sample_count as f64 / self.sample_rate as f64)
    }

    /// Parse the emitted header back out of the buffer
    pub fn header(&self) -> Result<WavHeader> {
        let reader = hound::WavReader::new(Cursor::new(self.bytes.as_slice()))?;
        let spec = reader.spec();
        let bytes_per_sample = u32::from(spec.bits_per_sample / 8);

        Ok(WavHeader {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            bits_per_sample: spec.bits_per_sample,
            data_len: reader.len() * bytes_per_sample,
        })
    }

    /// Decode the PCM section back into samples
    pub fn pcm(&self) -> Result<Vec<i16>> {
        let reader = hound::WavReader::new(Cursor::new(self.bytes.as_slice()))?;
        Ok(reader.into_samples::<i16>().collect::<std::result::Result<Vec<_>, _>>()?)
    }
}
