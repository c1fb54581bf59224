//! Export encoding

use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, InterleavedPcm, MonoPcm, Quality};
use crate::resample::remix_channels;
use remix_audio::AudioBuffer;
use std::fmt;
use std::io::Cursor;
use std::str::FromStr;
use thiserror::Error;
use tracing::debug;

/// Errors that can occur while encoding
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Unsupported export format: {0}")]
    UnsupportedFormat(String),
    #[error("{format} does not support {channels} channels")]
    UnsupportedChannels { format: ExportFormat, channels: u16 },
    #[error("Encoder error: {0}")]
    Encoder(String),
}

/// Container/codec of the exported mix
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    /// MPEG-1 Layer III via LAME
    #[default]
    Mp3,
    /// 16-bit PCM WAV
    Wav,
}

impl ExportFormat {
    /// File extension without the dot
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "mp3",
            ExportFormat::Wav => "wav",
        }
    }

    /// MIME type for delivery
    pub fn mime_type(self) -> &'static str {
        match self {
            ExportFormat::Mp3 => "audio/mpeg",
            ExportFormat::Wav => "audio/wav",
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ExportFormat {
    type Err = EncodeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mp3" => Ok(ExportFormat::Mp3),
            "wav" | "wave" => Ok(ExportFormat::Wav),
            other => Err(EncodeError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Export target settings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSettings {
    pub format: ExportFormat,
    /// MP3 constant bitrate in kbps (ignored for WAV)
    pub bitrate_kbps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            format: ExportFormat::Mp3,
            bitrate_kbps: 192,
        }
    }
}

/// Encode a buffer to the requested export format
pub fn encode(buffer: &AudioBuffer, settings: &ExportSettings) -> Result<Vec<u8>, EncodeError> {
    let bytes = match settings.format {
        ExportFormat::Mp3 => encode_mp3(buffer, settings.bitrate_kbps)?,
        ExportFormat::Wav => encode_wav(buffer)?,
    };

    debug!(
        format = %settings.format,
        frames = buffer.frames(),
        bytes = bytes.len(),
        "Encoded mix"
    );

    Ok(bytes)
}

/// Quantize normalized samples to 16-bit PCM
fn to_i16(samples: &[f32]) -> Vec<i16> {
    samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * 32767.0) as i16)
        .collect()
}

fn mp3_bitrate(kbps: u32) -> Bitrate {
    match kbps {
        0..=96 => Bitrate::Kbps96,
        97..=112 => Bitrate::Kbps112,
        113..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        225..=256 => Bitrate::Kbps256,
        _ => Bitrate::Kbps320,
    }
}

/// Most channels an MP3 stream can carry
pub const MP3_MAX_CHANNELS: u16 = 2;

fn encode_mp3(buffer: &AudioBuffer, bitrate_kbps: u32) -> Result<Vec<u8>, EncodeError> {
    if buffer.channels() == 0 {
        return Err(EncodeError::UnsupportedChannels {
            format: ExportFormat::Mp3,
            channels: 0,
        });
    }

    // Surround layouts fold down to stereo
    let downmixed;
    let buffer = if buffer.channels() > MP3_MAX_CHANNELS {
        debug!(from = buffer.channels(), "Downmixing to stereo for MP3");
        downmixed = remix_channels(buffer, MP3_MAX_CHANNELS)
            .map_err(|e| EncodeError::Encoder(format!("Downmix failed: {}", e)))?;
        &downmixed
    } else {
        buffer
    };
    let channels = buffer.channels();

    let mut builder =
        Builder::new().ok_or_else(|| EncodeError::Encoder("Failed to create LAME encoder".into()))?;

    builder
        .set_num_channels(channels as u8)
        .map_err(|e| EncodeError::Encoder(format!("Invalid channel count: {:?}", e)))?;
    builder
        .set_sample_rate(buffer.sample_rate())
        .map_err(|e| EncodeError::Encoder(format!("Invalid sample rate: {:?}", e)))?;
    builder
        .set_brate(mp3_bitrate(bitrate_kbps))
        .map_err(|e| EncodeError::Encoder(format!("Failed to set bitrate: {:?}", e)))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| EncodeError::Encoder(format!("Failed to set quality: {:?}", e)))?;

    let mut encoder = builder
        .build()
        .map_err(|e| EncodeError::Encoder(format!("Failed to build encoder: {:?}", e)))?;

    let pcm = to_i16(buffer.samples());
    let mut mp3 = Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(buffer.frames()));

    let encoded = if channels == 1 {
        encoder.encode_to_vec(MonoPcm(&pcm), &mut mp3)
    } else {
        encoder.encode_to_vec(InterleavedPcm(&pcm), &mut mp3)
    };
    encoded.map_err(|e| EncodeError::Encoder(format!("MP3 encoding failed: {:?}", e)))?;

    encoder
        .flush_to_vec::<FlushNoGap>(&mut mp3)
        .map_err(|e| EncodeError::Encoder(format!("MP3 flush failed: {:?}", e)))?;

    Ok(mp3)
}

fn encode_wav(buffer: &AudioBuffer) -> Result<Vec<u8>, EncodeError> {
    let spec = hound::WavSpec {
        channels: buffer.channels(),
        sample_rate: buffer.sample_rate(),
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(44 + buffer.samples().len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .map_err(|e| EncodeError::Encoder(e.to_string()))?;
        for sample in to_i16(buffer.samples()) {
            writer
                .write_sample(sample)
                .map_err(|e| EncodeError::Encoder(e.to_string()))?;
        }
        writer
            .finalize()
            .map_err(|e| EncodeError::Encoder(e.to_string()))?;
    }

    Ok(cursor.into_inner())
}
