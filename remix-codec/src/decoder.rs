//! In-memory audio decoding

use remix_audio::AudioBuffer;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that can occur while decoding
#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("Empty input")]
    Empty,
    #[error("Unrecognized container or codec: {0}")]
    UnsupportedFormat(String),
    #[error("No audio track found in stream")]
    NoAudioTrack,
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Decoded stream has an invalid layout: {0}")]
    Layout(String),
}

/// Decoder for arbitrary container/codec bytes using Symphonia
#[derive(Debug, Default, Clone)]
pub struct AudioDecoder {
    /// Optional extension hint (e.g. "mp3") to speed up probing
    extension_hint: Option<String>,
}

impl AudioDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a decoder that hints the prober with a file extension
    pub fn with_extension_hint(ext: impl Into<String>) -> Self {
        Self {
            extension_hint: Some(ext.into()),
        }
    }

    /// Decode a complete encoded stream held in memory
    pub fn decode(&self, bytes: Vec<u8>) -> Result<AudioBuffer, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let mss = MediaSourceStream::new(Box::new(Cursor::new(bytes)), Default::default());

        let mut hint = Hint::new();
        if let Some(ext) = self.extension_hint.as_deref() {
            hint.with_extension(ext);
        }

        // Probe the format
        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut format = probed.format;

        // Find first audio track
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or(DecodeError::NoAudioTrack)?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let mut decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

        let mut sample_rate = codec_params.sample_rate;
        let mut channels = codec_params.channels.map(|c| c.count() as u16);
        let mut samples: Vec<f32> = Vec::new();
        let mut skipped_packets = 0usize;

        loop {
            let packet = match format.next_packet() {
                Ok(p) => p,
                Err(SymphoniaError::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    break;
                }
                Err(SymphoniaError::ResetRequired) => break,
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            };

            if packet.track_id() != track_id {
                continue;
            }

            let decoded = match decoder.decode(&packet) {
                Ok(d) => d,
                Err(SymphoniaError::DecodeError(msg)) => {
                    // Corrupt packet; keep going like a player would
                    skipped_packets += 1;
                    warn!("Skipping undecodable packet: {}", msg);
                    continue;
                }
                Err(e) => return Err(DecodeError::Decode(e.to_string())),
            };

            let spec = *decoded.spec();
            sample_rate.get_or_insert(spec.rate);
            channels.get_or_insert(spec.channels.count() as u16);

            let duration = decoded.capacity() as u64;
            let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
            sample_buf.copy_interleaved_ref(decoded);
            samples.extend_from_slice(sample_buf.samples());
        }

        let sample_rate = sample_rate.ok_or(DecodeError::NoAudioTrack)?;
        let channels = channels.ok_or(DecodeError::NoAudioTrack)?;

        if samples.is_empty() && skipped_packets > 0 {
            return Err(DecodeError::Decode(format!(
                "all {} packets failed to decode",
                skipped_packets
            )));
        }

        debug!(
            sample_rate,
            channels,
            frames = samples.len() / channels.max(1) as usize,
            skipped_packets,
            "Decoded stream"
        );

        AudioBuffer::new(samples, sample_rate, channels)
            .map_err(|e| DecodeError::Layout(e.to_string()))
    }
}
