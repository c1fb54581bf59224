//! Decoded PCM audio and the buffer algebra the remix pipeline is built on
//!
//! Every operation here consumes or borrows a buffer and hands back a new
//! owned one. Samples are interleaved `f32` normalized to -1.0..=1.0.

use crate::mixer::{db_to_gain, mix_saturating};
use thiserror::Error;

/// Errors from buffer algebra
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("Format mismatch: {left_rate} Hz/{left_channels} ch vs {right_rate} Hz/{right_channels} ch")]
    FormatMismatch {
        left_rate: u32,
        left_channels: u16,
        right_rate: u32,
        right_channels: u16,
    },
    #[error("Cannot loop a zero-length buffer")]
    EmptyTile,
    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(u32),
    #[error("Invalid channel count: {0}")]
    InvalidChannels(u16),
    #[error("Sample count {samples} is not a multiple of {channels} channels")]
    RaggedFrames { samples: usize, channels: u16 },
}

/// In-memory decoded audio
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    /// Interleaved samples (f32, normalized to -1.0 to 1.0)
    samples: Vec<f32>,
    /// Sample rate in Hz
    sample_rate: u32,
    /// Number of interleaved channels
    channels: u16,
}

impl AudioBuffer {
    /// Wrap interleaved samples
    pub fn new(samples: Vec<f32>, sample_rate: u32, channels: u16) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::InvalidSampleRate(sample_rate));
        }
        if channels == 0 {
            return Err(BufferError::InvalidChannels(channels));
        }
        if samples.len() % channels as usize != 0 {
            return Err(BufferError::RaggedFrames {
                samples: samples.len(),
                channels,
            });
        }

        Ok(Self {
            samples,
            sample_rate,
            channels,
        })
    }

    /// Zero-length buffer in the given format
    pub fn empty(sample_rate: u32, channels: u16) -> Result<Self, BufferError> {
        Self::new(Vec::new(), sample_rate, channels)
    }

    /// Silent buffer of `frames` frames
    pub fn silence(frames: usize, sample_rate: u32, channels: u16) -> Result<Self, BufferError> {
        Self::new(vec![0.0; frames * channels as usize], sample_rate, channels)
    }

    /// Empty buffer sharing this buffer's format
    pub fn empty_like(&self) -> Self {
        Self {
            samples: Vec::new(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channels(&self) -> u16 {
        self.channels
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels as usize
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in milliseconds
    pub fn duration_ms(&self) -> f64 {
        self.frames() as f64 * 1000.0 / self.sample_rate as f64
    }

    /// Duration in seconds
    pub fn duration_secs(&self) -> f64 {
        self.frames() as f64 / self.sample_rate as f64
    }

    /// True when both buffers share sample rate and channel count
    pub fn same_format(&self, other: &AudioBuffer) -> bool {
        self.sample_rate == other.sample_rate && self.channels == other.channels
    }

    /// Convert a millisecond position to a frame index, rounded to nearest
    pub fn ms_to_frame(&self, ms: f64) -> usize {
        if !ms.is_finite() || ms <= 0.0 {
            return 0;
        }
        (ms * self.sample_rate as f64 / 1000.0).round() as usize
    }

    /// Extract `[start_ms, end_ms)`, clamped to the buffer.
    ///
    /// An inverted or out-of-range window yields an empty buffer rather than an error.
    pub fn slice(&self, start_ms: f64, end_ms: f64) -> AudioBuffer {
        let frames = self.frames();
        let start = self.ms_to_frame(start_ms).min(frames);
        let end = self.ms_to_frame(end_ms).min(frames);

        if start >= end {
            return self.empty_like();
        }

        let ch = self.channels as usize;
        Self {
            samples: self.samples[start * ch..end * ch].to_vec(),
            sample_rate: self.sample_rate,
            channels: self.channels,
        }
    }

    /// Trim in place, same semantics as [`AudioBuffer::slice`]
    pub fn trim(mut self, start_ms: f64, end_ms: f64) -> AudioBuffer {
        let frames = self.frames();
        let start = self.ms_to_frame(start_ms).min(frames);
        let end = self.ms_to_frame(end_ms).min(frames);

        if start >= end {
            self.samples.clear();
            return self;
        }

        let ch = self.channels as usize;
        self.samples.truncate(end * ch);
        self.samples.drain(..start * ch);
        self
    }

    /// Append `other` after this buffer. Formats must match.
    pub fn concat(mut self, other: &AudioBuffer) -> Result<AudioBuffer, BufferError> {
        if !self.same_format(other) {
            return Err(BufferError::FormatMismatch {
                left_rate: self.sample_rate,
                left_channels: self.channels,
                right_rate: other.sample_rate,
                right_channels: other.channels,
            });
        }

        self.samples.extend_from_slice(&other.samples);
        Ok(self)
    }

    /// Scale every sample by `10^(db/20)`
    pub fn gain(mut self, db: f32) -> AudioBuffer {
        let gain = db_to_gain(db);
        for sample in self.samples.iter_mut() {
            *sample *= gain;
        }
        self
    }

    /// Number of whole repetitions needed to reach `min_duration_ms`
    pub fn tile_count(&self, min_duration_ms: f64) -> Result<usize, BufferError> {
        if self.is_empty() {
            return Err(BufferError::EmptyTile);
        }
        if min_duration_ms <= 0.0 {
            return Ok(0);
        }
        Ok((min_duration_ms / self.duration_ms()).ceil() as usize)
    }

    /// Repeat end-to-end until at least `min_duration_ms`, then cut to exactly that length
    pub fn loop_tile(&self, min_duration_ms: f64) -> Result<AudioBuffer, BufferError> {
        let repetitions = self.tile_count(min_duration_ms)?;

        let mut samples = Vec::with_capacity(self.samples.len() * repetitions);
        for _ in 0..repetitions {
            samples.extend_from_slice(&self.samples);
        }

        let tiled = Self {
            samples,
            sample_rate: self.sample_rate,
            channels: self.channels,
        };
        Ok(tiled.trim(0.0, min_duration_ms))
    }

    /// Mix `other` onto this buffer starting at offset zero.
    ///
    /// Output length is always `self`'s length; extra samples in `other` are
    /// ignored. Sums saturate at the normalized range.
    pub fn overlay(mut self, other: &AudioBuffer) -> Result<AudioBuffer, BufferError> {
        if !self.same_format(other) {
            return Err(BufferError::FormatMismatch {
                left_rate: self.sample_rate,
                left_channels: self.channels,
                right_rate: other.sample_rate,
                right_channels: other.channels,
            });
        }

        mix_saturating(&mut self.samples, &other.samples);
        Ok(self)
    }

    /// Declare a new sample rate without touching the samples.
    ///
    /// Playback at the new rate shifts both pitch and duration.
    pub fn reinterpret_sample_rate(mut self, new_rate: u32) -> Result<AudioBuffer, BufferError> {
        if new_rate == 0 {
            return Err(BufferError::InvalidSampleRate(new_rate));
        }
        self.sample_rate = new_rate;
        Ok(self)
    }

    /// Split into one `Vec` per channel
    pub fn deinterleave(&self) -> Vec<Vec<f32>> {
        let ch = self.channels as usize;
        (0..ch)
            .map(|c| self.samples.iter().skip(c).step_by(ch).copied().collect())
            .collect()
    }

    /// Build from per-channel data, truncating to the shortest channel
    pub fn from_planar(planes: &[Vec<f32>], sample_rate: u32) -> Result<Self, BufferError> {
        let channels = u16::try_from(planes.len()).map_err(|_| BufferError::InvalidChannels(0))?;
        if channels == 0 {
            return Err(BufferError::InvalidChannels(0));
        }

        let frames = planes.iter().map(Vec::len).min().unwrap_or(0);
        let mut samples = Vec::with_capacity(frames * planes.len());
        for frame in 0..frames {
            for plane in planes {
                samples.push(plane[frame]);
            }
        }

        Self::new(samples, sample_rate, channels)
    }

    /// Absolute peak level
    pub fn peak(&self) -> f32 {
        self.samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()))
    }
}
