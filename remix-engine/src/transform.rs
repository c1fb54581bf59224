//! Per-clip decode, trim and speed change

use crate::error::{RemixError, SourceRole, TransformStage};
use crate::request::ClipEdit;
use remix_audio::AudioBuffer;
use remix_codec::{CodecGateway, ResampleError};
use tracing::debug;

/// Longest clip, after edits, accepted by default (one hour)
pub const DEFAULT_MAX_CLIP_SECS: f64 = 3600.0;

/// Runs one clip through decode -> trim -> speed
#[derive(Debug, Clone, Copy)]
pub struct ClipTransform<'a> {
    codec: &'a CodecGateway,
    max_clip_secs: f64,
}

impl<'a> ClipTransform<'a> {
    pub fn new(codec: &'a CodecGateway) -> Self {
        Self {
            codec,
            max_clip_secs: DEFAULT_MAX_CLIP_SECS,
        }
    }

    /// Refuse clips whose edited duration would exceed `secs`
    pub fn with_max_clip_secs(mut self, secs: f64) -> Self {
        self.max_clip_secs = secs;
        self
    }

    /// Decode `bytes` and apply the clip's edits.
    ///
    /// Errors carry the clip's role and source reference.
    pub fn process(
        &self,
        role: SourceRole,
        edit: &ClipEdit,
        bytes: Vec<u8>,
    ) -> Result<AudioBuffer, RemixError> {
        let decoded = self
            .codec
            .decode(bytes)
            .map_err(|source| RemixError::Decode {
                role,
                reference: edit.source.clone(),
                source,
            })?;

        debug!(
            %role,
            reference = %edit.source,
            sample_rate = decoded.sample_rate(),
            channels = decoded.channels(),
            duration_secs = decoded.duration_secs(),
            "Decoded clip"
        );

        let trimmed = trim(decoded, edit);
        if edit.speed == 1.0 && trimmed.duration_secs() > self.max_clip_secs {
            return Err(RemixError::Validation(format!(
                "{} lasts {:.1}s, above the {}s limit",
                role,
                trimmed.duration_secs(),
                self.max_clip_secs
            )));
        }
        self.change_speed(role, edit, trimmed)
    }

    fn change_speed(
        &self,
        role: SourceRole,
        edit: &ClipEdit,
        buffer: AudioBuffer,
    ) -> Result<AudioBuffer, RemixError> {
        let speed = edit.speed;
        if speed == 1.0 || buffer.is_empty() {
            return Ok(buffer);
        }

        let before = buffer.duration_secs();
        let projected = before / speed;
        if projected > self.max_clip_secs {
            return Err(RemixError::Validation(format!(
                "{} would last {:.1}s at speed {}, above the {}s limit",
                role, projected, speed, self.max_clip_secs
            )));
        }

        let changed = if speed > 1.0 {
            self.codec
                .true_speed_change(&buffer, speed)
                .map_err(|e| RemixError::transform(role, &edit.source, TransformStage::Speed, e))?
        } else {
            slow_down(self.codec, buffer, speed)
                .map_err(|e| RemixError::transform(role, &edit.source, TransformStage::Speed, e))?
        };

        debug!(
            %role,
            speed,
            before_secs = before,
            after_secs = changed.duration_secs(),
            "Changed clip speed"
        );

        Ok(changed)
    }
}

/// Keep `[trim_start, trim_end)`; an absent end means the clip's own duration
fn trim(buffer: AudioBuffer, edit: &ClipEdit) -> AudioBuffer {
    let duration_ms = buffer.duration_ms();
    let start_ms = edit.trim_start_secs * 1000.0;
    let end_ms = edit
        .trim_end_secs
        .map(|end| (end * 1000.0).min(duration_ms))
        .unwrap_or(duration_ms);

    buffer.trim(start_ms, end_ms)
}

/// Play slower by declaring a lower sample rate, then resample back to the
/// original rate. Duration grows by `1 / speed` and pitch drops with it.
fn slow_down(
    codec: &CodecGateway,
    buffer: AudioBuffer,
    speed: f64,
) -> Result<AudioBuffer, ResampleError> {
    let original_rate = buffer.sample_rate();
    let slowed_rate = (original_rate as f64 * speed).round() as u32;
    if slowed_rate == 0 {
        return Err(ResampleError::InvalidRate(slowed_rate));
    }

    let slowed = buffer.reinterpret_sample_rate(slowed_rate)?;
    codec.resample(&slowed, original_rate)
}
