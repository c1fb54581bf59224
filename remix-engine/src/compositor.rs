//! Timeline assembly: concatenated foreground over a looped, attenuated bed

use crate::error::RemixError;
use remix_audio::{AudioBuffer, BufferError};
use tracing::debug;

/// Default background attenuation in dB
pub const DEFAULT_BACKGROUND_GAIN_DB: f32 = -15.0;

/// Background track that has already had its gain applied
#[derive(Debug, Clone, PartialEq)]
pub struct AttenuatedBackground(AudioBuffer);

impl AttenuatedBackground {
    pub fn buffer(&self) -> &AudioBuffer {
        &self.0
    }

    pub fn into_inner(self) -> AudioBuffer {
        self.0
    }

    /// Apply a gain-neutral conversion such as resampling
    pub fn try_map<E>(
        self,
        f: impl FnOnce(AudioBuffer) -> Result<AudioBuffer, E>,
    ) -> Result<Self, E> {
        f(self.0).map(Self)
    }
}

/// Folds clips into the foreground and lays the background under it
#[derive(Debug, Clone, Copy)]
pub struct TimelineCompositor {
    background_gain_db: f32,
}

impl Default for TimelineCompositor {
    fn default() -> Self {
        Self::new(DEFAULT_BACKGROUND_GAIN_DB)
    }
}

impl TimelineCompositor {
    pub fn new(background_gain_db: f32) -> Self {
        Self { background_gain_db }
    }

    pub fn background_gain_db(&self) -> f32 {
        self.background_gain_db
    }

    pub fn attenuate(&self, background: AudioBuffer) -> AttenuatedBackground {
        AttenuatedBackground(background.gain(self.background_gain_db))
    }

    /// Concatenate in order, starting from an empty buffer of the first clip's format
    pub fn concat(&self, clips: Vec<AudioBuffer>) -> Result<AudioBuffer, RemixError> {
        let Some(first) = clips.first() else {
            return Err(RemixError::Composition("no clips to concatenate".into()));
        };

        clips
            .iter()
            .try_fold(first.empty_like(), |timeline, clip| timeline.concat(clip))
            .map_err(composition)
    }

    /// Loop or cut the background to exactly the foreground's length
    pub fn fit_background(
        &self,
        background: &AttenuatedBackground,
        foreground: &AudioBuffer,
    ) -> Result<AudioBuffer, RemixError> {
        let bed = background.buffer();
        let target_ms = foreground.duration_ms();

        if bed.frames() < foreground.frames() {
            let tiles = bed.tile_count(target_ms).map_err(composition)?;
            debug!(
                tiles,
                background_secs = bed.duration_secs(),
                foreground_secs = foreground.duration_secs(),
                "Looping background"
            );
            bed.loop_tile(target_ms).map_err(composition)
        } else {
            Ok(bed.slice(0.0, target_ms))
        }
    }

    /// Build the final timeline.
    ///
    /// An empty foreground is refused before any looping is attempted.
    pub fn compose(
        &self,
        clips: Vec<AudioBuffer>,
        background: Option<AttenuatedBackground>,
    ) -> Result<AudioBuffer, RemixError> {
        let foreground = self.concat(clips)?;
        if foreground.is_empty() {
            return Err(RemixError::Composition(
                "all clips are empty after trimming".into(),
            ));
        }

        let Some(background) = background else {
            return Ok(foreground);
        };

        if background.buffer().is_empty() {
            return Err(RemixError::Composition("background music is empty".into()));
        }

        let bed = self.fit_background(&background, &foreground)?;
        bed.overlay(&foreground).map_err(composition)
    }
}

fn composition(err: BufferError) -> RemixError {
    RemixError::Composition(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use remix_audio::db_to_gain;

    fn constant(value: f32, frames: usize, sample_rate: u32, channels: u16) -> AudioBuffer {
        AudioBuffer::new(vec![value; frames * channels as usize], sample_rate, channels).unwrap()
    }

    fn ramp(frames: usize, sample_rate: u32) -> AudioBuffer {
        let samples = (0..frames).map(|i| (i as f32 / frames as f32) * 0.5).collect();
        AudioBuffer::new(samples, sample_rate, 1).unwrap()
    }

    #[test]
    fn test_concat_in_order() {
        let compositor = TimelineCompositor::default();
        let a = constant(0.1, 3, 8000, 1);
        let b = constant(0.2, 2, 8000, 1);
        let out = compositor.concat(vec![a, b]).unwrap();
        assert_eq!(out.samples(), &[0.1, 0.1, 0.1, 0.2, 0.2]);
    }

    #[test]
    fn test_concat_rejects_mixed_formats() {
        let compositor = TimelineCompositor::default();
        let a = constant(0.1, 3, 8000, 1);
        let b = constant(0.2, 3, 16000, 1);
        assert!(matches!(
            compositor.concat(vec![a, b]),
            Err(RemixError::Composition(_))
        ));
    }

    #[test]
    fn test_background_looped_and_truncated() {
        // 10s of foreground over a 4s bed: three tiles, cut to 10s
        let rate = 1000;
        let compositor = TimelineCompositor::default();
        let foreground = constant(0.0, 10 * rate, rate as u32, 1);
        let bed = ramp(4 * rate, rate as u32);

        let background = compositor.attenuate(bed.clone());
        assert_eq!(bed.tile_count(foreground.duration_ms()).unwrap(), 3);

        let out = compositor
            .compose(vec![foreground.clone()], Some(background))
            .unwrap();
        assert_eq!(out.frames(), foreground.frames());

        let gain = db_to_gain(-15.0);
        for t in [0usize, 500, 3999, 4000, 8500, 9999] {
            let expected = bed.samples()[t % (4 * rate)] * gain;
            assert!(
                (out.samples()[t] - expected).abs() < 1e-6,
                "frame {}: {} vs {}",
                t,
                out.samples()[t],
                expected
            );
        }
    }

    #[test]
    fn test_longer_background_is_cut() {
        let compositor = TimelineCompositor::new(0.0);
        let foreground = constant(0.25, 300, 1000, 2);
        let background = compositor.attenuate(constant(0.25, 1000, 1000, 2));

        let out = compositor.compose(vec![foreground], Some(background)).unwrap();
        assert_eq!(out.frames(), 300);
        assert!(out.samples().iter().all(|s| (s - 0.5).abs() < 1e-6));
    }

    #[test]
    fn test_empty_foreground_is_rejected() {
        let compositor = TimelineCompositor::default();
        let empty = AudioBuffer::empty(8000, 1).unwrap();
        let background = compositor.attenuate(constant(0.1, 100, 8000, 1));

        assert!(matches!(
            compositor.compose(vec![empty.clone()], Some(background)),
            Err(RemixError::Composition(_))
        ));
        assert!(matches!(
            compositor.compose(vec![empty], None),
            Err(RemixError::Composition(_))
        ));
    }

    #[test]
    fn test_empty_background_is_rejected() {
        let compositor = TimelineCompositor::default();
        let foreground = constant(0.1, 100, 8000, 1);
        let background = compositor.attenuate(AudioBuffer::empty(8000, 1).unwrap());
        assert!(matches!(
            compositor.compose(vec![foreground], Some(background)),
            Err(RemixError::Composition(_))
        ));
    }

    #[test]
    fn test_overlay_saturates() {
        let compositor = TimelineCompositor::new(0.0);
        let foreground = constant(0.9, 10, 8000, 1);
        let background = compositor.attenuate(constant(0.9, 10, 8000, 1));
        let out = compositor.compose(vec![foreground], Some(background)).unwrap();
        assert!(out.samples().iter().all(|&s| s == 1.0));
    }
}
