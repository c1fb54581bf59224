//! Sample rate conversion and channel layout conforming

use remix_audio::{AudioBuffer, BufferError};
use rubato::{FftFixedInOut, Resampler};
use thiserror::Error;
use tracing::debug;

/// Chunk size handed to the FFT resampler
const RESAMPLE_CHUNK: usize = 1024;

/// Errors from resampling and channel conversion
#[derive(Error, Debug)]
pub enum ResampleError {
    #[error("Invalid target sample rate: {0}")]
    InvalidRate(u32),
    #[error("Invalid target channel count: {0}")]
    InvalidChannels(u16),
    #[error("Resampler error: {0}")]
    Resampler(String),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}

/// Resample to `target_rate`, keeping the duration.
///
/// Output length is `round(frames * target_rate / source_rate)`; the
/// resampler's startup delay is trimmed off.
pub fn resample(buffer: &AudioBuffer, target_rate: u32) -> Result<AudioBuffer, ResampleError> {
    if target_rate == 0 {
        return Err(ResampleError::InvalidRate(target_rate));
    }
    if buffer.sample_rate() == target_rate {
        return Ok(buffer.clone());
    }
    if buffer.is_empty() {
        return Ok(AudioBuffer::empty(target_rate, buffer.channels())?);
    }

    debug!(
        from = buffer.sample_rate(),
        to = target_rate,
        frames = buffer.frames(),
        "Resampling"
    );

    let planes = buffer.deinterleave();
    let resampled = resample_planes(&planes, buffer.sample_rate(), target_rate)?;
    Ok(AudioBuffer::from_planar(&resampled, target_rate)?)
}

fn resample_planes(
    planes: &[Vec<f32>],
    source_rate: u32,
    target_rate: u32,
) -> Result<Vec<Vec<f32>>, ResampleError> {
    let channels = planes.len();
    let frames = planes.first().map(Vec::len).unwrap_or(0);
    let expected = (frames as f64 * target_rate as f64 / source_rate as f64).round() as usize;

    let mut resampler = FftFixedInOut::<f32>::new(
        source_rate as usize,
        target_rate as usize,
        RESAMPLE_CHUNK,
        channels,
    )
    .map_err(|e| ResampleError::Resampler(e.to_string()))?;

    let delay = resampler.output_delay();
    let chunk_size = resampler.input_frames_next();
    let mut block = vec![vec![0.0f32; chunk_size]; channels];
    let mut output: Vec<Vec<f32>> = vec![Vec::with_capacity(expected + delay); channels];

    // Keep feeding (zero-padded past the end) until the delayed tail is flushed
    let mut pos = 0;
    while output[0].len() < expected + delay {
        for (plane, dst) in planes.iter().zip(block.iter_mut()) {
            dst.fill(0.0);
            if pos < frames {
                let end = (pos + chunk_size).min(frames);
                dst[..end - pos].copy_from_slice(&plane[pos..end]);
            }
        }

        let resampled = resampler
            .process(&block, None)
            .map_err(|e| ResampleError::Resampler(e.to_string()))?;

        for (ch, data) in resampled.into_iter().enumerate() {
            output[ch].extend(data);
        }

        pos += chunk_size;
    }

    for channel in output.iter_mut() {
        channel.drain(..delay.min(channel.len()));
        channel.truncate(expected);
    }

    Ok(output)
}

/// Up- or down-mix to `target_channels`.
///
/// Mono fans out to every channel, anything to mono averages, and other
/// layouts fold input channel `i` onto output `i % target_channels`.
pub fn remix_channels(
    buffer: &AudioBuffer,
    target_channels: u16,
) -> Result<AudioBuffer, ResampleError> {
    if target_channels == 0 {
        return Err(ResampleError::InvalidChannels(target_channels));
    }
    let source_channels = buffer.channels();
    if source_channels == target_channels {
        return Ok(buffer.clone());
    }

    let src = source_channels as usize;
    let dst = target_channels as usize;
    let frames = buffer.frames();
    let mut samples = Vec::with_capacity(frames * dst);

    for frame in buffer.samples().chunks_exact(src) {
        if dst > src {
            for c in 0..dst {
                samples.push(frame[c % src]);
            }
        } else {
            for c in 0..dst {
                let (sum, count) = frame
                    .iter()
                    .enumerate()
                    .filter(|(i, _)| i % dst == c)
                    .fold((0.0f32, 0usize), |(sum, count), (_, &s)| (sum + s, count + 1));
                samples.push(sum / count.max(1) as f32);
            }
        }
    }

    Ok(AudioBuffer::new(samples, buffer.sample_rate(), target_channels)?)
}

/// Bring `buffer` to the given rate and channel layout
pub fn conform(
    buffer: AudioBuffer,
    target_rate: u32,
    target_channels: u16,
) -> Result<AudioBuffer, ResampleError> {
    if buffer.sample_rate() == target_rate && buffer.channels() == target_channels {
        return Ok(buffer);
    }

    let remixed = remix_channels(&buffer, target_channels)?;
    resample(&remixed, target_rate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, sample_rate: u32, channels: u16, frames: usize) -> AudioBuffer {
        let mut samples = Vec::with_capacity(frames * channels as usize);
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
            for _ in 0..channels {
                samples.push(s);
            }
        }
        AudioBuffer::new(samples, sample_rate, channels).unwrap()
    }

    #[test]
    fn test_resample_keeps_duration() {
        let buf = sine(440.0, 44100, 2, 44100);
        let out = resample(&buf, 48000).unwrap();
        assert_eq!(out.sample_rate(), 48000);
        assert_eq!(out.channels(), 2);
        assert_eq!(out.frames(), 48000);
    }

    #[test]
    fn test_resample_downward_odd_length() {
        let buf = sine(440.0, 48000, 1, 12345);
        let out = resample(&buf, 22050).unwrap();
        assert_eq!(out.frames(), (12345.0f64 * 22050.0 / 48000.0).round() as usize);
    }

    #[test]
    fn test_resample_preserves_level() {
        let buf = sine(440.0, 22050, 1, 22050);
        let out = resample(&buf, 44100).unwrap();
        let middle = &out.samples()[4410..39690];
        let peak = middle.iter().fold(0.0f32, |a, s| a.max(s.abs()));
        assert!((peak - 0.5).abs() < 0.05, "peak {}", peak);
    }

    #[test]
    fn test_resample_same_rate_is_clone() {
        let buf = sine(440.0, 44100, 1, 100);
        assert_eq!(resample(&buf, 44100).unwrap(), buf);
        assert!(resample(&buf, 0).is_err());
    }

    #[test]
    fn test_resample_empty() {
        let buf = AudioBuffer::empty(44100, 2).unwrap();
        let out = resample(&buf, 48000).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.sample_rate(), 48000);
    }

    #[test]
    fn test_mono_to_stereo() {
        let buf = AudioBuffer::new(vec![0.1, 0.2, 0.3], 8000, 1).unwrap();
        let stereo = remix_channels(&buf, 2).unwrap();
        assert_eq!(stereo.samples(), &[0.1, 0.1, 0.2, 0.2, 0.3, 0.3]);
    }

    #[test]
    fn test_stereo_to_mono() {
        let buf = AudioBuffer::new(vec![0.2, 0.4, -1.0, 1.0], 8000, 2).unwrap();
        let mono = remix_channels(&buf, 1).unwrap();
        assert_eq!(mono.frames(), 2);
        assert!((mono.samples()[0] - 0.3).abs() < 1e-6);
        assert!(mono.samples()[1].abs() < 1e-6);
    }

    #[test]
    fn test_conform() {
        let buf = sine(440.0, 22050, 1, 22050);
        let out = conform(buf, 44100, 2).unwrap();
        assert_eq!(out.sample_rate(), 44100);
        assert_eq!(out.channels(), 2);
        assert_eq!(out.frames(), 44100);
    }
}
