//! Fixtures for engine tests

use remix_audio::AudioBuffer;
use remix_codec::{encode, ExportFormat, ExportSettings};
use std::f32::consts::PI;

/// Sine tone at half scale, identical on every channel
pub fn sine(freq: f32, seconds: f64, sample_rate: u32, channels: u16) -> AudioBuffer {
    let frames = (seconds * sample_rate as f64).round() as usize;
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let s = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
        for _ in 0..channels {
            samples.push(s);
        }
    }
    AudioBuffer::new(samples, sample_rate, channels).unwrap()
}

pub fn silence(seconds: f64, sample_rate: u32, channels: u16) -> AudioBuffer {
    let frames = (seconds * sample_rate as f64).round() as usize;
    AudioBuffer::silence(frames, sample_rate, channels).unwrap()
}

/// 16-bit WAV encoding of `buffer`
pub fn wav_bytes(buffer: &AudioBuffer) -> Vec<u8> {
    let settings = ExportSettings {
        format: ExportFormat::Wav,
        ..Default::default()
    };
    encode(buffer, &settings).unwrap()
}

/// Sign changes per second on the first channel
pub fn zero_crossing_rate(buffer: &AudioBuffer) -> f64 {
    let ch = buffer.channels() as usize;
    let first: Vec<f32> = buffer.samples().iter().step_by(ch).copied().collect();
    let crossings = first
        .windows(2)
        .filter(|w| (w[0] >= 0.0) != (w[1] >= 0.0))
        .count();
    crossings as f64 / buffer.duration_secs()
}
