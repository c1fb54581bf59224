//! In-memory fixtures for codec tests

use std::f32::consts::PI;
use std::io::Cursor;

/// 16-bit WAV bytes holding a sine tone at half scale
pub fn sine_wav(freq: f32, sample_rate: u32, channels: u16, seconds: f32) -> Vec<u8> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let frames = (seconds * sample_rate as f32).round() as usize;
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..frames {
            let s = (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5;
            for _ in 0..channels {
                writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
            }
        }
        writer.finalize().unwrap();
    }
    cursor.into_inner()
}
