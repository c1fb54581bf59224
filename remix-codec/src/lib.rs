//! Codec gateway for remix - decoding, resampling, and export encoding
//!
//! Everything that turns bytes into [`AudioBuffer`]s and back lives here,
//! along with the format conversions the pipeline needs between them.

mod decoder;
mod encoder;
mod resample;
#[cfg(test)]
mod test_support;

pub use decoder::{AudioDecoder, DecodeError};
pub use encoder::{encode, EncodeError, ExportFormat, ExportSettings, MP3_MAX_CHANNELS};
pub use resample::{conform, remix_channels, resample, ResampleError};

use remix_audio::{AudioBuffer, PhaseVocoder, StretchError, TimeStretchParams};

/// Single entry point for decode, encode, format conversion and re-timing.
///
/// Holds only configuration, so one gateway can be shared by reference
/// across worker threads.
#[derive(Debug, Clone, Default)]
pub struct CodecGateway {
    decoder: AudioDecoder,
    export: ExportSettings,
    stretch: TimeStretchParams,
}

impl CodecGateway {
    /// Create a gateway exporting with the given settings
    pub fn new(export: ExportSettings) -> Self {
        Self {
            export,
            ..Default::default()
        }
    }

    /// Override phase vocoder parameters used by [`CodecGateway::true_speed_change`]
    pub fn with_stretch_params(mut self, params: TimeStretchParams) -> Self {
        self.stretch = params;
        self
    }

    pub fn export_settings(&self) -> &ExportSettings {
        &self.export
    }

    /// Decode encoded bytes of any supported container/codec
    pub fn decode(&self, bytes: Vec<u8>) -> Result<AudioBuffer, DecodeError> {
        self.decoder.decode(bytes)
    }

    /// Encode to the configured export format
    pub fn encode(&self, buffer: &AudioBuffer) -> Result<Vec<u8>, EncodeError> {
        encode(buffer, &self.export)
    }

    /// Resample to `rate`, keeping duration
    pub fn resample(&self, buffer: &AudioBuffer, rate: u32) -> Result<AudioBuffer, ResampleError> {
        resample(buffer, rate)
    }

    /// Normalize to the given sample rate and channel count
    pub fn conform(
        &self,
        buffer: AudioBuffer,
        rate: u32,
        channels: u16,
    ) -> Result<AudioBuffer, ResampleError> {
        conform(buffer, rate, channels)
    }

    /// Play `factor` times faster at the same pitch.
    ///
    /// Output duration is `input_duration / factor`.
    pub fn true_speed_change(
        &self,
        buffer: &AudioBuffer,
        factor: f64,
    ) -> Result<AudioBuffer, StretchError> {
        PhaseVocoder::new(self.stretch).process_buffer(buffer, factor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::sine_wav;

    #[test]
    fn test_true_speed_change_halves_duration() {
        let gateway = CodecGateway::default();
        let buf = gateway.decode(sine_wav(440.0, 44100, 2, 3.0)).unwrap();
        let fast = gateway.true_speed_change(&buf, 2.0).unwrap();
        assert!((fast.duration_secs() - 1.5).abs() < 0.01);
        assert_eq!(fast.sample_rate(), 44100);
        assert_eq!(fast.channels(), 2);
    }

    #[test]
    fn test_gateway_round_trip_wav() {
        let gateway = CodecGateway::new(ExportSettings {
            format: ExportFormat::Wav,
            bitrate_kbps: 0,
        });
        let buf = gateway.decode(sine_wav(440.0, 48000, 1, 0.5)).unwrap();
        let bytes = gateway.encode(&buf).unwrap();
        let again = gateway.decode(bytes).unwrap();
        assert_eq!(again.frames(), buf.frames());
        for (a, b) in again.samples().iter().zip(buf.samples()) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_conform_through_gateway() {
        let gateway = CodecGateway::default();
        let buf = gateway.decode(sine_wav(440.0, 22050, 1, 1.0)).unwrap();
        let out = gateway.conform(buf, 44100, 2).unwrap();
        assert_eq!(out.channels(), 2);
        assert_eq!(out.frames(), 44100);
    }
}
