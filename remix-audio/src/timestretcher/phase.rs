//! Phase vocoder for pitch-preserving playback rate changes.
//!
//! - Phase propagation from measured instantaneous frequency
//! - Identity phase locking around spectral peaks to reduce phasiness
//! - Spectral-flux transient detection with phase reset

use super::stft::{FftSize, Stft};
use super::StretchError;
use crate::buffer::AudioBuffer;
use rustfft::num_complex::Complex;
use std::f32::consts::PI;
use tracing::debug;

const TWO_PI: f32 = 2.0 * PI;

/// Phase locking modes for different quality/CPU trade-offs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseLockMode {
    /// No phase locking (fastest, most phasiness)
    None,
    /// Identity phase locking (bins inherit the nearest peak's phase offset)
    #[default]
    Identity,
}

/// Time-stretching parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeStretchParams {
    /// Analysis frame size
    pub fft_size: FftSize,
    /// Phase lock mode
    pub phase_lock: PhaseLockMode,
    /// Spectral flux ratio (0.0-1.0) above which a frame counts as a transient
    pub transient_threshold: f32,
}

impl Default for TimeStretchParams {
    fn default() -> Self {
        Self {
            fft_size: FftSize::Medium,
            phase_lock: PhaseLockMode::Identity,
            transient_threshold: 0.6,
        }
    }
}

/// Offline phase vocoder
pub struct PhaseVocoder {
    stft: Stft,
    params: TimeStretchParams,
    /// Nominal phase advance per sample for each bin
    omega: Vec<f32>,
    peaks: Vec<usize>,
}

impl PhaseVocoder {
    /// Create new phase vocoder
    pub fn new(params: TimeStretchParams) -> Self {
        let stft = Stft::new(params.fft_size);
        let size = stft.size();
        let omega = (0..stft.num_bins())
            .map(|k| TWO_PI * k as f32 / size as f32)
            .collect();
        let peaks = Vec::with_capacity(stft.num_bins() / 4);

        Self {
            stft,
            params,
            omega,
            peaks,
        }
    }

    pub fn params(&self) -> TimeStretchParams {
        self.params
    }

    /// Re-time every channel of `buffer` to play `rate` times faster at the same pitch.
    ///
    /// The result has exactly `round(frames / rate)` frames.
    pub fn process_buffer(
        &mut self,
        buffer: &AudioBuffer,
        rate: f64,
    ) -> Result<AudioBuffer, StretchError> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(StretchError::InvalidRate(rate));
        }

        debug!(
            rate,
            frames = buffer.frames(),
            channels = buffer.channels(),
            "Time-stretching buffer"
        );

        let planes: Vec<Vec<f32>> = buffer
            .deinterleave()
            .iter()
            .map(|channel| self.process_channel(channel, rate))
            .collect();

        Ok(AudioBuffer::from_planar(&planes, buffer.sample_rate())?)
    }

    /// Stretch a single channel
    pub fn process_channel(&mut self, input: &[f32], rate: f64) -> Vec<f32> {
        let out_len = (input.len() as f64 / rate).round() as usize;
        if input.is_empty() || out_len == 0 {
            return vec![0.0; out_len];
        }

        let num_bins = self.stft.num_bins();
        let half = self.stft.size() as isize / 2;
        let synthesis_hop = self.stft.hop_size();
        let analysis_hop = synthesis_hop as f64 * rate;
        // Frames are centred on their hop positions; two extra cover the tail
        let frame_count = out_len / synthesis_hop + 2;

        let mut output = vec![0.0f32; out_len];
        let mut window_sum = vec![0.0f32; out_len];

        let mut bins = vec![Complex::new(0.0f32, 0.0); num_bins];
        let mut out_bins = vec![Complex::new(0.0f32, 0.0); num_bins];
        let mut magnitudes = vec![0.0f32; num_bins];
        let mut phases = vec![0.0f32; num_bins];
        let mut prev_magnitudes = vec![0.0f32; num_bins];
        let mut prev_phases = vec![0.0f32; num_bins];
        let mut synth_phases = vec![0.0f32; num_bins];
        let mut prev_analysis_pos = 0isize;

        for frame in 0..frame_count {
            let analysis_pos = (frame as f64 * analysis_hop).round() as isize;
            let synthesis_pos = (frame * synthesis_hop) as isize;

            self.stft.analyze(input, analysis_pos - half, &mut bins);
            for k in 0..num_bins {
                magnitudes[k] = bins[k].norm();
                phases[k] = bins[k].arg();
            }

            let transient = frame == 0 || self.is_transient(&magnitudes, &prev_magnitudes);
            if transient {
                synth_phases.copy_from_slice(&phases);
            } else {
                let hop_in = (analysis_pos - prev_analysis_pos).max(1) as f32;
                let hop_out = synthesis_hop as f32;

                for k in 0..num_bins {
                    let expected = self.omega[k] * hop_in;
                    let deviation = wrap_phase(phases[k] - prev_phases[k] - expected);
                    let true_freq = self.omega[k] + deviation / hop_in;
                    synth_phases[k] = wrap_phase(synth_phases[k] + true_freq * hop_out);
                }

                if self.params.phase_lock == PhaseLockMode::Identity {
                    self.lock_to_peaks(&magnitudes, &phases, &mut synth_phases);
                }
            }

            for k in 0..num_bins {
                out_bins[k] = Complex::from_polar(magnitudes[k], synth_phases[k]);
            }

            self.stft
                .synthesize(&out_bins, &mut output, &mut window_sum, synthesis_pos - half);

            prev_magnitudes.copy_from_slice(&magnitudes);
            prev_phases.copy_from_slice(&phases);
            prev_analysis_pos = analysis_pos;
        }

        for (sample, &weight) in output.iter_mut().zip(&window_sum) {
            if weight > 1e-3 {
                *sample /= weight;
            }
        }

        output
    }

    /// Detect onsets using positive spectral flux relative to frame energy
    fn is_transient(&self, magnitudes: &[f32], prev_magnitudes: &[f32]) -> bool {
        let mut flux = 0.0f32;
        let mut total = 0.0f32;

        for (&mag, &prev) in magnitudes.iter().zip(prev_magnitudes) {
            let diff = mag - prev;
            // Only count increases
            if diff > 0.0 {
                flux += diff * diff;
            }
            total += mag * mag;
        }

        let total = total.sqrt();
        total > 1e-3 && flux.sqrt() / total > self.params.transient_threshold
    }

    /// Identity phase locking: every bin keeps its analysis phase offset
    /// from the peak whose region of influence it falls in.
    fn lock_to_peaks(&mut self, magnitudes: &[f32], phases: &[f32], synth_phases: &mut [f32]) {
        self.peaks.clear();
        let num_bins = magnitudes.len();
        for k in 2..num_bins.saturating_sub(2) {
            let mag = magnitudes[k];
            if mag > magnitudes[k - 2]
                && mag > magnitudes[k - 1]
                && mag > magnitudes[k + 1]
                && mag > magnitudes[k + 2]
            {
                self.peaks.push(k);
            }
        }

        if self.peaks.is_empty() {
            return;
        }

        let mut region_start = 0;
        for (i, &peak) in self.peaks.iter().enumerate() {
            let region_end = match self.peaks.get(i + 1) {
                Some(&next) => (peak + next) / 2,
                None => num_bins - 1,
            };
            let peak_synth = synth_phases[peak];
            let peak_phase = phases[peak];

            for k in region_start..=region_end {
                if k != peak {
                    synth_phases[k] = wrap_phase(peak_synth + phases[k] - peak_phase);
                }
            }
            region_start = region_end + 1;
        }
    }
}

impl Default for PhaseVocoder {
    fn default() -> Self {
        Self::new(TimeStretchParams::default())
    }
}

/// Wrap phase to [-π, π]
#[inline(always)]
fn wrap_phase(phase: f32) -> f32 {
    phase - TWO_PI * ((phase + PI) / TWO_PI).floor()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, frames: usize) -> Vec<f32> {
        (0..frames)
            .map(|i| (2.0 * PI * freq * i as f32 / sample_rate as f32).sin() * 0.5)
            .collect()
    }

    fn zero_crossings(samples: &[f32]) -> usize {
        samples
            .windows(2)
            .filter(|w| (w[0] < 0.0) != (w[1] < 0.0))
            .count()
    }

    fn rms(samples: &[f32]) -> f32 {
        (samples.iter().map(|s| s * s).sum::<f32>() / samples.len() as f32).sqrt()
    }

    #[test]
    fn test_output_length() {
        let mut pv = PhaseVocoder::default();
        let input = sine(440.0, 44100, 44100);
        assert_eq!(pv.process_channel(&input, 2.0).len(), 22050);
        assert_eq!(pv.process_channel(&input, 1.5).len(), 29400);
        assert!(pv.process_channel(&[], 2.0).is_empty());
    }

    #[test]
    fn test_speedup_preserves_pitch() {
        let sample_rate = 44100;
        let mut pv = PhaseVocoder::default();
        let input = sine(440.0, sample_rate, sample_rate as usize * 2);
        let output = pv.process_channel(&input, 2.0);

        // Ignore the edges, where frames run into silence
        let middle = &output[4096..output.len() - 4096];
        let seconds = middle.len() as f32 / sample_rate as f32;
        let freq = zero_crossings(middle) as f32 / 2.0 / seconds;
        assert!((freq - 440.0).abs() < 440.0 * 0.05, "frequency {}", freq);

        let level = rms(middle) / rms(&input);
        assert!(level > 0.8 && level < 1.2, "level ratio {}", level);
    }

    #[test]
    fn test_unity_rate_is_near_passthrough() {
        let mut pv = PhaseVocoder::new(TimeStretchParams {
            phase_lock: PhaseLockMode::None,
            ..Default::default()
        });
        let input = sine(1000.0, 48000, 16384);
        let output = pv.process_channel(&input, 1.0);
        assert_eq!(output.len(), input.len());
        for i in 2048..14336 {
            assert!((output[i] - input[i]).abs() < 1e-2, "sample {}", i);
        }
    }

    #[test]
    fn test_process_buffer_rejects_bad_rate() {
        let mut pv = PhaseVocoder::default();
        let buf = AudioBuffer::silence(100, 44100, 2).unwrap();
        assert!(matches!(
            pv.process_buffer(&buf, 0.0),
            Err(StretchError::InvalidRate(_))
        ));
        assert!(pv.process_buffer(&buf, f64::NAN).is_err());
    }

    #[test]
    fn test_process_buffer_keeps_format() {
        let mut pv = PhaseVocoder::default();
        let buf = AudioBuffer::silence(48000, 48000, 2).unwrap();
        let fast = pv.process_buffer(&buf, 2.0).unwrap();
        assert_eq!(fast.channels(), 2);
        assert_eq!(fast.sample_rate(), 48000);
        assert_eq!(fast.frames(), 24000);
    }

    #[test]
    fn test_phase_wrap() {
        assert!(wrap_phase(0.0).abs() < 0.001);
        assert!((wrap_phase(PI + 0.1) - (-PI + 0.1)).abs() < 0.001);
        assert!((wrap_phase(-PI - 0.1) - (PI - 0.1)).abs() < 0.001);
        assert!((wrap_phase(5.0 * TWO_PI + 0.5) - 0.5).abs() < 0.001);
    }
}
