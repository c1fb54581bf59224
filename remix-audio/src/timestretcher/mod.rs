//! Pitch-independent time-stretching for whole buffers.
//!
//! A phase vocoder re-times decoded clips so they play faster without
//! sounding higher.
//!
//! # Usage
//!
//! ```rust,ignore
//! use remix_audio::timestretcher::{PhaseVocoder, TimeStretchParams};
//!
//! let mut vocoder = PhaseVocoder::new(TimeStretchParams::default());
//! let faster = vocoder.process_buffer(&clip, 2.0)?; // half the length, same pitch
//! ```
//!
//! # Algorithm Details
//!
//! 1. Window the input into overlapping frames spaced by the analysis hop
//! 2. Convert to frequency domain via FFT
//! 3. Measure each bin's true frequency from its phase advance
//! 4. Re-accumulate phase at the synthesis hop
//! 5. Convert back via IFFT and overlap-add, normalized by the window energy

mod phase;
mod stft;

pub use phase::{PhaseLockMode, PhaseVocoder, TimeStretchParams};
pub use stft::{FftSize, Stft};

use crate::buffer::BufferError;
use thiserror::Error;

/// Errors from time-stretching
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StretchError {
    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),
    #[error(transparent)]
    Buffer(#[from] BufferError),
}
