//! Audio primitives for remix - buffers, mixing, and time-stretching
//!
//! This module provides the sample-level building blocks of the pipeline:
//! - Buffer: decoded PCM with slice, concat, gain, loop-tile and overlay
//! - Mixer: decibel conversion and saturating sums
//! - Timestretcher: phase vocoder for pitch-preserving speed-up

mod buffer;
mod mixer;
pub mod timestretcher;

pub use buffer::{AudioBuffer, BufferError};
pub use mixer::{db_to_gain, mix_saturating, saturate, SAMPLE_MAX, SAMPLE_MIN};
pub use timestretcher::{FftSize, PhaseLockMode, PhaseVocoder, StretchError, TimeStretchParams};
