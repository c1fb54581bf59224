//! Offline Short-Time Fourier Transform for whole-buffer processing.
//!
//! Frames are read from and overlap-added into plain slices at arbitrary
//! (possibly negative) offsets; anything outside the slice is treated as
//! silence on input and discarded on output.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// FFT size options for time-stretching
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FftSize {
    /// 1024 samples - better transients, less frequency resolution
    Small = 1024,
    /// 2048 samples - balanced (recommended)
    #[default]
    Medium = 2048,
    /// 4096 samples - smoother tones, smeared attacks
    Large = 4096,
}

impl FftSize {
    #[inline]
    pub fn as_usize(self) -> usize {
        self as usize
    }

    #[inline]
    pub fn hop_size(self) -> usize {
        // 75% overlap
        self.as_usize() / 4
    }
}

/// Short-Time Fourier Transform processor
pub struct Stft {
    size: usize,
    hop_size: usize,
    /// Pre-computed Hann window, used for both analysis and synthesis
    window: Vec<f32>,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    /// Working buffer for FFT (avoid allocation per frame)
    work: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Normalization factor for IFFT
    norm_factor: f32,
}

impl Stft {
    /// Create new STFT processor
    pub fn new(fft_size: FftSize) -> Self {
        let size = fft_size.as_usize();
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);

        let window: Vec<f32> = (0..size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
            .collect();

        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());

        Self {
            size,
            hop_size: fft_size.hop_size(),
            window,
            forward,
            inverse,
            work: vec![Complex::new(0.0, 0.0); size],
            scratch: vec![Complex::new(0.0, 0.0); scratch_len],
            norm_factor: 1.0 / size as f32,
        }
    }

    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    #[inline]
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    /// Number of positive frequency bins (size/2 + 1)
    #[inline]
    pub fn num_bins(&self) -> usize {
        self.size / 2 + 1
    }

    /// Window and transform the frame of `input` starting at `start`
    pub fn analyze(&mut self, input: &[f32], start: isize, output: &mut [Complex<f32>]) {
        debug_assert!(output.len() >= self.num_bins());

        for i in 0..self.size {
            let idx = start + i as isize;
            let sample = if idx >= 0 && (idx as usize) < input.len() {
                input[idx as usize]
            } else {
                0.0
            };
            self.work[i] = Complex::new(sample * self.window[i], 0.0);
        }

        self.forward
            .process_with_scratch(&mut self.work, &mut self.scratch);

        output[..self.num_bins()].copy_from_slice(&self.work[..self.num_bins()]);
    }

    /// Inverse transform `input`, window it and overlap-add into `output` at `start`.
    ///
    /// The squared window is accumulated into `window_sum` so the caller can
    /// normalize once all frames are in.
    pub fn synthesize(
        &mut self,
        input: &[Complex<f32>],
        output: &mut [f32],
        window_sum: &mut [f32],
        start: isize,
    ) {
        debug_assert!(input.len() >= self.num_bins());
        debug_assert_eq!(output.len(), window_sum.len());

        // Rebuild the full spectrum from the positive half (Hermitian symmetry)
        let bins = self.num_bins();
        self.work[..bins].copy_from_slice(&input[..bins]);
        for i in 1..self.size / 2 {
            self.work[self.size - i] = input[i].conj();
        }

        self.inverse
            .process_with_scratch(&mut self.work, &mut self.scratch);

        for i in 0..self.size {
            let idx = start + i as isize;
            if idx < 0 || idx as usize >= output.len() {
                continue;
            }
            let w = self.window[i];
            output[idx as usize] += self.work[i].re * self.norm_factor * w;
            window_sum[idx as usize] += w * w;
        }
    }
}
