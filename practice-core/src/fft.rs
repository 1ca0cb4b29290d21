//! # Fast Fourier Transform (FFT) Module
//!
//! FFT-backed helpers for the pitch estimator. The YIN difference function
//! needs the lagged products `sum x[j] * x[j + tau]` for every lag in the
//! search range; computing them through the frequency domain turns an
//! `O(N^2)` loop into two forward transforms and one inverse.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::sync::Arc;

/// Removes the DC offset from a signal by making its average value zero.
///
/// Cheap microphones often sit slightly off zero, which biases the
/// difference function towards long lags.
pub fn remove_dc_offset(signal: &mut [f32]) {
    let len = signal.len();
    if len == 0 { return; }
    let avg = signal.iter().sum::<f32>() / len as f32;
    if avg.abs() > 1e-6 {
        for sample in signal.iter_mut() {
            *sample -= avg;
        }
    }
}

/// Computes windowed lagged products with pre-planned FFTs.
///
/// Plans and scratch buffers are allocated once, so repeated calls on the
/// analysis path do not touch the allocator.
pub struct Autocorrelator {
    size: usize,
    forward: Arc<dyn Fft<f32>>,
    inverse: Arc<dyn Fft<f32>>,
    head: Vec<Complex<f32>>,
    full: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl std::fmt::Debug for Autocorrelator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Autocorrelator").field("size", &self.size).finish()
    }
}

impl Autocorrelator {
    /// Plans transforms for windows of `size` samples.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_len = forward
            .get_inplace_scratch_len()
            .max(inverse.get_inplace_scratch_len());
        Self {
            size,
            forward,
            inverse,
            head: vec![Complex::default(); size],
            full: vec![Complex::default(); size],
            scratch: vec![Complex::default(); scratch_len],
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Writes `out[tau] = sum_{j < size/2} signal[j] * signal[j + tau]` for
    /// every `tau < out.len()`.
    ///
    /// `signal` must hold exactly `size` samples and `out` at most `size / 2`
    /// entries. Because the first operand is zero beyond `size / 2`, the
    /// circular correlation never wraps for those lags and equals the linear one.
    pub fn lagged_products(&mut self, signal: &[f32], out: &mut [f32]) {
        debug_assert_eq!(signal.len(), self.size);
        debug_assert!(out.len() <= self.size / 2);

        let half = self.size / 2;
        for (i, (&sample, (h, f))) in signal
            .iter()
            .zip(self.head.iter_mut().zip(self.full.iter_mut()))
            .enumerate()
        {
            *f = Complex { re: sample, im: 0.0 };
            *h = if i < half { *f } else { Complex::default() };
        }

        self.forward.process_with_scratch(&mut self.head, &mut self.scratch);
        self.forward.process_with_scratch(&mut self.full, &mut self.scratch);

        // Cross-correlation theorem: conj(H) * F.
        for (h, f) in self.head.iter_mut().zip(self.full.iter()) {
            *h = h.conj() * *f;
        }
        self.inverse.process_with_scratch(&mut self.head, &mut self.scratch);

        // RustFFT leaves the inverse unnormalized.
        let scale = 1.0 / self.size as f32;
        for (o, c) in out.iter_mut().zip(self.head.iter()) {
            *o = c.re * scale;
        }
    }
}
