//! FFT engine using realfft for real-valued signals
//!
//! Shared, immutable plan; scratch buffers are supplied by the caller so a
//! single engine can serve any number of channels or threads.

use crate::error::{CalibrationError, Result};
use num_complex::Complex64;
use realfft::{RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// FFT engine for real-valued signals
#[derive(Clone)]
pub struct FftEngine {
    /// FFT size (number of samples after zero padding)
    fft_size: usize,

    /// Real FFT processor
    r2c: Arc<dyn RealToComplex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - Transform length; shorter inputs are zero-padded to it
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);

        Self { fft_size, r2c }
    }

    /// Allocate an input/output buffer pair sized for this engine
    pub fn make_buffers(&self) -> (Vec<f64>, Vec<Complex64>) {
        (self.r2c.make_input_vec(), self.r2c.make_output_vec())
    }

    /// Compute the one-sided spectrum of `signal` into `output`
    ///
    /// `input` is scratch space of `fft_size` samples; it is overwritten.
    pub fn spectrum_into(
        &self,
        signal: &[f64],
        input: &mut [f64],
        output: &mut [Complex64],
    ) -> Result<()> {
        let copy_len = signal.len().min(self.fft_size);
        input[..copy_len].copy_from_slice(&signal[..copy_len]);
        input[copy_len..].fill(0.0);

        self.r2c
            .process(input, output)
            .map_err(|e| CalibrationError::numerical(format!("FFT failed: {}", e)))
    }

    /// Compute the one-sided spectrum X[k] for k = 0..fft_size/2
    pub fn spectrum(&self, signal: &[f64]) -> Result<Vec<Complex64>> {
        let (mut input, mut output) = self.make_buffers();
        self.spectrum_into(signal, &mut input, &mut output)?;
        Ok(output)
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// One-sided frequency axis in Hz, resolution sample_rate / fft_size
    pub fn frequency_axis(&self, sample_rate: f64) -> Vec<f64> {
        let df = sample_rate / self.fft_size as f64;
        (0..self.num_bins()).map(|k| k as f64 * df).collect()
    }
}
