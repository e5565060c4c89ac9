//! Cascaded biquad (SOS) filtering with state management
//!
//! Each section runs in transposed direct form II. Zero-phase filtering runs
//! the cascade forward, then again over the time-reversed output.

use super::design::{design_butterworth_bandpass, BandpassSpec, Biquad};
use crate::error::Result;

/// IIR filter built from second-order sections
pub struct SosFilter {
    /// Sections applied in order
    sections: Vec<Biquad>,

    /// Two delay elements per section
    state: Vec<[f64; 2]>,
}

impl SosFilter {
    /// Create a new filter from second-order sections
    pub fn new(sections: Vec<Biquad>) -> Self {
        let state = vec![[0.0; 2]; sections.len()];
        Self { sections, state }
    }

    /// Design a Butterworth band-pass filter
    pub fn bandpass(spec: &BandpassSpec) -> Result<Self> {
        Ok(Self::new(design_butterworth_bandpass(spec)?))
    }

    /// Process single sample
    #[inline]
    pub fn process_sample(&mut self, input: f64) -> f64 {
        let mut x = input;
        for (s, z) in self.sections.iter().zip(self.state.iter_mut()) {
            let y = s.b[0] * x + z[0];
            z[0] = s.b[1] * x - s.a[1] * y + z[1];
            z[1] = s.b[2] * x - s.a[2] * y;
            x = y;
        }
        x
    }

    /// Process a block of samples
    pub fn process_block(&mut self, input: &[f64]) -> Vec<f64> {
        input.iter().map(|&x| self.process_sample(x)).collect()
    }

    /// Process a block in-place
    pub fn process_block_inplace(&mut self, buffer: &mut [f64]) {
        for sample in buffer.iter_mut() {
            *sample = self.process_sample(*sample);
        }
    }

    /// Forward-backward filtering of a whole trace (no group delay)
    ///
    /// State is cleared before each pass and left cleared afterwards.
    pub fn filter_zero_phase(&mut self, buffer: &mut [f64]) {
        self.reset();
        self.process_block_inplace(buffer);
        buffer.reverse();
        self.reset();
        self.process_block_inplace(buffer);
        buffer.reverse();
        self.reset();
    }

    /// Reset filter state (clear delay lines)
    pub fn reset(&mut self) {
        for z in self.state.iter_mut() {
            *z = [0.0; 2];
        }
    }

    /// Get filter sections
    pub fn sections(&self) -> &[Biquad] {
        &self.sections
    }

    /// Number of poles in the cascade
    pub fn order(&self) -> usize {
        2 * self.sections.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    #[test]
    fn test_single_section_impulse() {
        // y[n] = x[n] + 0.5 y[n-1]
        let mut filter = SosFilter::new(vec![Biquad {
            b: [1.0, 0.0, 0.0],
            a: [1.0, -0.5, 0.0],
        }]);

        let out = filter.process_block(&[1.0, 0.0, 0.0, 0.0]);
        assert!((out[0] - 1.0).abs() < 1e-12);
        assert!((out[1] - 0.5).abs() < 1e-12);
        assert!((out[2] - 0.25).abs() < 1e-12);
        assert!((out[3] - 0.125).abs() < 1e-12);
    }

    #[test]
    fn test_reset() {
        let mut filter = SosFilter::new(vec![Biquad {
            b: [1.0, 1.0, 0.0],
            a: [1.0, 0.0, 0.0],
        }]);

        filter.process_sample(1.0);
        filter.process_sample(2.0);
        filter.reset();

        let output = filter.process_sample(1.0);
        assert!((output - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_bandpass_passes_inband_and_rejects_dc() {
        let spec = BandpassSpec::new(0.5, 5.0, 100.0, 4).unwrap();
        let mut filter = SosFilter::bandpass(&spec).unwrap();
        assert_eq!(filter.order(), 8);

        let n = 4000;
        let mut signal: Vec<f64> = (0..n)
            .map(|i| 3.0 + (2.0 * PI * 2.0 * i as f64 / 100.0).sin())
            .collect();
        filter.filter_zero_phase(&mut signal);

        // Look at the interior, away from edge transients
        let interior = &signal[1000..3000];
        let mean = interior.iter().sum::<f64>() / interior.len() as f64;
        let rms = (interior.iter().map(|x| x * x).sum::<f64>() / interior.len() as f64).sqrt();

        assert!(mean.abs() < 1e-2, "DC leaked: {}", mean);
        assert!((rms - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-2, "rms {}", rms);
    }

    #[test]
    fn test_zero_phase_has_no_delay() {
        let spec = BandpassSpec::new(0.5, 10.0, 100.0, 4).unwrap();
        let mut filter = SosFilter::bandpass(&spec).unwrap();

        let n = 4000;
        let clean: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * 2.0 * i as f64 / 100.0).sin())
            .collect();
        let mut filtered = clean.clone();
        filter.filter_zero_phase(&mut filtered);

        let max_err = clean[1000..3000]
            .iter()
            .zip(&filtered[1000..3000])
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max);
        assert!(max_err < 1e-2, "max error {}", max_err);
    }
}
