//! Poles-and-zeros instrument response
//!
//! Analog response evaluated directly on the jω axis, never discretized.

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Zero-pole-gain description of an analog signal chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentResponse {
    /// Zeros (rad/s)
    pub zeros: Vec<Complex64>,

    /// Poles (rad/s)
    pub poles: Vec<Complex64>,

    /// Normalization gain of the pole-zero stage
    pub gain: f64,

    /// Overall sensitivity (product of the cascaded stage gains)
    pub sensitivity: f64,
}

impl Default for InstrumentResponse {
    fn default() -> Self {
        Self::unity()
    }
}

impl InstrumentResponse {
    pub fn new(zeros: Vec<Complex64>, poles: Vec<Complex64>, gain: f64, sensitivity: f64) -> Self {
        Self {
            zeros,
            poles,
            gain,
            sensitivity,
        }
    }

    /// Generic chain: no poles or zeros, every gain 1
    pub fn unity() -> Self {
        Self::new(Vec::new(), Vec::new(), 1.0, 1.0)
    }

    /// Build a response from its stage gains
    ///
    /// The sensitivity is the product of the normalization, seismometer and
    /// datalogger gains.
    pub fn from_stages(
        zeros: Vec<Complex64>,
        poles: Vec<Complex64>,
        normalization_gain: f64,
        seismometer_gain: f64,
        datalogger_gain: f64,
    ) -> Self {
        let sensitivity = normalization_gain * seismometer_gain * datalogger_gain;
        Self::new(zeros, poles, normalization_gain, sensitivity)
    }

    /// Response at one frequency (Hz): sensitivity · Π(s − z) / Π(s − p), s = j2πf
    pub fn response_at(&self, frequency: f64) -> Complex64 {
        let s = Complex64::new(0.0, 2.0 * PI * frequency);
        let num: Complex64 = self.zeros.iter().map(|&z| s - z).product();
        let den: Complex64 = self.poles.iter().map(|&p| s - p).product();
        num / den * self.sensitivity
    }

    /// Complex response at each frequency (Hz)
    pub fn evaluate(&self, frequencies: &[f64]) -> Vec<Complex64> {
        frequencies.iter().map(|&f| self.response_at(f)).collect()
    }

    /// Amplitude response |H(f)|
    pub fn amplitude(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies.iter().map(|&f| self.response_at(f).norm()).collect()
    }

    /// Phase response in degrees, in (-180, 180]
    pub fn phase_deg(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies
            .iter()
            .map(|&f| self.response_at(f).arg().to_degrees())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unity_response_is_one() {
        let paz = InstrumentResponse::unity();
        for h in paz.evaluate(&[0.0, 0.01, 1.0, 37.5, 1e4]) {
            assert_eq!(h, Complex64::new(1.0, 0.0));
        }
    }

    #[test]
    fn test_from_stages_sensitivity() {
        let paz = InstrumentResponse::from_stages(vec![], vec![], 2.0, 1500.0, 4e5);
        assert!((paz.sensitivity - 1.2e9).abs() < 1.0);
        assert_eq!(paz.gain, 2.0);
    }

    #[test]
    fn test_single_pole_lowpass() {
        // H(s) = wc / (s + wc) with wc = 2π rad/s: -3 dB and -45° at 1 Hz
        let wc = 2.0 * PI;
        let paz = InstrumentResponse::new(vec![], vec![Complex64::new(-wc, 0.0)], 1.0, wc);

        let amp = paz.amplitude(&[0.0, 1.0]);
        let phase = paz.phase_deg(&[1.0]);
        assert!((amp[0] - 1.0).abs() < 1e-12);
        assert!((amp[1] - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((phase[0] + 45.0).abs() < 1e-9);
    }
}
