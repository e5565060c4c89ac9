//! Second-order seismometer model
//!
//! Double zero at the origin and one pole pair with natural period T and
//! damping h:
//!
//! ```text
//! H(s) = A · s² / (s² + 2hω0·s + ω0²),   ω0 = 2π/T
//! ```
//!
//! For h < 1 the poles are ω0·(−h ± j√(1−h²)); the polynomial form stays
//! defined for overdamped systems.

use super::paz::InstrumentResponse;
use crate::error::{CalibrationError, Result};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Natural period, damping ratio and gain
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeismometerModel {
    /// Natural period T (s)
    pub period: f64,

    /// Damping ratio h
    pub damping: f64,

    /// Gain A
    pub gain: f64,
}

impl SeismometerModel {
    pub fn new(period: f64, damping: f64, gain: f64) -> Result<Self> {
        let model = Self {
            period,
            damping,
            gain,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        let positive = |v: f64| v.is_finite() && v > 0.0;
        if !(positive(self.period) && positive(self.damping) && positive(self.gain)) {
            return Err(CalibrationError::config(format!(
                "model parameters must be positive (T={}, h={}, A={})",
                self.period, self.damping, self.gain
            )));
        }
        Ok(())
    }

    /// Natural angular frequency ω0 = 2π/T
    pub fn omega0(&self) -> f64 {
        2.0 * PI / self.period
    }

    /// The two poles, roots of s² + 2hω0·s + ω0²
    pub fn poles(&self) -> [Complex64; 2] {
        let w0 = self.omega0();
        let root = Complex64::new(1.0 - self.damping * self.damping, 0.0).sqrt();
        let centre = Complex64::new(-self.damping, 0.0);
        [(centre + root * Complex64::i()) * w0, (centre - root * Complex64::i()) * w0]
    }

    /// Complex response at one frequency (Hz)
    pub fn response_at(&self, frequency: f64) -> Complex64 {
        let w0 = self.omega0();
        let s = Complex64::new(0.0, 2.0 * PI * frequency);
        let s2 = s * s;
        s2 * self.gain / (s2 + s * (2.0 * self.damping * w0) + w0 * w0)
    }

    /// Complex response at each frequency (Hz)
    pub fn evaluate(&self, frequencies: &[f64]) -> Vec<Complex64> {
        frequencies.iter().map(|&f| self.response_at(f)).collect()
    }

    /// Amplitude |H(f)|
    pub fn amplitude(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies.iter().map(|&f| self.response_at(f).norm()).collect()
    }

    /// Phase in degrees, in (-180, 180]
    pub fn phase_deg(&self, frequencies: &[f64]) -> Vec<f64> {
        frequencies
            .iter()
            .map(|&f| self.response_at(f).arg().to_degrees())
            .collect()
    }

    /// Equivalent pole-zero description
    pub fn to_instrument_response(&self) -> InstrumentResponse {
        let zero = Complex64::new(0.0, 0.0);
        InstrumentResponse::new(vec![zero, zero], self.poles().to_vec(), self.gain, self.gain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_nonpositive_parameters() {
        assert!(SeismometerModel::new(120.0, 0.707, 1.0).is_ok());
        assert!(matches!(
            SeismometerModel::new(0.0, 0.7, 1.0),
            Err(CalibrationError::Configuration(_))
        ));
        assert!(matches!(
            SeismometerModel::new(1.0, -0.7, 1.0),
            Err(CalibrationError::Configuration(_))
        ));
    }

    #[test]
    fn test_asymptotes_and_resonance() {
        let model = SeismometerModel::new(1.0, 0.707, 2.0).unwrap();

        // Flat at A well above the corner, +90° at the natural frequency
        let amp = model.amplitude(&[100.0]);
        assert!((amp[0] - 2.0).abs() < 1e-3);
        let phase = model.phase_deg(&[1.0, 1e-3, 100.0]);
        assert!((phase[0] - 90.0).abs() < 1e-9);
        assert!(phase[1] > 179.0);
        assert!(phase[2].abs() < 1.0);

        // |H(f0)| = A / 2h
        let at_f0 = model.amplitude(&[1.0])[0];
        assert!((at_f0 - 2.0 / (2.0 * 0.707)).abs() < 1e-9);
    }

    #[test]
    fn test_matches_pole_zero_form() {
        let model = SeismometerModel::new(120.0, 0.7, 1500.0).unwrap();
        let paz = model.to_instrument_response();
        let freqs = [0.001, 0.00833, 0.1, 1.0, 10.0];
        for (a, b) in model.evaluate(&freqs).iter().zip(paz.evaluate(&freqs)) {
            assert!((a - b).norm() <= 1e-9 * b.norm());
        }
        let [p1, p2] = model.poles();
        assert_eq!(p1, p2.conj());
        assert!((p1.norm() - model.omega0()).abs() < 1e-12);
    }
}
