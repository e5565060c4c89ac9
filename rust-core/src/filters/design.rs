//! Butterworth band-pass design as cascaded second-order sections
//!
//! Analog prototype -> band-pass transform -> bilinear transform, with the
//! resulting poles paired into biquads. Running the sections in cascade is
//! far better conditioned than expanding the full transfer-function
//! polynomial at high orders.

use crate::error::{CalibrationError, Result};
use num_complex::Complex64;
use std::f64::consts::PI;

/// One second-order section, normalized so that a[0] == 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Biquad {
    pub b: [f64; 3],
    pub a: [f64; 3],
}

/// Band-pass filter specification
#[derive(Debug, Clone, PartialEq)]
pub struct BandpassSpec {
    /// Lower corner frequency (Hz)
    pub low_hz: f64,

    /// Upper corner frequency (Hz), strictly below Nyquist
    pub high_hz: f64,

    /// Sampling rate (Hz)
    pub sample_rate: f64,

    /// Order of the low-pass prototype; the band-pass has twice as many poles
    pub corners: usize,
}

impl BandpassSpec {
    pub fn new(low_hz: f64, high_hz: f64, sample_rate: f64, corners: usize) -> Result<Self> {
        let spec = Self {
            low_hz,
            high_hz,
            sample_rate,
            corners,
        };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        let nyquist = self.sample_rate / 2.0;
        if self.corners == 0 {
            return Err(CalibrationError::config("filter needs at least one corner"));
        }
        if !(self.low_hz > 0.0 && self.low_hz < self.high_hz) {
            return Err(CalibrationError::config(format!(
                "band edges must satisfy 0 < fmin < fmax (got {} Hz, {} Hz)",
                self.low_hz, self.high_hz
            )));
        }
        if self.high_hz >= nyquist {
            return Err(CalibrationError::config(format!(
                "fmax ({} Hz) must lie below Nyquist ({} Hz)",
                self.high_hz, nyquist
            )));
        }
        Ok(())
    }
}

/// Design a digital Butterworth band-pass filter
///
/// # Returns
/// Second-order sections to be applied in order; the overall gain is folded
/// into the first section's numerator.
pub fn design_butterworth_bandpass(spec: &BandpassSpec) -> Result<Vec<Biquad>> {
    spec.validate()?;

    let n = spec.corners;
    let nyquist = spec.sample_rate / 2.0;

    // Pre-warped analog band edges (bilinear transform with fs = 2)
    let fs2 = 4.0;
    let w1 = fs2 * (PI * spec.low_hz / nyquist / 2.0).tan();
    let w2 = fs2 * (PI * spec.high_hz / nyquist / 2.0).tan();
    let bw = w2 - w1;
    let wo = (w1 * w2).sqrt();

    // Low-pass prototype poles on the unit circle, left half plane
    let prototype: Vec<Complex64> = (0..n)
        .map(|k| {
            let m = 2.0 * k as f64 - n as f64 + 1.0;
            -Complex64::from_polar(1.0, PI * m / (2.0 * n as f64))
        })
        .collect();

    // Low-pass to band-pass: each prototype pole splits in two, N zeros at s = 0
    let mut analog_poles = Vec::with_capacity(2 * n);
    for p in &prototype {
        let p_lp = p * (bw / 2.0);
        let root = (p_lp * p_lp - wo * wo).sqrt();
        analog_poles.push(p_lp + root);
        analog_poles.push(p_lp - root);
    }
    let analog_gain = bw.powi(n as i32);

    // Bilinear transform: zeros at origin map to z = 1, the N zeros at
    // infinity map to z = -1
    let fs2c = Complex64::new(fs2, 0.0);
    let digital_poles: Vec<Complex64> = analog_poles
        .iter()
        .map(|&p| (fs2c + p) / (fs2c - p))
        .collect();
    let denom: Complex64 = analog_poles.iter().map(|&p| fs2c - p).product();
    let gain = analog_gain * (Complex64::new(fs2.powi(n as i32), 0.0) / denom).re;

    if !gain.is_finite() || digital_poles.iter().any(|p| p.norm() >= 1.0) {
        return Err(CalibrationError::numerical(format!(
            "unstable band-pass design for [{}, {}] Hz at {} Hz",
            spec.low_hz, spec.high_hz, spec.sample_rate
        )));
    }

    let mut sections: Vec<Biquad> = pair_poles(&digital_poles)
        .into_iter()
        .map(|(p1, p2)| Biquad {
            b: [1.0, 0.0, -1.0],
            a: [1.0, -(p1 + p2).re, (p1 * p2).re],
        })
        .collect();

    if let Some(first) = sections.first_mut() {
        for coeff in first.b.iter_mut() {
            *coeff *= gain;
        }
    }

    Ok(sections)
}

/// Pair poles into conjugate pairs (or pairs of real poles)
fn pair_poles(poles: &[Complex64]) -> Vec<(Complex64, Complex64)> {
    let tol = 1e-12;
    let mut pairs = Vec::with_capacity(poles.len() / 2);
    let mut real: Vec<f64> = Vec::new();

    for &p in poles {
        if p.im > tol * p.norm().max(1.0) {
            pairs.push((p, p.conj()));
        } else if p.im.abs() <= tol * p.norm().max(1.0) {
            real.push(p.re);
        }
    }

    real.sort_by(|a, b| a.total_cmp(b));
    for chunk in real.chunks(2) {
        let p1 = Complex64::new(chunk[0], 0.0);
        let p2 = Complex64::new(*chunk.get(1).unwrap_or(&0.0), 0.0);
        pairs.push((p1, p2));
    }

    pairs
}

/// Frequency response of cascaded sections at the given frequencies (Hz)
pub fn sos_frequency_response(
    sections: &[Biquad],
    frequencies: &[f64],
    sample_rate: f64,
) -> Vec<Complex64> {
    frequencies
        .iter()
        .map(|&f| {
            let z1 = Complex64::from_polar(1.0, -2.0 * PI * f / sample_rate);
            let z2 = z1 * z1;
            sections
                .iter()
                .map(|s| {
                    (s.b[0] + s.b[1] * z1 + s.b[2] * z2) / (s.a[0] + s.a[1] * z1 + s.a[2] * z2)
                })
                .product()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_validation() {
        assert!(BandpassSpec::new(0.1, 10.0, 100.0, 8).is_ok());
        assert!(matches!(
            BandpassSpec::new(10.0, 1.0, 100.0, 8),
            Err(CalibrationError::Configuration(_))
        ));
        assert!(matches!(
            BandpassSpec::new(0.1, 50.0, 100.0, 8),
            Err(CalibrationError::Configuration(_))
        ));
        assert!(matches!(
            BandpassSpec::new(0.1, 10.0, 100.0, 0),
            Err(CalibrationError::Configuration(_))
        ));
    }

    #[test]
    fn test_bandpass_sections() {
        let spec = BandpassSpec::new(0.1, 10.0, 100.0, 8).unwrap();
        let sos = design_butterworth_bandpass(&spec).unwrap();

        // 16 poles -> 8 biquads
        assert_eq!(sos.len(), 8);
        for s in &sos {
            // Stable: |a2| < 1 for every conjugate pair
            assert!(s.a[2].abs() < 1.0);
        }
    }

    #[test]
    fn test_bandpass_magnitude() {
        let spec = BandpassSpec::new(0.1, 10.0, 100.0, 8).unwrap();
        let sos = design_butterworth_bandpass(&spec).unwrap();

        let h = sos_frequency_response(&sos, &[0.0, 1.0, 0.1, 10.0, 30.0, 49.999], 100.0);

        // Zeros at DC and Nyquist
        assert!(h[0].norm() < 1e-9);
        // Flat passband
        assert!((h[1].norm() - 1.0).abs() < 1e-6, "|H(1 Hz)| = {}", h[1].norm());
        // -3 dB at the corners
        assert!((h[2].norm() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        assert!((h[3].norm() - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-3);
        // Sharp rejection well above the band
        assert!(h[4].norm() < 1e-4);
        assert!(h[5].norm() < 1e-6);
    }

    #[test]
    fn test_odd_order_design() {
        let spec = BandpassSpec::new(1.0, 5.0, 50.0, 3).unwrap();
        let sos = design_butterworth_bandpass(&spec).unwrap();
        assert_eq!(sos.len(), 3);

        let h = sos_frequency_response(&sos, &[(1.0f64 * 5.0).sqrt()], 50.0);
        assert!((h[0].norm() - 1.0).abs() < 0.05);
    }
}
