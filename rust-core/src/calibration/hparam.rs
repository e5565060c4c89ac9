//! Second-order model fit of a measured transfer function
//!
//! Two decoupled least-squares stages over the band [fmin, fnorm):
//!
//! 1. phase: refine (T, h) against the measured phase, seeded at the
//!    frequency where the phase is closest to +90°
//! 2. amplitude: with (T, h) held, fit the gain A against |H|
//!
//! Both stages weight each bin by its coherence (uncertainty 1/C).

use super::cross_calib::TransferFunction;
use super::lm::{levenberg_marquardt, LmOptions};
use crate::error::{CalibrationError, Result};
use crate::response::SeismometerModel;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Fewest usable bins for a fit
const MIN_BAND_BINS: usize = 3;

/// Model fitter configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HParamConfig {
    /// Lower band edge (Hz)
    pub fmin: f64,

    /// Normalization frequency and exclusive upper band edge (Hz)
    pub fnorm: f64,

    /// Damping seed
    pub initial_damping: f64,

    pub max_iterations: usize,
    pub tolerance: f64,
}

impl Default for HParamConfig {
    fn default() -> Self {
        Self {
            fmin: 0.001,
            fnorm: 1.0,
            initial_damping: 0.707,
            max_iterations: 200,
            tolerance: 1.49e-8,
        }
    }
}

impl HParamConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.fmin.is_finite() && self.fmin >= 0.0) {
            return Err(CalibrationError::config(format!(
                "fmin must be a non-negative frequency (got {})",
                self.fmin
            )));
        }
        if !(self.fnorm.is_finite() && self.fnorm > self.fmin) {
            return Err(CalibrationError::config(format!(
                "fnorm ({}) must exceed fmin ({})",
                self.fnorm, self.fmin
            )));
        }
        if !(self.initial_damping.is_finite() && self.initial_damping > 0.0) {
            return Err(CalibrationError::config(format!(
                "initial damping must be positive (got {})",
                self.initial_damping
            )));
        }
        if self.max_iterations == 0 || !(self.tolerance > 0.0) {
            return Err(CalibrationError::config(
                "max_iterations and tolerance must be positive",
            ));
        }
        Ok(())
    }

    fn lm_options(&self) -> LmOptions {
        LmOptions {
            max_iterations: self.max_iterations,
            tolerance: self.tolerance,
        }
    }
}

/// Fitted model together with what produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HParamFit {
    /// Final (T, h, A)
    pub model: SeismometerModel,

    /// Coarse (T0, h0, A0) the fit started from
    pub seed: SeismometerModel,

    /// Frequencies of the first and last bin used (Hz)
    pub band: (f64, f64),

    /// Usable bins in the band
    pub band_bins: usize,

    pub phase_iterations: usize,
    pub amplitude_iterations: usize,
}

/// Band samples the fit runs on
struct FitBand {
    frequencies: Vec<f64>,
    amplitude: Vec<f64>,
    phase: Vec<f64>,
    weight: Vec<f64>,
}

/// Wrap an angle difference into (-180, 180]
fn wrap_degrees(angle: f64) -> f64 {
    let wrapped = angle - 360.0 * (angle / 360.0).round();
    if wrapped <= -180.0 {
        wrapped + 360.0
    } else {
        wrapped
    }
}

fn select_band(tf: &TransferFunction, config: &HParamConfig) -> Result<(FitBand, usize)> {
    let lo = tf.nearest_bin(config.fmin);
    let hi = tf.nearest_bin(config.fnorm);

    let mut band = FitBand {
        frequencies: Vec::new(),
        amplitude: Vec::new(),
        phase: Vec::new(),
        weight: Vec::new(),
    };
    let mut masked = 0;
    for i in lo..hi.max(lo) {
        let h = tf.response()[i];
        let c = tf.coherence()[i];
        if !h.is_finite() || !c.is_finite() {
            masked += 1;
            continue;
        }
        band.frequencies.push(tf.frequencies()[i]);
        band.amplitude.push(h.norm());
        band.phase.push(h.arg().to_degrees());
        band.weight.push(c.clamp(0.0, 1.0));
    }

    if masked > 0 {
        warn!(bins = masked, "non-finite bins excluded from the model fit");
    }
    if band.frequencies.len() < MIN_BAND_BINS {
        return Err(CalibrationError::numerical(format!(
            "fit band [{} Hz, {} Hz) holds {} usable bins, need at least {}",
            config.fmin,
            config.fnorm,
            band.frequencies.len(),
            MIN_BAND_BINS
        )));
    }

    Ok((band, hi))
}

/// Coarse (T0, h0, A0)
fn seed(
    tf: &TransferFunction,
    band: &FitBand,
    norm_bin: usize,
    config: &HParamConfig,
) -> Result<SeismometerModel> {
    let (i90, _) = band
        .phase
        .iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_d), (i, &p)| {
            let d = (p - 90.0).abs();
            if d < best_d {
                (i, d)
            } else {
                (best, best_d)
            }
        });

    let gain = tf.response()[norm_bin].norm();
    if !(gain.is_finite() && gain > 0.0) {
        return Err(CalibrationError::numerical(format!(
            "no usable amplitude at fnorm ({} Hz)",
            tf.frequencies()[norm_bin]
        )));
    }

    Ok(SeismometerModel {
        period: 1.0 / band.frequencies[i90],
        damping: config.initial_damping,
        gain,
    })
}

/// Fit (T, h, A) of a second-order seismometer to a measured transfer function
///
/// Fails with a numerical error when the band holds fewer than three usable
/// bins, when either stage does not converge, or when the fitted parameters
/// are not physical.
pub fn hparam(tf: &TransferFunction, config: &HParamConfig) -> Result<HParamFit> {
    config.validate()?;
    let (band, norm_bin) = select_band(tf, config)?;
    let seed = seed(tf, &band, norm_bin, config)?;
    let options = config.lm_options();

    // Stage 1: (T, h) from the phase; the gain does not affect it
    let phase_fit = levenberg_marquardt(
        |p| {
            let model = SeismometerModel {
                period: p[0],
                damping: p[1],
                gain: 1.0,
            };
            band.frequencies
                .iter()
                .zip(&band.phase)
                .zip(&band.weight)
                .map(|((&f, &measured), &w)| {
                    w * wrap_degrees(model.response_at(f).arg().to_degrees() - measured)
                })
                .collect()
        },
        &[seed.period, seed.damping],
        &options,
    )?;
    let (period, damping) = (phase_fit.params[0], phase_fit.params[1]);

    // Stage 2: A alone against |H|
    let shape: Vec<f64> = {
        let unit = SeismometerModel {
            period,
            damping,
            gain: 1.0,
        };
        unit.amplitude(&band.frequencies)
    };
    let amplitude_fit = levenberg_marquardt(
        |p| {
            shape
                .iter()
                .zip(&band.amplitude)
                .zip(&band.weight)
                .map(|((&g, &measured), &w)| w * (p[0] * g - measured))
                .collect()
        },
        &[seed.gain],
        &options,
    )?;

    let model = SeismometerModel {
        period,
        damping,
        gain: amplitude_fit.params[0],
    };
    model.validate().map_err(|_| {
        CalibrationError::numerical(format!(
            "fit converged to non-physical parameters (T={}, h={}, A={})",
            model.period, model.damping, model.gain
        ))
    })?;

    debug!(
        period = model.period,
        damping = model.damping,
        gain = model.gain,
        phase_iterations = phase_fit.iterations,
        amplitude_iterations = amplitude_fit.iterations,
        "second-order model fitted"
    );

    Ok(HParamFit {
        model,
        seed,
        band: (band.frequencies[0], band.frequencies[band.frequencies.len() - 1]),
        band_bins: band.frequencies.len(),
        phase_iterations: phase_fit.iterations,
        amplitude_iterations: amplitude_fit.iterations,
    })
}

/// Measured and modelled curves on the transfer function's frequency axis
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseComparison {
    pub frequencies: Array1<f64>,
    pub measured_amplitude: Array1<f64>,
    pub measured_phase: Array1<f64>,
    pub model_amplitude: Array1<f64>,
    pub model_phase: Array1<f64>,
    pub coherence: Array1<f64>,
}

impl ResponseComparison {
    pub fn new(tf: &TransferFunction, model: &SeismometerModel) -> Self {
        let frequencies = tf.frequencies().clone();
        let modelled = frequencies.mapv(|f| model.response_at(f));

        Self {
            measured_amplitude: tf.amplitude(),
            measured_phase: tf.phase_deg(),
            model_amplitude: modelled.mapv(|h| h.norm()),
            model_phase: modelled.mapv(|h| h.arg().to_degrees()),
            coherence: tf.coherence().clone(),
            frequencies,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use num_complex::Complex64;

    fn synthetic(model: &SeismometerModel, frequencies: Vec<f64>) -> TransferFunction {
        let response = Array1::from(model.evaluate(&frequencies));
        let coherence = Array1::from_elem(frequencies.len(), 1.0);
        TransferFunction::new(Array1::from(frequencies), response, coherence).unwrap()
    }

    #[test]
    fn test_wrap_degrees() {
        assert_relative_eq!(wrap_degrees(190.0), -170.0);
        assert_relative_eq!(wrap_degrees(-190.0), 170.0);
        assert_relative_eq!(wrap_degrees(180.0), 180.0);
        assert_relative_eq!(wrap_degrees(-180.0), 180.0);
        assert_relative_eq!(wrap_degrees(45.0), 45.0);
    }

    #[test]
    fn test_recovers_short_period_model() {
        let truth = SeismometerModel::new(1.0, 0.6, 2.5).unwrap();
        let freqs: Vec<f64> = (1..=5000).map(|i| i as f64 * 0.002).collect();
        let tf = synthetic(&truth, freqs);

        let config = HParamConfig {
            fmin: 0.01,
            fnorm: 5.0,
            ..HParamConfig::default()
        };
        let fit = hparam(&tf, &config).unwrap();

        assert_relative_eq!(fit.model.period, 1.0, max_relative = 1e-4);
        assert_relative_eq!(fit.model.damping, 0.6, max_relative = 1e-4);
        assert_relative_eq!(fit.model.gain, 2.5, max_relative = 1e-4);
        assert_relative_eq!(fit.seed.period, 1.0, max_relative = 1e-9);
        assert_eq!(fit.seed.damping, 0.707);
        assert!(fit.band.0 >= 0.01 - 1e-12 && fit.band.1 < 5.0);
    }

    #[test]
    fn test_recovers_long_period_model() {
        let truth = SeismometerModel::new(120.0, 0.7, 1500.0).unwrap();
        let freqs: Vec<f64> = (1..=2000).map(|i| i as f64 * 0.0005).collect();
        let tf = synthetic(&truth, freqs);

        let fit = hparam(&tf, &HParamConfig::default()).unwrap();

        assert_relative_eq!(fit.model.period, 120.0, max_relative = 1e-3);
        assert_relative_eq!(fit.model.damping, 0.7, max_relative = 1e-3);
        assert_relative_eq!(fit.model.gain, 1500.0, max_relative = 1e-3);
        assert!(fit.phase_iterations > 0);
    }

    #[test]
    fn test_low_coherence_bins_barely_matter() {
        let truth = SeismometerModel::new(1.0, 0.7, 1.0).unwrap();
        let freqs: Vec<f64> = (1..=2000).map(|i| i as f64 * 0.005).collect();
        let mut response = Array1::from(truth.evaluate(&freqs));
        let mut coherence = Array1::from_elem(freqs.len(), 1.0);
        // Corrupt a stretch but mark it incoherent
        for i in 300..340 {
            response[i] *= Complex64::new(0.0, 3.0);
            coherence[i] = 0.0;
        }
        let tf = TransferFunction::new(Array1::from(freqs), response, coherence).unwrap();

        let config = HParamConfig {
            fmin: 0.02,
            fnorm: 8.0,
            ..HParamConfig::default()
        };
        let fit = hparam(&tf, &config).unwrap();
        assert_relative_eq!(fit.model.period, 1.0, max_relative = 1e-4);
        assert_relative_eq!(fit.model.damping, 0.7, max_relative = 1e-4);
    }

    #[test]
    fn test_empty_band_is_a_fit_error() {
        let truth = SeismometerModel::new(1.0, 0.7, 1.0).unwrap();
        let freqs: Vec<f64> = (1..=100).map(|i| i as f64 * 0.1).collect();
        let tf = synthetic(&truth, freqs);

        let config = HParamConfig {
            fmin: 2.0,
            fnorm: 2.05,
            ..HParamConfig::default()
        };
        assert!(matches!(hparam(&tf, &config), Err(CalibrationError::Numerical(_))));
    }

    #[test]
    fn test_invalid_band_is_a_configuration_error() {
        let config = HParamConfig {
            fmin: 1.0,
            fnorm: 0.5,
            ..HParamConfig::default()
        };
        assert!(matches!(config.validate(), Err(CalibrationError::Configuration(_))));
    }

    #[test]
    fn test_response_comparison_tracks_axis() {
        let truth = SeismometerModel::new(1.0, 0.7, 1.0).unwrap();
        let freqs: Vec<f64> = (1..=50).map(|i| i as f64 * 0.1).collect();
        let tf = synthetic(&truth, freqs);

        let cmp = ResponseComparison::new(&tf, &truth);
        assert_eq!(cmp.frequencies.len(), 50);
        for (m, d) in cmp.measured_amplitude.iter().zip(&cmp.model_amplitude) {
            assert_relative_eq!(*m, *d, max_relative = 1e-12);
        }
        for (m, d) in cmp.measured_phase.iter().zip(&cmp.model_phase) {
            assert_relative_eq!(*m, *d, epsilon = 1e-9);
        }
    }
}
