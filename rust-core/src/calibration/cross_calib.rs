//! Transfer function between a monitor channel and a device under test
//!
//! H(f) = S_mr(f) · H0(f) / S_mm(f), where S_mr is the monitor→response
//! cross-spectrum, S_mm the monitor PSD and H0 the analog response of the
//! monitor-side signal chain. Bins where S_mm is close to zero produce huge
//! or non-finite values; they are kept so the caller can mask them with the
//! coherence.

use crate::error::{CalibrationError, Result};
use crate::filters::windows::taper_edges;
use crate::response::InstrumentResponse;
use crate::series::SampleSeries;
use crate::spectrum::welch::{nearest_index, WelchConfig, WelchEstimator};
use crate::spectrum::windowing::remove_mean;
use ndarray::{s, Array1};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Transfer-function builder configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrossCalibConfig {
    /// Spectral estimator settings
    pub welch: WelchConfig,

    /// Remove the mean of both traces first
    pub demean: bool,

    /// Taper both traces before estimation
    pub taper: bool,

    /// Length of each taper ramp as a fraction of the trace
    pub taper_fraction: f64,
}

impl Default for CrossCalibConfig {
    fn default() -> Self {
        Self {
            welch: WelchConfig::default(),
            demean: false,
            taper: false,
            taper_fraction: 0.05,
        }
    }
}

impl CrossCalibConfig {
    pub fn validate(&self) -> Result<()> {
        self.welch.validate()?;
        if !(0.0..=0.5).contains(&self.taper_fraction) {
            return Err(CalibrationError::config(format!(
                "taper fraction must lie in [0, 0.5] (got {})",
                self.taper_fraction
            )));
        }
        Ok(())
    }
}

/// Measured transfer function with its coherence, zero frequency excluded
#[derive(Debug, Clone, PartialEq)]
pub struct TransferFunction {
    frequencies: Array1<f64>,
    response: Array1<Complex64>,
    coherence: Array1<f64>,
}

impl TransferFunction {
    /// Assemble a transfer function from parallel arrays
    ///
    /// Frequencies must be strictly positive and strictly increasing.
    pub fn new(
        frequencies: Array1<f64>,
        response: Array1<Complex64>,
        coherence: Array1<f64>,
    ) -> Result<Self> {
        if frequencies.len() != response.len() || frequencies.len() != coherence.len() {
            return Err(CalibrationError::precondition(format!(
                "transfer function arrays differ in length ({}, {}, {})",
                frequencies.len(),
                response.len(),
                coherence.len()
            )));
        }
        if frequencies.first().map_or(false, |&f| f <= 0.0)
            || frequencies.iter().zip(frequencies.iter().skip(1)).any(|(a, b)| b <= a)
        {
            return Err(CalibrationError::precondition(
                "transfer function frequencies must be positive and strictly increasing",
            ));
        }

        Ok(Self {
            frequencies,
            response,
            coherence,
        })
    }

    pub fn frequencies(&self) -> &Array1<f64> {
        &self.frequencies
    }

    /// Complex response H(f)
    pub fn response(&self) -> &Array1<Complex64> {
        &self.response
    }

    /// Coherence C(f) in [0, 1]
    pub fn coherence(&self) -> &Array1<f64> {
        &self.coherence
    }

    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }

    /// |H(f)|
    pub fn amplitude(&self) -> Array1<f64> {
        self.response.mapv(|h| h.norm())
    }

    /// arg H(f) in degrees, in (-180, 180]
    pub fn phase_deg(&self) -> Array1<f64> {
        self.response.mapv(|h| h.arg().to_degrees())
    }

    /// Index of the bin closest to `frequency`
    pub fn nearest_bin(&self, frequency: f64) -> usize {
        nearest_index(&self.frequencies, frequency)
    }
}

fn precondition(series: &SampleSeries, config: &CrossCalibConfig) -> SampleSeries {
    let mut samples = series.samples().to_vec();
    if config.demean {
        remove_mean(&mut samples);
    }
    if config.taper {
        taper_edges(&mut samples, config.taper_fraction);
    }
    series.with_samples(samples)
}

/// Compute the calibrated transfer function from `monitor` to `response`
///
/// # Arguments
/// * `monitor` - Reference signal (injected calibration signal or a colocated
///   reference sensor)
/// * `response` - Output of the device under test
/// * `paz` - Analog response of the monitor-side chain
/// * `config` - Preconditioning and spectral settings
pub fn cross_calib(
    monitor: &SampleSeries,
    response: &SampleSeries,
    paz: &InstrumentResponse,
    config: &CrossCalibConfig,
) -> Result<TransferFunction> {
    config.validate()?;
    monitor.check_aligned(response)?;

    let m = precondition(monitor, config);
    let r = precondition(response, config);

    let estimator = WelchEstimator::new(config.welch.clone())?;
    let matrix = estimator.spectral_matrix(&[&m, &r])?;
    matrix.ensure_averaged()?;

    let frequencies = matrix.frequencies();
    let pmm = matrix.power(0).into_parts().1;
    let pmr = matrix.entry(0, 1);
    let h0 = frequencies.mapv(|f| paz.response_at(f));

    let h = ndarray::Zip::from(pmr)
        .and(&h0)
        .and(&pmm)
        .map_collect(|&cross, &chain, &power| cross * chain / power);
    let coherence = matrix.coherence(0, 1).into_parts().1;

    // The DC bin is meaningless for AC-coupled sensors
    let response = h.slice(s![1..]).to_owned();
    let coherence = coherence.slice(s![1..]).to_owned();
    let frequencies = frequencies.slice(s![1..]).to_owned();

    let unstable = response.iter().filter(|v| !v.is_finite()).count();
    if unstable > 0 {
        warn!(bins = unstable, "transfer function has non-finite bins (vanishing monitor power)");
    }
    debug!(bins = frequencies.len(), "transfer function computed");

    TransferFunction::new(frequencies, response, coherence)
}
