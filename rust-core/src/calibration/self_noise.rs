//! Self-noise of three colocated sensors (Sleeman, 2006)
//!
//! With P_ij the averaged cross-spectra of channels i and j, the power each
//! channel does not share with the other two is
//!
//! ```text
//! N0 = P00 - P10·P02/P12
//! N1 = P11 - P21·P10/P20
//! N2 = P22 - P02·P21/P01
//! ```
//!
//! Bins where a denominator vanishes give non-finite noise and are kept.

use crate::error::{CalibrationError, Result};
use crate::filters::WindowType;
use crate::series::ThreeChannelSet;
use crate::spectrum::windowing::Detrend;
use crate::spectrum::{SpectralMatrix, Spectrum, WelchConfig, WelchEstimator};
use ndarray::Array1;
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// PSD correction factor of the McNamara & Buland processing
pub const MCNAMARA_PSD_CORRECTION: f64 = 1.142857;

/// Self-noise estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfNoiseConfig {
    /// Spectral estimator settings
    pub welch: WelchConfig,

    /// Low-frequency bins to drop, as a fraction of the segment length
    pub discard_fraction: f64,

    /// Factor applied to every spectrum before combining them
    pub psd_correction: Option<f64>,
}

impl Default for SelfNoiseConfig {
    fn default() -> Self {
        Self {
            welch: WelchConfig::default(),
            discard_fraction: 0.0,
            psd_correction: None,
        }
    }
}

impl SelfNoiseConfig {
    /// McNamara & Buland style processing: 1024-sample segments at 75 %
    /// overlap, no padding, linear detrend, 20 % cosine taper, lowest 3 % of
    /// bins discarded and the 1.142857 PSD correction
    pub fn mcnamara() -> Self {
        Self {
            welch: WelchConfig {
                segment_length: 1024,
                overlap: 768,
                pad_length: 1024,
                detrend: Detrend::Linear,
                window: WindowType::CosineTaper { fraction: 0.2 },
            },
            discard_fraction: 0.03,
            psd_correction: Some(MCNAMARA_PSD_CORRECTION),
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.welch.validate()?;
        if !(0.0..1.0).contains(&self.discard_fraction) {
            return Err(CalibrationError::config(format!(
                "discard fraction must lie in [0, 1) (got {})",
                self.discard_fraction
            )));
        }
        if let Some(factor) = self.psd_correction {
            if !(factor.is_finite() && factor > 0.0) {
                return Err(CalibrationError::config(format!(
                    "PSD correction must be positive (got {})",
                    factor
                )));
            }
        }
        Ok(())
    }

    /// Number of low bins removed from the output
    pub fn discarded_bins(&self) -> usize {
        (self.discard_fraction * self.welch.segment_length as f64).floor() as usize
    }
}

/// Per-channel self-noise and total power on a shared frequency axis
#[derive(Debug, Clone, PartialEq)]
pub struct SelfNoise {
    pub frequencies: Array1<f64>,

    /// Incoherent noise PSD of each channel
    pub noise: [Array1<f64>; 3],

    /// Total PSD of each channel
    pub power: [Array1<f64>; 3],
}

impl SelfNoise {
    pub fn len(&self) -> usize {
        self.frequencies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frequencies.is_empty()
    }
}

fn combine(matrix: &SpectralMatrix, i: usize, j: usize, k: usize) -> Array1<f64> {
    // N_i = P_ii - P_ji·P_ik / P_jk
    let pii = matrix.entry(i, i);
    let pji = matrix.entry(j, i);
    let pik = matrix.entry(i, k);
    let pjk = matrix.entry(j, k);

    let mut out = Array1::zeros(matrix.num_bins());
    for (bin, value) in out.iter_mut().enumerate() {
        let n: Complex64 = pii[bin] - pji[bin] * pik[bin] / pjk[bin];
        *value = n.re;
    }
    out
}

/// Estimate the self-noise of each channel of a colocated three-sensor set
pub fn sleeman(set: &ThreeChannelSet, config: &SelfNoiseConfig) -> Result<SelfNoise> {
    config.validate()?;

    let estimator = WelchEstimator::new(config.welch.clone())?;
    let [a, b, c] = set.channels();
    let mut matrix = estimator.spectral_matrix(&[a, b, c])?;
    matrix.ensure_averaged()?;
    if let Some(factor) = config.psd_correction {
        matrix = matrix.scaled(factor);
    }

    let skip = config.discarded_bins().min(matrix.num_bins());
    let noise_of = |i, j, k| -> Result<Array1<f64>> {
        let spectrum = Spectrum::new(matrix.frequencies().clone(), combine(&matrix, i, j, k))?;
        Ok(spectrum.skip_bins(skip).into_parts().1)
    };
    let power_of = |i| matrix.power(i).skip_bins(skip).into_parts().1;

    let result = SelfNoise {
        frequencies: matrix.power(0).skip_bins(skip).into_parts().0,
        noise: [noise_of(0, 1, 2)?, noise_of(1, 2, 0)?, noise_of(2, 0, 1)?],
        power: [power_of(0), power_of(1), power_of(2)],
    };

    let unstable: usize = result
        .noise
        .iter()
        .map(|n| n.iter().filter(|v| !v.is_finite()).count())
        .sum();
    if unstable > 0 {
        warn!(bins = unstable, "self-noise has non-finite bins (vanishing cross-spectrum)");
    }
    debug!(bins = result.len(), discarded = skip, "self-noise estimated");

    Ok(result)
}
