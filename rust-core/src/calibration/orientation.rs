//! Relative orientation and gain of two colocated three-component sets
//!
//! Both sets are demeaned, detrended, tapered and band-passed, then each test
//! channel is regressed on the three reference channels.

use crate::error::{CalibrationError, Result};
use crate::filters::{taper_edges, BandpassSpec, SosFilter};
use crate::series::ThreeChannelSet;
use crate::spectrum::windowing::remove_linear_trend;
use nalgebra::DMatrix;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Orientation estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrientationConfig {
    /// Passband lower edge (Hz)
    pub fmin: f64,

    /// Passband upper edge (Hz), below Nyquist
    pub fmax: f64,

    /// Prototype order of the Butterworth band-pass
    pub corners: usize,

    /// Edge taper length as a fraction of the trace
    pub taper_fraction: f64,

    /// Filter forward and backward
    pub zerophase: bool,

    /// Smallest accepted ratio of extreme singular values of the reference
    pub rcond: f64,
}

impl Default for OrientationConfig {
    fn default() -> Self {
        Self {
            fmin: 0.1,
            fmax: 10.0,
            corners: 8,
            taper_fraction: 0.1,
            zerophase: true,
            rcond: 1e-10,
        }
    }
}

impl OrientationConfig {
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=0.5).contains(&self.taper_fraction) {
            return Err(CalibrationError::config(format!(
                "taper fraction must lie in [0, 0.5] (got {})",
                self.taper_fraction
            )));
        }
        if !(self.rcond > 0.0 && self.rcond < 1.0) {
            return Err(CalibrationError::config(format!(
                "rcond must lie in (0, 1) (got {})",
                self.rcond
            )));
        }
        Ok(())
    }

    fn bandpass(&self, sample_rate: f64) -> Result<BandpassSpec> {
        BandpassSpec::new(self.fmin, self.fmax, sample_rate, self.corners)
    }
}

/// 3×3 matrix M with test_i ≈ Σ_j M[i][j] · reference_j
///
/// Rows are test channels, columns reference channels. Diagonal dominance
/// means aligned axes; off-diagonal terms measure cross-axis leakage.
#[derive(Debug, Clone, PartialEq)]
pub struct OrientationMatrix {
    matrix: Array2<f64>,

    /// Residual norm of each test channel relative to its own norm
    misfit: [f64; 3],
}

impl OrientationMatrix {
    /// Coefficient of reference channel `reference` in test channel `test`
    pub fn coefficient(&self, test: usize, reference: usize) -> f64 {
        self.matrix[[test, reference]]
    }

    pub fn as_array(&self) -> &Array2<f64> {
        &self.matrix
    }

    pub fn to_array(&self) -> Array2<f64> {
        self.matrix.clone()
    }

    /// ‖test_i − Σ_j M[i][j]·reference_j‖ / ‖test_i‖ after preprocessing
    pub fn misfit(&self) -> [f64; 3] {
        self.misfit
    }
}

fn preprocess(
    set: &ThreeChannelSet,
    filter: &mut SosFilter,
    config: &OrientationConfig,
) -> Vec<Vec<f64>> {
    set.channels()
        .iter()
        .map(|channel| {
            let mut samples = channel.samples().to_vec();
            remove_linear_trend(&mut samples);
            taper_edges(&mut samples, config.taper_fraction);
            if config.zerophase {
                filter.filter_zero_phase(&mut samples);
            } else {
                filter.reset();
                filter.process_block_inplace(&mut samples);
            }
            samples
        })
        .collect()
}

fn column_matrix(columns: &[Vec<f64>]) -> DMatrix<f64> {
    DMatrix::from_fn(columns[0].len(), columns.len(), |r, c| columns[c][r])
}

/// Estimate the matrix mapping the reference set onto the test set
pub fn trans_matrix(
    reference: &ThreeChannelSet,
    test: &ThreeChannelSet,
    config: &OrientationConfig,
) -> Result<OrientationMatrix> {
    config.validate()?;
    reference.check_aligned(test)?;

    let spec = config.bandpass(reference.sampling_rate())?;
    let mut filter = SosFilter::bandpass(&spec)?;

    let x = column_matrix(&preprocess(reference, &mut filter, config));
    let y = column_matrix(&preprocess(test, &mut filter, config));

    let svd = x.clone().svd(true, true);
    let smax = svd.singular_values.max();
    let smin = svd.singular_values.min();
    if smax.is_nan() || smax <= 0.0 || smin < config.rcond * smax {
        return Err(CalibrationError::numerical(format!(
            "reference channels are degenerate (singular values {:e} .. {:e})",
            smin, smax
        )));
    }

    // Column k of the solution holds the reference coefficients of test channel k
    let solution = svd
        .solve(&y, 0.0)
        .map_err(|e| CalibrationError::numerical(format!("least-squares solve failed: {}", e)))?;

    let residual = &y - &x * &solution;
    let misfit = [0, 1, 2].map(|k| {
        let norm = y.column(k).norm();
        if norm > 0.0 {
            residual.column(k).norm() / norm
        } else {
            0.0
        }
    });

    let matrix = Array2::from_shape_fn((3, 3), |(i, j)| solution[(j, i)]);
    debug!(
        samples = reference.len(),
        condition = smax / smin,
        "orientation matrix estimated"
    );

    Ok(OrientationMatrix { matrix, misfit })
}
