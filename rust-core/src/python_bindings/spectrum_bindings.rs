//! Python bindings for spectral estimation

use super::convert::{series, start_time, to_py_err, PyWindowType};
use crate::spectrum::{Detrend, WelchConfig, WelchEstimator};
use num_complex::Complex64;
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::prelude::*;

/// Welch estimator exposed to Python
#[pyclass(name = "WelchEstimator")]
pub struct PyWelchEstimator {
    estimator: WelchEstimator,
    sampling_rate: f64,
}

#[pymethods]
impl PyWelchEstimator {
    /// Create a new estimator
    ///
    /// Args:
    ///     sampling_rate: Sample rate in Hz
    ///     segment_length: Samples per segment
    ///     overlap: Overlapping samples (default: 90% of the segment)
    ///     pad_length: FFT length (default: 4x the segment)
    ///     window_type: Segment window
    ///     taper_fraction: Taper fraction for the cosine-taper window
    ///     linear_detrend: Remove a least-squares line instead of the mean
    #[new]
    #[pyo3(signature = (sampling_rate, segment_length=1024, overlap=None, pad_length=None, window_type=PyWindowType::Hann, taper_fraction=0.1, linear_detrend=false))]
    fn new(
        sampling_rate: f64,
        segment_length: usize,
        overlap: Option<usize>,
        pad_length: Option<usize>,
        window_type: PyWindowType,
        taper_fraction: f64,
        linear_detrend: bool,
    ) -> PyResult<Self> {
        let mut config = WelchConfig::with_segment_length(segment_length);
        if let Some(o) = overlap {
            config.overlap = o;
        }
        if let Some(p) = pad_length {
            config.pad_length = p;
        }
        config.window = window_type.to_window(taper_fraction);
        if linear_detrend {
            config.detrend = Detrend::Linear;
        }

        Ok(Self {
            estimator: WelchEstimator::new(config).map_err(to_py_err)?,
            sampling_rate,
        })
    }

    /// Power spectral density
    ///
    /// Returns:
    ///     Tuple of (frequencies, psd) numpy arrays
    fn psd<'py>(
        &self,
        py: Python<'py>,
        signal: PyReadonlyArray1<f64>,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let x = series(signal, self.sampling_rate, start_time(0.0)?)?;
        let (freqs, values) = self.estimator.psd(&x).map_err(to_py_err)?.into_parts();
        Ok((freqs.into_pyarray(py), values.into_pyarray(py)))
    }

    /// Cross spectral density conj(X)·Y
    fn csd<'py>(
        &self,
        py: Python<'py>,
        x: PyReadonlyArray1<f64>,
        y: PyReadonlyArray1<f64>,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<Complex64>)> {
        let t0 = start_time(0.0)?;
        let x = series(x, self.sampling_rate, t0)?;
        let y = series(y, self.sampling_rate, t0)?;
        let (freqs, values) = self.estimator.csd(&x, &y).map_err(to_py_err)?.into_parts();
        Ok((freqs.into_pyarray(py), values.into_pyarray(py)))
    }

    /// Magnitude-squared coherence
    fn coherence<'py>(
        &self,
        py: Python<'py>,
        x: PyReadonlyArray1<f64>,
        y: PyReadonlyArray1<f64>,
    ) -> PyResult<(&'py PyArray1<f64>, &'py PyArray1<f64>)> {
        let t0 = start_time(0.0)?;
        let x = series(x, self.sampling_rate, t0)?;
        let y = series(y, self.sampling_rate, t0)?;
        let (freqs, values) = self
            .estimator
            .coherence(&x, &y)
            .map_err(to_py_err)?
            .into_parts();
        Ok((freqs.into_pyarray(py), values.into_pyarray(py)))
    }

    /// Get number of frequency bins
    fn num_bins(&self) -> usize {
        self.estimator.num_bins()
    }

    /// Get current sample rate
    fn get_sample_rate(&self) -> f64 {
        self.sampling_rate
    }
}
