//! Python bindings for the calibration estimators

use super::convert::{channel_set, series, start_time, to_py_err};
use crate::calibration::{
    self, CrossCalibConfig, HParamConfig, OrientationConfig, SelfNoiseConfig, TransferFunction,
};
use crate::response::InstrumentResponse;
use crate::spectrum::WelchConfig;
use num_complex::Complex64;
use numpy::{IntoPyArray, PyArray1, PyArray2, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::prelude::*;

type Spectrum<'py> = (&'py PyArray1<f64>, &'py PyArray1<Complex64>, &'py PyArray1<f64>);

/// Transfer function from a monitor channel to a device under test
///
/// Args:
///     monitor: Monitor samples
///     response: Response samples
///     sampling_rate: Sample rate in Hz
///     zeros, poles: Monitor-chain zeros and poles (rad/s)
///     sensitivity: Monitor-chain sensitivity
///
/// Returns:
///     Tuple of (frequencies, complex response, coherence)
#[pyfunction]
#[pyo3(signature = (monitor, response, sampling_rate, zeros=Vec::new(), poles=Vec::new(), sensitivity=1.0, segment_length=1024, demean=false, taper=false, start=0.0))]
#[allow(clippy::too_many_arguments)]
pub fn cross_calib<'py>(
    py: Python<'py>,
    monitor: PyReadonlyArray1<f64>,
    response: PyReadonlyArray1<f64>,
    sampling_rate: f64,
    zeros: Vec<Complex64>,
    poles: Vec<Complex64>,
    sensitivity: f64,
    segment_length: usize,
    demean: bool,
    taper: bool,
    start: f64,
) -> PyResult<Spectrum<'py>> {
    let t0 = start_time(start)?;
    let monitor = series(monitor, sampling_rate, t0)?;
    let response = series(response, sampling_rate, t0)?;
    let paz = InstrumentResponse::new(zeros, poles, 1.0, sensitivity);
    let config = CrossCalibConfig {
        welch: WelchConfig::with_segment_length(segment_length),
        demean,
        taper,
        ..CrossCalibConfig::default()
    };

    let tf = calibration::cross_calib(&monitor, &response, &paz, &config).map_err(to_py_err)?;
    Ok((
        tf.frequencies().clone().into_pyarray(py),
        tf.response().clone().into_pyarray(py),
        tf.coherence().clone().into_pyarray(py),
    ))
}

/// Fit period, damping and gain of a second-order seismometer
///
/// Returns:
///     Tuple of (period, damping, gain)
#[pyfunction]
#[pyo3(signature = (frequencies, response, coherence, fmin=0.001, fnorm=1.0))]
pub fn hparam(
    frequencies: PyReadonlyArray1<f64>,
    response: PyReadonlyArray1<Complex64>,
    coherence: PyReadonlyArray1<f64>,
    fmin: f64,
    fnorm: f64,
) -> PyResult<(f64, f64, f64)> {
    let tf = TransferFunction::new(
        frequencies.as_array().to_owned(),
        response.as_array().to_owned(),
        coherence.as_array().to_owned(),
    )
    .map_err(to_py_err)?;
    let config = HParamConfig {
        fmin,
        fnorm,
        ..HParamConfig::default()
    };

    let fit = calibration::hparam(&tf, &config).map_err(to_py_err)?;
    Ok((fit.model.period, fit.model.damping, fit.model.gain))
}

/// Self-noise of three colocated channels
///
/// Args:
///     channels: (3, n) array, one row per channel
///     mcnamara: Use the McNamara & Buland preset instead of the defaults
///
/// Returns:
///     Tuple of (frequencies, (3, m) noise array)
#[pyfunction]
#[pyo3(signature = (channels, sampling_rate, segment_length=1024, mcnamara=false, start=0.0))]
pub fn sleeman<'py>(
    py: Python<'py>,
    channels: PyReadonlyArray2<f64>,
    sampling_rate: f64,
    segment_length: usize,
    mcnamara: bool,
    start: f64,
) -> PyResult<(&'py PyArray1<f64>, &'py PyArray2<f64>)> {
    let set = channel_set(channels, sampling_rate, start_time(start)?)?;
    let config = if mcnamara {
        SelfNoiseConfig::mcnamara()
    } else {
        SelfNoiseConfig {
            welch: WelchConfig::with_segment_length(segment_length),
            ..SelfNoiseConfig::default()
        }
    };

    let result = calibration::sleeman(&set, &config).map_err(to_py_err)?;
    let noise = ndarray::stack(
        ndarray::Axis(0),
        &[result.noise[0].view(), result.noise[1].view(), result.noise[2].view()],
    )
    .map_err(|e| pyo3::exceptions::PyRuntimeError::new_err(e.to_string()))?;
    Ok((result.frequencies.into_pyarray(py), noise.into_pyarray(py)))
}

/// Matrix M with test_i ≈ Σ_j M[i, j]·reference_j over a passband
///
/// Args:
///     reference, test: (3, n) arrays sampled at the same rate and time
#[pyfunction]
#[pyo3(signature = (reference, test, sampling_rate, fmin=0.1, fmax=10.0, start=0.0))]
pub fn trans_matrix<'py>(
    py: Python<'py>,
    reference: PyReadonlyArray2<f64>,
    test: PyReadonlyArray2<f64>,
    sampling_rate: f64,
    fmin: f64,
    fmax: f64,
    start: f64,
) -> PyResult<&'py PyArray2<f64>> {
    let t0 = start_time(start)?;
    let reference = channel_set(reference, sampling_rate, t0)?;
    let test = channel_set(test, sampling_rate, t0)?;
    let config = OrientationConfig {
        fmin,
        fmax,
        ..OrientationConfig::default()
    };

    let matrix = calibration::trans_matrix(&reference, &test, &config).map_err(to_py_err)?;
    Ok(matrix.to_array().into_pyarray(py))
}
