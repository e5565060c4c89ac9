//! Conversions between numpy arguments and core types

use crate::error::CalibrationError;
use crate::filters::WindowType;
use crate::series::{SampleSeries, ThreeChannelSet};
use chrono::{DateTime, TimeZone, Utc};
use numpy::{PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

/// Window type enum exposed to Python
#[pyclass(name = "WindowType")]
#[derive(Clone)]
pub enum PyWindowType {
    Hann,
    Hamming,
    Blackman,
    Rectangular,
    CosineTaper,
}

impl PyWindowType {
    /// Core window, `fraction` only used by the cosine taper
    pub fn to_window(&self, fraction: f64) -> WindowType {
        match self {
            PyWindowType::Hann => WindowType::Hann,
            PyWindowType::Hamming => WindowType::Hamming,
            PyWindowType::Blackman => WindowType::Blackman,
            PyWindowType::Rectangular => WindowType::Rectangular,
            PyWindowType::CosineTaper => WindowType::CosineTaper { fraction },
        }
    }
}

/// Configuration and precondition problems are the caller's fault
pub fn to_py_err(err: CalibrationError) -> PyErr {
    match err {
        CalibrationError::Configuration(_) | CalibrationError::Precondition(_) => {
            PyValueError::new_err(err.to_string())
        }
        CalibrationError::Numerical(_) => PyRuntimeError::new_err(err.to_string()),
    }
}

/// Start time from POSIX seconds
pub fn start_time(timestamp: f64) -> PyResult<DateTime<Utc>> {
    let secs = timestamp.floor();
    let nanos = ((timestamp - secs) * 1e9).round().min(999_999_999.0) as u32;
    Utc.timestamp_opt(secs as i64, nanos)
        .single()
        .ok_or_else(|| PyValueError::new_err(format!("invalid start time {}", timestamp)))
}

pub fn series(
    samples: PyReadonlyArray1<f64>,
    sampling_rate: f64,
    start: DateTime<Utc>,
) -> PyResult<SampleSeries> {
    SampleSeries::new(samples.as_array().to_vec(), sampling_rate, start).map_err(to_py_err)
}

/// Three-channel set from a (3, n) array, one row per channel
pub fn channel_set(
    rows: PyReadonlyArray2<f64>,
    sampling_rate: f64,
    start: DateTime<Utc>,
) -> PyResult<ThreeChannelSet> {
    let array = rows.as_array();
    let channels = array
        .outer_iter()
        .map(|row| SampleSeries::new(row.to_vec(), sampling_rate, start))
        .collect::<Result<Vec<_>, _>>()
        .map_err(to_py_err)?;
    ThreeChannelSet::from_vec(channels).map_err(to_py_err)
}
