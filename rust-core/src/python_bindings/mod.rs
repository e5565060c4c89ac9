//! PyO3 bindings for Python integration

use pyo3::prelude::*;

mod calibration_bindings;
mod convert;
mod spectrum_bindings;

/// Python module definition
#[pymodule]
fn colocsensors(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_class::<spectrum_bindings::PyWelchEstimator>()?;
    m.add_class::<convert::PyWindowType>()?;

    m.add_function(wrap_pyfunction!(calibration_bindings::cross_calib, m)?)?;
    m.add_function(wrap_pyfunction!(calibration_bindings::hparam, m)?)?;
    m.add_function(wrap_pyfunction!(calibration_bindings::sleeman, m)?)?;
    m.add_function(wrap_pyfunction!(calibration_bindings::trans_matrix, m)?)?;

    Ok(())
}
