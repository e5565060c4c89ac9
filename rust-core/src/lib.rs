//! Colocated Sensor Calibration - Spectral Core
//!
//! Transfer functions, second-order model fits, self-noise and relative
//! orientation of seismic sensors recording the same ground motion, with
//! optional Python bindings.

// Suppress PyO3 non-local impl warnings (harmless macro-generated code)
#![allow(non_local_definitions)]

pub mod calibration;
pub mod error;
pub mod filters;
pub mod response;
pub mod series;
pub mod spectrum;

#[cfg(feature = "python")]
pub mod python_bindings;

pub use calibration::{
    cross_calib, hparam, sleeman, trans_matrix, CrossCalibConfig, HParamConfig, HParamFit,
    OrientationConfig, OrientationMatrix, ResponseComparison, SelfNoise, SelfNoiseConfig,
    TransferFunction,
};
pub use error::{CalibrationError, Result};
pub use filters::WindowType;
pub use response::{InstrumentResponse, SeismometerModel};
pub use series::{SampleSeries, ThreeChannelSet};
pub use spectrum::{Detrend, WelchConfig, WelchEstimator};
