//! Calibration estimators built on the spectral and filtering layers

pub mod cross_calib;
pub mod hparam;
pub mod lm;
pub mod orientation;
pub mod self_noise;

pub use cross_calib::{cross_calib, CrossCalibConfig, TransferFunction};
pub use hparam::{hparam, HParamConfig, HParamFit, ResponseComparison};
pub use lm::{levenberg_marquardt, LmOptions, LmSolution};
pub use orientation::{trans_matrix, OrientationConfig, OrientationMatrix};
pub use self_noise::{sleeman, SelfNoise, SelfNoiseConfig, MCNAMARA_PSD_CORRECTION};
