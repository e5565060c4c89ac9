//! Spectral estimation (Welch method)

pub mod fft;
pub mod windowing;
pub mod welch;

pub use fft::FftEngine;
pub use windowing::Detrend;
pub use welch::{
    CrossSpectralEstimate, CrossSpectrum, PowerSpectrum, SpectralMatrix, Spectrum, WelchConfig,
    WelchEstimator,
};
