//! Error taxonomy shared by every estimator

use thiserror::Error;

/// Errors raised by the calibration core.
///
/// Per-bin numerical instabilities (a near-zero monitor PSD, a vanishing
/// cross-spectrum in the self-noise combination) are *not* errors: they are
/// propagated as extreme or non-finite values at the affected bin.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CalibrationError {
    /// Invalid option values or combinations (e.g. overlap >= segment length)
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// Channel count, sampling rate, length or start-time mismatch
    #[error("Precondition violated: {0}")]
    Precondition(String),

    /// Fit non-convergence, singular least-squares system, degenerate denominators
    #[error("Numerical failure: {0}")]
    Numerical(String),
}

impl CalibrationError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        CalibrationError::Configuration(msg.into())
    }

    pub(crate) fn precondition(msg: impl Into<String>) -> Self {
        CalibrationError::Precondition(msg.into())
    }

    pub(crate) fn numerical(msg: impl Into<String>) -> Self {
        CalibrationError::Numerical(msg.into())
    }
}

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, CalibrationError>;
