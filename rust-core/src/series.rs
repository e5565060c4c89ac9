//! Sample series and three-channel sets
//!
//! Immutable value types validated at construction. All cross-channel
//! estimators take these instead of bare slices so that alignment is
//! enforced before any computation starts.

use chrono::{DateTime, Utc};
use crate::error::{CalibrationError, Result};

/// Relative tolerance used when comparing sampling rates
const RATE_TOLERANCE: f64 = 1e-9;

/// Ordered real samples with their sampling rate and absolute start time
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSeries {
    samples: Vec<f64>,
    sampling_rate: f64,
    start_time: DateTime<Utc>,
}

impl SampleSeries {
    /// Create a new series
    ///
    /// # Arguments
    /// * `samples` - Sample values (must not be empty)
    /// * `sampling_rate` - Sampling rate in Hz (finite, > 0)
    /// * `start_time` - Timestamp of the first sample
    pub fn new(
        samples: Vec<f64>,
        sampling_rate: f64,
        start_time: DateTime<Utc>,
    ) -> Result<Self> {
        if !(sampling_rate.is_finite() && sampling_rate > 0.0) {
            return Err(CalibrationError::precondition(format!(
                "sampling rate must be positive and finite (got {})",
                sampling_rate
            )));
        }
        if samples.is_empty() {
            return Err(CalibrationError::precondition("sample series is empty"));
        }

        Ok(Self {
            samples,
            sampling_rate,
            start_time,
        })
    }

    /// Derive a series sharing this one's rate and start time
    pub(crate) fn with_samples(&self, samples: Vec<f64>) -> Self {
        Self {
            samples,
            sampling_rate: self.sampling_rate,
            start_time: self.start_time,
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sampling_rate(&self) -> f64 {
        self.sampling_rate
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Sampling interval in seconds
    pub fn delta(&self) -> f64 {
        1.0 / self.sampling_rate
    }

    /// Check that `other` shares rate, sample count and start time
    ///
    /// Start times must agree within half a sampling interval.
    pub fn check_aligned(&self, other: &SampleSeries) -> Result<()> {
        let rate_diff = (self.sampling_rate - other.sampling_rate).abs();
        if rate_diff > RATE_TOLERANCE * self.sampling_rate.max(other.sampling_rate) {
            return Err(CalibrationError::precondition(format!(
                "sampling rates differ ({} Hz vs {} Hz)",
                self.sampling_rate, other.sampling_rate
            )));
        }

        if self.len() != other.len() {
            return Err(CalibrationError::precondition(format!(
                "sample counts differ ({} vs {})",
                self.len(),
                other.len()
            )));
        }

        let offset = (self.start_time - other.start_time)
            .num_nanoseconds()
            .map(|ns| ns as f64 * 1e-9)
            .unwrap_or(f64::INFINITY);
        if offset.abs() >= 0.5 * self.delta() {
            return Err(CalibrationError::precondition(format!(
                "start times differ by {:.6} s (tolerance {:.6} s)",
                offset.abs(),
                0.5 * self.delta()
            )));
        }

        Ok(())
    }
}

/// Exactly three aligned channels recording the same physical signal
#[derive(Debug, Clone, PartialEq)]
pub struct ThreeChannelSet {
    channels: [SampleSeries; 3],
}

impl ThreeChannelSet {
    /// Build a set, failing fast if the channels are not aligned
    pub fn new(first: SampleSeries, second: SampleSeries, third: SampleSeries) -> Result<Self> {
        first.check_aligned(&second)?;
        first.check_aligned(&third)?;
        second.check_aligned(&third)?;

        Ok(Self {
            channels: [first, second, third],
        })
    }

    /// Build a set from a list that must hold exactly three channels
    pub fn from_vec(channels: Vec<SampleSeries>) -> Result<Self> {
        let count = channels.len();
        let [a, b, c]: [SampleSeries; 3] = channels.try_into().map_err(|_| {
            CalibrationError::precondition(format!("expected 3 channels, got {}", count))
        })?;
        Self::new(a, b, c)
    }

    pub fn channels(&self) -> &[SampleSeries; 3] {
        &self.channels
    }

    pub fn sampling_rate(&self) -> f64 {
        self.channels[0].sampling_rate()
    }

    /// Samples per channel
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels[0].is_empty()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.channels[0].start_time()
    }

    /// Check that another set shares rate, length and start time with this one
    pub fn check_aligned(&self, other: &ThreeChannelSet) -> Result<()> {
        self.channels[0].check_aligned(&other.channels[0])
    }
}
