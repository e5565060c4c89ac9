//! Segment conditioning for spectral estimation
//!
//! Detrending and windowing applied to each Welch segment before the FFT.

use crate::filters::windows::{generate_window, WindowType};
use serde::{Deserialize, Serialize};

/// Pre-segment detrending mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detrend {
    /// Leave the segment untouched
    None,
    /// Remove the mean
    Mean,
    /// Remove the mean and the least-squares linear trend
    Linear,
}

/// Remove the mean in-place
pub fn remove_mean(signal: &mut [f64]) {
    if signal.is_empty() {
        return;
    }
    let mean = signal.iter().sum::<f64>() / signal.len() as f64;
    for s in signal.iter_mut() {
        *s -= mean;
    }
}

/// Remove the least-squares line a + b·n in-place
pub fn remove_linear_trend(signal: &mut [f64]) {
    let n = signal.len();
    if n < 2 {
        remove_mean(signal);
        return;
    }

    let x_mean = (n - 1) as f64 / 2.0;
    let y_mean = signal.iter().sum::<f64>() / n as f64;

    let (mut sxy, mut sxx) = (0.0, 0.0);
    for (i, &y) in signal.iter().enumerate() {
        let dx = i as f64 - x_mean;
        sxy += dx * (y - y_mean);
        sxx += dx * dx;
    }
    let slope = sxy / sxx;

    for (i, s) in signal.iter_mut().enumerate() {
        *s -= y_mean + slope * (i as f64 - x_mean);
    }
}

/// Apply a detrend mode in-place
pub fn detrend_inplace(signal: &mut [f64], mode: Detrend) {
    match mode {
        Detrend::None => {}
        Detrend::Mean => remove_mean(signal),
        Detrend::Linear => remove_linear_trend(signal),
    }
}

/// Precomputed window for a fixed segment length
#[derive(Debug, Clone)]
pub struct SegmentWindow {
    coefficients: Vec<f64>,
    power: f64,
}

impl SegmentWindow {
    pub fn new(window_type: WindowType, length: usize) -> Self {
        let coefficients = generate_window(window_type, length);
        let power = coefficients.iter().map(|w| w * w).sum();
        Self {
            coefficients,
            power,
        }
    }

    /// Sum of squared coefficients (density normalization)
    pub fn power(&self) -> f64 {
        self.power
    }

    /// Copy `segment` into `out`, detrended then windowed
    pub fn condition(&self, segment: &[f64], detrend: Detrend, out: &mut Vec<f64>) {
        out.clear();
        out.extend_from_slice(segment);
        detrend_inplace(out, detrend);
        for (s, w) in out.iter_mut().zip(self.coefficients.iter()) {
            *s *= w;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_remove_mean() {
        let mut s = vec![1.0, 2.0, 3.0, 6.0];
        remove_mean(&mut s);
        assert!(s.iter().sum::<f64>().abs() < 1e-12);
        assert!((s[3] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_remove_linear_trend() {
        let mut s: Vec<f64> = (0..50).map(|i| 4.0 + 0.25 * i as f64).collect();
        remove_linear_trend(&mut s);
        assert!(s.iter().all(|v| v.abs() < 1e-10));
    }

    #[test]
    fn test_condition_segment() {
        let window = SegmentWindow::new(WindowType::Rectangular, 4);
        assert!((window.power() - 4.0).abs() < 1e-12);

        let mut out = Vec::new();
        window.condition(&[1.0, 1.0, 3.0, 3.0], Detrend::Mean, &mut out);
        assert_eq!(out, vec![-1.0, -1.0, 1.0, 1.0]);
    }
}
