//! Window functions for spectral estimation and trace tapering

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WindowType {
    /// Hann window: w[n] = 0.5 - 0.5*cos(2πn/(M-1))
    /// Mainlobe width: 8π/M, Sidelobe attenuation: ~44 dB
    Hann,

    /// Hamming window: w[n] = 0.54 - 0.46*cos(2πn/(M-1))
    Hamming,

    /// Blackman window: w[n] = 0.42 - 0.5*cos(2πn/(M-1)) + 0.08*cos(4πn/(M-1))
    Blackman,

    /// Rectangular window (no windowing)
    Rectangular,

    /// Tukey-style cosine taper: flat top, half-cosine ramps covering
    /// `fraction` of the window in total (half on each side)
    CosineTaper { fraction: f64 },
}

impl WindowType {
    /// Check parameters carried by the window variant
    pub fn is_valid(&self) -> bool {
        match self {
            WindowType::CosineTaper { fraction } => (0.0..=1.0).contains(fraction),
            _ => true,
        }
    }
}

/// Generate window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (M)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..M-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    if length == 1 {
        return vec![1.0];
    }

    let m = length as f64;
    let mut window = Vec::with_capacity(length);

    match window_type {
        WindowType::Hann => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / (m - 1.0);
                window.push(0.5 - 0.5 * angle.cos());
            }
        }

        WindowType::Hamming => {
            for n in 0..length {
                let angle = 2.0 * PI * n as f64 / (m - 1.0);
                window.push(0.54 - 0.46 * angle.cos());
            }
        }

        WindowType::Blackman => {
            for n in 0..length {
                let angle1 = 2.0 * PI * n as f64 / (m - 1.0);
                let angle2 = 4.0 * PI * n as f64 / (m - 1.0);
                window.push(0.42 - 0.5 * angle1.cos() + 0.08 * angle2.cos());
            }
        }

        WindowType::Rectangular => {
            window.resize(length, 1.0);
        }

        WindowType::CosineTaper { fraction } => {
            window = cosine_taper(length, fraction);
        }
    }

    window
}

/// Cosine taper with ramps of round(M·fraction/2) samples on each side.
///
/// The first and last samples are zero, the samples adjoining the flat
/// section are one.
fn cosine_taper(length: usize, fraction: f64) -> Vec<f64> {
    let half = length as f64 * fraction / 2.0;
    let frac = if fraction == 0.0 || fraction == 1.0 {
        half as usize
    } else {
        (half + 0.5) as usize
    };

    let mut window = vec![1.0; length];
    if frac == 0 || length < 4 {
        return window;
    }

    let idx1 = 0;
    let mut idx2 = frac - 1;
    let mut idx3 = length - frac;
    let idx4 = length - 1;
    if idx1 == idx2 {
        idx2 += 1;
    }
    if idx3 == idx4 {
        idx3 -= 1;
    }

    for (n, w) in window.iter_mut().enumerate().take(idx2 + 1) {
        let x = (n - idx1) as f64 / (idx2 - idx1) as f64;
        *w = 0.5 * (1.0 - (PI * x).cos());
    }
    for (n, w) in window.iter_mut().enumerate().skip(idx3) {
        let x = (idx3 as f64 - n as f64) / (idx4 - idx3) as f64;
        *w = 0.5 * (1.0 + (PI * x).cos());
    }

    window
}

/// Taper both ends of a trace in-place with Hann-shaped ramps
///
/// Each ramp spans floor(`fraction` · n) samples; the interior is untouched.
pub fn taper_edges(signal: &mut [f64], fraction: f64) {
    let npts = signal.len();
    let wlen = (fraction.clamp(0.0, 0.5) * npts as f64) as usize;
    if wlen == 0 {
        return;
    }

    // Ramps are the outer halves of a symmetric Hann window of 2·wlen(+1) points
    let sides = if 2 * wlen == npts { 2 * wlen } else { 2 * wlen + 1 };
    let ramp = generate_window(WindowType::Hann, sides);

    for i in 0..wlen {
        signal[i] *= ramp[i];
        signal[npts - wlen + i] *= ramp[sides - wlen + i];
    }
}
