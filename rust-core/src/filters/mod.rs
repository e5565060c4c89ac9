//! Windows, tapers and IIR band-pass filtering

pub mod windows;
pub mod design;
pub mod iir;

pub use windows::{WindowType, generate_window, taper_edges};
pub use design::{BandpassSpec, Biquad, design_butterworth_bandpass};
pub use iir::SosFilter;
