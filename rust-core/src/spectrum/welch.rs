//! Welch power / cross-power / coherence estimation
//!
//! Every channel is cut into overlapping segments, each segment is detrended,
//! windowed, zero-padded and transformed once, and the cross-periodograms of
//! all channel pairs are averaged in a single pass. Results are one-sided
//! spectral densities (units²/Hz).

use super::fft::FftEngine;
use super::windowing::{Detrend, SegmentWindow};
use crate::error::{CalibrationError, Result};
use crate::filters::windows::WindowType;
use crate::series::SampleSeries;
use ndarray::{Array1, Array3, ArrayView1, s};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Default segment length (samples)
pub const DEFAULT_SEGMENT_LENGTH: usize = 1024;

/// Default overlap as a fraction of the segment length
pub const DEFAULT_OVERLAP_RATIO: f64 = 0.9;

/// Default zero-padded transform length as a multiple of the segment length
pub const DEFAULT_PAD_FACTOR: usize = 4;

/// Fewest segments for which cross-channel quantities carry information
pub const MIN_AVERAGED_SEGMENTS: usize = 2;

/// Spectral estimator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelchConfig {
    /// Segment length N (samples)
    pub segment_length: usize,

    /// Overlap between consecutive segments (samples, < N)
    pub overlap: usize,

    /// Transform length P >= N; segments are zero-padded to it
    pub pad_length: usize,

    /// Detrending applied to each segment
    pub detrend: Detrend,

    /// Window applied to each segment
    pub window: WindowType,
}

impl Default for WelchConfig {
    fn default() -> Self {
        Self::with_segment_length(DEFAULT_SEGMENT_LENGTH)
    }
}

impl WelchConfig {
    /// Default configuration scaled to a segment length: 90% overlap,
    /// 4x zero padding, mean detrend, Hann window
    pub fn with_segment_length(segment_length: usize) -> Self {
        Self {
            segment_length,
            overlap: (segment_length as f64 * DEFAULT_OVERLAP_RATIO) as usize,
            pad_length: segment_length * DEFAULT_PAD_FACTOR,
            detrend: Detrend::Mean,
            window: WindowType::Hann,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.segment_length == 0 {
            return Err(CalibrationError::config("segment length must be positive"));
        }
        if self.overlap >= self.segment_length {
            return Err(CalibrationError::config(format!(
                "overlap ({}) must be smaller than the segment length ({})",
                self.overlap, self.segment_length
            )));
        }
        if self.pad_length < self.segment_length {
            return Err(CalibrationError::config(format!(
                "pad length ({}) must be at least the segment length ({})",
                self.pad_length, self.segment_length
            )));
        }
        if !self.window.is_valid() {
            return Err(CalibrationError::config(format!(
                "invalid window parameters: {:?}",
                self.window
            )));
        }
        Ok(())
    }

    /// Number of segments for a series of `len` samples
    pub fn segment_count(&self, len: usize) -> usize {
        if len < self.segment_length {
            return 0;
        }
        let step = self.segment_length - self.overlap;
        (len - self.overlap) / step
    }
}

/// Values on a one-sided, uniformly spaced frequency axis
#[derive(Debug, Clone, PartialEq)]
pub struct Spectrum<T> {
    frequencies: Array1<f64>,
    values: Array1<T>,
}

/// Real-valued spectrum (PSD, coherence, noise)
pub type PowerSpectrum = Spectrum<f64>;

/// Complex-valued spectrum (CSD)
pub type CrossSpectrum = Spectrum<Complex64>;

impl<T: Clone> Spectrum<T> {
    /// Pair a frequency axis with values of the same length
    pub fn new(frequencies: Array1<f64>, values: Array1<T>) -> Result<Self> {
        if frequencies.len() != values.len() {
            return Err(CalibrationError::precondition(format!(
                "frequency axis has {} bins but {} values were given",
                frequencies.len(),
                values.len()
            )));
        }
        if frequencies.iter().zip(frequencies.iter().skip(1)).any(|(a, b)| b <= a) {
            return Err(CalibrationError::precondition(
                "frequency axis must be strictly increasing",
            ));
        }
        Ok(Self {
            frequencies,
            values,
        })
    }

    pub fn frequencies(&self) -> &Array1<f64> {
        &self.frequencies
    }

    pub fn values(&self) -> &Array1<T> {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Index of the bin closest to `frequency`
    pub fn nearest_bin(&self, frequency: f64) -> usize {
        nearest_index(&self.frequencies, frequency)
    }

    /// Drop the lowest `count` bins
    pub fn skip_bins(&self, count: usize) -> Self {
        let count = count.min(self.len());
        Self {
            frequencies: self.frequencies.slice(s![count..]).to_owned(),
            values: self.values.slice(s![count..]).to_owned(),
        }
    }

    pub fn into_parts(self) -> (Array1<f64>, Array1<T>) {
        (self.frequencies, self.values)
    }
}

/// Index of the element of `axis` closest to `value` (first on ties)
pub(crate) fn nearest_index(axis: &Array1<f64>, value: f64) -> usize {
    axis.iter()
        .enumerate()
        .fold((0, f64::INFINITY), |(best, best_d), (i, &f)| {
            let d = (f - value).abs();
            if d < best_d {
                (i, d)
            } else {
                (best, best_d)
            }
        })
        .0
}

/// Averaged cross-spectral matrix S_ij(f) = <conj(X_i)·X_j> of several channels
///
/// Hermitian in (i, j) at every bin; the diagonal holds the PSDs.
#[derive(Debug, Clone)]
pub struct SpectralMatrix {
    frequencies: Array1<f64>,

    /// Indexed as (bin, i, j)
    values: Array3<Complex64>,

    segments: usize,
}

impl SpectralMatrix {
    pub fn frequencies(&self) -> &Array1<f64> {
        &self.frequencies
    }

    pub fn num_channels(&self) -> usize {
        self.values.shape()[1]
    }

    pub fn num_bins(&self) -> usize {
        self.frequencies.len()
    }

    /// Number of averaged segments
    pub fn segments(&self) -> usize {
        self.segments
    }

    /// Raw view of S_ij across frequency
    pub fn entry(&self, i: usize, j: usize) -> ArrayView1<'_, Complex64> {
        self.values.slice(s![.., i, j])
    }

    /// Power spectral density of channel `i`
    pub fn power(&self, i: usize) -> PowerSpectrum {
        Spectrum {
            frequencies: self.frequencies.clone(),
            values: self.entry(i, i).mapv(|v| v.re),
        }
    }

    /// Cross spectral density conj(X_i)·X_j
    pub fn cross(&self, i: usize, j: usize) -> CrossSpectrum {
        Spectrum {
            frequencies: self.frequencies.clone(),
            values: self.entry(i, j).to_owned(),
        }
    }

    /// Magnitude-squared coherence |S_ij|² / (S_ii·S_jj), clamped to [0, 1]
    ///
    /// Bins where both PSDs vanish come out as NaN.
    pub fn coherence(&self, i: usize, j: usize) -> PowerSpectrum {
        let values = ndarray::Zip::from(self.entry(i, j))
            .and(self.entry(i, i))
            .and(self.entry(j, j))
            .map_collect(|sij, sii, sjj| {
                let c = sij.norm_sqr() / (sii.re * sjj.re);
                if c.is_finite() { c.clamp(0.0, 1.0) } else { c }
            });
        Spectrum {
            frequencies: self.frequencies.clone(),
            values,
        }
    }

    /// Fail unless at least two segments were averaged
    ///
    /// A single segment gives a rank-1 matrix: unit coherence everywhere and
    /// zero Sleeman noise, whatever the data.
    pub fn ensure_averaged(&self) -> Result<()> {
        if self.segments < MIN_AVERAGED_SEGMENTS {
            return Err(CalibrationError::numerical(format!(
                "{} segment(s) averaged, need at least {}; shorten the segment or supply more samples",
                self.segments, MIN_AVERAGED_SEGMENTS
            )));
        }
        Ok(())
    }

    /// Multiply every entry by a real factor
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            frequencies: self.frequencies.clone(),
            values: self.values.mapv(|v| v * factor),
            segments: self.segments,
        }
    }
}

/// PSDs, CSD and coherence of one channel pair
#[derive(Debug, Clone)]
pub struct CrossSpectralEstimate {
    pub pxx: PowerSpectrum,
    pub pyy: PowerSpectrum,
    pub pxy: CrossSpectrum,
    pub coherence: PowerSpectrum,
}

/// Welch spectral estimator
#[derive(Clone)]
pub struct WelchEstimator {
    config: WelchConfig,
    fft: FftEngine,
    window: SegmentWindow,
}

impl WelchEstimator {
    /// Create new estimator, validating the configuration
    pub fn new(config: WelchConfig) -> Result<Self> {
        config.validate()?;
        let fft = FftEngine::new(config.pad_length);
        let window = SegmentWindow::new(config.window, config.segment_length);

        Ok(Self {
            config,
            fft,
            window,
        })
    }

    pub fn config(&self) -> &WelchConfig {
        &self.config
    }

    /// Number of one-sided frequency bins (P/2 + 1)
    pub fn num_bins(&self) -> usize {
        self.fft.num_bins()
    }

    /// Cross-spectral matrix of any number of aligned channels
    pub fn spectral_matrix(&self, channels: &[&SampleSeries]) -> Result<SpectralMatrix> {
        let first = channels
            .first()
            .ok_or_else(|| CalibrationError::precondition("no channels given"))?;
        for other in &channels[1..] {
            first.check_aligned(other)?;
        }

        let len = first.len();
        let n = self.config.segment_length;
        if n > len {
            return Err(CalibrationError::config(format!(
                "segment length ({}) exceeds series length ({})",
                n, len
            )));
        }

        let n_channels = channels.len();
        let n_bins = self.num_bins();
        let step = n - self.config.overlap;
        let n_segments = self.config.segment_count(len);
        if n_segments < MIN_AVERAGED_SEGMENTS {
            warn!(
                segments = n_segments,
                "fewer than two segments averaged: cross-spectral matrix has rank 1"
            );
        }

        let (mut input, _) = self.fft.make_buffers();
        let mut segment = Vec::with_capacity(n);
        let mut transforms = vec![vec![Complex64::new(0.0, 0.0); n_bins]; n_channels];

        // Upper triangle accumulators, row-major over (i, j >= i)
        let pairs: Vec<(usize, usize)> = (0..n_channels)
            .flat_map(|i| (i..n_channels).map(move |j| (i, j)))
            .collect();
        let mut sums = vec![vec![Complex64::new(0.0, 0.0); n_bins]; pairs.len()];

        for k in 0..n_segments {
            let start = k * step;
            for (series, out) in channels.iter().zip(transforms.iter_mut()) {
                self.window.condition(
                    &series.samples()[start..start + n],
                    self.config.detrend,
                    &mut segment,
                );
                self.fft.spectrum_into(&segment, &mut input, out)?;
            }

            for (&(i, j), sum) in pairs.iter().zip(sums.iter_mut()) {
                for ((acc, xi), xj) in sum.iter_mut().zip(&transforms[i]).zip(&transforms[j]) {
                    *acc += xi.conj() * xj;
                }
            }
        }

        // Density scaling, then double everything but DC (and Nyquist for even P)
        let fs = first.sampling_rate();
        let scale = 1.0 / (fs * self.window.power() * n_segments as f64);
        let last_doubled = if self.config.pad_length % 2 == 0 {
            n_bins - 1
        } else {
            n_bins
        };

        let mut values = Array3::<Complex64>::zeros((n_bins, n_channels, n_channels));
        for (&(i, j), sum) in pairs.iter().zip(&sums) {
            for (bin, &acc) in sum.iter().enumerate() {
                let factor = if bin >= 1 && bin < last_doubled { 2.0 } else { 1.0 };
                let v = acc * (scale * factor);
                values[[bin, i, j]] = v;
                values[[bin, j, i]] = v.conj();
            }
        }

        debug!(
            channels = n_channels,
            segments = n_segments,
            bins = n_bins,
            "welch spectral matrix"
        );

        Ok(SpectralMatrix {
            frequencies: Array1::from(self.fft.frequency_axis(fs)),
            values,
            segments: n_segments,
        })
    }

    /// Power spectral density of one series
    pub fn psd(&self, x: &SampleSeries) -> Result<PowerSpectrum> {
        Ok(self.spectral_matrix(&[x])?.power(0))
    }

    /// Cross spectral density conj(X)·Y
    pub fn csd(&self, x: &SampleSeries, y: &SampleSeries) -> Result<CrossSpectrum> {
        Ok(self.spectral_matrix(&[x, y])?.cross(0, 1))
    }

    /// Magnitude-squared coherence of two series
    pub fn coherence(&self, x: &SampleSeries, y: &SampleSeries) -> Result<PowerSpectrum> {
        Ok(self.spectral_matrix(&[x, y])?.coherence(0, 1))
    }

    /// PSDs, CSD and coherence of a pair in one pass
    pub fn cross_spectra(&self, x: &SampleSeries, y: &SampleSeries) -> Result<CrossSpectralEstimate> {
        let matrix = self.spectral_matrix(&[x, y])?;
        Ok(CrossSpectralEstimate {
            pxx: matrix.power(0),
            pyy: matrix.power(1),
            pxy: matrix.cross(0, 1),
            coherence: matrix.coherence(0, 1),
        })
    }
}
