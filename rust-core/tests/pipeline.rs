//! End-to-end runs of the estimators on synthetic colocated recordings

use approx::assert_relative_eq;
use chrono::{TimeZone, Utc};
use colocsensors::filters::{Biquad, SosFilter};
use colocsensors::{
    cross_calib, hparam, sleeman, trans_matrix, CalibrationError, CrossCalibConfig, HParamConfig,
    InstrumentResponse, OrientationConfig, SampleSeries, SelfNoiseConfig, ThreeChannelSet,
    WelchConfig,
};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use std::f64::consts::PI;

fn white(n: usize, sigma: f64, rng: &mut StdRng) -> Vec<f64> {
    let normal = Normal::new(0.0, sigma).unwrap();
    (0..n).map(|_| normal.sample(rng)).collect()
}

/// Bilinear transform of A·s²/(s² + 2hω0·s + ω0²), prewarped at ω0
fn seismometer_biquad(period: f64, damping: f64, gain: f64, fs: f64) -> Biquad {
    let w0 = 2.0 * PI / period;
    let k = w0 / (w0 / (2.0 * fs)).tan();
    let a0 = k * k + 2.0 * damping * w0 * k + w0 * w0;
    let a1 = 2.0 * (w0 * w0 - k * k);
    let a2 = k * k - 2.0 * damping * w0 * k + w0 * w0;
    let g = gain * k * k / a0;

    Biquad {
        b: [g, -2.0 * g, g],
        a: [1.0, a1 / a0, a2 / a0],
    }
}

#[test]
fn transfer_function_then_model_fit() {
    let fs = 100.0;
    let t0 = Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(2020);

    let monitor = white(60_000, 1.0, &mut rng);
    let mut sensor = SosFilter::new(vec![seismometer_biquad(1.0, 0.7, 1.0, fs)]);
    let response = sensor.process_block(&monitor);

    let monitor = SampleSeries::new(monitor, fs, t0).unwrap();
    let response = SampleSeries::new(response, fs, t0).unwrap();

    let config = CrossCalibConfig {
        welch: WelchConfig::with_segment_length(2048),
        ..CrossCalibConfig::default()
    };
    let tf = cross_calib(&monitor, &response, &InstrumentResponse::unity(), &config).unwrap();
    assert!(tf.frequencies().iter().all(|&f| f > 0.0));

    let fit = hparam(
        &tf,
        &HParamConfig {
            fmin: 0.2,
            fnorm: 5.0,
            ..HParamConfig::default()
        },
    )
    .unwrap();

    assert_relative_eq!(fit.model.period, 1.0, max_relative = 0.02);
    assert_relative_eq!(fit.model.damping, 0.7, max_relative = 0.03);
    assert_relative_eq!(fit.model.gain, 1.0, max_relative = 0.03);
}

#[test]
fn self_noise_with_mcnamara_processing() {
    let fs = 20.0;
    let t0 = Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(7);
    let n = 32_768;

    let ground = white(n, 1.0, &mut rng);
    let sigmas = [0.02, 0.02, 0.04];
    let channels: Vec<SampleSeries> = sigmas
        .iter()
        .map(|&sigma| {
            let noise = white(n, sigma, &mut rng);
            let samples = ground.iter().zip(&noise).map(|(g, e)| g + e).collect();
            SampleSeries::new(samples, fs, t0).unwrap()
        })
        .collect();
    let set = ThreeChannelSet::from_vec(channels).unwrap();

    let config = SelfNoiseConfig::mcnamara();
    let result = sleeman(&set, &config).unwrap();
    assert_eq!(result.len(), 513 - config.discarded_bins());

    for (noise, sigma) in result.noise.iter().zip(sigmas) {
        let expected = config.psd_correction.unwrap() * 2.0 * sigma * sigma / fs;
        let mut sorted = noise.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        let median = sorted[sorted.len() / 2];
        assert!(
            median > 0.7 * expected && median < 1.4 * expected,
            "sigma {}: median {} vs {}",
            sigma,
            median,
            expected
        );
    }
}

#[test]
fn orientation_of_a_misaligned_sensor() {
    let fs = 40.0;
    let t0 = Utc.with_ymd_and_hms(2020, 2, 2, 0, 0, 0).unwrap();
    let mut rng = StdRng::seed_from_u64(99);
    let n = 8000;

    let ground: Vec<Vec<f64>> = (0..3).map(|_| white(n, 1.0, &mut rng)).collect();
    let azimuth = 5f64.to_radians();
    let (s, c) = azimuth.sin_cos();
    let truth = [[c, s, 0.0], [-s, c, 0.0], [0.0, 0.0, 0.97]];

    let make_set = |rows: Vec<Vec<f64>>| {
        ThreeChannelSet::from_vec(
            rows.into_iter()
                .map(|r| SampleSeries::new(r, fs, t0).unwrap())
                .collect(),
        )
        .unwrap()
    };
    let rotated: Vec<Vec<f64>> = (0..3)
        .map(|i| {
            (0..n)
                .map(|t| (0..3).map(|j| truth[i][j] * ground[j][t]).sum())
                .collect()
        })
        .collect();

    let reference = make_set(ground);
    let test = make_set(rotated);
    let config = OrientationConfig {
        fmin: 0.5,
        fmax: 8.0,
        ..OrientationConfig::default()
    };

    let m = trans_matrix(&reference, &test, &config).unwrap();
    for i in 0..3 {
        for j in 0..3 {
            assert!((m.coefficient(i, j) - truth[i][j]).abs() < 1e-8);
        }
    }

    let too_high = OrientationConfig {
        fmax: 25.0,
        ..config
    };
    assert!(matches!(
        trans_matrix(&reference, &test, &too_high),
        Err(CalibrationError::Configuration(_))
    ));
}
