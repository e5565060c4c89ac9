use chrono::{TimeZone, Utc};
use colocsensors::{sleeman, SampleSeries, SelfNoiseConfig, ThreeChannelSet, WelchConfig, WelchEstimator};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn synthetic(n: usize, phase: f64, fs: f64) -> SampleSeries {
    let t0 = Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap();
    let samples = (0..n)
        .map(|i| {
            let t = i as f64 / fs;
            (2.0 * std::f64::consts::PI * 0.7 * t + phase).sin() + 0.1 * (13.0 * t).cos()
        })
        .collect();
    SampleSeries::new(samples, fs, t0).unwrap()
}

fn bench_welch(c: &mut Criterion) {
    let fs = 100.0;
    let x = synthetic(100_000, 0.0, fs);
    let y = synthetic(100_000, 0.3, fs);
    let estimator = WelchEstimator::new(WelchConfig::default()).unwrap();

    c.bench_function("welch_psd_100k", |b| b.iter(|| estimator.psd(black_box(&x)).unwrap()));
    c.bench_function("welch_cross_spectra_100k", |b| {
        b.iter(|| estimator.cross_spectra(black_box(&x), black_box(&y)).unwrap())
    });

    let set = ThreeChannelSet::new(x.clone(), y.clone(), synthetic(100_000, 0.6, fs)).unwrap();
    let config = SelfNoiseConfig::mcnamara();
    c.bench_function("sleeman_mcnamara_100k", |b| {
        b.iter(|| sleeman(black_box(&set), &config).unwrap())
    });
}

criterion_group!(benches, bench_welch);
criterion_main!(benches);
