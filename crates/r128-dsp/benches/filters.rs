//! Measurement stage benchmarks

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use r128_core::TruePeakMode;
use r128_dsp::{KWeightingFilter, SlidingPowerWindow, StereoFieldAnalyzer, TruePeakEstimator};

fn test_signal() -> Vec<f64> {
    (0..1024).map(|i| (i as f64 * 0.01).sin()).collect()
}

fn bench_k_weighting(c: &mut Criterion) {
    let mut filter = KWeightingFilter::new(48_000);
    let buffer = test_signal();

    c.bench_function("k_weighting_1024", |b| {
        b.iter(|| {
            let mut acc = 0.0;
            for &x in &buffer {
                acc += filter.process(black_box(x));
            }
            acc
        })
    });
}

fn bench_power_window(c: &mut Criterion) {
    let mut window = SlidingPowerWindow::from_duration(48_000, 400.0, 100.0);
    let buffer = test_signal();

    c.bench_function("power_window_1024", |b| {
        b.iter(|| {
            for &x in &buffer {
                black_box(window.push(x * x));
            }
        })
    });
}

fn bench_true_peak(c: &mut Criterion) {
    let buffer = test_signal();

    for mode in [TruePeakMode::Polyphase, TruePeakMode::Linear] {
        let mut tp = TruePeakEstimator::new(mode);
        c.bench_function(&format!("true_peak_{mode:?}_1024").to_lowercase(), |b| {
            b.iter(|| {
                for &x in &buffer {
                    black_box(tp.push(x));
                }
            })
        });
    }
}

fn bench_stereo(c: &mut Criterion) {
    let mut analyzer = StereoFieldAnalyzer::from_duration(48_000, 300.0, 300.0);
    let buffer = test_signal();

    c.bench_function("stereo_field_1024", |b| {
        b.iter(|| {
            for &x in &buffer {
                analyzer.push(black_box(x), black_box(-0.5 * x));
            }
            analyzer.snapshot(200.0)
        })
    });
}

criterion_group!(
    benches,
    bench_k_weighting,
    bench_power_window,
    bench_true_peak,
    bench_stereo
);
criterion_main!(benches);
