use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vitalcast::signal::{RollingWindow, SpectralEstimator};

fn filled_window(len: usize, cpm: f64, frame_rate: f64) -> RollingWindow {
    let mut window = RollingWindow::new(len);
    for i in 0..len {
        let t = i as f64 / frame_rate;
        window.push(120.0 + 3.0 * (2.0 * std::f64::consts::PI * cpm / 60.0 * t).sin());
    }
    window
}

fn benchmark_peak_estimate(c: &mut Criterion) {
    let mut group = c.benchmark_group("spectral_peak");

    for fft_size in [512usize, 1024, 4096].iter() {
        let window = filled_window(150, 75.0, 30.0);
        group.bench_with_input(
            BenchmarkId::new("heart_rate_window", fft_size),
            fft_size,
            |b, &fft_size| {
                let mut estimator = SpectralEstimator::new(30.0, fft_size);
                b.iter(|| black_box(estimator.peak_cpm(window.iter(), (45.0, 180.0))));
            },
        );
    }

    let window = filled_window(450, 15.0, 30.0);
    group.bench_function("respiratory_window", |b| {
        let mut estimator = SpectralEstimator::new(30.0, 4096);
        b.iter(|| black_box(estimator.peak_cpm(window.iter(), (5.0, 40.0))));
    });

    group.finish();
}

criterion_group!(benches, benchmark_peak_estimate);
criterion_main!(benches);
