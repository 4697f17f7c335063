use std::{f64::consts::PI, time::Duration};

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use fft_trigger_logger::{
    capture::{Sample, SampleClock, Scaling},
    config::TargetFrequencySet,
    sim::SimAdc,
    spectrum::{detect, hann_window, Spectrum},
};
use rand::prelude::*;

const RATE: f64 = 25600.0;

fn benchmark(c: &mut Criterion) {
    let mut rng = rand::thread_rng();

    // One second of a 50 Hz tone in noise, like a real analysis window
    let samples: Vec<Sample> = (0..RATE as usize)
        .map(|i| {
            let t = i as f64 / RATE;
            Sample {
                timestamp: None,
                raw_code: 0,
                voltage: (2.0 * PI * 50.0 * t).sin() + rng.gen_range(-0.1..0.1),
            }
        })
        .collect();
    let voltages: Vec<f64> = samples.iter().map(|s| s.voltage).collect();
    let elapsed = Duration::from_secs(1);
    // Worst case, nothing matches so every target scans every bin
    let targets = TargetFrequencySet::new(
        vec![1000.0, 2000.0, 3000.0, 4000.0, 5000.0, 6000.0],
        10.0,
        0.05,
    )
    .unwrap();

    c.bench_function("hann window", |b| {
        b.iter(|| hann_window(black_box(samples.len())))
    });

    c.bench_function("spectrum", |b| {
        b.iter(|| Spectrum::compute(black_box(&voltages), black_box(elapsed)))
    });

    c.bench_function("detect miss", |b| {
        b.iter(|| detect(black_box(&samples), black_box(elapsed), black_box(&targets), None))
    });

    // Per-sample loop overhead with the spin wait effectively disabled
    let clock = SampleClock::new(0, Scaling::new(3.3, 1023));
    let mut adc = SimAdc::new(3.3, 1023).with_tone(50.0, 1.0);
    c.bench_function("acquire 1024 samples", |b| {
        b.iter(|| {
            clock
                .acquire(&mut adc, black_box(1e9), black_box(1024.0 / 1e9))
                .unwrap()
        })
    });
}

criterion_group!(benches, benchmark);
criterion_main!(benches);
