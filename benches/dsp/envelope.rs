//! Benchmarks for the exponential ADSR envelope.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sampler::dsp::envelope::Envelope;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn render(env: &mut Envelope, buffer: &mut [f64]) {
    for sample in buffer.iter_mut() {
        *sample = env.tick();
    }
}

pub fn bench_envelope(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/envelope");

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f64; size];

        // Attack phase (ramping up)
        let mut env = Envelope::adsr(SAMPLE_RATE, 10.0, 0.1, 0.7, 0.3);
        group.bench_with_input(BenchmarkId::new("attack", size), &size, |b, _| {
            b.iter(|| render(&mut env, black_box(&mut buffer)))
        });

        // Sustain phase (holding steady)
        let mut env = Envelope::adsr(SAMPLE_RATE, 0.001, 0.001, 0.7, 0.3);
        for _ in 0..200 {
            env.tick();
        }
        group.bench_with_input(BenchmarkId::new("sustain", size), &size, |b, _| {
            b.iter(|| render(&mut env, black_box(&mut buffer)))
        });

        // Release phase (ramping down)
        let mut env = Envelope::adsr(SAMPLE_RATE, 0.001, 0.001, 0.7, 10.0);
        for _ in 0..200 {
            env.tick();
        }
        env.release();
        group.bench_with_input(BenchmarkId::new("release", size), &size, |b, _| {
            b.iter(|| render(&mut env, black_box(&mut buffer)))
        });
    }

    group.finish();
}
