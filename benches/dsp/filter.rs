//! Benchmarks for the resonant cascade filter.

use std::hint::black_box;

use criterion::{BenchmarkId, Criterion};
use saavy_sampler::dsp::filter::{Filter, FilterSlope};

use crate::BLOCK_SIZES;

pub fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/filter");

    for &size in BLOCK_SIZES {
        // Generate a test signal (sawtooth-like ramp)
        let input: Vec<f32> = (0..size)
            .map(|i| (i as f32 / size as f32) * 2.0 - 1.0)
            .collect();

        let variants = [
            ("lowpass_24", Filter::lowpass(0.3), FilterSlope::Db24),
            ("lowpass_12", Filter::lowpass(0.3), FilterSlope::Db12),
            ("highpass_24", Filter::highpass(0.3), FilterSlope::Db24),
            ("bandpass_24", Filter::bandpass(0.3), FilterSlope::Db24),
        ];

        for (name, mut filter, slope) in variants {
            filter.set_slope(slope);
            filter.set_resonance(0.5);
            let mut buffer = input.clone();
            group.bench_with_input(BenchmarkId::new(name, size), &size, |b, _| {
                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    filter.render(black_box(&mut buffer));
                })
            });
        }
    }

    group.finish();
}
