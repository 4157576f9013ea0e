//! Benchmarks for DSP primitives and real-world scenarios.
//!
//! Run with: cargo bench
//!
//! These benchmarks measure the performance of core DSP operations to ensure
//! they complete well within real-time audio deadlines.
//!
//! Reference timing at 48kHz sample rate:
//!   - 64 frames  = 1.33ms deadline
//!   - 128 frames = 2.67ms deadline
//!   - 256 frames = 5.33ms deadline
//!   - 512 frames = 10.67ms deadline
//!
//! Benchmark groups:
//!   - dsp/*        Low-level primitives (envelope, filter, table player)
//!   - scenarios/*  The mixer at realistic voice counts

use criterion::{criterion_group, criterion_main};

mod dsp;
mod scenarios;

/// Common buffer sizes used in audio applications, in stereo frames.
pub const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512];

pub const SAMPLE_RATE: f64 = 48_000.0;

criterion_group!(
    benches,
    // Low-level DSP primitives
    dsp::bench_envelope,
    dsp::bench_filter,
    dsp::bench_player,
    // Real-world scenarios
    scenarios::bench_voices,
);
criterion_main!(benches);
