//! Benchmarks for a single table player.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use saavy_sampler::dsp::filter::FilterMode;
use saavy_sampler::synth::player::TablePlayer;
use saavy_sampler::table::Table;

use crate::{BLOCK_SIZES, SAMPLE_RATE};

fn render(player: &mut TablePlayer, buffer: &mut [f32]) {
    for frame in buffer.chunks_exact_mut(2) {
        let (l, r) = player.tick();
        frame[0] = l;
        frame[1] = r;
    }
}

pub fn bench_player(c: &mut Criterion) {
    let mut group = c.benchmark_group("dsp/player");
    let table = Arc::new(Table::saw(110.0, 0.0, SAMPLE_RATE).expect("valid table"));

    for &size in BLOCK_SIZES {
        let mut buffer = vec![0.0f32; size * 2];

        // Plain looping playback, no filter
        let mut plain = TablePlayer::new(table.clone(), SAMPLE_RATE).expect("valid rate");
        plain.set_looping(true);
        group.bench_with_input(BenchmarkId::new("plain", size), &size, |b, _| {
            b.iter(|| render(&mut plain, black_box(&mut buffer)))
        });

        // Filtered, with the cutoff envelope running at control rate
        let mut filtered = TablePlayer::new(table.clone(), SAMPLE_RATE).expect("valid rate");
        filtered.set_looping(true);
        filtered.set_filter_mode(FilterMode::LowPass);
        filtered.set_filter_cutoff(0.1);
        filtered.set_filter_resonance(0.4);
        filtered.set_filter_decay(5.0);
        filtered.set_filter_sustain(0.2);
        filtered.set_filter_envelope_enabled(true);
        group.bench_with_input(BenchmarkId::new("filter_envelope", size), &size, |b, _| {
            b.iter(|| render(&mut filtered, black_box(&mut buffer)))
        });

        // Continuous glide keeps the increment moving
        let mut gliding = TablePlayer::new(table.clone(), SAMPLE_RATE).expect("valid rate");
        gliding.set_looping(true);
        gliding.set_note_with_glide(12.0, 60.0);
        group.bench_with_input(BenchmarkId::new("glide", size), &size, |b, _| {
            b.iter(|| render(&mut gliding, black_box(&mut buffer)))
        });
    }

    group.finish();
}
