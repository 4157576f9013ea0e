//! Benchmarks for the mixer at different voice counts.

use std::hint::black_box;
use std::sync::Arc;

use criterion::{BenchmarkId, Criterion};
use saavy_sampler::dsp::filter::FilterMode;
use saavy_sampler::synth::mixer::{Mixer, MixerStats};
use saavy_sampler::synth::{PlaybackEvent, TablePlayer};
use saavy_sampler::table::Table;

use crate::SAMPLE_RATE;

const VOICE_COUNTS: &[usize] = &[1, 8, 32, 128];
const BLOCK: usize = 256;

pub fn bench_voices(c: &mut Criterion) {
    let mut group = c.benchmark_group("scenarios/voices");
    let table = Arc::new(Table::saw(110.0, 0.0, SAMPLE_RATE).expect("valid table"));

    for &voices in VOICE_COUNTS {
        let mut buffer = vec![0.0f32; BLOCK * 2];

        let stats = Arc::new(MixerStats::default());
        let (mut mixer, mut control) = Mixer::new(voices, voices, stats);
        for i in 0..voices {
            let mut player = TablePlayer::new(table.clone(), SAMPLE_RATE).expect("valid rate");
            player.set_looping(true);
            player.set_note((i % 24) as f64);
            player.set_balance(((i % 5) as f32 - 2.0) / 2.0);
            player.set_filter_mode(FilterMode::LowPass);
            player.set_filter_cutoff(0.2);
            let event = PlaybackEvent::new(player, 0.0, 0.0, SAMPLE_RATE, 16);
            if control.admit(Box::new(event)).is_err() {
                panic!("admission queue too small");
            }
        }
        mixer.render(&mut buffer);

        group.bench_with_input(BenchmarkId::new("filtered_saws", voices), &voices, |b, _| {
            b.iter(|| mixer.render(black_box(&mut buffer)))
        });
    }

    group.finish();
}
