/// Renders a short chord progression through the offline backend and writes
/// it to a WAV file.
///
/// Run with: cargo run --example offline_bounce [out.wav]
use saavy_sampler::dsp::filter::FilterMode;
use saavy_sampler::io::OfflineBackend;
use saavy_sampler::{Engine, EngineConfig, Table};

const SAMPLE_RATE: u32 = 48_000;
const BLOCK_FRAMES: usize = 256;
const SECONDS: f64 = 3.0;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "offline_bounce.wav".to_string());

    let backend = OfflineBackend::new();
    let renderer = backend.renderer();
    let engine = Engine::new(
        EngineConfig::default().with_sample_rate(SAMPLE_RATE),
        backend,
    );

    engine.load(0, Table::saw(110.0, 0.0, f64::from(SAMPLE_RATE))?)?;
    engine.load(1, Table::square(110.0, 0.0, f64::from(SAMPLE_RATE))?)?;
    engine.start()?;

    // Two chords, each voice one second long
    let chords: [(f64, [f64; 3]); 2] = [(0.0, [0.0, 3.0, 7.0]), (1.0, [5.0, 8.0, 12.0])];
    let mut events = Vec::new();
    for (start, notes) in chords {
        for (i, note) in notes.into_iter().enumerate() {
            let mut event = engine.prepare(i % 2, start, 1.0)?;
            let player = event.player_mut();
            player.set_looping(true);
            player.set_note(note);
            player.set_gain(-15.0);
            player.set_balance(i as f32 - 1.0);
            player.set_amplitude_attack(0.01);
            player.set_amplitude_release(0.4);
            player.set_filter_mode(FilterMode::LowPass);
            player.set_filter_cutoff(0.08);
            player.set_filter_decay(0.6);
            player.set_filter_sustain(0.2);
            player.set_filter_envelope_enabled(true);
            events.push(event);
        }
    }
    println!("Admitted {} events", engine.play(events));

    let spec = hound::WavSpec {
        channels: 2,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };
    let mut writer = hound::WavWriter::create(&path, spec)?;

    let total_frames = (SECONDS * f64::from(SAMPLE_RATE)) as usize;
    let mut block = vec![0.0f32; BLOCK_FRAMES * 2];
    let mut peak = 0.0f32;
    let mut rendered = 0;
    while rendered < total_frames {
        renderer.render(&mut block);
        for &sample in &block {
            peak = peak.max(sample.abs());
            writer.write_sample(sample)?;
        }
        rendered += BLOCK_FRAMES;
        engine.collect_retired();
    }
    writer.finalize()?;

    println!("Rendered {} frames to {}", renderer.frames_rendered(), path);
    println!("Peak amplitude: {:.3}", peak);
    println!("Voices still active: {}", engine.active_voices());

    engine.close()?;
    Ok(())
}
