//! saavy-sampler - plays a short phrase on the default output device
//!
//! Run with: cargo run --bin saavy-sampler [path/to/sample.wav]
//!
//! Without a path, a synthesized saw wave is used. Set RUST_LOG=debug to see
//! loads, prepares, and admissions.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use color_eyre::eyre::WrapErr;
use saavy_sampler::dsp::filter::FilterMode;
use saavy_sampler::{Engine, EngineConfig, Table};
use tracing::info;
use tracing_subscriber::EnvFilter;

const SLOT: usize = 0;

// Semitone offsets of a minor arpeggio, played twice
const PHRASE: [f64; 8] = [0.0, 3.0, 7.0, 12.0, 7.0, 3.0, 0.0, -5.0];
const STEP_SECONDS: f64 = 0.2;

fn main() -> color_eyre::Result<()> {
    color_eyre::install()?;
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let engine = Engine::with_cpal(EngineConfig::default());

    for device in engine.list_devices()? {
        info!(name = %device.name, host = %device.host, "output device");
    }

    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => engine
            .load(SLOT, path.as_path())
            .wrap_err_with(|| format!("loading {}", path.display()))?,
        None => engine.load(SLOT, Table::saw(110.0, 0.0, engine.sample_rate())?)?,
    }

    engine.start().wrap_err("starting audio")?;

    let mut events = Vec::with_capacity(PHRASE.len());
    for (step, &note) in PHRASE.iter().enumerate() {
        let mut event = engine.prepare(SLOT, step as f64 * STEP_SECONDS, STEP_SECONDS * 0.9)?;
        let player = event.player_mut();
        player.set_looping(true);
        player.set_note(note);
        player.set_gain(-12.0);
        player.set_balance(if step % 2 == 0 { -0.3 } else { 0.3 });
        player.set_amplitude_attack(0.005);
        player.set_amplitude_release(0.15);
        player.set_filter_mode(FilterMode::LowPass);
        player.set_filter_cutoff(0.05);
        player.set_filter_resonance(0.5);
        player.set_filter_decay(0.25);
        player.set_filter_sustain(0.1);
        player.set_filter_envelope_depth(0.4);
        player.set_filter_envelope_enabled(true);
        events.push(event);
    }

    let admitted = engine.play(events);
    info!(admitted, "phrase queued");

    // A held drone under the phrase, faded out through its handle
    let mut drone = engine.prepare(SLOT, 0.0, 0.0)?;
    drone.player_mut().set_looping(true);
    drone.player_mut().set_note(-12.0);
    drone.player_mut().set_gain(-18.0);
    drone.player_mut().set_amplitude_release(0.5);
    let mut handle = drone.handle();
    engine.play([drone]);

    thread::sleep(Duration::from_secs_f64(STEP_SECONDS * PHRASE.len() as f64));
    if let Some(handle) = handle.as_mut() {
        handle.set_note_with_glide(-24.0, 1.0);
        handle.release();
    }
    thread::sleep(Duration::from_millis(800));

    info!(
        active = engine.active_voices(),
        retired = engine.collect_retired(),
        "finishing"
    );
    engine.close()?;
    Ok(())
}
