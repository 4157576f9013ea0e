/// Plays overlapping voices on the default output device and steers one of
/// them live through its handle.
///
/// Run with: cargo run --example polyphony_demo
use std::thread;
use std::time::Duration;

use saavy_sampler::{Engine, EngineConfig, Table};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("=== Polyphony Demo ===\n");

    let engine = Engine::with_cpal(EngineConfig::default().with_max_voices(16));
    engine.load(0, Table::sine(220.0, 0.0, engine.sample_rate())?)?;
    engine.start()?;
    println!("Streaming at {} Hz", engine.sample_rate());

    // C major chord, staggered entries, fixed lengths
    let mut chord = Vec::new();
    for (i, note) in [0.0, 4.0, 7.0].into_iter().enumerate() {
        let mut event = engine.prepare(0, i as f64 * 0.25, 2.0)?;
        event.player_mut().set_looping(true);
        event.player_mut().set_note(note);
        event.player_mut().set_gain(-12.0);
        event.player_mut().set_amplitude_release(0.5);
        chord.push(event);
    }
    println!("Admitted {} chord voices", engine.play(chord));

    // A held voice we bend and then release by hand
    let mut lead = engine.prepare(0, 0.5, 0.0)?;
    lead.player_mut().set_looping(true);
    lead.player_mut().set_note(12.0);
    lead.player_mut().set_gain(-15.0);
    lead.player_mut().set_amplitude_release(0.3);
    let mut handle = lead.handle().ok_or("handle already taken")?;
    engine.play([lead]);

    thread::sleep(Duration::from_secs(1));
    println!("Active voices: {}", engine.active_voices());

    println!("Bending the lead up a fourth");
    handle.set_note_with_glide(17.0, 0.5);
    thread::sleep(Duration::from_secs(1));

    println!("Releasing the lead");
    handle.release();
    thread::sleep(Duration::from_secs(2));

    println!("Lead retired: {}", handle.is_retired());
    println!("Retired events freed: {}", engine.collect_retired());
    engine.close()?;
    Ok(())
}
