pub mod dsp; // Envelopes, filters, gain
pub mod engine; // Table registry, lifecycle, admission
pub mod io; // Audio backends and file decoding
pub mod synth; // Voices and the realtime mix
pub mod table; // Immutable sample tables

pub use engine::{Engine, EngineConfig, EngineError};
pub use synth::{PlaybackEvent, VoiceHandle};
pub use table::{Table, TableSource, Waveform};
