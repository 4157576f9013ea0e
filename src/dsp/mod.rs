//! Low-level DSP primitives used by every voice.
//!
//! These components are allocation-free and realtime-safe, making them safe to
//! embed directly inside voice structs.

/// Exponential attack/decay/sustain/release envelope generator.
pub mod envelope;
/// Resonant cascade filter with low/high/band-pass taps.
pub mod filter;
/// Decibel and amplitude conversion.
pub mod gain;

pub use envelope::{Envelope, EnvelopeStage, ENVELOPE_FLOOR};
pub use filter::{Filter, FilterMode, FilterSlope, MAX_CUTOFF};
pub use gain::{amplitude_to_decibels, decibels_to_amplitude, GAIN_NEGATIVE_INFINITY};
