//! Real-world scenario benchmarks.
//!
//! These model the mixer as the audio callback sees it.

mod voices;

pub use voices::bench_voices;
