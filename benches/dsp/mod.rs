//! Benchmarks for low-level DSP primitives.

mod envelope;
mod filter;
mod player;

pub use envelope::bench_envelope;
pub use filter::bench_filter;
pub use player::bench_player;
