//! Immutable sample tables: decoded files and single-cycle waveforms.

use std::f64::consts::TAU;
use std::path::{Path, PathBuf};

use rand::Rng;
use thiserror::Error;

use crate::io::decoder::{decode_file, DecodeError};

/*
Tables
======

A table is a block of samples plus the metadata needed to play it back:

    name, channels (1 or 2), sample_rate, samples (interleaved), frame_count

Tables never change after they are built. Every voice playing a table holds
its own `Arc<Table>`, so unloading a table from the engine doesn't pull the
samples out from under voices that are still sounding.

Single-cycle waveforms
----------------------

A waveform table holds exactly one cycle at the requested frequency, so a
player running at speed 1.0 and looping reproduces that frequency:

    n = floor(|sample_rate / frequency|)      (frequency 0 → 1 sample of DC)

Phase is given in cycles and normalized into [0, 1) before use.
*/

#[derive(Debug, Error)]
pub enum TableError {
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(f64),
    #[error("tables must be mono or stereo, got {0} channels")]
    InvalidChannels(usize),
    #[error("table has no frames")]
    Empty,
    #[error("{samples} samples do not divide into {channels} channels")]
    Misaligned { samples: usize, channels: usize },
    #[error(transparent)]
    Decode(#[from] DecodeError),
}

/// Shapes available to [`Table::waveform`].
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Waveform {
    Sine,
    Saw,
    Square,
    Noise,
    ImpulseTrain,
}

impl Waveform {
    fn name(self) -> &'static str {
        match self {
            Waveform::Sine => "sine",
            Waveform::Saw => "saw",
            Waveform::Square => "square",
            Waveform::Noise => "noise",
            Waveform::ImpulseTrain => "impulse-train",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Table {
    name: String,
    channels: usize,
    sample_rate: f64,
    samples: Vec<f32>,
    frame_count: usize,
}

impl Table {
    /// Build a table from interleaved samples.
    pub fn from_samples(
        name: impl Into<String>,
        channels: usize,
        sample_rate: f64,
        samples: Vec<f32>,
    ) -> Result<Self, TableError> {
        check_sample_rate(sample_rate)?;
        if !(1..=2).contains(&channels) {
            return Err(TableError::InvalidChannels(channels));
        }
        if samples.is_empty() {
            return Err(TableError::Empty);
        }
        if samples.len() % channels != 0 {
            return Err(TableError::Misaligned {
                samples: samples.len(),
                channels,
            });
        }

        let frame_count = samples.len() / channels;
        Ok(Self {
            name: name.into(),
            channels,
            sample_rate,
            samples,
            frame_count,
        })
    }

    /// Decode a sound file into a table named after its path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TableError> {
        let path = path.as_ref();
        let decoded = decode_file(path)?;
        Self::from_samples(
            path.display().to_string(),
            decoded.channels,
            f64::from(decoded.sample_rate),
            decoded.samples,
        )
    }

    /// One cycle of `waveform` at `frequency` Hz, starting `phase` cycles in.
    pub fn waveform(
        waveform: Waveform,
        frequency: f64,
        phase: f64,
        sample_rate: f64,
    ) -> Result<Self, TableError> {
        check_sample_rate(sample_rate)?;

        let n = single_cycle_len(frequency, sample_rate);
        let phase = normalize_phase(phase);

        let samples = match waveform {
            Waveform::Sine => (0..n)
                .map(|i| (TAU * frequency * i as f64 / sample_rate + TAU * phase).sin() as f32)
                .collect(),
            Waveform::Saw => ramp(n, phase, 1.0).map(|x| x as f32).collect(),
            Waveform::Square => ramp(n, phase, 2.0)
                .map(|x| if x < 0.0 { -1.0 } else { 1.0 })
                .collect(),
            Waveform::Noise => noise(n),
            Waveform::ImpulseTrain => {
                let mut samples = vec![0.0; n];
                let offset = (phase * n as f64) as usize;
                let index = if offset > 0 { n - offset } else { 0 };
                if let Some(sample) = samples.get_mut(index) {
                    *sample = 1.0;
                }
                samples
            }
        };

        Self::from_samples(waveform.name(), 1, sample_rate, samples)
    }

    pub fn sine(frequency: f64, phase: f64, sample_rate: f64) -> Result<Self, TableError> {
        Self::waveform(Waveform::Sine, frequency, phase, sample_rate)
    }

    pub fn saw(frequency: f64, phase: f64, sample_rate: f64) -> Result<Self, TableError> {
        Self::waveform(Waveform::Saw, frequency, phase, sample_rate)
    }

    pub fn square(frequency: f64, phase: f64, sample_rate: f64) -> Result<Self, TableError> {
        Self::waveform(Waveform::Square, frequency, phase, sample_rate)
    }

    pub fn noise(frequency: f64, phase: f64, sample_rate: f64) -> Result<Self, TableError> {
        Self::waveform(Waveform::Noise, frequency, phase, sample_rate)
    }

    pub fn impulse_train(frequency: f64, phase: f64, sample_rate: f64) -> Result<Self, TableError> {
        Self::waveform(Waveform::ImpulseTrain, frequency, phase, sample_rate)
    }

    /// White noise lasting `duration` seconds (at least one frame).
    pub fn white_noise(duration: f64, sample_rate: f64) -> Result<Self, TableError> {
        check_sample_rate(sample_rate)?;
        let n = (duration.max(0.0) * sample_rate) as usize;
        Self::from_samples("white-noise", 1, sample_rate, noise(n.max(1)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn channels(&self) -> usize {
        self.channels
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn frame_count(&self) -> usize {
        self.frame_count
    }

    /// Interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// The frame at `index` as a stereo pair; mono is duplicated.
    /// Out-of-range indices read as silence.
    #[inline]
    pub fn frame(&self, index: usize) -> (f32, f32) {
        match self.channels {
            1 => {
                let s = self.samples.get(index).copied().unwrap_or(0.0);
                (s, s)
            }
            _ => {
                let left = self.samples.get(2 * index).copied().unwrap_or(0.0);
                let right = self.samples.get(2 * index + 1).copied().unwrap_or(0.0);
                (left, right)
            }
        }
    }
}

/// Where [`crate::engine::Engine::load`] should get a table from.
#[derive(Debug, Clone)]
pub enum TableSource {
    File(PathBuf),
    Table(Table),
}

impl From<Table> for TableSource {
    fn from(table: Table) -> Self {
        TableSource::Table(table)
    }
}

impl From<PathBuf> for TableSource {
    fn from(path: PathBuf) -> Self {
        TableSource::File(path)
    }
}

impl From<&Path> for TableSource {
    fn from(path: &Path) -> Self {
        TableSource::File(path.to_path_buf())
    }
}

/// Map any phase into `[0, 1)`: negatives reflect to their magnitude,
/// whole cycles are dropped.
pub fn normalize_phase(phase: f64) -> f64 {
    if !phase.is_finite() {
        return 0.0;
    }
    let phase = phase.abs();
    if phase >= 1.0 {
        phase - phase.floor()
    } else {
        phase
    }
}

fn check_sample_rate(sample_rate: f64) -> Result<(), TableError> {
    if sample_rate.is_finite() && sample_rate > 0.0 {
        Ok(())
    } else {
        Err(TableError::InvalidSampleRate(sample_rate))
    }
}

fn single_cycle_len(frequency: f64, sample_rate: f64) -> usize {
    if frequency == 0.0 || !frequency.is_finite() {
        return 1;
    }
    ((sample_rate / frequency).abs() as usize).max(1)
}

/// Bipolar ramp from `2·phase − 1`, stepping `speed / n`, wrapping to −1 above 1.
fn ramp(n: usize, phase: f64, speed: f64) -> impl Iterator<Item = f64> {
    let step = speed / n as f64;
    let mut x = phase * 2.0 - 1.0;
    (0..n).map(move |_| {
        let out = x;
        x += step;
        if x > 1.0 {
            x = -1.0;
        }
        out
    })
}

fn noise(n: usize) -> Vec<f32> {
    let mut rng = rand::thread_rng();
    (0..n).map(|_| rng.gen_range(-1.0..1.0)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_samples_validates() {
        assert!(matches!(
            Table::from_samples("t", 3, 48_000.0, vec![0.0; 6]),
            Err(TableError::InvalidChannels(3))
        ));
        assert!(matches!(
            Table::from_samples("t", 2, 48_000.0, vec![0.0; 5]),
            Err(TableError::Misaligned { samples: 5, channels: 2 })
        ));
        assert!(matches!(
            Table::from_samples("t", 1, 48_000.0, vec![]),
            Err(TableError::Empty)
        ));
        assert!(matches!(
            Table::from_samples("t", 1, 0.0, vec![0.0]),
            Err(TableError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Table::from_samples("t", 1, f64::NAN, vec![0.0]),
            Err(TableError::InvalidSampleRate(_))
        ));

        let table = Table::from_samples("t", 2, 44_100.0, vec![0.0; 10]).unwrap();
        assert_eq!(table.frame_count(), 5);
        assert_eq!(table.samples().len(), table.channels() * table.frame_count());
    }

    #[test]
    fn single_cycle_length() {
        let table = Table::sine(440.0, 0.0, 44_100.0).unwrap();
        assert_eq!(table.frame_count(), 100); // floor(100.227)
        assert_eq!(table.channels(), 1);
        assert_eq!(table.name(), "sine");

        // negative frequency uses the magnitude
        assert_eq!(Table::saw(-480.0, 0.0, 48_000.0).unwrap().frame_count(), 100);

        // DC and absurdly high frequencies still produce one frame
        assert_eq!(Table::sine(0.0, 0.0, 48_000.0).unwrap().frame_count(), 1);
        assert_eq!(Table::sine(96_000.0, 0.0, 48_000.0).unwrap().frame_count(), 1);
    }

    #[test]
    fn sine_starts_at_phase() {
        let table = Table::sine(480.0, 0.25, 48_000.0).unwrap();
        assert!((table.samples()[0] - 1.0).abs() < 1e-6);
        assert!(table.samples()[25].abs() < 1e-5);
    }

    #[test]
    fn saw_ramps_from_phase() {
        let table = Table::saw(480.0, 0.0, 48_000.0).unwrap();
        let s = table.samples();
        assert!((s[0] + 1.0).abs() < 1e-6);
        assert!((s[1] - s[0] - 0.01).abs() < 1e-5);
        assert!(s.windows(2).all(|w| w[1] > w[0]));

        let shifted = Table::saw(480.0, 0.5, 48_000.0).unwrap();
        assert!(shifted.samples()[0].abs() < 1e-6);
    }

    #[test]
    fn square_is_bipolar() {
        let table = Table::square(480.0, 0.0, 48_000.0).unwrap();
        assert!(table.samples().iter().all(|&x| x == 1.0 || x == -1.0));
        assert_eq!(table.samples()[0], -1.0);
        assert_eq!(table.samples()[60], 1.0);
    }

    #[test]
    fn noise_is_bounded() {
        let table = Table::noise(100.0, 0.0, 48_000.0).unwrap();
        assert_eq!(table.frame_count(), 480);
        assert!(table.samples().iter().all(|&x| (-1.0..1.0).contains(&x)));

        let long = Table::white_noise(0.5, 48_000.0).unwrap();
        assert_eq!(long.frame_count(), 24_000);
        assert_eq!(Table::white_noise(0.0, 48_000.0).unwrap().frame_count(), 1);
    }

    #[test]
    fn impulse_position_follows_phase() {
        let at_zero = Table::impulse_train(480.0, 0.0, 48_000.0).unwrap();
        assert_eq!(at_zero.samples()[0], 1.0);
        assert_eq!(at_zero.samples().iter().filter(|&&x| x != 0.0).count(), 1);

        let quarter = Table::impulse_train(480.0, 0.25, 48_000.0).unwrap();
        assert_eq!(quarter.samples()[75], 1.0);
        assert_eq!(quarter.samples().iter().filter(|&&x| x != 0.0).count(), 1);
    }

    #[test]
    fn phase_normalization() {
        assert_eq!(normalize_phase(0.25), 0.25);
        assert_eq!(normalize_phase(-0.25), 0.25);
        assert!((normalize_phase(2.75) - 0.75).abs() < 1e-12);
        assert_eq!(normalize_phase(1.0), 0.0);
        assert_eq!(normalize_phase(f64::INFINITY), 0.0);
    }

    #[test]
    fn waveforms_reject_bad_rates() {
        assert!(matches!(
            Table::sine(440.0, 0.0, -1.0),
            Err(TableError::InvalidSampleRate(_))
        ));
        assert!(matches!(
            Table::white_noise(1.0, 0.0),
            Err(TableError::InvalidSampleRate(_))
        ));
    }

    #[test]
    fn frame_reads_duplicate_mono_and_tolerate_overrun() {
        let mono = Table::from_samples("m", 1, 48_000.0, vec![0.5, -0.5]).unwrap();
        assert_eq!(mono.frame(1), (-0.5, -0.5));
        assert_eq!(mono.frame(7), (0.0, 0.0));

        let stereo = Table::from_samples("s", 2, 48_000.0, vec![0.1, 0.2, 0.3, 0.4]).unwrap();
        assert_eq!(stereo.frame(1), (0.3, 0.4));
    }
}
