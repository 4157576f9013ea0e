#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::io::backend::StreamConfig;

const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const DEFAULT_ADMISSION_CAPACITY: usize = 256;
const DEFAULT_MAX_VOICES: usize = 128;
const DEFAULT_COMMAND_CAPACITY: usize = 64;
const DEFAULT_FILTER_CONTROL_RATE: f64 = 100.0;

/// Engine settings. Every field has a default; the `with_*` methods build on
/// top of [`EngineConfig::default`].
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Requested output rate in Hz.
    pub sample_rate: u32,

    /// Frames per device callback, or `None` for the backend's choice.
    pub frames_per_buffer: Option<u32>,

    /// Output device name, or `None` for the default device.
    pub device: Option<String>,

    /// How many played events can wait to be picked up by the mixer.
    pub admission_capacity: usize,

    /// Upper bound on simultaneously sounding events.
    pub max_voices: usize,

    /// Per-event queue size for commands sent through a voice handle.
    pub command_capacity: usize,

    /// Rate in Hz at which filter envelopes retune the filter.
    pub filter_control_rate: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            frames_per_buffer: None,
            device: None,
            admission_capacity: DEFAULT_ADMISSION_CAPACITY,
            max_voices: DEFAULT_MAX_VOICES,
            command_capacity: DEFAULT_COMMAND_CAPACITY,
            filter_control_rate: DEFAULT_FILTER_CONTROL_RATE,
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_frames_per_buffer(mut self, frames: u32) -> Self {
        self.frames_per_buffer = Some(frames);
        self
    }

    pub fn with_device(mut self, device: impl Into<String>) -> Self {
        self.device = Some(device.into());
        self
    }

    pub fn with_admission_capacity(mut self, capacity: usize) -> Self {
        self.admission_capacity = capacity;
        self
    }

    pub fn with_max_voices(mut self, voices: usize) -> Self {
        self.max_voices = voices;
        self
    }

    pub fn with_command_capacity(mut self, capacity: usize) -> Self {
        self.command_capacity = capacity;
        self
    }

    pub fn with_filter_control_rate(mut self, rate: f64) -> Self {
        self.filter_control_rate = rate;
        self
    }

    pub(crate) fn stream_config(&self) -> StreamConfig {
        StreamConfig {
            sample_rate: self.sample_rate,
            frames_per_buffer: self.frames_per_buffer,
            device: self.device.clone(),
        }
    }
}
