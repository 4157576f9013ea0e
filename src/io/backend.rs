use std::error::Error as StdError;

use thiserror::Error;

use crate::synth::mixer::Mixer;

/// Every stream the engine opens is interleaved stereo.
pub const OUTPUT_CHANNELS: u16 = 2;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("no default output device available")]
    NoDevice,
    #[error("output device not found: {0}")]
    DeviceNotFound(String),
    #[error("failed to enumerate devices")]
    Devices(#[source] Box<dyn StdError + Send + Sync>),
    #[error("failed to build output stream")]
    BuildStream(#[source] Box<dyn StdError + Send + Sync>),
    #[error("failed to start output stream")]
    PlayStream(#[source] Box<dyn StdError + Send + Sync>),
    #[error("failed to spawn audio thread")]
    Thread(#[source] std::io::Error),
    #[error("audio thread exited unexpectedly")]
    ThreadGone,
}

/// What to ask the backend for when opening a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    /// `None` lets the backend choose.
    pub frames_per_buffer: Option<u32>,
    /// `None` selects the default output device.
    pub device: Option<String>,
}

/// An output device a backend can open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    pub host: String,
    pub max_output_channels: u16,
    pub default_sample_rate: Option<u32>,
}

/// Something that can drive a [`Mixer`] from an audio clock.
pub trait AudioBackend: Send {
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError>;

    /// Start pulling audio from `mixer`. The mixer moves to the audio side
    /// and is dropped when the stream stops.
    fn open(
        &mut self,
        config: &StreamConfig,
        mixer: Mixer,
    ) -> Result<Box<dyn ActiveStream>, BackendError>;
}

/// A running stream.
pub trait ActiveStream: Send {
    /// The rate the stream actually runs at.
    fn sample_rate(&self) -> f64;

    fn stop(self: Box<Self>) -> Result<(), BackendError>;
}
