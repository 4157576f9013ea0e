//! The control-side engine: table registry, lifecycle, and admission.
//!
//! ```no_run
//! use saavy_sampler::engine::{Engine, EngineConfig};
//! use saavy_sampler::io::OfflineBackend;
//! use saavy_sampler::table::Table;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = OfflineBackend::new();
//! let renderer = backend.renderer();
//! let engine = Engine::new(EngineConfig::default(), backend);
//!
//! engine.load(0, Table::saw(220.0, 0.0, 48_000.0)?)?;
//! engine.start()?;
//!
//! let mut event = engine.prepare(0, 0.0, 0.5)?;
//! event.player_mut().set_looping(true);
//! engine.play([event]);
//!
//! let mut block = vec![0.0; 512];
//! renderer.render(&mut block);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

pub use self::config::EngineConfig;
pub use self::error::EngineError;

use crate::io::backend::{ActiveStream, AudioBackend, DeviceInfo};
use crate::synth::event::PlaybackEvent;
use crate::synth::mixer::{Mixer, MixerControl, MixerStats};
use crate::synth::player::TablePlayer;
use crate::table::{Table, TableSource};

enum Lifecycle {
    Closed,
    Stopped,
    Started {
        stream: Box<dyn ActiveStream>,
        sample_rate: f64,
    },
}

struct Inner {
    tables: HashMap<usize, Arc<Table>>,
    config: EngineConfig,
    lifecycle: Lifecycle,
    backend: Box<dyn AudioBackend>,
}

impl Inner {
    /// Configuration may only change while open and stopped.
    fn check_configurable(&self) -> Result<(), EngineError> {
        match self.lifecycle {
            Lifecycle::Closed => Err(EngineError::NotInitialized),
            Lifecycle::Started { .. } => Err(EngineError::AlreadyStarted),
            Lifecycle::Stopped => Ok(()),
        }
    }
}

/// A polyphonic sampler.
///
/// `Engine` is `Send + Sync`; share it behind an `Arc` and call it from any
/// control thread. Audio runs inside the backend and never touches the locks
/// taken here.
pub struct Engine {
    inner: Mutex<Inner>,
    // Present only while started. Kept apart from `inner` so `play` never
    // waits on a decode or a lifecycle change.
    control: Mutex<Option<MixerControl>>,
    stats: Arc<MixerStats>,
}

impl Engine {
    /// Create an open, stopped engine.
    pub fn new(config: EngineConfig, backend: impl AudioBackend + 'static) -> Self {
        Self {
            inner: Mutex::new(Inner {
                tables: HashMap::new(),
                config,
                lifecycle: Lifecycle::Stopped,
                backend: Box::new(backend),
            }),
            control: Mutex::new(None),
            stats: Arc::new(MixerStats::default()),
        }
    }

    /// An engine on the default `cpal` output device.
    #[cfg(feature = "cpal")]
    pub fn with_cpal(config: EngineConfig) -> Self {
        Self::new(config, crate::io::cpal_backend::CpalBackend::new())
    }

    pub fn list_devices(&self) -> Result<Vec<DeviceInfo>, EngineError> {
        let inner = self.inner.lock();
        if matches!(inner.lifecycle, Lifecycle::Closed) {
            return Err(EngineError::NotInitialized);
        }
        Ok(inner.backend.devices()?)
    }

    pub fn set_sample_rate(&self, sample_rate: u32) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.check_configurable()?;
        if sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample rate must be positive"));
        }
        inner.config.sample_rate = sample_rate;
        debug!(sample_rate, "sample rate set");
        Ok(())
    }

    pub fn set_frames_per_buffer(&self, frames: u32) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.check_configurable()?;
        if frames == 0 {
            return Err(EngineError::InvalidConfig("frames per buffer must be positive"));
        }
        inner.config.frames_per_buffer = Some(frames);
        debug!(frames, "frames per buffer set");
        Ok(())
    }

    /// Choose an output device by name, or `None` for the default.
    pub fn set_device(&self, device: Option<&str>) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        inner.check_configurable()?;

        if let Some(name) = device {
            let known = inner.backend.devices()?.iter().any(|d| d.name.trim() == name);
            if !known {
                return Err(EngineError::Device(name.to_string()));
            }
        }
        inner.config.device = device.map(str::to_string);
        debug!(device = ?device, "output device set");
        Ok(())
    }

    /// Open the output stream and start mixing.
    pub fn start(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::Closed => return Err(EngineError::NotInitialized),
            Lifecycle::Started { .. } => return Err(EngineError::AlreadyStarted),
            Lifecycle::Stopped => {}
        }
        if inner.config.sample_rate == 0 {
            return Err(EngineError::InvalidConfig("sample rate must be positive"));
        }

        let (mixer, control) = Mixer::new(
            inner.config.admission_capacity,
            inner.config.max_voices,
            self.stats.clone(),
        );
        let stream_config = inner.config.stream_config();
        let stream = inner.backend.open(&stream_config, mixer)?;
        let sample_rate = stream.sample_rate();

        *self.control.lock() = Some(control);
        inner.lifecycle = Lifecycle::Started {
            stream,
            sample_rate,
        };

        info!(
            sample_rate,
            max_voices = inner.config.max_voices,
            device = ?inner.config.device,
            "engine started"
        );
        Ok(())
    }

    /// Stop the stream. Every event still playing or queued is dropped.
    pub fn stop(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::Closed => return Err(EngineError::NotInitialized),
            Lifecycle::Stopped => return Err(EngineError::NotStarted),
            Lifecycle::Started { .. } => {}
        }
        self.shut_down_stream(&mut inner)
    }

    /// Stop if needed and release the backend. Loaded tables are kept for
    /// [`Engine::reopen`].
    pub fn close(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        let running = match inner.lifecycle {
            Lifecycle::Closed => return Err(EngineError::NotInitialized),
            Lifecycle::Started { .. } => true,
            Lifecycle::Stopped => false,
        };
        let stopped = if running {
            self.shut_down_stream(&mut inner)
        } else {
            Ok(())
        };
        inner.lifecycle = Lifecycle::Closed;
        info!("engine closed");
        stopped
    }

    pub fn reopen(&self) -> Result<(), EngineError> {
        let mut inner = self.inner.lock();
        if !matches!(inner.lifecycle, Lifecycle::Closed) {
            return Err(EngineError::AlreadyInitialized);
        }
        inner.lifecycle = Lifecycle::Stopped;
        info!(tables = inner.tables.len(), "engine reopened");
        Ok(())
    }

    fn shut_down_stream(&self, inner: &mut Inner) -> Result<(), EngineError> {
        let lifecycle = std::mem::replace(&mut inner.lifecycle, Lifecycle::Stopped);
        let result = match lifecycle {
            Lifecycle::Started { stream, .. } => stream.stop(),
            _ => Ok(()),
        };

        // The mixer is gone with the stream; drop the control ends too
        if let Some(mut control) = self.control.lock().take() {
            control.collect_retired();
        }
        self.stats.clear_active_voices();

        info!("engine stopped");
        result.map_err(EngineError::from)
    }

    pub fn is_started(&self) -> bool {
        matches!(self.inner.lock().lifecycle, Lifecycle::Started { .. })
    }

    pub fn is_open(&self) -> bool {
        !matches!(self.inner.lock().lifecycle, Lifecycle::Closed)
    }

    /// The streaming rate while started, the configured rate otherwise.
    pub fn sample_rate(&self) -> f64 {
        let inner = self.inner.lock();
        match inner.lifecycle {
            Lifecycle::Started { sample_rate, .. } => sample_rate,
            _ => f64::from(inner.config.sample_rate),
        }
    }

    pub fn config(&self) -> EngineConfig {
        self.inner.lock().config.clone()
    }

    /// Load a table into `slot`, replacing whatever was there.
    ///
    /// Voices already playing the old table keep it alive until they finish.
    pub fn load(&self, slot: usize, source: impl Into<TableSource>) -> Result<(), EngineError> {
        // Decode before taking the lock
        let table = match source.into() {
            TableSource::File(path) => Table::from_file(&path)?,
            TableSource::Table(table) => table,
        };
        debug!(
            slot,
            name = table.name(),
            channels = table.channels(),
            frames = table.frame_count(),
            sample_rate = table.sample_rate(),
            "table loaded"
        );

        self.inner.lock().tables.insert(slot, Arc::new(table));
        Ok(())
    }

    /// Remove the table in `slot`. Voices already playing it are unaffected.
    pub fn delete(&self, slot: usize) -> Result<(), EngineError> {
        self.inner
            .lock()
            .tables
            .remove(&slot)
            .ok_or(EngineError::TableNotFound(slot))?;
        debug!(slot, "table deleted");
        Ok(())
    }

    pub fn has_table(&self, slot: usize) -> bool {
        self.inner.lock().tables.contains_key(&slot)
    }

    /// Build an event for the table in `slot` at the streaming rate.
    ///
    /// The event does nothing until passed to [`Engine::play`]; set its
    /// parameters through [`PlaybackEvent::player_mut`] first. A duration of
    /// zero or less plays until released.
    pub fn prepare(
        &self,
        slot: usize,
        delay_seconds: f64,
        duration_seconds: f64,
    ) -> Result<PlaybackEvent, EngineError> {
        let inner = self.inner.lock();
        let Lifecycle::Started { sample_rate, .. } = inner.lifecycle else {
            return Err(EngineError::NotStarted);
        };
        let table = inner
            .tables
            .get(&slot)
            .cloned()
            .ok_or(EngineError::TableNotFound(slot))?;

        let player =
            TablePlayer::with_control_rate(table, sample_rate, inner.config.filter_control_rate)?;
        let event = PlaybackEvent::new(
            player,
            delay_seconds,
            duration_seconds,
            sample_rate,
            inner.config.command_capacity,
        );

        debug!(
            slot,
            delay_frames = event.delay_frames(),
            duration_frames = event.duration_frames(),
            "event prepared"
        );
        Ok(event)
    }

    /// Hand events to the mixer. Returns how many were admitted.
    ///
    /// Never blocks. When the admission queue is full, or the engine isn't
    /// started, the event is dropped and counted in
    /// [`Engine::dropped_admissions`]; its handle reports retired.
    pub fn play(&self, events: impl IntoIterator<Item = PlaybackEvent>) -> usize {
        let mut control = self.control.lock();
        let mut admitted = 0;
        let mut dropped = 0;

        match control.as_mut() {
            Some(control) => {
                control.collect_retired();
                for event in events {
                    match control.admit(Box::new(event)) {
                        Ok(()) => admitted += 1,
                        Err(event) => {
                            drop(event);
                            self.stats.record_dropped_admission();
                            dropped += 1;
                        }
                    }
                }
            }
            None => {
                for event in events {
                    drop(event);
                    self.stats.record_dropped_admission();
                    dropped += 1;
                }
            }
        }

        if dropped > 0 {
            warn!(
                admitted,
                dropped,
                started = control.is_some(),
                "dropped events that could not be admitted"
            );
        }
        admitted
    }

    /// Free events the mixer has finished with. Returns how many.
    pub fn collect_retired(&self) -> usize {
        self.control
            .lock()
            .as_mut()
            .map_or(0, MixerControl::collect_retired)
    }

    pub fn active_voices(&self) -> usize {
        self.stats.active_voices()
    }

    /// Events rejected by [`Engine::play`] since the engine was created.
    pub fn dropped_admissions(&self) -> u64 {
        self.stats.dropped_admissions()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::offline::OfflineBackend;

    fn engine() -> Engine {
        Engine::new(EngineConfig::default(), OfflineBackend::new())
    }

    fn engine_is_send_sync<T: Send + Sync>() {}

    #[test]
    fn engine_can_be_shared() {
        engine_is_send_sync::<Engine>();
    }

    #[test]
    fn lifecycle_errors_leave_state_unchanged() {
        let engine = engine();
        assert!(matches!(engine.stop(), Err(EngineError::NotStarted)));
        assert!(matches!(engine.reopen(), Err(EngineError::AlreadyInitialized)));

        engine.start().unwrap();
        assert!(engine.is_started());
        assert!(matches!(engine.start(), Err(EngineError::AlreadyStarted)));
        assert!(matches!(
            engine.set_sample_rate(44_100),
            Err(EngineError::AlreadyStarted)
        ));
        assert!(engine.is_started());

        engine.stop().unwrap();
        assert!(!engine.is_started());

        engine.close().unwrap();
        assert!(!engine.is_open());
        assert!(matches!(engine.start(), Err(EngineError::NotInitialized)));
        assert!(matches!(engine.close(), Err(EngineError::NotInitialized)));
        assert!(matches!(
            engine.set_frames_per_buffer(64),
            Err(EngineError::NotInitialized)
        ));
        assert!(matches!(engine.list_devices(), Err(EngineError::NotInitialized)));

        engine.reopen().unwrap();
        engine.start().unwrap();
        assert!(engine.is_started());
    }

    #[test]
    fn close_stops_a_running_stream() {
        let engine = engine();
        engine.start().unwrap();
        engine.close().unwrap();
        assert!(!engine.is_started());
        assert!(!engine.is_open());
    }

    #[test]
    fn configuration_applies_on_next_start() {
        let engine = engine();
        engine.set_sample_rate(44_100).unwrap();
        assert!(matches!(
            engine.set_sample_rate(0),
            Err(EngineError::InvalidConfig(_))
        ));
        engine.set_frames_per_buffer(128).unwrap();
        engine.start().unwrap();
        assert_eq!(engine.sample_rate(), 44_100.0);
        assert_eq!(engine.config().frames_per_buffer, Some(128));
    }

    #[test]
    fn set_device_checks_names() {
        let engine = engine();
        engine.set_device(Some("offline")).unwrap();
        assert!(matches!(
            engine.set_device(Some("Nonexistent")),
            Err(EngineError::Device(_))
        ));
        assert_eq!(engine.config().device.as_deref(), Some("offline"));
        engine.set_device(None).unwrap();
        assert_eq!(engine.config().device, None);
    }

    #[test]
    fn table_registry() {
        let engine = engine();
        assert!(!engine.has_table(3));
        engine
            .load(3, Table::sine(440.0, 0.0, 48_000.0).unwrap())
            .unwrap();
        assert!(engine.has_table(3));
        engine.delete(3).unwrap();
        assert!(matches!(engine.delete(3), Err(EngineError::TableNotFound(3))));
        assert!(matches!(engine.delete(42), Err(EngineError::TableNotFound(42))));
        assert!(!engine.has_table(3));
    }

    #[test]
    fn prepare_requires_stream_and_table() {
        let engine = engine();
        engine
            .load(0, Table::sine(440.0, 0.0, 48_000.0).unwrap())
            .unwrap();
        assert!(matches!(
            engine.prepare(0, 0.0, 1.0),
            Err(EngineError::NotStarted)
        ));

        engine.start().unwrap();
        assert!(matches!(
            engine.prepare(1, 0.0, 1.0),
            Err(EngineError::TableNotFound(1))
        ));
        let event = engine.prepare(0, 0.5, 1.0).unwrap();
        assert_eq!(event.delay_frames(), 24_000);
        assert_eq!(event.duration_frames(), 48_000);
    }

    #[test]
    fn play_while_stopped_drops_events() {
        let engine = engine();
        engine
            .load(0, Table::sine(440.0, 0.0, 48_000.0).unwrap())
            .unwrap();
        engine.start().unwrap();
        let mut event = engine.prepare(0, 0.0, 0.0).unwrap();
        let handle = event.handle().unwrap();
        engine.stop().unwrap();

        assert_eq!(engine.play([event]), 0);
        assert_eq!(engine.dropped_admissions(), 1);
        assert!(handle.is_retired());
        assert_eq!(engine.play(Vec::new()), 0);
        assert_eq!(engine.dropped_admissions(), 1);
    }

    #[test]
    fn missing_file_is_a_table_error() {
        let engine = engine();
        let result = engine.load(0, std::path::Path::new("/definitely/not/here.wav"));
        assert!(matches!(result, Err(EngineError::Table(_))));
        assert!(!engine.has_table(0));
    }
}
