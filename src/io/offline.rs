use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::io::backend::{ActiveStream, AudioBackend, BackendError, DeviceInfo, StreamConfig};
use crate::synth::mixer::Mixer;

/// A backend with no clock of its own. Whoever holds the
/// [`OfflineRenderer`] pulls audio by calling `render`, which suits game
/// loops, tests, and bouncing to disk.
#[derive(Default)]
pub struct OfflineBackend {
    shared: Arc<Shared>,
}

/// Pull side of an [`OfflineBackend`]. Cheap to clone.
#[derive(Clone)]
pub struct OfflineRenderer {
    shared: Arc<Shared>,
}

#[derive(Default)]
struct Shared {
    mixer: Mutex<Option<Mixer>>,
    frames_rendered: AtomicU64,
}

impl OfflineBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn renderer(&self) -> OfflineRenderer {
        OfflineRenderer {
            shared: self.shared.clone(),
        }
    }
}

impl AudioBackend for OfflineBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        Ok(vec![DeviceInfo {
            name: "offline".to_string(),
            host: "offline".to_string(),
            max_output_channels: 2,
            default_sample_rate: None,
        }])
    }

    fn open(
        &mut self,
        config: &StreamConfig,
        mixer: Mixer,
    ) -> Result<Box<dyn ActiveStream>, BackendError> {
        *self.shared.mixer.lock() = Some(mixer);
        self.shared.frames_rendered.store(0, Ordering::Relaxed);
        debug!(sample_rate = config.sample_rate, "offline stream opened");
        Ok(Box::new(OfflineStream {
            shared: self.shared.clone(),
            sample_rate: f64::from(config.sample_rate),
        }))
    }
}

impl OfflineRenderer {
    /// Fill `out` with interleaved stereo from the engine.
    ///
    /// Never blocks: without a running stream, or if the stream is being
    /// opened or stopped at this instant, `out` is filled with silence.
    pub fn render(&self, out: &mut [f32]) {
        match self.shared.mixer.try_lock() {
            Some(mut guard) => match guard.as_mut() {
                Some(mixer) => {
                    mixer.render(out);
                    self.shared
                        .frames_rendered
                        .fetch_add((out.len() / 2) as u64, Ordering::Relaxed);
                }
                None => out.fill(0.0),
            },
            None => out.fill(0.0),
        }
    }

    pub fn is_running(&self) -> bool {
        self.shared.mixer.lock().is_some()
    }

    /// Stereo frames rendered since the stream was opened.
    pub fn frames_rendered(&self) -> u64 {
        self.shared.frames_rendered.load(Ordering::Relaxed)
    }
}

struct OfflineStream {
    shared: Arc<Shared>,
    sample_rate: f64,
}

impl ActiveStream for OfflineStream {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn stop(self: Box<Self>) -> Result<(), BackendError> {
        self.shared.mixer.lock().take();
        debug!("offline stream stopped");
        Ok(())
    }
}
