use std::sync::mpsc;
use std::thread;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tracing::{error, info};

use crate::io::backend::{
    ActiveStream, AudioBackend, BackendError, DeviceInfo, StreamConfig, OUTPUT_CHANNELS,
};
use crate::synth::mixer::Mixer;

/// Plays through the default `cpal` host.
///
/// `cpal` streams aren't `Send` on every platform, so each stream is built,
/// played, and dropped on its own thread.
#[derive(Debug, Default)]
pub struct CpalBackend;

impl CpalBackend {
    pub fn new() -> Self {
        Self
    }
}

impl AudioBackend for CpalBackend {
    fn devices(&self) -> Result<Vec<DeviceInfo>, BackendError> {
        let host = cpal::default_host();
        let host_name = host.id().name().to_string();
        let devices = host
            .output_devices()
            .map_err(|e| BackendError::Devices(Box::new(e)))?;

        let mut infos = Vec::new();
        for device in devices {
            let Ok(name) = device.name() else {
                continue;
            };
            let max_output_channels = match device.supported_output_configs() {
                Ok(configs) => configs.map(|c| c.channels()).max().unwrap_or(0),
                Err(e) => {
                    error!(device = %name, err = %e, "unable to query output configs");
                    continue;
                }
            };
            if max_output_channels == 0 {
                continue;
            }
            let default_sample_rate = device
                .default_output_config()
                .ok()
                .map(|c| c.sample_rate().0);

            infos.push(DeviceInfo {
                name,
                host: host_name.clone(),
                max_output_channels,
                default_sample_rate,
            });
        }

        infos.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(infos)
    }

    fn open(
        &mut self,
        config: &StreamConfig,
        mixer: Mixer,
    ) -> Result<Box<dyn ActiveStream>, BackendError> {
        let (ready_tx, ready_rx) = mpsc::channel::<Result<(), BackendError>>();
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        let config = config.clone();
        let sample_rate = config.sample_rate;

        let thread = thread::Builder::new()
            .name("saavy-audio".to_string())
            .spawn(move || {
                let stream = match build_stream(&config, mixer) {
                    Ok(stream) => stream,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if let Err(e) = stream.play() {
                    let _ = ready_tx.send(Err(BackendError::PlayStream(Box::new(e))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                // Park until stopped, or until the stream handle goes away
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(BackendError::Thread)?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!(sample_rate, "cpal stream started");
                Ok(Box::new(CpalStream {
                    stop_tx,
                    thread: Some(thread),
                    sample_rate: f64::from(sample_rate),
                }))
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(BackendError::ThreadGone)
            }
        }
    }
}

fn build_stream(config: &StreamConfig, mut mixer: Mixer) -> Result<cpal::Stream, BackendError> {
    let host = cpal::default_host();
    let device = match config.device.as_deref() {
        Some(wanted) => host
            .output_devices()
            .map_err(|e| BackendError::Devices(Box::new(e)))?
            .find(|d| d.name().map(|n| n.trim() == wanted).unwrap_or(false))
            .ok_or_else(|| BackendError::DeviceNotFound(wanted.to_string()))?,
        None => host.default_output_device().ok_or(BackendError::NoDevice)?,
    };

    let stream_config = cpal::StreamConfig {
        channels: OUTPUT_CHANNELS,
        sample_rate: cpal::SampleRate(config.sample_rate),
        buffer_size: match config.frames_per_buffer {
            Some(frames) => cpal::BufferSize::Fixed(frames),
            None => cpal::BufferSize::Default,
        },
    };

    device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| mixer.render(data),
            |err| error!(err = %err, "cpal output stream error"),
            None,
        )
        .map_err(|e| BackendError::BuildStream(Box::new(e)))
}

struct CpalStream {
    stop_tx: mpsc::Sender<()>,
    thread: Option<thread::JoinHandle<()>>,
    sample_rate: f64,
}

impl ActiveStream for CpalStream {
    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn stop(mut self: Box<Self>) -> Result<(), BackendError> {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            thread.join().map_err(|_| BackendError::ThreadGone)?;
        }
        info!("cpal stream stopped");
        Ok(())
    }
}

impl Drop for CpalStream {
    fn drop(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
