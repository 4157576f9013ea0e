use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtrb::{Producer, PushError};
use tracing::warn;

use crate::dsp::filter::{FilterMode, FilterSlope};

/// A parameter change for a voice that is already playing.
///
/// Each variant mirrors a [`TablePlayer`](crate::synth::player::TablePlayer)
/// setter, except `Release` and `Stop`, which act on the whole event.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VoiceCommand {
    SetGain(f32),
    SetDcOffset(f32),
    SetBalance(f32),
    SetSpeed { speed: f64, glide: f64 },
    SetNote { semitones: f64, glide: f64 },
    SetReverse(bool),
    SetLooping(bool),
    SetRegion { start: f64, end: f64 },
    SetLoopRegion { start: f64, end: f64 },
    SetFilterMode(FilterMode),
    SetFilterSlope(FilterSlope),
    SetFilterCutoff(f32),
    SetFilterResonance(f32),
    SetFilterEnvelopeEnabled(bool),
    SetFilterEnvelopeDepth(f32),
    SetFilterAttack(f64),
    SetFilterDecay(f64),
    SetFilterSustain(f64),
    SetFilterRelease(f64),
    SetAmplitudeAttack(f64),
    SetAmplitudeDecay(f64),
    SetAmplitudeSustain(f64),
    SetAmplitudeRelease(f64),
    Attack,
    Trigger,
    Release,
    Stop,
}

/// Control-side handle to one playing event.
///
/// Commands are queued without blocking and picked up by the mixer at the
/// start of its next callback.
pub struct VoiceHandle {
    tx: Producer<VoiceCommand>,
    retired: Arc<AtomicBool>,
}

impl VoiceHandle {
    pub(crate) fn new(tx: Producer<VoiceCommand>, retired: Arc<AtomicBool>) -> Self {
        Self { tx, retired }
    }

    /// Queue a command. Returns false if the voice is gone or its queue is full.
    pub fn send(&mut self, command: VoiceCommand) -> bool {
        if self.is_retired() {
            return false;
        }
        match self.tx.push(command) {
            Ok(()) => true,
            Err(PushError::Full(command)) => {
                warn!(?command, "voice command queue full, dropping command");
                false
            }
        }
    }

    /// True once the event has finished, been stopped, or been dropped.
    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::Acquire)
    }

    pub fn set_gain(&mut self, db: f32) {
        self.send(VoiceCommand::SetGain(db));
    }

    pub fn set_balance(&mut self, balance: f32) {
        self.send(VoiceCommand::SetBalance(balance));
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.send(VoiceCommand::SetSpeed { speed, glide: 0.0 });
    }

    pub fn set_speed_with_glide(&mut self, speed: f64, seconds: f64) {
        self.send(VoiceCommand::SetSpeed {
            speed,
            glide: seconds,
        });
    }

    pub fn set_note(&mut self, semitones: f64) {
        self.send(VoiceCommand::SetNote {
            semitones,
            glide: 0.0,
        });
    }

    pub fn set_note_with_glide(&mut self, semitones: f64, seconds: f64) {
        self.send(VoiceCommand::SetNote {
            semitones,
            glide: seconds,
        });
    }

    pub fn set_filter_cutoff(&mut self, cutoff: f32) {
        self.send(VoiceCommand::SetFilterCutoff(cutoff));
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.send(VoiceCommand::SetFilterResonance(resonance));
    }

    pub fn trigger(&mut self) {
        self.send(VoiceCommand::Trigger);
    }

    /// Start the release; the event retires once the amplitude envelope is done.
    pub fn release(&mut self) {
        self.send(VoiceCommand::Release);
    }

    /// Retire immediately, without a release tail.
    pub fn stop(&mut self) {
        self.send(VoiceCommand::Stop);
    }
}
