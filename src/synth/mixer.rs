use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::synth::event::PlaybackEvent;

/*
Mixer
=====

The real-time half of the engine. It owns every active event outright; the
control side can only reach it through two lock-free rings:

    control                              audio callback
    ───────                              ──────────────
    MixerControl::admit ──admissions──→  Mixer::render
    MixerControl::collect_retired ←──retired────┘

Each `render` call:

    1. move admitted events into the active set while there's room
    2. apply each event's queued commands
    3. tick every event for every stereo frame and sum
    4. swap-remove retired events and send them back for dropping

The active set is preallocated at `max_voices`, so none of this allocates,
and nothing is ever freed here either. Admission only happens while the
return ring has a free slot for every active event plus the newcomer, so a
retiring event always finds room. When the control side stops collecting,
new events simply wait in the admission ring.
*/

/// Counters shared between the mixer and the engine.
#[derive(Debug, Default)]
pub struct MixerStats {
    active_voices: AtomicUsize,
    dropped_admissions: AtomicU64,
}

impl MixerStats {
    pub fn active_voices(&self) -> usize {
        self.active_voices.load(Ordering::Relaxed)
    }

    pub fn dropped_admissions(&self) -> u64 {
        self.dropped_admissions.load(Ordering::Relaxed)
    }

    pub(crate) fn clear_active_voices(&self) {
        self.active_voices.store(0, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped_admission(&self) {
        self.dropped_admissions.fetch_add(1, Ordering::Relaxed);
    }
}

pub struct Mixer {
    admissions: Consumer<Box<PlaybackEvent>>,
    retired: Producer<Box<PlaybackEvent>>,
    active: Vec<Box<PlaybackEvent>>,
    max_voices: usize,
    stats: Arc<MixerStats>,
}

/// Control-side ends of the mixer's rings.
pub struct MixerControl {
    admissions: Producer<Box<PlaybackEvent>>,
    retired: Consumer<Box<PlaybackEvent>>,
    stats: Arc<MixerStats>,
}

impl Mixer {
    /// Build a mixer and the control ends that feed it.
    pub fn new(
        admission_capacity: usize,
        max_voices: usize,
        stats: Arc<MixerStats>,
    ) -> (Self, MixerControl) {
        let max_voices = max_voices.max(1);
        let (admit_tx, admit_rx) = RingBuffer::new(admission_capacity.max(1));
        let (retire_tx, retire_rx) = RingBuffer::new(max_voices * 2);

        stats.clear_active_voices();

        let mixer = Self {
            admissions: admit_rx,
            retired: retire_tx,
            active: Vec::with_capacity(max_voices),
            max_voices,
            stats: stats.clone(),
        };
        let control = MixerControl {
            admissions: admit_tx,
            retired: retire_rx,
            stats,
        };
        (mixer, control)
    }

    /// Fill `out` with interleaved stereo.
    pub fn render(&mut self, out: &mut [f32]) {
        while self.active.len() < self.max_voices && self.retired.slots() > self.active.len() {
            match self.admissions.pop() {
                Ok(event) => self.active.push(event),
                Err(_) => break,
            }
        }

        for event in self.active.iter_mut() {
            event.apply_commands();
        }

        // A trailing half frame stays zeroed
        out.fill(0.0);
        for frame in out.chunks_exact_mut(2) {
            let (mut left, mut right) = (0.0, 0.0);
            for event in self.active.iter_mut() {
                let (l, r) = event.tick();
                left += l;
                right += r;
            }
            frame[0] = left;
            frame[1] = right;
        }

        let mut i = 0;
        while i < self.active.len() {
            // The admission bound keeps a slot free; if not, hold it until there is one
            if self.active[i].is_retired() && !self.retired.is_full() {
                let event = self.active.swap_remove(i);
                if let Err(PushError::Full(event)) = self.retired.push(event) {
                    self.active.push(event);
                    break;
                }
            } else {
                i += 1;
            }
        }

        self.stats
            .active_voices
            .store(self.active.len(), Ordering::Relaxed);
    }

    pub fn active_voices(&self) -> usize {
        self.active.len()
    }

    pub fn max_voices(&self) -> usize {
        self.max_voices
    }
}

impl MixerControl {
    /// Hand an event to the mixer without blocking.
    ///
    /// A full queue gives the event back; the caller decides what to do with it.
    pub fn admit(&mut self, event: Box<PlaybackEvent>) -> Result<(), Box<PlaybackEvent>> {
        match self.admissions.push(event) {
            Ok(()) => Ok(()),
            Err(PushError::Full(event)) => Err(event),
        }
    }

    /// Drop every event the mixer has handed back. Returns how many.
    pub fn collect_retired(&mut self) -> usize {
        let mut count = 0;
        while let Ok(event) = self.retired.pop() {
            drop(event);
            count += 1;
        }
        count
    }

    /// Free slots left in the admission queue.
    pub fn free_slots(&self) -> usize {
        self.admissions.slots()
    }

    pub fn stats(&self) -> &Arc<MixerStats> {
        &self.stats
    }
}
