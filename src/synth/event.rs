use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, RingBuffer};

use crate::synth::message::{VoiceCommand, VoiceHandle};
use crate::synth::player::TablePlayer;

/*
Playback Event
==============

Wraps one TablePlayer with a start delay and an optional duration, and
decides when the voice is done.

    ┌───────┐ delay frames ┌─────────────────┐ duration frames ┌───────────────────┐
    │ Delay │ ───────────→ │ LimitedDuration │ ──────────────→ │ UnlimitedDuration │
    └───────┘              └─────────────────┘  (release)      └───────────────────┘
        │                                                              │
        │ release()                           amp envelope reaches Off │
        ↓                                                              ↓
    ┌─────────┐ ←──────────────────────────────────────────────────────┘
    │ Retired │   also: stop() from any state
    └─────────┘

A duration of zero or less means "play until released": the event skips
LimitedDuration and waits in UnlimitedDuration for release().

Once retired an event outputs silence forever and never comes back. Its
shared flag lets the control side (through the VoiceHandle) see that.
*/

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventState {
    Delay,
    LimitedDuration,
    UnlimitedDuration,
    Retired,
}

pub struct PlaybackEvent {
    player: TablePlayer,
    state: EventState,
    limited: bool,
    delay_frames: u64,
    duration_frames: u64,
    remaining: u64,
    rx: Consumer<VoiceCommand>,
    handle: Option<VoiceHandle>,
    retired: Arc<AtomicBool>,
}

impl PlaybackEvent {
    /// `command_capacity` bounds how many commands can be queued between two
    /// audio callbacks.
    pub fn new(
        player: TablePlayer,
        delay_seconds: f64,
        duration_seconds: f64,
        sample_rate: f64,
        command_capacity: usize,
    ) -> Self {
        let (tx, rx) = RingBuffer::<VoiceCommand>::new(command_capacity.max(1));
        let retired = Arc::new(AtomicBool::new(false));
        let delay_frames = seconds_to_frames(delay_seconds, sample_rate);
        let duration_frames = seconds_to_frames(duration_seconds, sample_rate);

        let mut event = Self {
            player,
            state: EventState::Delay,
            limited: duration_seconds > 0.0,
            delay_frames,
            duration_frames,
            remaining: delay_frames,
            rx,
            handle: Some(VoiceHandle::new(tx, retired.clone())),
            retired,
        };
        if delay_frames == 0 {
            event.start_playing();
        }
        event
    }

    /// Take the control handle. Only the first call returns one.
    pub fn handle(&mut self) -> Option<VoiceHandle> {
        self.handle.take()
    }

    /// Produce the next stereo frame and advance the state machine.
    #[inline]
    pub fn tick(&mut self) -> (f32, f32) {
        let frame = match self.state {
            EventState::Retired => return (0.0, 0.0),
            EventState::Delay => {
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.start_playing();
                }
                return (0.0, 0.0);
            }
            EventState::LimitedDuration => {
                let frame = self.player.tick();
                self.remaining = self.remaining.saturating_sub(1);
                if self.remaining == 0 {
                    self.player.release();
                    self.state = EventState::UnlimitedDuration;
                }
                frame
            }
            EventState::UnlimitedDuration => self.player.tick(),
        };

        if self.player.amplitude_envelope_mut().take_completed() {
            self.retire();
        }
        frame
    }

    /// Release the voice. An event still waiting out its delay never sounds.
    pub fn release(&mut self) {
        match self.state {
            EventState::Delay => self.retire(),
            EventState::LimitedDuration => {
                self.player.release();
                self.state = EventState::UnlimitedDuration;
            }
            EventState::UnlimitedDuration => self.player.release(),
            EventState::Retired => {}
        }
    }

    /// Retire immediately, cutting off any release tail.
    pub fn stop(&mut self) {
        self.retire();
    }

    /// Apply every command queued through the [`VoiceHandle`].
    pub fn apply_commands(&mut self) {
        while let Ok(command) = self.rx.pop() {
            if self.state != EventState::Retired {
                self.apply(command);
            }
        }
    }

    fn apply(&mut self, command: VoiceCommand) {
        let player = &mut self.player;
        match command {
            VoiceCommand::SetGain(db) => player.set_gain(db),
            VoiceCommand::SetDcOffset(offset) => player.set_dc_offset(offset),
            VoiceCommand::SetBalance(balance) => player.set_balance(balance),
            VoiceCommand::SetSpeed { speed, glide } => player.set_speed_with_glide(speed, glide),
            VoiceCommand::SetNote { semitones, glide } => {
                player.set_note_with_glide(semitones, glide)
            }
            VoiceCommand::SetReverse(reversed) => player.set_reverse(reversed),
            VoiceCommand::SetLooping(looping) => player.set_looping(looping),
            VoiceCommand::SetRegion { start, end } => player.set_region(start, end),
            VoiceCommand::SetLoopRegion { start, end } => player.set_loop_region(start, end),
            VoiceCommand::SetFilterMode(mode) => player.set_filter_mode(mode),
            VoiceCommand::SetFilterSlope(slope) => player.set_filter_slope(slope),
            VoiceCommand::SetFilterCutoff(cutoff) => player.set_filter_cutoff(cutoff),
            VoiceCommand::SetFilterResonance(resonance) => player.set_filter_resonance(resonance),
            VoiceCommand::SetFilterEnvelopeEnabled(enabled) => {
                player.set_filter_envelope_enabled(enabled)
            }
            VoiceCommand::SetFilterEnvelopeDepth(depth) => player.set_filter_envelope_depth(depth),
            VoiceCommand::SetFilterAttack(seconds) => player.set_filter_attack(seconds),
            VoiceCommand::SetFilterDecay(seconds) => player.set_filter_decay(seconds),
            VoiceCommand::SetFilterSustain(level) => player.set_filter_sustain(level),
            VoiceCommand::SetFilterRelease(seconds) => player.set_filter_release(seconds),
            VoiceCommand::SetAmplitudeAttack(seconds) => player.set_amplitude_attack(seconds),
            VoiceCommand::SetAmplitudeDecay(seconds) => player.set_amplitude_decay(seconds),
            VoiceCommand::SetAmplitudeSustain(level) => player.set_amplitude_sustain(level),
            VoiceCommand::SetAmplitudeRelease(seconds) => player.set_amplitude_release(seconds),
            VoiceCommand::Attack => player.attack(),
            VoiceCommand::Trigger => player.trigger(),
            VoiceCommand::Release => self.release(),
            VoiceCommand::Stop => self.stop(),
        }
    }

    fn start_playing(&mut self) {
        if !self.limited {
            self.state = EventState::UnlimitedDuration;
        } else if self.duration_frames == 0 {
            // Too short to produce a single frame, go straight to the tail
            self.player.release();
            self.state = EventState::UnlimitedDuration;
        } else {
            self.remaining = self.duration_frames;
            self.state = EventState::LimitedDuration;
        }
    }

    fn retire(&mut self) {
        self.state = EventState::Retired;
        self.retired.store(true, Ordering::Release);
    }

    pub fn state(&self) -> EventState {
        self.state
    }

    pub fn is_retired(&self) -> bool {
        self.state == EventState::Retired
    }

    /// True when the event releases itself after its duration.
    pub fn is_limited(&self) -> bool {
        self.limited
    }

    pub fn delay_frames(&self) -> u64 {
        self.delay_frames
    }

    pub fn duration_frames(&self) -> u64 {
        self.duration_frames
    }

    pub fn player(&self) -> &TablePlayer {
        &self.player
    }

    /// Direct access for setting parameters before the event is played.
    pub fn player_mut(&mut self) -> &mut TablePlayer {
        &mut self.player
    }
}

impl Drop for PlaybackEvent {
    fn drop(&mut self) {
        // Handles must never wait on an event that no longer exists
        self.retired.store(true, Ordering::Release);
    }
}

fn seconds_to_frames(seconds: f64, sample_rate: f64) -> u64 {
    (seconds * sample_rate).max(0.0).floor() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::envelope::EnvelopeStage;
    use crate::table::Table;

    const SR: f64 = 1_000.0;

    fn player(frames: usize) -> TablePlayer {
        let table = Table::from_samples("dc", 1, SR, vec![0.5; frames]).unwrap();
        TablePlayer::new(Arc::new(table), SR).unwrap()
    }

    fn event(delay: f64, duration: f64) -> PlaybackEvent {
        let mut player = player(10_000);
        player.set_amplitude_release(0.01); // 10 frames
        PlaybackEvent::new(player, delay, duration, SR, 16)
    }

    #[test]
    fn frame_counts_are_floored() {
        let e = event(0.0105, 0.0209);
        assert_eq!(e.delay_frames(), 10);
        assert_eq!(e.duration_frames(), 20);
        assert!(e.is_limited());

        let e = event(-1.0, -1.0);
        assert_eq!(e.delay_frames(), 0);
        assert_eq!(e.duration_frames(), 0);
        assert!(!e.is_limited());
        assert_eq!(e.state(), EventState::UnlimitedDuration);
    }

    #[test]
    fn delay_then_duration_then_release() {
        let mut e = event(0.005, 0.02);
        assert_eq!(e.state(), EventState::Delay);

        for _ in 0..5 {
            assert_eq!(e.tick(), (0.0, 0.0));
        }
        assert_eq!(e.state(), EventState::LimitedDuration);

        for _ in 0..20 {
            assert!(e.tick().0 > 0.0);
        }
        assert_eq!(e.state(), EventState::UnlimitedDuration);
        assert_eq!(e.player().amplitude_envelope().stage(), EnvelopeStage::Release);

        // 10 release ticks, then the Off transition retires the event
        for _ in 0..10 {
            e.tick();
            assert!(!e.is_retired());
        }
        e.tick();
        assert!(e.is_retired());

        for _ in 0..10 {
            assert_eq!(e.tick(), (0.0, 0.0));
            assert_eq!(e.state(), EventState::Retired);
        }
    }

    #[test]
    fn unlimited_waits_for_release() {
        let mut e = event(0.0, 0.0);
        for _ in 0..5_000 {
            e.tick();
        }
        assert_eq!(e.state(), EventState::UnlimitedDuration);

        e.release();
        for _ in 0..11 {
            e.tick();
        }
        assert!(e.is_retired());
    }

    #[test]
    fn zero_frame_duration_releases_immediately() {
        let mut e = event(0.0, 0.0001); // limited, but under one frame
        assert!(e.is_limited());
        assert_eq!(e.duration_frames(), 0);
        assert_eq!(e.state(), EventState::UnlimitedDuration);
        assert_eq!(e.player().amplitude_envelope().stage(), EnvelopeStage::Release);
    }

    #[test]
    fn release_during_delay_retires_silently() {
        let mut e = event(1.0, 1.0);
        e.tick();
        e.release();
        assert!(e.is_retired());
        assert_eq!(e.tick(), (0.0, 0.0));
    }

    #[test]
    fn release_during_limited_duration_cuts_it_short() {
        let mut e = event(0.0, 1.0);
        e.tick();
        e.release();
        assert_eq!(e.state(), EventState::UnlimitedDuration);
        assert_eq!(e.player().amplitude_envelope().stage(), EnvelopeStage::Release);
    }

    #[test]
    fn stop_is_immediate_and_final() {
        let mut e = event(0.0, 0.0);
        let handle = e.handle().unwrap();
        e.tick();
        e.stop();
        assert!(e.is_retired());
        assert!(handle.is_retired());
        e.release();
        assert!(e.is_retired());
    }

    #[test]
    fn handle_is_given_out_once() {
        let mut e = event(0.0, 0.0);
        assert!(e.handle().is_some());
        assert!(e.handle().is_none());
    }

    #[test]
    fn commands_apply_on_drain() {
        let mut e = event(0.0, 0.0);
        let mut handle = e.handle().unwrap();
        handle.set_gain(-80.0);
        handle.set_speed(2.0);

        // Nothing changes until the owner drains the queue
        assert!(e.tick().0 > 0.0);
        e.apply_commands();
        assert_eq!(e.tick(), (0.0, 0.0));
        assert!((e.player().phase_increment() - 2.0).abs() < 1e-12);

        handle.release();
        e.apply_commands();
        assert_eq!(e.player().amplitude_envelope().stage(), EnvelopeStage::Release);

        handle.stop();
        e.apply_commands();
        assert!(e.is_retired());
        assert!(handle.is_retired());
    }

    #[test]
    fn dropping_marks_handle_retired() {
        let mut e = event(0.0, 0.0);
        let handle = e.handle().unwrap();
        assert!(!handle.is_retired());
        drop(e);
        assert!(handle.is_retired());
    }
}
