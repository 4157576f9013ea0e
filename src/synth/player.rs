use std::sync::Arc;

use thiserror::Error;

use crate::dsp::envelope::Envelope;
use crate::dsp::filter::{Filter, FilterMode, FilterSlope};
use crate::dsp::gain::decibels_to_amplitude;
use crate::table::Table;

/*
Table Player
============

One voice's worth of playback over a shared, immutable `Table`. Always
produces stereo: mono tables are duplicated to both sides.

Signal flow per tick:

    table[floor(phase)] → filter L/R → + dc offset → × amp · amp_env · balance

Phase & speed
-------------

`phase` is a fractional frame index. Each tick it advances by the phase
increment, which is the playback speed scaled by

    sr_factor = table_rate / output_rate

so speed 1.0 plays at the table's natural pitch at any output rate. A negative
increment plays backwards.

Portamento: a glide sets a target increment and a per-tick slide step

    step = |target - current| / (seconds · output_rate)

and the increment walks toward the target by `step` each tick, clamped so it
lands exactly.

Regions
-------

    0 ........ start ======= end ........ frame_count - 1
                  loop_start ==== loop_end

One-shot playback stops (and reports finished) when phase leaves
[start, end]. Looping playback wraps inside [loop_start, loop_end] and never
finishes.

Control rate
------------

Retuning the filter costs a division, so when the filter envelope is on the
cutoff is only refreshed every `control_ticks` frames. The envelope itself
still ticks every frame so its timing stays sample-accurate.
*/

/// Default rate for filter-envelope cutoff updates.
pub const DEFAULT_CONTROL_RATE: f64 = 100.0;

#[derive(Debug, Error)]
pub enum PlayerError {
    #[error("invalid output sample rate: {0}")]
    InvalidSampleRate(f64),
}

pub struct TablePlayer {
    table: Arc<Table>,
    sample_rate: f64,
    sr_factor: f64,

    // Level
    amplitude: f32,
    dc_offset: f32,
    balance_left: f32,
    balance_right: f32,
    amplitude_envelope: Envelope,

    // Filter
    filter_left: Filter,
    filter_right: Filter,
    filter_cutoff: f32,
    filter_envelope_enabled: bool,
    filter_envelope_depth: f32,
    filter_envelope: Envelope,
    control_tick: usize,
    control_ticks: usize,

    // Playback position
    phase: f64,
    phase_increment: f64,
    target_phase_increment: f64,
    slide_step: f64,
    start: usize,
    end: usize,
    loop_start: usize,
    loop_end: usize,
    looping: bool,
    reversed: bool,
    finished: bool,
}

impl TablePlayer {
    pub fn new(table: Arc<Table>, sample_rate: f64) -> Result<Self, PlayerError> {
        Self::with_control_rate(table, sample_rate, DEFAULT_CONTROL_RATE)
    }

    /// Like [`TablePlayer::new`], with a custom filter-envelope update rate in Hz.
    pub fn with_control_rate(
        table: Arc<Table>,
        sample_rate: f64,
        control_rate: f64,
    ) -> Result<Self, PlayerError> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(PlayerError::InvalidSampleRate(sample_rate));
        }
        let control_rate = if control_rate.is_finite() && control_rate > 0.0 {
            control_rate
        } else {
            DEFAULT_CONTROL_RATE
        };

        let sr_factor = table.sample_rate() / sample_rate;
        let last = table.frame_count().saturating_sub(1);
        let cutoff = Filter::default().cutoff();

        Ok(Self {
            sample_rate,
            sr_factor,
            amplitude: 1.0,
            dc_offset: 0.0,
            balance_left: 1.0,
            balance_right: 1.0,
            amplitude_envelope: Envelope::adsr(sample_rate, 0.0, 1.0, 1.0, 0.001),
            filter_left: Filter::new(FilterMode::None),
            filter_right: Filter::new(FilterMode::None),
            filter_cutoff: cutoff,
            filter_envelope_enabled: false,
            filter_envelope_depth: 0.5,
            filter_envelope: Envelope::adsr(sample_rate, 0.0, 1.0, 1.0, 0.001),
            control_tick: 0,
            control_ticks: (sample_rate / control_rate).floor() as usize + 1,
            phase: 0.0,
            phase_increment: sr_factor,
            target_phase_increment: sr_factor,
            slide_step: 0.0,
            start: 0,
            end: last,
            loop_start: 0,
            loop_end: last,
            looping: false,
            reversed: false,
            finished: false,
            table,
        })
    }

    /// Produce the next stereo frame.
    #[inline]
    pub fn tick(&mut self) -> (f32, f32) {
        if self.finished {
            // The amplitude envelope keeps running so a release can still complete
            self.amplitude_envelope.tick();
            if self.filter_envelope_enabled {
                self.filter_envelope.tick();
                self.advance_control_tick();
            }
            return (0.0, 0.0);
        }

        let (left, right) = self.table.frame(self.phase.max(0.0) as usize);

        if self.filter_envelope_enabled {
            let env = self.filter_envelope.tick() as f32;
            if self.control_tick == 0 {
                let cutoff = self.filter_cutoff + env * self.filter_envelope_depth;
                self.filter_left.set_cutoff(cutoff);
                self.filter_right.set_cutoff(cutoff);
            }
            self.advance_control_tick();
        }

        let left = self.filter_left.tick(left) + self.dc_offset;
        let right = self.filter_right.tick(right) + self.dc_offset;

        let gain = self.amplitude * self.amplitude_envelope.tick() as f32;
        let out = (left * gain * self.balance_left, right * gain * self.balance_right);

        self.phase += self.phase_increment;
        self.glide();
        self.wrap_phase();

        out
    }

    fn advance_control_tick(&mut self) {
        self.control_tick += 1;
        if self.control_tick >= self.control_ticks {
            self.control_tick = 0;
        }
    }

    fn glide(&mut self) {
        if self.phase_increment < self.target_phase_increment {
            self.phase_increment = (self.phase_increment + self.slide_step).min(self.target_phase_increment);
        } else if self.phase_increment > self.target_phase_increment {
            self.phase_increment = (self.phase_increment - self.slide_step).max(self.target_phase_increment);
        }
    }

    fn wrap_phase(&mut self) {
        let next = self.phase.floor();
        let forwards = self.phase_increment >= 0.0;

        if self.looping {
            if forwards && next > self.loop_end as f64 {
                self.phase = self.loop_start as f64;
            } else if !forwards && next < self.loop_start as f64 {
                self.phase = self.loop_end as f64;
            }
        } else if next > self.end as f64 {
            self.phase = self.end as f64;
            self.finished = true;
        } else if next < self.start as f64 {
            self.phase = self.start as f64;
            self.finished = true;
        }
    }

    /// Restart from the region start (or end, when reversed). Envelopes are untouched.
    pub fn trigger(&mut self) {
        self.phase = if self.reversed {
            self.end as f64
        } else {
            self.start as f64
        };
        self.finished = false;
    }

    /// Re-enter the attack stage of both envelopes.
    pub fn attack(&mut self) {
        self.amplitude_envelope.attack();
        self.filter_envelope.attack();
    }

    /// Enter the release stage of both envelopes.
    pub fn release(&mut self) {
        self.amplitude_envelope.release();
        self.filter_envelope.release();
    }

    pub fn set_gain(&mut self, db: f32) {
        if !db.is_finite() {
            return;
        }
        self.amplitude = decibels_to_amplitude(db);
    }

    pub fn set_dc_offset(&mut self, offset: f32) {
        if offset.is_finite() {
            self.dc_offset = offset;
        }
    }

    /// Pan between -1 (left only) and 1 (right only). Anything outside is ignored.
    pub fn set_balance(&mut self, balance: f32) {
        if !(-1.0..=1.0).contains(&balance) {
            return;
        }
        if balance > 0.0 {
            self.balance_left = 1.0 - balance;
            self.balance_right = 1.0;
        } else {
            self.balance_left = 1.0;
            self.balance_right = 1.0 + balance;
        }
    }

    /// Jump to a playback speed. Direction is kept; non-positive speeds are ignored.
    pub fn set_speed(&mut self, speed: f64) {
        if let Some(target) = self.target_for_speed(speed) {
            self.target_phase_increment = target;
            self.phase_increment = target;
        }
    }

    /// Glide to a playback speed over `seconds`. Zero or negative glide jumps.
    pub fn set_speed_with_glide(&mut self, speed: f64, seconds: f64) {
        let Some(target) = self.target_for_speed(speed) else {
            return;
        };
        if !seconds.is_finite() || seconds <= 0.0 {
            self.target_phase_increment = target;
            self.phase_increment = target;
            return;
        }

        self.slide_step = (target - self.phase_increment).abs() / (seconds * self.sample_rate);
        self.target_phase_increment = target;
    }

    /// Set the speed as a transposition in semitones.
    pub fn set_note(&mut self, semitones: f64) {
        self.set_speed(semitones_to_speed(semitones));
    }

    pub fn set_note_with_glide(&mut self, semitones: f64, seconds: f64) {
        self.set_speed_with_glide(semitones_to_speed(semitones), seconds);
    }

    fn target_for_speed(&self, speed: f64) -> Option<f64> {
        if !speed.is_finite() || speed <= 0.0 {
            return None;
        }
        let target = speed * self.sr_factor;
        Some(if self.phase_increment < 0.0 { -target } else { target })
    }

    /// Switch direction. Call [`TablePlayer::trigger`] afterwards to start a
    /// reversed one-shot from the end of the region.
    pub fn set_reverse(&mut self, reversed: bool) {
        self.reversed = reversed;
        if (self.phase_increment > 0.0 && reversed) || (self.phase_increment < 0.0 && !reversed) {
            self.phase_increment = -self.phase_increment;
            self.target_phase_increment = -self.target_phase_increment;
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        if looping {
            self.finished = false;
        }
        self.looping = looping;
    }

    /// Set the one-shot region as fractions of the table.
    pub fn set_region(&mut self, start: f64, end: f64) {
        if let Some((s, e)) = self.region_indices(start, end) {
            self.start = s;
            self.end = e;
        }
    }

    /// Set the loop region as fractions of the table.
    pub fn set_loop_region(&mut self, start: f64, end: f64) {
        if let Some((s, e)) = self.region_indices(start, end) {
            self.loop_start = s;
            self.loop_end = e;
        }
    }

    fn region_indices(&self, start: f64, end: f64) -> Option<(usize, usize)> {
        if start.is_nan() || end.is_nan() {
            return None;
        }
        let start = start.clamp(0.0, 1.0);
        let end = end.clamp(0.0, 1.0);
        if start >= end {
            return None;
        }

        let last = self.table.frame_count().saturating_sub(1) as f64;
        let s = (last * start).floor() as usize;
        let e = (last * end).floor() as usize;
        (e > s).then_some((s, e))
    }

    pub fn set_filter_mode(&mut self, mode: FilterMode) {
        self.filter_left.set_mode(mode);
        self.filter_right.set_mode(mode);
    }

    pub fn set_filter_slope(&mut self, slope: FilterSlope) {
        self.filter_left.set_slope(slope);
        self.filter_right.set_slope(slope);
    }

    /// Set the cutoff. With the filter envelope on this is the base the
    /// envelope is added to.
    pub fn set_filter_cutoff(&mut self, cutoff: f32) {
        self.filter_left.set_cutoff(cutoff);
        self.filter_right.set_cutoff(cutoff);
        self.filter_cutoff = self.filter_left.cutoff();
    }

    pub fn set_filter_resonance(&mut self, resonance: f32) {
        self.filter_left.set_resonance(resonance);
        self.filter_right.set_resonance(resonance);
    }

    pub fn set_filter_envelope_enabled(&mut self, enabled: bool) {
        self.filter_envelope_enabled = enabled;
    }

    /// Negative depth inverts the envelope.
    pub fn set_filter_envelope_depth(&mut self, depth: f32) {
        if depth.is_finite() {
            self.filter_envelope_depth = depth;
        }
    }

    pub fn set_filter_attack(&mut self, seconds: f64) {
        self.filter_envelope.set_attack(seconds);
    }

    pub fn set_filter_decay(&mut self, seconds: f64) {
        self.filter_envelope.set_decay(seconds);
    }

    pub fn set_filter_sustain(&mut self, level: f64) {
        self.filter_envelope.set_sustain(level);
    }

    pub fn set_filter_release(&mut self, seconds: f64) {
        self.filter_envelope.set_release(seconds);
    }

    pub fn set_amplitude_attack(&mut self, seconds: f64) {
        self.amplitude_envelope.set_attack(seconds);
    }

    pub fn set_amplitude_decay(&mut self, seconds: f64) {
        self.amplitude_envelope.set_decay(seconds);
    }

    pub fn set_amplitude_sustain(&mut self, level: f64) {
        self.amplitude_envelope.set_sustain(level);
    }

    pub fn set_amplitude_release(&mut self, seconds: f64) {
        self.amplitude_envelope.set_release(seconds);
    }

    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn phase_increment(&self) -> f64 {
        self.phase_increment
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    pub fn region(&self) -> (usize, usize) {
        (self.start, self.end)
    }

    pub fn loop_region(&self) -> (usize, usize) {
        (self.loop_start, self.loop_end)
    }

    pub fn filter_cutoff(&self) -> f32 {
        self.filter_left.cutoff()
    }

    pub fn amplitude_envelope(&self) -> &Envelope {
        &self.amplitude_envelope
    }

    pub(crate) fn amplitude_envelope_mut(&mut self) -> &mut Envelope {
        &mut self.amplitude_envelope
    }

    pub fn filter_envelope(&self) -> &Envelope {
        &self.filter_envelope
    }

    pub fn table(&self) -> &Arc<Table> {
        &self.table
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

#[inline]
fn semitones_to_speed(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}
