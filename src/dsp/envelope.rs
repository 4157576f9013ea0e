/*
ADSR Envelope Implementation
============================

This module implements an exponential ADSR envelope generator, used for both
the amplitude and the filter cutoff of every voice.

Vocabulary
----------

  level       The envelope's current output value, always inside [FLOOR, 1.0].
              It never reaches exactly 0.0 because every stage is computed in
              the log domain, and ln(0) is undefined.

  stage       Off, Attack, Decay, Sustain or Release.

  frames      Stage durations are stored in frames, not seconds:
                  frames = floor(max(seconds * sample_rate, 0))

  multiplier  The per-tick factor applied to `level` while inside a ramp.


The Shape: Exponential Ramps
----------------------------

  Level
    1.0 ┐   ╭╮
        │  ╭╯╰╮
    S   │  │   ╰──────────╮
        │ ╭╯              ╰╮
  FLOOR └─╯─────────────────╰──→ Time
         A   D     S        R

Each ramp multiplies `level` by a constant every tick, which traces a straight
line in decibels. That matches how acoustic sounds decay much better than a
linear ramp does.


The Math: Time to Multiplier
----------------------------

To go from `start` to `target` in N ticks with a constant multiplier m:

    start × mᴺ = target
    m = exp((ln(target) - ln(start)) / N)

For large N this is ≈ 1 + (ln(target) - ln(start)) / N, which is where the
classic formulation comes from. We use the exponential itself, so the level
lands on the target after exactly N ticks, and in a single tick when N < 1.


The State Machine
-----------------

    attack() from any stage            release() from any stage
            │                                   │
            ↓                                   ↓
       ┌────────┐  N ticks  ┌───────┐ N ticks ┌─────────┐ N ticks ┌─────┐
       │ Attack │ ────────→ │ Decay │ ──────→ │ Sustain │         │ Off │
       └────────┘           └───────┘         └─────────┘         └─────┘
                                                   ┌─────────┐       ↑
                                                   │ Release │ ──────┘
                                                   └─────────┘

A stage ramps for its N frames, and the transition happens on tick N+1. On
each transition the level is pinned to the stage target so rounding never
leaks into the next stage.

Both attack() and release() start from the CURRENT level, so retriggering or
releasing mid-ramp never clicks.

Changing a stage duration while inside that stage recomputes the multiplier
from the remaining tick count, so automation stays glitch-free.

Release → Off latches a completion flag exactly once. Owners poll it with
`take_completed()` instead of registering a callback.
*/

/// Lowest level an envelope can output; stands in for zero under a logarithm.
pub const ENVELOPE_FLOOR: f64 = 0.0001;

/// The current stage of the envelope state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeStage {
    Off,     // Finished releasing, level pinned to the floor
    Attack,  // Ramping toward 1.0
    Decay,   // Ramping from the peak toward the sustain level
    Sustain, // Holding the sustain level
    Release, // Ramping toward the floor
}

pub struct Envelope {
    sample_rate: f64,

    // Shape (durations in frames, sustain as a level)
    attack_frames: u64,
    decay_frames: u64,
    sustain_level: f64,
    release_frames: u64,

    // Runtime state
    stage: EnvelopeStage,
    tick: u64,
    level: f64,
    multiplier: f64,

    // Completion latch (Release → Off)
    completed: bool,
    completion_fired: bool,
}

impl Envelope {
    /// Build an envelope and enter its attack stage from the floor.
    pub fn adsr(sample_rate: f64, attack: f64, decay: f64, sustain: f64, release: f64) -> Self {
        debug_assert!(sample_rate > 0.0);

        let mut env = Self {
            sample_rate,
            attack_frames: 0,
            decay_frames: 0,
            sustain_level: 1.0,
            release_frames: 0,
            stage: EnvelopeStage::Off,
            tick: 0,
            level: ENVELOPE_FLOOR,
            multiplier: 1.0,
            completed: false,
            completion_fired: false,
        };

        env.set_attack(attack);
        env.set_decay(decay);
        env.set_sustain(sustain);
        env.set_release(release);
        env.attack();
        env
    }

    /// Set the attack time in seconds.
    pub fn set_attack(&mut self, seconds: f64) {
        self.attack_frames = self.seconds_to_frames(seconds);
        if self.stage == EnvelopeStage::Attack {
            let remaining = self.remaining_ticks(self.attack_frames);
            self.multiplier = level_multiplier(self.level, 1.0, remaining);
        }
    }

    /// Set the decay time in seconds.
    pub fn set_decay(&mut self, seconds: f64) {
        self.decay_frames = self.seconds_to_frames(seconds);
        if self.stage == EnvelopeStage::Decay {
            let remaining = self.remaining_ticks(self.decay_frames);
            self.multiplier = level_multiplier(self.level, self.sustain_level, remaining);
        }
    }

    /// Set the sustain level, clamped to `[ENVELOPE_FLOOR, 1.0]`.
    pub fn set_sustain(&mut self, level: f64) {
        if level.is_nan() {
            return;
        }
        self.sustain_level = level.clamp(ENVELOPE_FLOOR, 1.0);

        match self.stage {
            EnvelopeStage::Decay => {
                // Bend the slope of the decay that is already underway
                let remaining = self.remaining_ticks(self.decay_frames);
                self.multiplier = level_multiplier(self.level, self.sustain_level, remaining);
            }
            EnvelopeStage::Sustain => {
                self.level = self.sustain_level;
            }
            _ => {}
        }
    }

    /// Set the release time in seconds.
    pub fn set_release(&mut self, seconds: f64) {
        self.release_frames = self.seconds_to_frames(seconds);
        if self.stage == EnvelopeStage::Release {
            let remaining = self.remaining_ticks(self.release_frames);
            self.multiplier = level_multiplier(self.level, ENVELOPE_FLOOR, remaining);
        }
    }

    /// Enter the attack stage from the current level (note on / retrigger).
    pub fn attack(&mut self) {
        self.stage = EnvelopeStage::Attack;
        self.tick = 0;
        self.multiplier = level_multiplier(self.level, 1.0, self.attack_frames as f64);
    }

    /// Enter the release stage from the current level (note off).
    pub fn release(&mut self) {
        self.stage = EnvelopeStage::Release;
        self.tick = 0;
        self.multiplier = level_multiplier(self.level, ENVELOPE_FLOOR, self.release_frames as f64);
    }

    /// Advance the envelope by one frame and return the new level.
    pub fn tick(&mut self) -> f64 {
        let frames = match self.stage {
            EnvelopeStage::Off | EnvelopeStage::Sustain => return self.level,
            EnvelopeStage::Attack => self.attack_frames,
            EnvelopeStage::Decay => self.decay_frames,
            EnvelopeStage::Release => self.release_frames,
        };

        if self.tick < frames {
            let target = self.stage_target();
            let next = self.level * self.multiplier;
            // Never step past the target, whichever direction we're moving
            self.level = if target >= self.level {
                next.clamp(self.level, target)
            } else {
                next.clamp(target, self.level)
            };
            self.tick += 1;
        } else {
            self.next_stage();
        }

        debug_assert!((ENVELOPE_FLOOR..=1.0).contains(&self.level));
        self.level
    }

    /// Returns true exactly once, after the first Release → Off transition.
    pub fn take_completed(&mut self) -> bool {
        std::mem::take(&mut self.completed)
    }

    pub fn is_off(&self) -> bool {
        self.stage == EnvelopeStage::Off
    }

    pub fn stage(&self) -> EnvelopeStage {
        self.stage
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn sustain_level(&self) -> f64 {
        self.sustain_level
    }

    pub fn attack_frames(&self) -> u64 {
        self.attack_frames
    }

    pub fn decay_frames(&self) -> u64 {
        self.decay_frames
    }

    pub fn release_frames(&self) -> u64 {
        self.release_frames
    }

    fn next_stage(&mut self) {
        self.tick = 0;
        match self.stage {
            EnvelopeStage::Attack => {
                self.level = 1.0;
                self.stage = EnvelopeStage::Decay;
                self.multiplier =
                    level_multiplier(self.level, self.sustain_level, self.decay_frames as f64);
            }
            EnvelopeStage::Decay => {
                self.level = self.sustain_level;
                self.stage = EnvelopeStage::Sustain;
                self.multiplier = 1.0;
            }
            EnvelopeStage::Release => {
                self.level = ENVELOPE_FLOOR;
                self.stage = EnvelopeStage::Off;
                self.multiplier = 1.0;
                if !self.completion_fired {
                    self.completion_fired = true;
                    self.completed = true;
                }
            }
            EnvelopeStage::Off | EnvelopeStage::Sustain => {}
        }
    }

    fn stage_target(&self) -> f64 {
        match self.stage {
            EnvelopeStage::Attack => 1.0,
            EnvelopeStage::Decay | EnvelopeStage::Sustain => self.sustain_level,
            EnvelopeStage::Release | EnvelopeStage::Off => ENVELOPE_FLOOR,
        }
    }

    fn remaining_ticks(&self, frames: u64) -> f64 {
        frames as f64 - self.tick as f64
    }

    fn seconds_to_frames(&self, seconds: f64) -> u64 {
        // f64::max drops NaN, and the cast saturates
        (seconds * self.sample_rate).max(0.0).floor() as u64
    }
}

/// Per-tick multiplier taking `start` to `target` in `frames` ticks.
#[inline]
pub fn level_multiplier(start: f64, target: f64, frames: f64) -> f64 {
    let delta = target.max(ENVELOPE_FLOOR).ln() - start.max(ENVELOPE_FLOOR).ln();
    if frames < 1.0 {
        delta.exp()
    } else {
        (delta / frames).exp()
    }
}
