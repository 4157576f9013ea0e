#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/*
Resonant Cascade Filter
=======================

A chain of one-pole low-pass integrators with a feedback path from the last
stage back into the first. Two stages give a 12 dB/octave slope, four give
24 dB/octave. The high- and band-pass responses are derived taps, so a single
pass computes every response.

| mode      | output              | passes          | rejects      |
| --------- | ------------------- | --------------- | ------------ |
| low-pass  | s_last              | below cutoff    | above cutoff |
| high-pass | input - s_last      | above cutoff    | below cutoff |
| band-pass | s_0 - s_last        | around cutoff   | both sides   |
| none      | input               | everything      | nothing      |

Per tick:

    s_0 += cutoff * (input - s_0 + feedback * (s_0 - s_last))
    s_k += cutoff * (s_(k-1) - s_k)          for k = 1..N-1

    feedback = resonance + resonance / (1 - cutoff)

`cutoff` is a normalized coefficient in [0, 1), not a frequency in Hz. It
must stay strictly below 1 or the feedback term divides by zero.

High resonance combined with a high cutoff makes the feedback large enough to
self-oscillate, and eventually to blow up. That's part of the character of
this topology and nothing here limits it.
*/

/// Highest cutoff coefficient the filter accepts.
pub const MAX_CUTOFF: f32 = 0.9999;

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    /// Bypass: input passes through untouched.
    #[default]
    None,
    LowPass,
    HighPass,
    BandPass,
}

#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterSlope {
    /// Two poles.
    Db12,
    /// Four poles.
    #[default]
    Db24,
}

impl FilterSlope {
    #[inline]
    pub fn poles(self) -> usize {
        match self {
            FilterSlope::Db12 => 2,
            FilterSlope::Db24 => 4,
        }
    }
}

pub struct Filter {
    mode: FilterMode,
    slope: FilterSlope,
    cutoff: f32,
    resonance: f32,
    feedback: f32,
    stages: [f32; 4], // integrator memory, only `slope.poles()` of them in use
}

impl Filter {
    pub fn new(mode: FilterMode) -> Self {
        let mut filter = Self {
            mode,
            slope: FilterSlope::Db24,
            cutoff: 0.999,
            resonance: 0.0,
            feedback: 0.0,
            stages: [0.0; 4],
        };
        filter.update_feedback();
        filter
    }

    pub fn lowpass(cutoff: f32) -> Self {
        let mut filter = Self::new(FilterMode::LowPass);
        filter.set_cutoff(cutoff);
        filter
    }

    pub fn highpass(cutoff: f32) -> Self {
        let mut filter = Self::new(FilterMode::HighPass);
        filter.set_cutoff(cutoff);
        filter
    }

    pub fn bandpass(cutoff: f32) -> Self {
        let mut filter = Self::new(FilterMode::BandPass);
        filter.set_cutoff(cutoff);
        filter
    }

    /// Filter one sample.
    ///
    /// In [`FilterMode::None`] the input comes straight back and the
    /// integrators are left alone.
    #[inline]
    pub fn tick(&mut self, input: f32) -> f32 {
        if self.mode == FilterMode::None {
            return input;
        }

        let poles = self.slope.poles();
        let last = self.stages[poles - 1];
        self.stages[0] += self.cutoff * (input - self.stages[0] + self.feedback * (self.stages[0] - last));
        for k in 1..poles {
            self.stages[k] += self.cutoff * (self.stages[k - 1] - self.stages[k]);
        }
        let last = self.stages[poles - 1];

        match self.mode {
            FilterMode::LowPass => last,
            FilterMode::HighPass => input - last,
            FilterMode::BandPass => self.stages[0] - last,
            FilterMode::None => input,
        }
    }

    /// Filter a block in place.
    pub fn render(&mut self, buffer: &mut [f32]) {
        for sample in buffer.iter_mut() {
            *sample = self.tick(*sample);
        }
    }

    pub fn reset(&mut self) {
        self.stages = [0.0; 4];
    }

    pub fn set_mode(&mut self, mode: FilterMode) {
        self.mode = mode;
    }

    pub fn set_slope(&mut self, slope: FilterSlope) {
        self.slope = slope;
    }

    /// Set the normalized cutoff, clamped to `[0, MAX_CUTOFF]`.
    pub fn set_cutoff(&mut self, cutoff: f32) {
        if !cutoff.is_finite() {
            return;
        }
        self.cutoff = cutoff.clamp(0.0, MAX_CUTOFF);
        self.update_feedback();
    }

    /// Set the resonance, clamped to `[0, 1]`.
    pub fn set_resonance(&mut self, resonance: f32) {
        if !resonance.is_finite() {
            return;
        }
        self.resonance = resonance.clamp(0.0, 1.0);
        self.update_feedback();
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    pub fn slope(&self) -> FilterSlope {
        self.slope
    }

    pub fn cutoff(&self) -> f32 {
        self.cutoff
    }

    pub fn resonance(&self) -> f32 {
        self.resonance
    }

    pub fn feedback(&self) -> f32 {
        self.feedback
    }

    fn update_feedback(&mut self) {
        self.feedback = self.resonance + self.resonance / (1.0 - self.cutoff);
    }
}

impl Default for Filter {
    fn default() -> Self {
        Self::new(FilterMode::LowPass)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peak_after_transient(buffer: &[f32]) -> f32 {
        let skip = buffer.len().min(64);
        buffer
            .get(skip..)
            .unwrap_or(buffer)
            .iter()
            .fold(0.0f32, |acc, &x| acc.max(x.abs()))
    }

    fn nyquist(len: usize) -> Vec<f32> {
        (0..len).map(|i| if i % 2 == 0 { 1.0 } else { -1.0 }).collect()
    }

    #[test]
    fn bypass_is_identity() {
        let mut filter = Filter::new(FilterMode::None);
        filter.set_cutoff(0.3);
        filter.set_resonance(0.9);
        for &x in &[0.0, 1.0, -1.0, 0.25, 12.5, -0.001, f32::MAX] {
            assert_eq!(filter.tick(x), x);
        }
        // Switching on afterwards starts from clean state
        filter.set_mode(FilterMode::LowPass);
        assert!(filter.tick(0.0).abs() < 1e-12);
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut filter = Filter::lowpass(0.5);
        let mut buffer = vec![1.0; 256];
        filter.render(&mut buffer);
        assert!(buffer[255] > 0.99, "got {}", buffer[255]);
    }

    #[test]
    fn highpass_rejects_dc() {
        let mut filter = Filter::highpass(0.5);
        let mut buffer = vec![1.0; 256];
        filter.render(&mut buffer);
        assert!(buffer[255].abs() < 0.01, "got {}", buffer[255]);
    }

    #[test]
    fn bandpass_rejects_dc() {
        let mut filter = Filter::bandpass(0.5);
        let mut buffer = vec![1.0; 256];
        filter.render(&mut buffer);
        assert!(buffer[255].abs() < 0.01, "got {}", buffer[255]);
    }

    #[test]
    fn lowpass_attenuates_nyquist() {
        let mut filter = Filter::lowpass(0.2);
        let mut buffer = nyquist(512);
        filter.render(&mut buffer);
        assert!(peak_after_transient(&buffer) < 0.01);
    }

    #[test]
    fn steeper_slope_attenuates_more() {
        let mut gentle = Filter::lowpass(0.2);
        gentle.set_slope(FilterSlope::Db12);
        let mut steep = Filter::lowpass(0.2);
        steep.set_slope(FilterSlope::Db24);

        let mut a = nyquist(512);
        let mut b = nyquist(512);
        gentle.render(&mut a);
        steep.render(&mut b);

        let gentle_peak = peak_after_transient(&a);
        let steep_peak = peak_after_transient(&b);
        assert!(
            steep_peak * 10.0 < gentle_peak,
            "24 dB peak {steep_peak} vs 12 dB peak {gentle_peak}"
        );
    }

    #[test]
    fn cutoff_and_resonance_are_clamped() {
        let mut filter = Filter::default();
        filter.set_cutoff(1.0);
        assert!(filter.cutoff() < 1.0);
        assert_eq!(filter.cutoff(), MAX_CUTOFF);
        filter.set_cutoff(-3.0);
        assert_eq!(filter.cutoff(), 0.0);
        filter.set_cutoff(f32::NAN);
        assert_eq!(filter.cutoff(), 0.0);

        filter.set_resonance(4.0);
        assert_eq!(filter.resonance(), 1.0);
        filter.set_resonance(-1.0);
        assert_eq!(filter.resonance(), 0.0);
    }

    #[test]
    fn feedback_tracks_parameters() {
        let mut filter = Filter::lowpass(0.5);
        filter.set_resonance(0.5);
        assert!((filter.feedback() - 1.5).abs() < 1e-6);

        filter.set_cutoff(0.75);
        assert!((filter.feedback() - 2.5).abs() < 1e-6);

        // Large, unlimited feedback near the top of the range
        filter.set_cutoff(MAX_CUTOFF);
        filter.set_resonance(1.0);
        assert!(filter.feedback() > 1000.0);
    }

    #[test]
    fn reset_clears_state() {
        let mut filter = Filter::lowpass(0.5);
        let mut buffer = vec![1.0; 64];
        filter.render(&mut buffer);
        filter.reset();
        assert!(filter.tick(0.0).abs() < 1e-12);
    }
}
