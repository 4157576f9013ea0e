//! Decibel and linear amplitude conversion.

/*
Decibels
========

    dB        = 20 × log₁₀(amplitude)
    amplitude = 10^(dB / 20)

    ×1.0   =   0 dB  (unity)
    ×0.5   ≈  -6 dB
    ×0.1   = -20 dB
    ×2.0   ≈  +6 dB

Anything at or below GAIN_NEGATIVE_INFINITY is treated as silence, so callers
can ask for "basically -inf" without producing vanishingly small floats.
*/

/// Gain at which a signal is considered silent.
pub const GAIN_NEGATIVE_INFINITY: f32 = -80.0;

/// Convert a gain in decibels to a linear amplitude multiplier.
///
/// ```
/// use saavy_sampler::dsp::gain::decibels_to_amplitude;
/// assert!((decibels_to_amplitude(0.0) - 1.0).abs() < 1e-6);
/// assert_eq!(decibels_to_amplitude(-80.0), 0.0);
/// ```
#[inline]
pub fn decibels_to_amplitude(db: f32) -> f32 {
    if db > GAIN_NEGATIVE_INFINITY {
        10.0_f32.powf(db * 0.05)
    } else {
        0.0
    }
}

/// Convert a linear amplitude to decibels, flooring at [`GAIN_NEGATIVE_INFINITY`].
#[inline]
pub fn amplitude_to_decibels(amplitude: f32) -> f32 {
    let amplitude = amplitude.abs();
    if amplitude > 0.0 {
        (20.0 * amplitude.log10()).max(GAIN_NEGATIVE_INFINITY)
    } else {
        GAIN_NEGATIVE_INFINITY
    }
}
