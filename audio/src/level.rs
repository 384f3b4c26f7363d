//! Signal level metering.

/// Level reported for a buffer with no energy.
pub const SILENCE_DB: f32 = f32::NEG_INFINITY;

/// Computes the root-mean-square of the samples.
pub fn rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum: f64 = samples.iter().map(|s| (*s as f64) * (*s as f64)).sum();
    (sum / samples.len() as f64).sqrt() as f32
}

/// Converts a linear amplitude to dBFS.
///
/// Zero (or negative) amplitude maps to [`SILENCE_DB`].
pub fn decibels(amplitude: f32) -> f32 {
    if amplitude <= 0.0 {
        return SILENCE_DB;
    }
    20.0 * amplitude.log10()
}
