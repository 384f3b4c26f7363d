//! PCM format definitions.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error returned when a format cannot be used for capture or playback.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    #[error("invalid sample rate: {0}")]
    SampleRate(u32),
    #[error("invalid channel count: {0}")]
    Channels(u16),
}

/// Describes an interleaved PCM stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Format {
    /// Sample rate in Hz (e.g., 16000, 44100).
    pub sample_rate: u32,
    /// Number of interleaved channels.
    pub channels: u16,
}

impl Format {
    /// Creates a mono format with the given sample rate.
    pub const fn mono(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 1 }
    }

    /// Creates a stereo format with the given sample rate.
    pub const fn stereo(sample_rate: u32) -> Self {
        Self { sample_rate, channels: 2 }
    }

    /// Checks that the format describes a usable stream.
    ///
    /// Hardware input nodes report a zero sample rate or zero channels while
    /// the route is being reconfigured.
    pub fn validate(&self) -> Result<(), FormatError> {
        if self.sample_rate == 0 || self.sample_rate > 384_000 {
            return Err(FormatError::SampleRate(self.sample_rate));
        }
        if self.channels == 0 || self.channels > 8 {
            return Err(FormatError::Channels(self.channels));
        }
        Ok(())
    }

    /// Returns the number of samples per second across all channels.
    pub fn samples_per_second(&self) -> u64 {
        self.sample_rate as u64 * self.channels as u64
    }

    /// Returns the number of frames covering the given duration.
    pub fn frames_in(&self, duration: Duration) -> usize {
        (duration.as_secs_f64() * self.sample_rate as f64).round() as usize
    }

    /// Returns the playback duration of the given number of frames.
    pub fn duration_of(&self, frames: usize) -> Duration {
        if self.sample_rate == 0 {
            return Duration::ZERO;
        }
        Duration::from_secs_f64(frames as f64 / self.sample_rate as f64)
    }
}

// Common format presets
impl Format {
    /// 16kHz mono (speech recognition input)
    pub const MONO_16K: Format = Format::mono(16000);
    /// 24kHz mono (on-device synthesis output)
    pub const MONO_24K: Format = Format::mono(24000);
    /// 44.1kHz mono
    pub const MONO_44K: Format = Format::mono(44100);
    /// 48kHz mono (typical hardware input node)
    pub const MONO_48K: Format = Format::mono(48000);
    /// 48kHz stereo
    pub const STEREO_48K: Format = Format::stereo(48000);
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}Hz/{}ch", self.sample_rate, self.channels)
    }
}

#[cfg(test)]
mod format_tests {
    use super::*;

    #[test]
    fn test_format_presets() {
        assert_eq!(Format::MONO_16K.sample_rate, 16000);
        assert_eq!(Format::MONO_16K.channels, 1);
        assert_eq!(Format::STEREO_48K.channels, 2);
        assert_eq!(Format::STEREO_48K.samples_per_second(), 96000);
    }

    #[test]
    fn test_format_validate() {
        assert!(Format::MONO_48K.validate().is_ok());
        assert_eq!(Format::mono(0).validate(), Err(FormatError::SampleRate(0)));
        assert_eq!(
            Format { sample_rate: 16000, channels: 0 }.validate(),
            Err(FormatError::Channels(0))
        );
    }

    #[test]
    fn test_frames_and_duration() {
        let format = Format::MONO_16K;
        assert_eq!(format.frames_in(Duration::from_millis(100)), 1600);
        assert_eq!(format.duration_of(16000), Duration::from_secs(1));
        assert_eq!(Format::mono(0).duration_of(100), Duration::ZERO);
    }

    #[test]
    fn test_format_display() {
        assert_eq!(Format::MONO_24K.to_string(), "24000Hz/1ch");
    }
}
