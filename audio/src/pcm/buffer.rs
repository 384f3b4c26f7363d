//! Float sample buffers.

use super::Format;
use crate::level;
use std::time::Duration;

/// A block of interleaved `f32` samples in the range `[-1.0, 1.0]`.
///
/// Produced by the microphone tap (one buffer per callback) and by the
/// on-device synthesizer (one buffer per utterance).
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    format: Format,
    samples: Vec<f32>,
}

impl AudioBuffer {
    /// Creates a buffer from interleaved samples.
    pub fn new(format: Format, samples: Vec<f32>) -> Self {
        Self { format, samples }
    }

    /// Creates a silent buffer of the given duration.
    pub fn silence(format: Format, duration: Duration) -> Self {
        let len = format.frames_in(duration) * format.channels as usize;
        Self::new(format, vec![0.0; len])
    }

    /// Creates a sine tone, mostly useful for simulated inputs.
    pub fn tone(format: Format, frequency: f32, amplitude: f32, duration: Duration) -> Self {
        let frames = format.frames_in(duration);
        let channels = format.channels as usize;
        let step = 2.0 * std::f32::consts::PI * frequency / format.sample_rate.max(1) as f32;
        let mut samples = Vec::with_capacity(frames * channels);
        for i in 0..frames {
            let v = amplitude * (step * i as f32).sin();
            for _ in 0..channels {
                samples.push(v);
            }
        }
        Self::new(format, samples)
    }

    /// Returns the buffer format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Returns the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.format.sample_rate
    }

    /// Returns the interleaved samples.
    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    /// Consumes the buffer and returns its samples.
    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }

    /// Returns the number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        self.samples.len() / self.format.channels.max(1) as usize
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Returns the playback duration.
    pub fn duration(&self) -> Duration {
        self.format.duration_of(self.frames())
    }

    /// Returns the playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.duration().as_secs_f64()
    }

    /// Returns the RMS level of the buffer in dBFS.
    pub fn level_db(&self) -> f32 {
        level::decibels(level::rms(&self.samples))
    }

    /// Splits the buffer into blocks of at most `frames` frames.
    ///
    /// Used to feed a pre-recorded buffer through a tap that expects
    /// fixed-size callbacks.
    pub fn split(&self, frames: usize) -> Vec<AudioBuffer> {
        let step = frames.max(1) * self.format.channels.max(1) as usize;
        self.samples
            .chunks(step)
            .map(|chunk| AudioBuffer::new(self.format, chunk.to_vec()))
            .collect()
    }

    /// Appends another buffer with the same format.
    ///
    /// Returns false and leaves `self` unchanged when the formats differ.
    pub fn append(&mut self, other: &AudioBuffer) -> bool {
        if other.format != self.format {
            return false;
        }
        self.samples.extend_from_slice(&other.samples);
        true
    }
}

#[cfg(test)]
mod buffer_tests {
    use super::*;

    #[test]
    fn test_silence_duration() {
        let buf = AudioBuffer::silence(Format::MONO_16K, Duration::from_millis(500));
        assert_eq!(buf.frames(), 8000);
        assert_eq!(buf.duration(), Duration::from_millis(500));
        assert!(buf.level_db().is_infinite());
    }

    #[test]
    fn test_stereo_frames() {
        let buf = AudioBuffer::silence(Format::STEREO_48K, Duration::from_millis(10));
        assert_eq!(buf.samples().len(), 960);
        assert_eq!(buf.frames(), 480);
    }

    #[test]
    fn test_tone_level() {
        let buf = AudioBuffer::tone(Format::MONO_16K, 440.0, 0.5, Duration::from_millis(100));
        // RMS of a sine is amplitude / sqrt(2), about -9 dBFS for 0.5
        let db = buf.level_db();
        assert!(db > -10.0 && db < -8.0, "db = {}", db);
    }

    #[test]
    fn test_split() {
        let buf = AudioBuffer::silence(Format::MONO_16K, Duration::from_millis(100));
        let parts = buf.split(1024);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].frames(), 1024);
        assert_eq!(parts[1].frames(), 1600 - 1024);
    }

    #[test]
    fn test_append_format_mismatch() {
        let mut a = AudioBuffer::silence(Format::MONO_16K, Duration::from_millis(10));
        let b = AudioBuffer::silence(Format::MONO_24K, Duration::from_millis(10));
        assert!(!a.append(&b));
        assert_eq!(a.frames(), 160);

        let c = AudioBuffer::silence(Format::MONO_16K, Duration::from_millis(10));
        assert!(a.append(&c));
        assert_eq!(a.frames(), 320);
    }
}
