//! Audio primitives shared by capture and playback.
//!
//! This crate provides:
//!
//! - `pcm`: PCM format descriptors and float sample buffers
//! - `level`: RMS and decibel metering used for voice-activity detection
//!
//! # Example
//!
//! ```rust
//! use roadtrip_audio::{AudioBuffer, Format};
//! use std::time::Duration;
//!
//! // 1 second of silence at 16kHz mono
//! let silence = AudioBuffer::silence(Format::MONO_16K, Duration::from_secs(1));
//! assert_eq!(silence.frames(), 16000);
//! assert!(silence.level_db().is_infinite());
//! ```

pub mod level;
pub mod pcm;

pub use level::{SILENCE_DB, decibels, rms};
pub use pcm::{AudioBuffer, Format, FormatError};
