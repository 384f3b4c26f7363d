//! Speech capture and transcript interpretation.
//!
//! This crate provides:
//! - [`SpeechCaptureController`]: microphone capture, voice-activity
//!   detection and recognizer error handling
//! - [`CommandInterpreter`]: maps transcripts to [`CommandAction`]s
//! - [`DestinationModeParser`]: extracts destinations and navigation intent
//! - [`EventBus`]: typed [`VoiceEvent`] broadcast
//!
//! # Example
//!
//! ```rust,ignore
//! use roadtrip_speech::{CaptureConfig, EventBus, SpeechCaptureController};
//!
//! let bus = EventBus::default();
//! let capture = SpeechCaptureController::new(asr, input, coordinator, speaker, bus.clone(), CaptureConfig::default());
//! let mut events = bus.subscribe();
//!
//! capture.start_capture().await?;
//! while let Ok(event) = events.recv().await {
//!     println!("{event:?}");
//! }
//! ```

mod asr;
mod capture;
mod command;
mod destination;
mod error;
mod event;
mod vad;

pub use asr::*;
pub use capture::*;
pub use command::*;
pub use destination::*;
pub use error::*;
pub use event::*;
pub use vad::*;
