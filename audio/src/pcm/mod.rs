//! PCM (Pulse Code Modulation) audio handling.
//!
//! # Key Types
//!
//! - [`Format`]: sample rate and channel layout
//! - [`AudioBuffer`]: interleaved `f32` samples tagged with their format

mod buffer;
mod format;

pub use buffer::AudioBuffer;
pub use format::{Format, FormatError};
