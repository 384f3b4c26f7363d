//! Speech recognizer and microphone contracts.

use crate::CaptureError;
use async_trait::async_trait;
use roadtrip_audio::{AudioBuffer, Format};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Error domain used by the platform dictation assistant.
pub const ASSISTANT_ERROR_DOMAIN: &str = "kAFAssistantErrorDomain";

/// Assistant codes that are known to be harmless.
const TRANSIENT_ASSISTANT_CODES: [i64; 3] = [209, 203, 216];

/// Assistant codes below this are system-level failures.
const ASSISTANT_FATAL_BELOW: i64 = 200;

/// Code the audio unit reports when the input cannot start.
const AUDIO_UNIT_ERROR_CODE: i64 = -1100;

/// Whether the user allowed speech recognition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Authorization {
    #[default]
    NotDetermined,
    Denied,
    Restricted,
    Authorized,
}

/// An error reported by the recognizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineError {
    pub domain: String,
    pub code: i64,
    pub message: String,
}

impl EngineError {
    pub fn new(domain: impl Into<String>, code: i64, message: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            code,
            message: message.into(),
        }
    }

    /// An error in the dictation assistant domain.
    pub fn assistant(code: i64, message: impl Into<String>) -> Self {
        Self::new(ASSISTANT_ERROR_DOMAIN, code, message)
    }

    pub fn is_assistant(&self) -> bool {
        self.domain == ASSISTANT_ERROR_DOMAIN
    }

    /// The failure came from the audio input rather than recognition.
    pub fn is_audio_related(&self) -> bool {
        self.code == AUDIO_UNIT_ERROR_CODE || self.message.to_lowercase().contains("audio")
    }
}

impl fmt::Display for EngineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}: {}", self.domain, self.code, self.message)
    }
}

/// How capture reacts to a recognizer error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Log and keep capturing.
    Transient,
    /// End the session and deliver what was recognized so far.
    SessionEnd,
    /// End the session quietly.
    Cancelled,
    /// Stop capture and reset the audio mode.
    Fatal,
}

/// Classifies a recognizer error.
pub fn classify_engine_error(error: &EngineError) -> ErrorClass {
    if error.is_assistant() {
        if TRANSIENT_ASSISTANT_CODES.contains(&error.code) {
            ErrorClass::Transient
        } else if error.code < ASSISTANT_FATAL_BELOW {
            ErrorClass::Fatal
        } else {
            ErrorClass::SessionEnd
        }
    } else if error.message.to_lowercase().contains("cancel") {
        ErrorClass::Cancelled
    } else {
        ErrorClass::Fatal
    }
}

/// Output of a recognition session.
#[derive(Debug, Clone, PartialEq)]
pub enum AsrEvent {
    /// Best transcription so far.
    Partial(String),
    /// Final transcription. The session ends after this.
    Final(String),
    Error(EngineError),
}

/// A running recognition session.
///
/// Audio is fed through `audio`; results arrive on `events`. Cancelling
/// `cancel` ends the session on the recognizer side.
pub struct AsrSession {
    pub audio: mpsc::Sender<AudioBuffer>,
    pub events: mpsc::Receiver<AsrEvent>,
    pub cancel: CancellationToken,
}

/// A streaming speech recognizer.
#[async_trait]
pub trait AsrEngine: Send + Sync {
    fn authorization(&self) -> Authorization;

    /// Starts a session for audio in the given format.
    async fn start_session(&self, format: Format) -> Result<AsrSession, CaptureError>;
}

/// The microphone input.
///
/// A tap delivers captured buffers into a channel while the input runs.
pub trait AudioInput: Send + Sync {
    /// Native hardware format.
    fn format(&self) -> Format;

    fn install_tap(&self, tap: mpsc::Sender<AudioBuffer>) -> Result<(), CaptureError>;

    fn remove_tap(&self);

    fn has_tap(&self) -> bool;

    fn start(&self) -> Result<(), CaptureError>;

    fn stop(&self);

    fn is_running(&self) -> bool;
}
