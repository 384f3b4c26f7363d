//! Capture errors.

use crate::EngineError;
use roadtrip_audio::FormatError;
use roadtrip_session::AudioError;

/// Error type for speech capture.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CaptureError {
    #[error("speech recognition not authorized")]
    PermissionDenied,
    #[error("capture session busy")]
    SessionBusy,
    #[error("audio input unavailable: {0}")]
    AudioUnavailable(String),
    #[error("invalid input format: {0}")]
    Format(#[from] FormatError),
    #[error("transient recognizer error: {0}")]
    TransientEngineError(EngineError),
    #[error("recognizer error: {0}")]
    FatalEngineError(EngineError),
    #[error("audio session error: {0}")]
    Hardware(#[from] AudioError),
    #[error("cancelled")]
    Cancelled,
}

impl CaptureError {
    /// Returns true if the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CaptureError::SessionBusy | CaptureError::TransientEngineError(_)
        )
    }
}
