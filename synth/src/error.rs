//! Synthesis errors.

use crate::Engine;
use roadtrip_session::AudioError;

/// Error type for TTS operations.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TtsError {
    #[error("engine unavailable: {0}")]
    EngineUnavailable(Engine),
    #[error("synthesis failed: {0}")]
    SynthesisFailed(String),
    #[error("audio session error: {0}")]
    Hardware(#[from] AudioError),
    #[error("script generation failed: {0}")]
    Script(String),
    #[error("cancelled")]
    Cancelled,
    #[error("other error: {0}")]
    Other(String),
}

impl TtsError {
    /// Returns true if the error is a user or system initiated stop.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, TtsError::Cancelled)
    }
}
