//! Assistant errors.

use roadtrip_session::AudioError;
use roadtrip_speech::CaptureError;
use roadtrip_synth::TtsError;

/// Error type for the voice assistant.
#[derive(Debug, thiserror::Error)]
pub enum VoiceError {
    #[error(transparent)]
    Capture(#[from] CaptureError),
    #[error(transparent)]
    Synthesis(#[from] TtsError),
    #[error(transparent)]
    Audio(#[from] AudioError),
    #[error("config: {0}")]
    Config(#[from] serde_yaml::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

impl VoiceError {
    /// Returns true if the caller may retry later.
    pub fn is_retryable(&self) -> bool {
        match self {
            VoiceError::Capture(e) => e.is_retryable(),
            _ => false,
        }
    }
}
