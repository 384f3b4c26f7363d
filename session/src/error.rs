//! Audio session errors.

/// Error type for audio session operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AudioError {
    #[error("hardware configuration failed: {0}")]
    HardwareConfig(String),
    #[error("vehicle audio route not connected")]
    RouteUnavailable,
    #[error("platform call timed out: {0}")]
    Timeout(&'static str),
    #[error("audio session closed")]
    Closed,
}

impl AudioError {
    /// Returns true if the error leaves the hardware session in an unknown
    /// state and recovery should be scheduled.
    pub fn needs_recovery(&self) -> bool {
        matches!(self, AudioError::HardwareConfig(_) | AudioError::Timeout(_))
    }
}
