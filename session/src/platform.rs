//! Platform audio session seam.

use crate::{AudioError, SessionConfig};
use async_trait::async_trait;

/// The operating-system audio session.
///
/// Only [`AudioSessionCoordinator`](crate::AudioSessionCoordinator) calls
/// these methods, always from its single worker task.
#[async_trait]
pub trait AudioPlatform: Send + Sync {
    /// Deactivates the current session configuration.
    async fn deactivate(&self) -> Result<(), AudioError>;

    /// Applies category, mode and options.
    async fn set_category(&self, config: &SessionConfig) -> Result<(), AudioError>;

    /// Activates the session.
    async fn activate(&self, notify_others: bool) -> Result<(), AudioError>;
}
