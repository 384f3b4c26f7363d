//! Coordinator configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Timing and retry settings for [`AudioSessionCoordinator`](crate::AudioSessionCoordinator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorConfig {
    /// Wait after deactivating the previous configuration.
    pub deactivate_settle_ms: u64,
    /// Upper bound for a single platform call.
    pub platform_timeout_ms: u64,
    /// Delay before recovering a failed transition.
    pub recovery_backoff_ms: u64,
    /// Recovery attempts before the failure is surfaced.
    pub max_recovery_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            deactivate_settle_ms: 100,
            platform_timeout_ms: 2000,
            recovery_backoff_ms: 1000,
            max_recovery_attempts: 2,
        }
    }
}

impl CoordinatorConfig {
    pub fn deactivate_settle(&self) -> Duration {
        Duration::from_millis(self.deactivate_settle_ms)
    }

    pub fn platform_timeout(&self) -> Duration {
        Duration::from_millis(self.platform_timeout_ms)
    }

    pub fn recovery_backoff(&self) -> Duration {
        Duration::from_millis(self.recovery_backoff_ms)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg: CoordinatorConfig = serde_json::from_str(r#"{"recovery_backoff_ms": 250}"#).unwrap();
        assert_eq!(cfg.recovery_backoff(), Duration::from_millis(250));
        assert_eq!(cfg.deactivate_settle(), Duration::from_millis(100));
        assert_eq!(cfg.max_recovery_attempts, 2);
    }
}
