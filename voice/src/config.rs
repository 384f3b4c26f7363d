//! Assistant configuration.

use crate::VoiceError;
use roadtrip_session::CoordinatorConfig;
use roadtrip_speech::CaptureConfig;
use roadtrip_synth::{DispatcherConfig, MonitorConfig, PodcastConfig};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Settings for every assistant component.
///
/// Missing sections and fields take their defaults, so a config file only
/// needs the values it changes:
///
/// ```yaml
/// capture:
///   silence_timeout_ms: 2500
/// dispatcher:
///   voice:
///     personality: enthusiastic
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssistantConfig {
    pub session: CoordinatorConfig,
    pub capture: CaptureConfig,
    pub dispatcher: DispatcherConfig,
    pub podcast: PodcastConfig,
    pub monitor: MonitorConfig,
    /// Buffered voice events per subscriber.
    pub event_capacity: usize,
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            session: CoordinatorConfig::default(),
            capture: CaptureConfig::default(),
            dispatcher: DispatcherConfig::default(),
            podcast: PodcastConfig::default(),
            monitor: MonitorConfig::default(),
            event_capacity: 64,
        }
    }
}

impl AssistantConfig {
    pub fn from_yaml(s: &str) -> Result<Self, VoiceError> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(s)?)
    }

    pub fn to_yaml(&self) -> Result<String, VoiceError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Loads a config file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, VoiceError> {
        let data = std::fs::read_to_string(path)?;
        Self::from_yaml(&data)
    }
}

#[cfg(test)]
mod config_tests {
    use super::*;
    use roadtrip_synth::VoicePersonality;

    #[test]
    fn test_empty_is_default() {
        assert_eq!(AssistantConfig::from_yaml("").unwrap(), AssistantConfig::default());
    }

    #[test]
    fn test_partial_override() {
        let yaml = r#"
capture:
  silence_timeout_ms: 2500
dispatcher:
  voice:
    personality: enthusiastic
podcast:
  max_attempts: 2
"#;
        let config = AssistantConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.capture.silence_timeout_ms, 2500);
        assert_eq!(config.capture.start_retry_ms, 500);
        assert_eq!(config.dispatcher.voice.personality, VoicePersonality::Enthusiastic);
        assert_eq!(config.podcast.max_attempts, 2);
        assert_eq!(config.podcast.target_secs, 6.0);
        assert_eq!(config.session, CoordinatorConfig::default());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let config = AssistantConfig::default();
        let yaml = config.to_yaml().unwrap();
        assert!(yaml.contains("silence_timeout_ms"));
        assert_eq!(AssistantConfig::from_yaml(&yaml).unwrap(), config);
    }

    #[test]
    fn test_invalid_yaml() {
        let err = AssistantConfig::from_yaml("capture: [1, 2").unwrap_err();
        assert!(matches!(err, VoiceError::Config(_)));
    }
}
