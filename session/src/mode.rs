//! Audio modes and the hardware session configuration behind each one.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// The exclusive hardware-audio configuration in effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum AudioMode {
    #[default]
    Inactive,
    Listening,
    Speaking,
    VehicleAudio,
    BackgroundAudio,
}

impl AudioMode {
    /// Returns true if the mode holds the hardware session active.
    pub fn is_active(&self) -> bool {
        !matches!(self, AudioMode::Inactive)
    }

    /// Returns the string representation of the mode.
    pub fn as_str(&self) -> &'static str {
        match self {
            AudioMode::Inactive => "inactive",
            AudioMode::Listening => "listening",
            AudioMode::Speaking => "speaking",
            AudioMode::VehicleAudio => "vehicle_audio",
            AudioMode::BackgroundAudio => "background_audio",
        }
    }

    /// Parses a mode from a string. Unknown values map to `Inactive`.
    pub fn from_str(s: &str) -> Self {
        match s {
            "listening" => AudioMode::Listening,
            "speaking" => AudioMode::Speaking,
            "vehicle_audio" => AudioMode::VehicleAudio,
            "background_audio" => AudioMode::BackgroundAudio,
            _ => AudioMode::Inactive,
        }
    }

    /// Returns the platform session configuration for this mode.
    pub fn session_config(&self) -> SessionConfig {
        use SessionOption::*;
        match self {
            AudioMode::Inactive => SessionConfig {
                category: SessionCategory::Ambient,
                mode: SessionMode::Default,
                options: vec![],
                activate: false,
                notify_others: false,
                stabilize: Duration::from_millis(100),
            },
            AudioMode::Listening => SessionConfig {
                category: SessionCategory::PlayAndRecord,
                mode: SessionMode::VoiceChat,
                options: vec![AllowBluetooth, DefaultToSpeaker],
                activate: true,
                notify_others: false,
                stabilize: Duration::from_millis(50),
            },
            AudioMode::Speaking => SessionConfig {
                category: SessionCategory::Playback,
                mode: SessionMode::SpokenAudio,
                options: vec![DefaultToSpeaker],
                activate: true,
                notify_others: false,
                stabilize: Duration::from_millis(50),
            },
            AudioMode::VehicleAudio => SessionConfig {
                category: SessionCategory::Playback,
                mode: SessionMode::SpokenAudio,
                options: vec![AllowBluetooth, AllowBluetoothA2dp, DuckOthers],
                activate: true,
                notify_others: true,
                stabilize: Duration::from_millis(100),
            },
            AudioMode::BackgroundAudio => SessionConfig {
                category: SessionCategory::Playback,
                mode: SessionMode::Default,
                options: vec![MixWithOthers, AllowBluetooth],
                activate: true,
                notify_others: true,
                stabilize: Duration::from_millis(50),
            },
        }
    }
}

impl fmt::Display for AudioMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl Serialize for AudioMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for AudioMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(AudioMode::from_str(&s))
    }
}

/// Platform session category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionCategory {
    Ambient,
    PlayAndRecord,
    Playback,
}

/// Platform session mode hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Default,
    VoiceChat,
    SpokenAudio,
}

/// Platform session option flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOption {
    AllowBluetooth,
    AllowBluetoothA2dp,
    DefaultToSpeaker,
    DuckOthers,
    MixWithOthers,
}

/// Everything the platform needs to configure the session for a mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub category: SessionCategory,
    pub mode: SessionMode,
    pub options: Vec<SessionOption>,
    /// Whether the session is activated after the category is applied.
    pub activate: bool,
    /// Whether other apps are notified on activation.
    pub notify_others: bool,
    /// Delay after applying before the session counts as stable.
    #[serde(skip)]
    pub stabilize: Duration,
}

impl SessionConfig {
    /// Returns true if the option is set.
    pub fn has(&self, option: SessionOption) -> bool {
        self.options.contains(&option)
    }
}

#[cfg(test)]
mod mode_tests {
    use super::*;

    #[test]
    fn test_mode_str_roundtrip() {
        for mode in [
            AudioMode::Inactive,
            AudioMode::Listening,
            AudioMode::Speaking,
            AudioMode::VehicleAudio,
            AudioMode::BackgroundAudio,
        ] {
            assert_eq!(AudioMode::from_str(mode.as_str()), mode);
        }
        assert_eq!(AudioMode::from_str("bogus"), AudioMode::Inactive);
    }

    #[test]
    fn test_mode_serde() {
        let json = serde_json::to_string(&AudioMode::VehicleAudio).unwrap();
        assert_eq!(json, "\"vehicle_audio\"");
        let mode: AudioMode = serde_json::from_str("\"listening\"").unwrap();
        assert_eq!(mode, AudioMode::Listening);
    }

    #[test]
    fn test_inactive_is_not_activated() {
        let cfg = AudioMode::Inactive.session_config();
        assert_eq!(cfg.category, SessionCategory::Ambient);
        assert!(!cfg.activate);
        assert!(!AudioMode::Inactive.is_active());
    }

    #[test]
    fn test_listening_records() {
        let cfg = AudioMode::Listening.session_config();
        assert_eq!(cfg.category, SessionCategory::PlayAndRecord);
        assert_eq!(cfg.mode, SessionMode::VoiceChat);
        assert!(cfg.has(SessionOption::AllowBluetooth));
        assert!(cfg.has(SessionOption::DefaultToSpeaker));
    }

    #[test]
    fn test_vehicle_ducks_others() {
        let cfg = AudioMode::VehicleAudio.session_config();
        assert!(cfg.has(SessionOption::AllowBluetoothA2dp));
        assert!(cfg.has(SessionOption::DuckOthers));
        assert!(cfg.notify_others);
    }

    #[test]
    fn test_background_mixes() {
        let cfg = AudioMode::BackgroundAudio.session_config();
        assert!(cfg.has(SessionOption::MixWithOthers));
        assert!(!cfg.has(SessionOption::DuckOthers));
    }
}
