//! Speech request types.

use chrono::{DateTime, Utc};
use roadtrip_audio::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::time::Instant;
use uuid::Uuid;

/// Queue priority of a speech request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// What the speech is for. Drives voice parameters and engine choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoiceContext {
    #[default]
    General,
    CommandFeedback,
    PoiAnnouncement,
    PodcastGeneration,
}

/// Speaking style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoicePersonality {
    #[default]
    Friendly,
    Professional,
    Casual,
    Enthusiastic,
}

impl VoicePersonality {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoicePersonality::Friendly => "friendly",
            VoicePersonality::Professional => "professional",
            VoicePersonality::Casual => "casual",
            VoicePersonality::Enthusiastic => "enthusiastic",
        }
    }
}

impl fmt::Display for VoicePersonality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A synthesis engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Engine {
    /// The operating system speech synthesizer. Lowest latency.
    Platform,
    /// The on-device neural model.
    OnDevice,
}

impl Engine {
    pub fn as_str(&self) -> &'static str {
        match self {
            Engine::Platform => "platform",
            Engine::OnDevice => "on_device",
        }
    }

    /// Returns the other engine.
    pub fn other(&self) -> Engine {
        match self {
            Engine::Platform => Engine::OnDevice,
            Engine::OnDevice => Engine::Platform,
        }
    }
}

impl fmt::Display for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A queued TTS job.
#[derive(Debug, Clone)]
pub struct SpeechRequest {
    pub id: Uuid,
    pub text: String,
    pub priority: Priority,
    pub context: VoiceContext,
    /// Overrides the dispatcher's configured personality.
    pub personality: Option<VoicePersonality>,
    pub timestamp: DateTime<Utc>,
    /// Audio rendered ahead of time; played as-is instead of synthesized.
    pub rendered: Option<AudioBuffer>,
}

impl SpeechRequest {
    /// Creates a request with a fresh id.
    pub fn new(text: impl Into<String>, priority: Priority, context: VoiceContext) -> Self {
        Self {
            id: Uuid::new_v4(),
            text: text.into(),
            priority,
            context,
            personality: None,
            timestamp: Utc::now(),
            rendered: None,
        }
    }

    /// Creates a request that plays pre-rendered audio.
    pub fn prerendered(
        audio: AudioBuffer,
        text: impl Into<String>,
        priority: Priority,
        context: VoiceContext,
    ) -> Self {
        Self {
            rendered: Some(audio),
            ..Self::new(text, priority, context)
        }
    }

    pub fn with_personality(mut self, personality: VoicePersonality) -> Self {
        self.personality = Some(personality);
        self
    }

    pub fn is_urgent(&self) -> bool {
        self.priority == Priority::Urgent
    }
}

/// One active playback.
#[derive(Debug, Clone)]
pub struct SynthesisSession {
    pub request_id: Uuid,
    pub engine: Engine,
    pub context: VoiceContext,
    pub started: Instant,
}

#[cfg(test)]
mod request_tests {
    use super::*;

    #[test]
    fn test_priority_order() {
        assert!(Priority::Urgent > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
    }

    #[test]
    fn test_request_ids_are_unique() {
        let a = SpeechRequest::new("a", Priority::Normal, VoiceContext::General);
        let b = SpeechRequest::new("a", Priority::Normal, VoiceContext::General);
        assert_ne!(a.id, b.id);
        assert!(a.rendered.is_none());
    }

    #[test]
    fn test_engine_other() {
        assert_eq!(Engine::Platform.other(), Engine::OnDevice);
        assert_eq!(Engine::OnDevice.other(), Engine::Platform);
        assert_eq!(Engine::OnDevice.to_string(), "on_device");
    }

    #[test]
    fn test_context_serde() {
        let json = serde_json::to_string(&VoiceContext::PoiAnnouncement).unwrap();
        assert_eq!(json, "\"poi_announcement\"");
    }
}
