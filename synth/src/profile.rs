//! Voice profile: personality and context driven speech parameters.

use crate::{Quality, Utterance, VoiceContext, VoiceId, VoiceParams, VoicePersonality};
use serde::{Deserialize, Serialize};

/// Words kept when speech is destined for a short announcement.
pub const PODCAST_MAX_WORDS: usize = 18;

/// Speech parameter settings shared by both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceProfile {
    pub personality: VoicePersonality,
    /// Compensate for road noise.
    pub automotive: bool,
    /// Trade quality and pace for lower power use.
    pub battery_saver: bool,
}

impl Default for VoiceProfile {
    fn default() -> Self {
        Self {
            personality: VoicePersonality::Friendly,
            automotive: true,
            battery_saver: false,
        }
    }
}

impl VoiceProfile {
    /// Returns the on-device voice for a personality.
    pub fn on_device_voice(personality: VoicePersonality) -> VoiceId {
        match personality {
            VoicePersonality::Friendly => VoiceId::V0,
            VoicePersonality::Professional => VoiceId::V1,
            VoicePersonality::Casual => VoiceId::V4,
            VoicePersonality::Enthusiastic => VoiceId::V3,
        }
    }

    /// Returns the platform voice identifier for a personality.
    pub fn platform_voice(personality: VoicePersonality) -> &'static str {
        match personality {
            VoicePersonality::Friendly => "compact.en-US.Samantha",
            VoicePersonality::Professional => "compact.en-US.Alex",
            VoicePersonality::Casual => "compact.en-US.Karen",
            VoicePersonality::Enthusiastic => "compact.en-US.Victoria",
        }
    }

    /// On-device speed for a context, clamped to 0.5..=2.0.
    pub fn speed(&self, context: VoiceContext) -> f32 {
        let mut speed: f32 = match context {
            VoiceContext::General => 1.0,
            VoiceContext::CommandFeedback => 1.2,
            VoiceContext::PoiAnnouncement => 0.9,
            VoiceContext::PodcastGeneration => 0.85,
        };
        if self.battery_saver {
            speed *= 1.15;
        }
        if self.automotive {
            speed *= match context {
                VoiceContext::General => 1.0,
                VoiceContext::CommandFeedback => 1.1,
                VoiceContext::PoiAnnouncement => 0.95,
                VoiceContext::PodcastGeneration => 0.9,
            };
        }
        speed.clamp(0.5, 2.0)
    }

    /// On-device pitch for a personality, clamped to -1.0..=1.0.
    pub fn pitch(&self, personality: VoicePersonality) -> f32 {
        let base = match personality {
            VoicePersonality::Friendly => 0.0,
            VoicePersonality::Professional => -0.1,
            VoicePersonality::Casual => 0.1,
            VoicePersonality::Enthusiastic => 0.2,
        };
        let pitch: f32 = if self.automotive { base + 0.05 } else { base };
        pitch.clamp(-1.0, 1.0)
    }

    /// On-device rendering quality for a context.
    pub fn quality(&self, context: VoiceContext) -> Quality {
        let quality = match context {
            VoiceContext::CommandFeedback => Quality::Low,
            VoiceContext::General => Quality::Medium,
            VoiceContext::PoiAnnouncement | VoiceContext::PodcastGeneration => Quality::High,
        };
        if self.battery_saver {
            quality.min(Quality::Medium)
        } else {
            quality
        }
    }

    /// Builds on-device parameters for a request.
    pub fn on_device_params(
        &self,
        context: VoiceContext,
        personality: Option<VoicePersonality>,
    ) -> VoiceParams {
        let personality = personality.unwrap_or(self.personality);
        VoiceParams::new(
            Self::on_device_voice(personality),
            self.speed(context),
            self.pitch(personality),
            self.quality(context),
        )
    }

    /// Platform speaking rate for a context (0.5 is the platform's normal rate).
    pub fn platform_rate(&self, context: VoiceContext) -> f32 {
        let mut rate: f32 = match context {
            VoiceContext::General => 0.5,
            VoiceContext::CommandFeedback => 0.6,
            VoiceContext::PoiAnnouncement => 0.45,
            VoiceContext::PodcastGeneration => 0.4,
        };
        if self.battery_saver {
            rate *= 1.1;
        }
        if self.automotive {
            rate *= match context {
                VoiceContext::General => 1.0,
                VoiceContext::CommandFeedback => 1.1,
                VoiceContext::PoiAnnouncement => 0.9,
                VoiceContext::PodcastGeneration => 0.85,
            };
        }
        rate.clamp(0.0, 1.0)
    }

    /// Platform pitch multiplier for a personality.
    pub fn platform_pitch(&self, personality: VoicePersonality) -> f32 {
        let base = match personality {
            VoicePersonality::Friendly => 1.0,
            VoicePersonality::Professional => 0.95,
            VoicePersonality::Casual => 1.05,
            VoicePersonality::Enthusiastic => 1.1,
        };
        if self.automotive { base * 0.95 } else { base }
    }

    /// Builds a platform utterance for a request.
    pub fn utterance(
        &self,
        text: &str,
        context: VoiceContext,
        personality: Option<VoicePersonality>,
    ) -> Utterance {
        let personality = personality.unwrap_or(self.personality);
        Utterance {
            text: text.to_string(),
            voice: Self::platform_voice(personality).to_string(),
            rate: self.platform_rate(context),
            pitch_multiplier: self.platform_pitch(personality),
        }
    }
}

/// Rewrites text so both engines pronounce it well.
///
/// Expands units and abbreviations. Announcement text is cut to
/// [`PODCAST_MAX_WORDS`] words.
pub fn preprocess_text(text: &str, context: VoiceContext) -> String {
    let mut out = text
        .replace("km/h", "kilometers per hour")
        .replace("mph", "miles per hour")
        .replace('&', "and")
        .replace("GPS", "G P S")
        .replace("POI", "point of interest");

    if context == VoiceContext::PodcastGeneration {
        let words: Vec<&str> = out.split_whitespace().collect();
        if words.len() > PODCAST_MAX_WORDS {
            out = format!("{}.", words[..PODCAST_MAX_WORDS].join(" "));
        }
    }
    out
}

#[cfg(test)]
mod profile_tests {
    use super::*;

    fn plain() -> VoiceProfile {
        VoiceProfile {
            automotive: false,
            ..Default::default()
        }
    }

    #[test]
    fn test_speed_by_context() {
        let p = plain();
        assert_eq!(p.speed(VoiceContext::General), 1.0);
        assert_eq!(p.speed(VoiceContext::CommandFeedback), 1.2);
        assert_eq!(p.speed(VoiceContext::PoiAnnouncement), 0.9);
        assert_eq!(p.speed(VoiceContext::PodcastGeneration), 0.85);
    }

    #[test]
    fn test_speed_battery_and_automotive() {
        let p = VoiceProfile {
            battery_saver: true,
            automotive: true,
            ..Default::default()
        };
        let expected = 1.2 * 1.15 * 1.1;
        assert!((p.speed(VoiceContext::CommandFeedback) - expected).abs() < 1e-5);
    }

    #[test]
    fn test_pitch_by_personality() {
        let p = plain();
        assert_eq!(p.pitch(VoicePersonality::Professional), -0.1);
        assert_eq!(p.pitch(VoicePersonality::Enthusiastic), 0.2);
        let auto = VoiceProfile::default();
        assert!((auto.pitch(VoicePersonality::Friendly) - 0.05).abs() < 1e-6);
    }

    #[test]
    fn test_battery_saver_caps_quality() {
        let p = VoiceProfile {
            battery_saver: true,
            ..Default::default()
        };
        assert_eq!(p.quality(VoiceContext::PodcastGeneration), Quality::Medium);
        assert_eq!(p.quality(VoiceContext::CommandFeedback), Quality::Low);
        assert_eq!(plain().quality(VoiceContext::PoiAnnouncement), Quality::High);
    }

    #[test]
    fn test_personality_override() {
        let p = plain();
        let params = p.on_device_params(VoiceContext::General, Some(VoicePersonality::Casual));
        assert_eq!(params.voice, VoiceId::V4);
        let params = p.on_device_params(VoiceContext::General, None);
        assert_eq!(params.voice, VoiceId::V0);

        let u = p.utterance("hi", VoiceContext::General, Some(VoicePersonality::Professional));
        assert!(u.voice.ends_with("Alex"));
        assert_eq!(u.pitch_multiplier, 0.95);
    }

    #[test]
    fn test_platform_rate_normal() {
        assert!((plain().platform_rate(VoiceContext::General) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_preprocess_expansions() {
        let out = preprocess_text("Drive 60 mph & follow GPS to the POI", VoiceContext::General);
        assert_eq!(
            out,
            "Drive 60 miles per hour and follow G P S to the point of interest"
        );
        assert_eq!(
            preprocess_text("limit 80 km/h", VoiceContext::General),
            "limit 80 kilometers per hour"
        );
    }

    #[test]
    fn test_preprocess_podcast_truncation() {
        let text = (1..=25).map(|i| format!("w{}", i)).collect::<Vec<_>>().join(" ");
        let out = preprocess_text(&text, VoiceContext::PodcastGeneration);
        assert_eq!(out.split_whitespace().count(), PODCAST_MAX_WORDS);
        assert!(out.ends_with("w18."));

        let short = preprocess_text("short one", VoiceContext::PodcastGeneration);
        assert_eq!(short, "short one");
    }
}
