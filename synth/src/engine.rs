//! Synthesis engine contracts.
//!
//! The acoustic models live outside this crate. The dispatcher talks to them
//! through three narrow traits:
//!
//! - [`PlatformTts`]: speaks an [`Utterance`]; resolves once speech starts
//!   with a [`PlaybackHandle`] that completes when it finishes or is cancelled
//! - [`OnDeviceTts`]: renders text into an [`AudioBuffer`]
//! - [`AudioOutput`]: plays a rendered buffer

use crate::TtsError;
use async_trait::async_trait;
use roadtrip_audio::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio::sync::oneshot;

/// A voice of the on-device model, `voice0` through `voice7`.
///
/// Voices 0-3 are female, 4-7 male.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct VoiceId(u8);

impl VoiceId {
    pub const COUNT: u8 = 8;

    /// Creates a voice id, or `None` if out of range.
    pub const fn new(index: u8) -> Option<Self> {
        if index < Self::COUNT { Some(Self(index)) } else { None }
    }

    pub const fn index(&self) -> u8 {
        self.0
    }

    pub fn is_female(&self) -> bool {
        self.0 < 4
    }
}

// Named voices used by the profile and announcement presets.
impl VoiceId {
    pub const V0: VoiceId = VoiceId(0);
    pub const V1: VoiceId = VoiceId(1);
    pub const V2: VoiceId = VoiceId(2);
    pub const V3: VoiceId = VoiceId(3);
    pub const V4: VoiceId = VoiceId(4);
    pub const V5: VoiceId = VoiceId(5);
    pub const V6: VoiceId = VoiceId(6);
    pub const V7: VoiceId = VoiceId(7);
}

impl fmt::Display for VoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "voice{}", self.0)
    }
}

impl From<VoiceId> for String {
    fn from(v: VoiceId) -> String {
        v.to_string()
    }
}

impl TryFrom<String> for VoiceId {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.strip_prefix("voice")
            .and_then(|n| n.parse::<u8>().ok())
            .and_then(VoiceId::new)
            .ok_or_else(|| format!("unknown voice: {}", s))
    }
}

/// Rendering quality hint for the on-device model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Quality {
    Low,
    Medium,
    High,
}

/// Parameters for one on-device synthesis call.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VoiceParams {
    pub voice: VoiceId,
    /// Playback speed, 0.5 to 2.0.
    pub speed: f32,
    /// Pitch shift, -1.0 to 1.0.
    pub pitch: f32,
    pub quality: Quality,
}

impl VoiceParams {
    pub fn new(voice: VoiceId, speed: f32, pitch: f32, quality: Quality) -> Self {
        Self {
            voice,
            speed,
            pitch,
            quality,
        }
        .clamped()
    }

    /// Returns a copy with speed and pitch clamped into range.
    pub fn clamped(mut self) -> Self {
        self.speed = self.speed.clamp(0.5, 2.0);
        self.pitch = self.pitch.clamp(-1.0, 1.0);
        self
    }
}

/// A platform engine speech job.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Utterance {
    pub text: String,
    /// Platform voice identifier.
    pub voice: String,
    /// Speaking rate on the platform scale (0.0 to 1.0, 0.5 is normal).
    pub rate: f32,
    /// Pitch multiplier (0.5 to 2.0).
    pub pitch_multiplier: f32,
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaybackOutcome {
    Finished,
    Cancelled,
}

/// Completion of a started platform utterance.
///
/// A dropped sender counts as [`PlaybackOutcome::Cancelled`].
pub type PlaybackHandle = oneshot::Receiver<PlaybackOutcome>;

/// Waits for a started utterance to end.
pub async fn wait_playback(handle: PlaybackHandle) -> PlaybackOutcome {
    handle.await.unwrap_or(PlaybackOutcome::Cancelled)
}

/// The platform speech synthesizer.
#[async_trait]
pub trait PlatformTts: Send + Sync {
    /// Starts speaking the utterance. Resolves once audio starts.
    async fn speak(&self, utterance: Utterance) -> Result<PlaybackHandle, TtsError>;

    /// Cancels the current utterance, if any.
    async fn cancel(&self);
}

/// The on-device neural synthesizer.
#[async_trait]
pub trait OnDeviceTts: Send + Sync {
    /// Returns true once the model is loaded and usable.
    fn is_available(&self) -> bool;

    /// Renders text to audio.
    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioBuffer, TtsError>;

    /// Aborts an in-flight synthesis.
    async fn stop(&self);

    /// Releases caches to reduce memory use.
    async fn optimize_for_memory(&self) {}
}

/// Plays rendered audio.
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Plays the buffer. Resolves when playback finishes or is stopped.
    async fn play(&self, buffer: AudioBuffer) -> Result<PlaybackOutcome, TtsError>;

    /// Stops playback.
    async fn stop(&self);
}

#[cfg(test)]
mod engine_tests {
    use super::*;

    #[test]
    fn test_voice_id_range() {
        assert_eq!(VoiceId::new(7), Some(VoiceId::V7));
        assert_eq!(VoiceId::new(8), None);
        assert!(VoiceId::V3.is_female());
        assert!(!VoiceId::V4.is_female());
    }

    #[test]
    fn test_voice_id_serde() {
        let json = serde_json::to_string(&VoiceId::V2).unwrap();
        assert_eq!(json, "\"voice2\"");
        let v: VoiceId = serde_json::from_str("\"voice6\"").unwrap();
        assert_eq!(v, VoiceId::V6);
        assert!(serde_json::from_str::<VoiceId>("\"voice9\"").is_err());
    }

    #[test]
    fn test_params_clamped() {
        let p = VoiceParams::new(VoiceId::V0, 3.0, -2.0, Quality::High);
        assert_eq!(p.speed, 2.0);
        assert_eq!(p.pitch, -1.0);
    }

    #[tokio::test]
    async fn test_dropped_handle_is_cancelled() {
        let (tx, rx) = oneshot::channel();
        drop(tx);
        assert_eq!(wait_playback(rx).await, PlaybackOutcome::Cancelled);

        let (tx, rx) = oneshot::channel();
        tx.send(PlaybackOutcome::Finished).unwrap();
        assert_eq!(wait_playback(rx).await, PlaybackOutcome::Finished);
    }
}
