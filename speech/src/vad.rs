//! Energy based voice-activity detection.

use roadtrip_audio::AudioBuffer;
use std::time::Duration;
use tokio::time::Instant;

/// Default level above which a buffer counts as voice.
pub const DEFAULT_THRESHOLD_DB: f32 = -40.0;

/// Default silence after which voice detection clears.
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(3);

/// A change in detected voice activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadTransition {
    VoiceStarted,
    VoiceStopped,
}

/// Tracks voice activity from buffer levels.
///
/// Every buffer above the threshold re-arms a silence deadline. When the
/// deadline passes, detection clears once and stays clear until the next
/// loud buffer.
#[derive(Debug, Clone)]
pub struct VoiceActivityDetector {
    threshold_db: f32,
    silence: Duration,
    voice_detected: bool,
    deadline: Option<Instant>,
}

impl Default for VoiceActivityDetector {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_DB, DEFAULT_SILENCE_TIMEOUT)
    }
}

impl VoiceActivityDetector {
    pub fn new(threshold_db: f32, silence: Duration) -> Self {
        Self {
            threshold_db,
            silence,
            voice_detected: false,
            deadline: None,
        }
    }

    pub fn voice_detected(&self) -> bool {
        self.voice_detected
    }

    /// The pending silence deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Returns true if the level counts as voice.
    pub fn is_voice(&self, level_db: f32) -> bool {
        level_db.is_finite() && level_db > self.threshold_db
    }

    /// Feeds one buffer level.
    pub fn observe(&mut self, level_db: f32, now: Instant) -> Option<VadTransition> {
        if !self.is_voice(level_db) {
            return None;
        }
        self.deadline = Some(now + self.silence);
        if self.voice_detected {
            None
        } else {
            self.voice_detected = true;
            Some(VadTransition::VoiceStarted)
        }
    }

    /// Feeds one buffer.
    pub fn observe_buffer(&mut self, buffer: &AudioBuffer, now: Instant) -> Option<VadTransition> {
        self.observe(buffer.level_db(), now)
    }

    /// Clears detection if the silence deadline has passed.
    pub fn poll_deadline(&mut self, now: Instant) -> Option<VadTransition> {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                if self.voice_detected {
                    self.voice_detected = false;
                    Some(VadTransition::VoiceStopped)
                } else {
                    None
                }
            }
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.voice_detected = false;
        self.deadline = None;
    }
}
