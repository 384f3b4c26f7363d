//! Duration-targeted POI announcements.
//!
//! [`DurationTargetedSynthesizer`] renders a short spoken announcement for a
//! point of interest and retries with a rescaled script until the audio lands
//! within the configured window around the target duration. The number of
//! synthesis calls is bounded by `max_attempts`; when no attempt lands in the
//! window the closest one is returned flagged as suboptimal.

use crate::{
    OnDeviceTts, Poi, PoiCategory, Quality, TtsError, VARIATION_PRESETS, VoiceId, VoiceParams,
    VoicePersonality, WORDS_PER_SECOND, adjust_for_duration, optimize_for_speech,
    optimize_word_count, template_script,
};
use chrono::{DateTime, Utc};
use futures::future::join_all;
use parking_lot::Mutex;
use roadtrip_audio::AudioBuffer;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Duration targeting settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PodcastConfig {
    pub target_secs: f64,
    pub tolerance_secs: f64,
    pub max_attempts: u32,
    /// Speed of the first attempt.
    pub base_speed: f32,
    /// Speed added on every retry.
    pub speed_step: f32,
    pub pitch: f32,
    /// Generation records kept for statistics.
    pub history: usize,
}

impl Default for PodcastConfig {
    fn default() -> Self {
        Self {
            target_secs: 6.0,
            tolerance_secs: 0.5,
            max_attempts: 3,
            base_speed: 0.85,
            speed_step: 0.05,
            pitch: 0.1,
            history: 100,
        }
    }
}

impl PodcastConfig {
    /// Words the first script is cut to.
    pub fn target_words(&self) -> usize {
        (self.target_secs * WORDS_PER_SECOND) as usize
    }

    /// Voice parameters for a 1-based attempt index.
    pub fn attempt_params(&self, voice: VoiceId, attempt: u32) -> VoiceParams {
        let speed = self.base_speed + self.speed_step * attempt.saturating_sub(1) as f32;
        VoiceParams::new(voice, speed, self.pitch, Quality::High)
    }
}

/// Voice tried after a synthesis error.
pub fn fallback_voice(voice: VoiceId) -> VoiceId {
    if voice == VoiceId::V0 { VoiceId::V2 } else { VoiceId::V0 }
}

/// One synthesis try.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationAttempt {
    /// 1-based.
    pub index: u32,
    pub script: String,
    pub voice: VoiceId,
    /// Measured duration; `None` when synthesis failed.
    pub duration_secs: Option<f64>,
    pub error: Option<String>,
}

/// A generated announcement.
#[derive(Debug, Clone)]
pub struct Announcement {
    pub poi_name: String,
    pub script: String,
    pub voice: VoiceId,
    pub audio: AudioBuffer,
    pub duration_secs: f64,
    pub attempts: Vec<GenerationAttempt>,
    /// No attempt landed within the tolerance window.
    pub suboptimal: bool,
}

/// A styled alternative rendering.
#[derive(Debug, Clone)]
pub struct Variation {
    pub id: String,
    pub personality: VoicePersonality,
    pub script: String,
    pub voice: VoiceId,
    pub audio: AudioBuffer,
    pub duration_secs: f64,
}

/// Outcome of one `generate` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationRecord {
    pub poi_name: String,
    pub category: PoiCategory,
    pub script_len: usize,
    pub duration_secs: Option<f64>,
    pub attempts: u32,
    pub processing_ms: f64,
    /// Landed within the tolerance window.
    pub success: bool,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate over the tracked records.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct GenerationStats {
    pub total: usize,
    pub success_rate: f64,
    pub average_processing_ms: f64,
}

/// Bounded history of generation records.
pub struct GenerationTracker {
    capacity: usize,
    records: Mutex<VecDeque<GenerationRecord>>,
}

impl GenerationTracker {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::new()),
        }
    }

    pub fn record(&self, record: GenerationRecord) {
        let mut records = self.records.lock();
        if records.len() >= self.capacity {
            records.pop_front();
        }
        records.push_back(record);
    }

    pub fn records(&self) -> Vec<GenerationRecord> {
        self.records.lock().iter().cloned().collect()
    }

    pub fn stats(&self) -> GenerationStats {
        let records = self.records.lock();
        if records.is_empty() {
            return GenerationStats::default();
        }
        let total = records.len();
        GenerationStats {
            total,
            success_rate: records.iter().filter(|r| r.success).count() as f64 / total as f64,
            average_processing_ms: records.iter().map(|r| r.processing_ms).sum::<f64>()
                / total as f64,
        }
    }
}

/// Generates POI announcements close to a target duration.
pub struct DurationTargetedSynthesizer {
    tts: Arc<dyn OnDeviceTts>,
    config: PodcastConfig,
    tracker: GenerationTracker,
}

struct Best {
    audio: AudioBuffer,
    script: String,
    voice: VoiceId,
    duration: f64,
}

impl DurationTargetedSynthesizer {
    pub fn new(tts: Arc<dyn OnDeviceTts>, config: PodcastConfig) -> Self {
        Self {
            tracker: GenerationTracker::new(config.history),
            tts,
            config,
        }
    }

    pub fn config(&self) -> &PodcastConfig {
        &self.config
    }

    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    /// Builds the initial script for a POI.
    pub fn script_for(&self, poi: &Poi) -> String {
        optimize_word_count(
            &optimize_for_speech(&template_script(poi)),
            self.config.target_words(),
        )
    }

    /// Generates an announcement for a POI.
    ///
    /// Makes at most `max_attempts` synthesis calls. A synthesis error is
    /// retried once with the fallback voice; a second error ends the loop.
    pub async fn generate(&self, poi: &Poi) -> Result<Announcement, TtsError> {
        let started = Instant::now();
        let target = self.config.target_secs;
        let max_attempts = self.config.max_attempts.max(1);

        let mut script = self.script_for(poi);
        let mut voice = poi.category.voice();
        let mut fallback_used = false;
        let mut attempts = Vec::new();
        let mut best: Option<Best> = None;
        let mut last_error = None;

        for index in 1..=max_attempts {
            let params = self.config.attempt_params(voice, index);
            match self.tts.synthesize(&script, &params).await {
                Ok(audio) => {
                    let duration = audio.duration_secs();
                    attempts.push(GenerationAttempt {
                        index,
                        script: script.clone(),
                        voice,
                        duration_secs: Some(duration),
                        error: None,
                    });
                    debug!(poi = %poi.name, attempt = index, duration, "podcast: attempt");

                    if (duration - target).abs() <= self.config.tolerance_secs {
                        self.track(poi, &script, Some(duration), index, started, true);
                        info!(poi = %poi.name, attempts = index, duration, "podcast: generated");
                        return Ok(Announcement {
                            poi_name: poi.name.clone(),
                            script,
                            voice,
                            audio,
                            duration_secs: duration,
                            attempts,
                            suboptimal: false,
                        });
                    }

                    let closer = best
                        .as_ref()
                        .is_none_or(|b| (duration - target).abs() < (b.duration - target).abs());
                    let next = adjust_for_duration(&script, duration, target);
                    if closer {
                        best = Some(Best {
                            audio,
                            script: std::mem::replace(&mut script, next),
                            voice,
                            duration,
                        });
                    } else {
                        script = next;
                    }
                }
                Err(e) if e.is_cancelled() => return Err(e),
                Err(e) => {
                    warn!(poi = %poi.name, attempt = index, voice = %voice, error = %e, "podcast: synthesis failed");
                    attempts.push(GenerationAttempt {
                        index,
                        script: script.clone(),
                        voice,
                        duration_secs: None,
                        error: Some(e.to_string()),
                    });
                    last_error = Some(e);
                    if fallback_used {
                        break;
                    }
                    fallback_used = true;
                    voice = fallback_voice(voice);
                }
            }
        }

        match best {
            Some(best) => {
                warn!(
                    poi = %poi.name,
                    duration = best.duration,
                    target,
                    attempts = attempts.len(),
                    "podcast: duration outside target window"
                );
                self.track(
                    poi,
                    &best.script,
                    Some(best.duration),
                    attempts.len() as u32,
                    started,
                    false,
                );
                Ok(Announcement {
                    poi_name: poi.name.clone(),
                    script: best.script,
                    voice: best.voice,
                    audio: best.audio,
                    duration_secs: best.duration,
                    attempts,
                    suboptimal: true,
                })
            }
            None => {
                self.track(poi, &script, None, attempts.len() as u32, started, false);
                Err(TtsError::SynthesisFailed(match last_error {
                    Some(e) => format!("all attempts failed: {}", e),
                    None => "all attempts failed".to_string(),
                }))
            }
        }
    }

    /// Renders every variation preset concurrently.
    ///
    /// Failed variations are logged and left out.
    pub async fn generate_variations(&self, poi: &Poi) -> Vec<Variation> {
        let jobs = VARIATION_PRESETS.iter().enumerate().map(|(i, preset)| async move {
            let script = preset.script(poi);
            let params = VoiceParams::new(preset.voice, preset.speed, preset.pitch, Quality::High);
            match self.tts.synthesize(&script, &params).await {
                Ok(audio) => Some(Variation {
                    id: format!("{}_var_{}", poi.name, i),
                    personality: preset.personality,
                    duration_secs: audio.duration_secs(),
                    script,
                    voice: preset.voice,
                    audio,
                }),
                Err(e) => {
                    warn!(poi = %poi.name, variation = i, error = %e, "podcast: variation failed");
                    None
                }
            }
        });
        join_all(jobs).await.into_iter().flatten().collect()
    }

    fn track(
        &self,
        poi: &Poi,
        script: &str,
        duration_secs: Option<f64>,
        attempts: u32,
        started: Instant,
        success: bool,
    ) {
        self.tracker.record(GenerationRecord {
            poi_name: poi.name.clone(),
            category: poi.category,
            script_len: script.chars().count(),
            duration_secs,
            attempts,
            processing_ms: started.elapsed().as_secs_f64() * 1000.0,
            success,
            timestamp: Utc::now(),
        });
    }
}

#[cfg(test)]
mod podcast_tests {
    use super::*;

    #[test]
    fn test_attempt_params() {
        let c = PodcastConfig::default();
        let p1 = c.attempt_params(VoiceId::V2, 1);
        let p3 = c.attempt_params(VoiceId::V2, 3);
        assert!((p1.speed - 0.85).abs() < 1e-6);
        assert!((p3.speed - 0.95).abs() < 1e-6);
        assert!((p1.pitch - 0.1).abs() < 1e-6);
        assert_eq!(p1.quality, Quality::High);
        assert_eq!(c.target_words(), 18);
    }

    #[test]
    fn test_fallback_voice() {
        assert_eq!(fallback_voice(VoiceId::V0), VoiceId::V2);
        assert_eq!(fallback_voice(VoiceId::V7), VoiceId::V0);
    }

    #[test]
    fn test_tracker_bounded_stats() {
        let t = GenerationTracker::new(2);
        for (i, success) in [true, false, true].into_iter().enumerate() {
            t.record(GenerationRecord {
                poi_name: format!("p{}", i),
                category: PoiCategory::Parks,
                script_len: 10,
                duration_secs: Some(6.0),
                attempts: 1,
                processing_ms: 10.0 * (i + 1) as f64,
                success,
                timestamp: Utc::now(),
            });
        }
        let stats = t.stats();
        assert_eq!(stats.total, 2);
        assert!((stats.success_rate - 0.5).abs() < 1e-9);
        assert!((stats.average_processing_ms - 25.0).abs() < 1e-9);
        assert_eq!(t.records()[0].poi_name, "p1");
    }
}
