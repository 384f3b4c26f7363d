//! In-memory engines.
//!
//! Stand-ins for the platform audio stack: a scripted recognizer, a
//! microphone that produces a burst of voice then silence, synthesizers
//! whose output length follows the word count, and settable device
//! telemetry. Used by tests and the `simulate` command.

use crate::AssistantEngines;
use async_trait::async_trait;
use parking_lot::Mutex;
use roadtrip_audio::{AudioBuffer, Format};
use roadtrip_session::{AudioError, AudioPlatform, SessionConfig};
use roadtrip_speech::{
    AsrEngine, AsrEvent, AsrSession, AudioInput, Authorization, CaptureError, EngineError,
};
use roadtrip_synth::{
    AudioOutput, DeviceReading, DeviceTelemetry, OnDeviceTts, PlatformTts, PlaybackHandle,
    PlaybackOutcome, TtsError, Utterance, VoiceParams, WORDS_PER_SECOND, word_count,
};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Length of one simulated microphone buffer.
const BUFFER_DURATION: Duration = Duration::from_millis(64);

/// Platform speaking rate in words per second at rate 0.5.
const PLATFORM_WORDS_PER_SECOND: f64 = 2.5;

// ============================================================================
// Audio Session
// ============================================================================

/// Audio session platform that records every call.
#[derive(Default)]
pub struct SimPlatform {
    calls: Mutex<Vec<String>>,
    fail_activations: AtomicUsize,
}

impl SimPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes the next `n` activations fail.
    pub fn fail_activations(&self, n: usize) {
        self.fail_activations.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl AudioPlatform for SimPlatform {
    async fn deactivate(&self) -> Result<(), AudioError> {
        self.calls.lock().push("deactivate".to_string());
        Ok(())
    }

    async fn set_category(&self, config: &SessionConfig) -> Result<(), AudioError> {
        self.calls.lock().push(format!("category {:?}", config.category));
        Ok(())
    }

    async fn activate(&self, _notify_others: bool) -> Result<(), AudioError> {
        let failing = self
            .fail_activations
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AudioError::HardwareConfig("activation refused".to_string()));
        }
        self.calls.lock().push("activate".to_string());
        Ok(())
    }
}

// ============================================================================
// Recognition
// ============================================================================

/// What the simulated user says during one capture session.
#[derive(Debug, Clone, PartialEq)]
pub enum SimUtterance {
    /// Partial results, one per step, then the final transcript.
    Phrase(String),
    /// A recognizer error after the first step.
    Error(EngineError),
    /// Nothing; the session stays open until stopped.
    Silence,
}

impl SimUtterance {
    pub fn phrase(text: impl Into<String>) -> Self {
        SimUtterance::Phrase(text.into())
    }
}

/// Recognizer that plays back scripted utterances, one per session.
pub struct SimAsr {
    authorization: Mutex<Authorization>,
    script: Mutex<VecDeque<SimUtterance>>,
    step: Duration,
    sessions: AtomicUsize,
}

impl SimAsr {
    pub fn new(script: Vec<SimUtterance>) -> Arc<Self> {
        Arc::new(Self {
            authorization: Mutex::new(Authorization::Authorized),
            script: Mutex::new(script.into()),
            step: Duration::from_millis(300),
            sessions: AtomicUsize::new(0),
        })
    }

    pub fn set_authorization(&self, authorization: Authorization) {
        *self.authorization.lock() = authorization;
    }

    pub fn push(&self, utterance: SimUtterance) {
        self.script.lock().push_back(utterance);
    }

    pub fn sessions(&self) -> usize {
        self.sessions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AsrEngine for SimAsr {
    fn authorization(&self) -> Authorization {
        *self.authorization.lock()
    }

    async fn start_session(&self, _format: Format) -> Result<AsrSession, CaptureError> {
        self.sessions.fetch_add(1, Ordering::SeqCst);
        let utterance = self.script.lock().pop_front().unwrap_or(SimUtterance::Silence);
        let (audio_tx, mut audio_rx) = mpsc::channel::<AudioBuffer>(64);
        let (events_tx, events_rx) = mpsc::channel(16);
        let cancel = CancellationToken::new();

        let step = self.step;
        let token = cancel.clone();
        tokio::spawn(async move {
            let script = async move {
                match utterance {
                    SimUtterance::Phrase(text) => {
                        let words: Vec<&str> = text.split_whitespace().collect();
                        for n in 1..words.len() {
                            tokio::time::sleep(step).await;
                            let partial = AsrEvent::Partial(words[..n].join(" "));
                            if events_tx.send(partial).await.is_err() {
                                return;
                            }
                        }
                        tokio::time::sleep(step).await;
                        let _ = events_tx.send(AsrEvent::Final(text.clone())).await;
                    }
                    SimUtterance::Error(error) => {
                        tokio::time::sleep(step).await;
                        let _ = events_tx.send(AsrEvent::Error(error)).await;
                    }
                    SimUtterance::Silence => std::future::pending::<()>().await,
                }
                // Keep the stream open until the session is torn down.
                std::future::pending::<()>().await
            };
            // Audio is consumed and discarded.
            let drain = async move { while audio_rx.recv().await.is_some() {} };
            tokio::select! {
                _ = token.cancelled() => {}
                _ = script => {}
                _ = drain => {}
            }
            debug!("sim: recognizer session ended");
        });

        Ok(AsrSession {
            audio: audio_tx,
            events: events_rx,
            cancel,
        })
    }
}

// ============================================================================
// Microphone
// ============================================================================

/// Microphone that produces voice for a while after each start, then
/// silence.
pub struct SimInput {
    format: Format,
    voice: Duration,
    tap: Arc<Mutex<Option<mpsc::Sender<AudioBuffer>>>>,
    running: Mutex<Option<CancellationToken>>,
}

impl SimInput {
    pub fn new(voice: Duration) -> Arc<Self> {
        Arc::new(Self {
            format: Format::MONO_16K,
            voice,
            tap: Arc::new(Mutex::new(None)),
            running: Mutex::new(None),
        })
    }
}

impl AudioInput for SimInput {
    fn format(&self) -> Format {
        self.format
    }

    fn install_tap(&self, tap: mpsc::Sender<AudioBuffer>) -> Result<(), CaptureError> {
        *self.tap.lock() = Some(tap);
        Ok(())
    }

    fn remove_tap(&self) {
        self.tap.lock().take();
    }

    fn has_tap(&self) -> bool {
        self.tap.lock().is_some()
    }

    fn start(&self) -> Result<(), CaptureError> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Ok(());
        }
        let cancel = CancellationToken::new();
        *running = Some(cancel.clone());

        let format = self.format;
        let voice_buffers = (self.voice.as_millis() / BUFFER_DURATION.as_millis()) as usize;
        let tap = self.tap.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(BUFFER_DURATION);
            let mut n = 0usize;
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                let buffer = if n < voice_buffers {
                    AudioBuffer::tone(format, 220.0, 0.3, BUFFER_DURATION)
                } else {
                    AudioBuffer::silence(format, BUFFER_DURATION)
                };
                n += 1;
                let sender = tap.lock().clone();
                if let Some(sender) = sender {
                    let _ = sender.try_send(buffer);
                }
            }
        });
        Ok(())
    }

    fn stop(&self) {
        if let Some(cancel) = self.running.lock().take() {
            cancel.cancel();
        }
    }

    fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// Platform synthesizer that "speaks" for a time proportional to the
/// word count.
#[derive(Default)]
pub struct SimPlatformTts {
    spoken: Mutex<Vec<String>>,
    current: Arc<Mutex<Option<oneshot::Sender<PlaybackOutcome>>>>,
}

impl SimPlatformTts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Texts spoken so far.
    pub fn spoken(&self) -> Vec<String> {
        self.spoken.lock().clone()
    }
}

#[async_trait]
impl PlatformTts for SimPlatformTts {
    async fn speak(&self, utterance: Utterance) -> Result<PlaybackHandle, TtsError> {
        let rate = f64::from(utterance.rate.max(0.1)) / 0.5;
        let secs = word_count(&utterance.text) as f64 / (PLATFORM_WORDS_PER_SECOND * rate);
        self.spoken.lock().push(utterance.text);

        let (tx, rx) = oneshot::channel();
        if let Some(prev) = self.current.lock().replace(tx) {
            let _ = prev.send(PlaybackOutcome::Cancelled);
        }
        let current = self.current.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs_f64(secs)).await;
            if let Some(tx) = current.lock().take() {
                let _ = tx.send(PlaybackOutcome::Finished);
            }
        });
        Ok(rx)
    }

    async fn cancel(&self) {
        if let Some(tx) = self.current.lock().take() {
            let _ = tx.send(PlaybackOutcome::Cancelled);
        }
    }
}

/// On-device synthesizer rendering silence of the spoken length.
pub struct SimOnDeviceTts {
    available: AtomicBool,
    latency: Mutex<Duration>,
    failures: AtomicUsize,
    calls: AtomicUsize,
    optimizations: AtomicUsize,
    stop: Notify,
}

impl SimOnDeviceTts {
    pub fn new(available: bool) -> Arc<Self> {
        Arc::new(Self {
            available: AtomicBool::new(available),
            latency: Mutex::new(Duration::from_millis(120)),
            failures: AtomicUsize::new(0),
            calls: AtomicUsize::new(0),
            optimizations: AtomicUsize::new(0),
            stop: Notify::new(),
        })
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = latency;
    }

    /// Makes the next `n` syntheses fail.
    pub fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn optimizations(&self) -> usize {
        self.optimizations.load(Ordering::SeqCst)
    }

    /// Seconds of audio `text` renders to at `speed`.
    pub fn rendered_secs(text: &str, speed: f32) -> f64 {
        word_count(text) as f64 / (WORDS_PER_SECOND * f64::from(speed))
    }
}

#[async_trait]
impl OnDeviceTts for SimOnDeviceTts {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn synthesize(&self, text: &str, params: &VoiceParams) -> Result<AudioBuffer, TtsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let latency = *self.latency.lock();
        tokio::select! {
            _ = tokio::time::sleep(latency) => {}
            _ = self.stop.notified() => return Err(TtsError::Cancelled),
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(TtsError::SynthesisFailed("model error".to_string()));
        }
        let secs = Self::rendered_secs(text, params.speed);
        Ok(AudioBuffer::silence(Format::MONO_24K, Duration::from_secs_f64(secs)))
    }

    async fn stop(&self) {
        self.stop.notify_waiters();
    }

    async fn optimize_for_memory(&self) {
        self.optimizations.fetch_add(1, Ordering::SeqCst);
    }
}

/// Speaker that plays a buffer for its duration.
#[derive(Default)]
pub struct SimOutput {
    plays: AtomicUsize,
    stopped: Notify,
}

impl SimOutput {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn plays(&self) -> usize {
        self.plays.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AudioOutput for SimOutput {
    async fn play(&self, buffer: AudioBuffer) -> Result<PlaybackOutcome, TtsError> {
        self.plays.fetch_add(1, Ordering::SeqCst);
        tokio::select! {
            _ = tokio::time::sleep(buffer.duration()) => Ok(PlaybackOutcome::Finished),
            _ = self.stopped.notified() => Ok(PlaybackOutcome::Cancelled),
        }
    }

    async fn stop(&self) {
        self.stopped.notify_waiters();
    }
}

// ============================================================================
// Telemetry
// ============================================================================

/// Device telemetry with a settable reading.
#[derive(Default)]
pub struct SimTelemetry {
    reading: Mutex<DeviceReading>,
}

impl SimTelemetry {
    pub fn new(reading: DeviceReading) -> Arc<Self> {
        Arc::new(Self {
            reading: Mutex::new(reading),
        })
    }

    pub fn set(&self, reading: DeviceReading) {
        *self.reading.lock() = reading;
    }
}

impl DeviceTelemetry for SimTelemetry {
    fn read(&self) -> DeviceReading {
        *self.reading.lock()
    }
}

// ============================================================================
// Bundle
// ============================================================================

/// A full set of simulated engines with handles for steering them.
#[derive(Clone)]
pub struct SimEngines {
    pub platform: Arc<SimPlatform>,
    pub asr: Arc<SimAsr>,
    pub input: Arc<SimInput>,
    pub platform_tts: Arc<SimPlatformTts>,
    pub on_device: Arc<SimOnDeviceTts>,
    pub output: Arc<SimOutput>,
    pub telemetry: Arc<SimTelemetry>,
}

impl SimEngines {
    /// Engines with the on-device model loaded and a quiet device.
    pub fn new(script: Vec<SimUtterance>) -> Self {
        Self {
            platform: SimPlatform::new(),
            asr: SimAsr::new(script),
            input: SimInput::new(Duration::from_millis(1200)),
            platform_tts: SimPlatformTts::new(),
            on_device: SimOnDeviceTts::new(true),
            output: SimOutput::new(),
            telemetry: SimTelemetry::new(DeviceReading::default()),
        }
    }

    pub fn engines(&self) -> AssistantEngines {
        AssistantEngines {
            platform: self.platform.clone(),
            asr: self.asr.clone(),
            input: self.input.clone(),
            platform_tts: self.platform_tts.clone(),
            on_device: self.on_device.clone(),
            output: self.output.clone(),
            telemetry: self.telemetry.clone(),
        }
    }
}

#[cfg(test)]
mod sim_tests {
    use super::*;

    #[test]
    fn test_rendered_secs() {
        let text = "one two three four five six";
        assert_eq!(SimOnDeviceTts::rendered_secs(text, 1.0), 2.0);
        assert!(SimOnDeviceTts::rendered_secs(text, 0.5) > 3.9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_scripted_phrase() {
        let asr = SimAsr::new(vec![SimUtterance::phrase("save this place")]);
        let mut session = asr.start_session(Format::MONO_16K).await.unwrap();

        assert_eq!(session.events.recv().await, Some(AsrEvent::Partial("save".to_string())));
        assert_eq!(
            session.events.recv().await,
            Some(AsrEvent::Partial("save this".to_string()))
        );
        assert_eq!(
            session.events.recv().await,
            Some(AsrEvent::Final("save this place".to_string()))
        );

        session.cancel.cancel();
        assert_eq!(session.events.recv().await, None);
        assert_eq!(asr.sessions(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_input_voice_then_silence() {
        let input = SimInput::new(Duration::from_millis(128));
        let (tx, mut rx) = mpsc::channel(16);
        input.install_tap(tx).unwrap();
        input.start().unwrap();

        let levels: Vec<f32> = collect_levels(&mut rx, 4).await;
        assert!(levels[0] > -40.0);
        assert!(levels[1] > -40.0);
        assert!(levels[2].is_infinite());

        input.stop();
        assert!(!input.is_running());
    }

    async fn collect_levels(rx: &mut mpsc::Receiver<AudioBuffer>, n: usize) -> Vec<f32> {
        let mut levels = Vec::new();
        for _ in 0..n {
            levels.push(rx.recv().await.unwrap().level_db());
        }
        levels
    }

    #[tokio::test(start_paused = true)]
    async fn test_platform_speak_and_cancel() {
        let tts = SimPlatformTts::new();
        let utterance = Utterance {
            text: "hello there".to_string(),
            voice: "sim".to_string(),
            rate: 0.5,
            pitch_multiplier: 1.0,
        };
        let handle = tts.speak(utterance.clone()).await.unwrap();
        assert_eq!(roadtrip_synth::wait_playback(handle).await, PlaybackOutcome::Finished);

        let handle = tts.speak(utterance).await.unwrap();
        tts.cancel().await;
        assert_eq!(roadtrip_synth::wait_playback(handle).await, PlaybackOutcome::Cancelled);
        assert_eq!(tts.spoken().len(), 2);
    }
}
