//! Microphone capture and transcript delivery.
//!
//! One capture session at a time. The session task owns the recognizer
//! stream and every deadline (voice silence, destination silence) and drives
//! them from a single `select!` loop.

use crate::{
    AppLifecycle, AsrEngine, AsrEvent, AsrSession, AudioInput, Authorization, CaptureError,
    CommandConfig, CommandInterpreter, ConfirmationSpeaker, DestinationModeParser, EngineError,
    ErrorClass, EventBus, VadTransition, VoiceActivityDetector, VoiceEvent, classify_engine_error,
};
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use parking_lot::Mutex;
use roadtrip_audio::AudioBuffer;
use roadtrip_session::{AudioMode, AudioSessionCoordinator, CaptureControl};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Capture timing and detection settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Buffer level above which voice is detected.
    pub voice_threshold_db: f32,
    /// Silence after which voice detection clears.
    pub silence_timeout_ms: u64,
    /// Wait between start attempts while the audio session settles.
    pub start_retry_ms: u64,
    pub max_start_retries: u32,
    /// Delay before restarting after an audio input failure.
    pub audio_restart_ms: u64,
    /// Silence in destination mode after which the transcript is evaluated.
    pub destination_silence_ms: u64,
    /// Delay before listening again for a navigation command.
    pub destination_restart_ms: u64,
    /// Delay before listening again when destination mode heard nothing.
    pub empty_restart_ms: u64,
    /// Buffers queued between the input tap and the session task.
    pub tap_capacity: usize,
    pub command: CommandConfig,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            voice_threshold_db: crate::DEFAULT_THRESHOLD_DB,
            silence_timeout_ms: 3000,
            start_retry_ms: 500,
            max_start_retries: 6,
            audio_restart_ms: 2000,
            destination_silence_ms: 3000,
            destination_restart_ms: 1500,
            empty_restart_ms: 500,
            tap_capacity: 64,
            command: CommandConfig::default(),
        }
    }
}

impl CaptureConfig {
    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    pub fn silence_timeout(&self) -> Duration {
        Self::ms(self.silence_timeout_ms)
    }

    pub fn start_retry(&self) -> Duration {
        Self::ms(self.start_retry_ms)
    }

    pub fn audio_restart(&self) -> Duration {
        Self::ms(self.audio_restart_ms)
    }

    pub fn destination_silence(&self) -> Duration {
        Self::ms(self.destination_silence_ms)
    }

    pub fn destination_restart(&self) -> Duration {
        Self::ms(self.destination_restart_ms)
    }

    pub fn empty_restart(&self) -> Duration {
        Self::ms(self.empty_restart_ms)
    }
}

struct ActiveSession {
    id: u64,
    cancel: CancellationToken,
    asr_cancel: CancellationToken,
}

#[derive(Default)]
struct CaptureState {
    next_id: u64,
    /// Bumped by every stop; a start that sees it change gives up.
    generation: u64,
    starting: bool,
    active: Option<ActiveSession>,
}

/// Clears `starting` however the start attempt ends.
struct StartingGuard<'a>(&'a Mutex<CaptureState>);

impl Drop for StartingGuard<'_> {
    fn drop(&mut self) {
        self.0.lock().starting = false;
    }
}

/// Why a session task ended.
enum SessionEnd {
    Stopped,
    Transcript(String),
    Quiet,
    Fatal(EngineError),
    DestinationSilence(String),
}

struct Inner {
    config: CaptureConfig,
    asr: Arc<dyn AsrEngine>,
    input: Arc<dyn AudioInput>,
    coordinator: AudioSessionCoordinator,
    commands: CommandInterpreter,
    destination: DestinationModeParser,
    bus: EventBus,
    state: Mutex<CaptureState>,
    restart: Mutex<Option<CancellationToken>>,
    listening: watch::Sender<bool>,
    voice_detected: watch::Sender<bool>,
    recognized_text: watch::Sender<String>,
    animation: watch::Sender<bool>,
}

/// Controls speech capture and routes transcripts to commands or
/// destination mode.
#[derive(Clone)]
pub struct SpeechCaptureController {
    inner: Arc<Inner>,
}

impl SpeechCaptureController {
    pub fn new(
        asr: Arc<dyn AsrEngine>,
        input: Arc<dyn AudioInput>,
        coordinator: AudioSessionCoordinator,
        speaker: Arc<dyn ConfirmationSpeaker>,
        bus: EventBus,
        config: CaptureConfig,
    ) -> Self {
        let commands = CommandInterpreter::new(bus.clone(), speaker, config.command.clone());
        let destination = DestinationModeParser::new(bus.clone());
        Self {
            inner: Arc::new(Inner {
                config,
                asr,
                input,
                coordinator,
                commands,
                destination,
                bus,
                state: Mutex::new(CaptureState::default()),
                restart: Mutex::new(None),
                listening: watch::channel(false).0,
                voice_detected: watch::channel(false).0,
                recognized_text: watch::channel(String::new()).0,
                animation: watch::channel(false).0,
            }),
        }
    }

    /// Starts a capture session.
    ///
    /// Waits for the audio session to settle, switches it to `Listening`,
    /// starts recognition and installs the microphone tap.
    pub async fn start_capture(&self) -> Result<(), CaptureError> {
        self.start_boxed().await
    }

    fn start_boxed(&self) -> BoxFuture<'static, Result<(), CaptureError>> {
        let this = self.clone();
        async move { this.start_inner().await }.boxed()
    }

    async fn start_inner(&self) -> Result<(), CaptureError> {
        let inner = &self.inner;
        if inner.asr.authorization() != Authorization::Authorized {
            warn!("capture: speech recognition not authorized");
            return Err(CaptureError::PermissionDenied);
        }

        let generation = {
            let mut st = inner.state.lock();
            if st.starting || st.active.is_some() {
                debug!("capture: already running");
                return Err(CaptureError::SessionBusy);
            }
            st.starting = true;
            st.generation
        };
        let _guard = StartingGuard(&inner.state);
        self.cancel_restart();

        let mut attempt = 0;
        while !inner.coordinator.is_stable() {
            if attempt >= inner.config.max_start_retries {
                warn!(attempt, "capture: audio session not stable");
                return Err(CaptureError::SessionBusy);
            }
            attempt += 1;
            debug!(attempt, "capture: audio session not stable, retrying");
            tokio::time::sleep(inner.config.start_retry()).await;
            if self.superseded(generation) {
                debug!("capture: stopped while waiting for the audio session");
                return Err(CaptureError::Cancelled);
            }
        }

        if self.superseded(generation) {
            debug!("capture: stopped before listening");
            return Err(CaptureError::Cancelled);
        }
        self.teardown_input();
        inner.coordinator.request_mode(AudioMode::Listening).await?;

        let (session, tap_rx) = match self.open_session().await {
            Ok(v) => v,
            Err(e) => {
                error!(error = %e, "capture: failed to start");
                self.teardown_input();
                self.request_background().await;
                return Err(e);
            }
        };

        let committed = {
            let mut st = inner.state.lock();
            if st.generation == generation {
                st.next_id += 1;
                let active = ActiveSession {
                    id: st.next_id,
                    cancel: CancellationToken::new(),
                    asr_cancel: session.cancel.clone(),
                };
                let out = (active.id, active.cancel.clone());
                st.active = Some(active);
                Some(out)
            } else {
                None
            }
        };
        let Some((id, cancel)) = committed else {
            debug!("capture: stopped while starting");
            session.cancel.cancel();
            self.teardown_input();
            self.request_background().await;
            return Err(CaptureError::Cancelled);
        };

        inner.recognized_text.send_replace(String::new());
        inner.listening.send_replace(true);
        info!(session = id, "capture: listening");

        let this = self.clone();
        tokio::spawn(async move { this.run_session(id, cancel, session, tap_rx).await });
        Ok(())
    }

    fn superseded(&self, generation: u64) -> bool {
        self.inner.state.lock().generation != generation
    }

    async fn open_session(
        &self,
    ) -> Result<(AsrSession, mpsc::Receiver<AudioBuffer>), CaptureError> {
        let inner = &self.inner;
        let format = inner.input.format();
        format.validate()?;

        let session = inner.asr.start_session(format).await?;
        let (tap_tx, tap_rx) = mpsc::channel(inner.config.tap_capacity.max(1));
        let started = inner
            .input
            .install_tap(tap_tx)
            .and_then(|_| inner.input.start());
        if let Err(e) = started {
            session.cancel.cancel();
            return Err(e);
        }
        Ok((session, tap_rx))
    }

    async fn run_session(
        self,
        id: u64,
        cancel: CancellationToken,
        session: AsrSession,
        mut tap: mpsc::Receiver<AudioBuffer>,
    ) {
        let inner = &self.inner;
        let AsrSession {
            audio,
            mut events,
            cancel: asr_cancel,
        } = session;
        let mut vad =
            VoiceActivityDetector::new(inner.config.voice_threshold_db, inner.config.silence_timeout());
        let destination_silence = inner.config.destination_silence();
        let mut destination_deadline =
            inner.destination.is_active().then(|| Instant::now() + destination_silence);
        let mut text = String::new();

        let end = loop {
            tokio::select! {
                _ = cancel.cancelled() => break SessionEnd::Stopped,
                buffer = tap.recv() => {
                    let Some(buffer) = buffer else {
                        warn!(session = id, "capture: input tap closed");
                        break SessionEnd::Transcript(text.clone());
                    };
                    let now = Instant::now();
                    let level = buffer.level_db();
                    if audio.try_send(buffer).is_err() {
                        debug!(session = id, "capture: recognizer lagging, buffer dropped");
                    }
                    if vad.observe(level, now) == Some(VadTransition::VoiceStarted) {
                        debug!(session = id, level, "capture: voice detected");
                        inner.voice_detected.send_replace(true);
                        inner.animation.send_replace(true);
                    }
                    if vad.is_voice(level) && inner.destination.is_active() {
                        destination_deadline = Some(now + destination_silence);
                    }
                }
                event = events.recv() => match event {
                    Some(AsrEvent::Partial(partial)) => {
                        text = partial.clone();
                        inner.recognized_text.send_replace(partial);
                        if inner.destination.is_active() {
                            destination_deadline = Some(Instant::now() + destination_silence);
                        }
                    }
                    Some(AsrEvent::Final(transcript)) => {
                        inner.recognized_text.send_replace(transcript.clone());
                        break SessionEnd::Transcript(transcript);
                    }
                    Some(AsrEvent::Error(e)) => match classify_engine_error(&e) {
                        ErrorClass::Transient => {
                            warn!(session = id, error = %e, "capture: transient recognizer error");
                        }
                        ErrorClass::SessionEnd => {
                            info!(session = id, error = %e, "capture: recognizer ended session");
                            break SessionEnd::Transcript(text.clone());
                        }
                        ErrorClass::Cancelled => break SessionEnd::Quiet,
                        ErrorClass::Fatal => break SessionEnd::Fatal(e),
                    },
                    None => break SessionEnd::Transcript(text.clone()),
                },
                _ = sleep_until_opt(vad.deadline()) => {
                    if vad.poll_deadline(Instant::now()) == Some(VadTransition::VoiceStopped) {
                        debug!(session = id, "capture: voice stopped");
                        inner.voice_detected.send_replace(false);
                        inner.animation.send_replace(false);
                    }
                }
                _ = sleep_until_opt(destination_deadline) => {
                    break SessionEnd::DestinationSilence(text.clone());
                }
            }
        };

        asr_cancel.cancel();
        drop(audio);

        if matches!(end, SessionEnd::Stopped) || !self.finish_session(id).await {
            debug!(session = id, "capture: session stopped");
            return;
        }

        match end {
            SessionEnd::Stopped | SessionEnd::Quiet => {}
            SessionEnd::Transcript(transcript) => self.deliver(&transcript),
            SessionEnd::Fatal(e) => {
                error!(session = id, error = %e, "capture: recognizer failed");
                inner.bus.publish(VoiceEvent::CaptureFailed {
                    message: e.to_string(),
                });
                if e.is_audio_related() {
                    self.schedule_restart(inner.config.audio_restart(), false);
                }
            }
            SessionEnd::DestinationSilence(transcript) => {
                if transcript.trim().is_empty() {
                    debug!(session = id, "capture: nothing heard in destination mode");
                    self.schedule_restart(inner.config.empty_restart(), true);
                } else {
                    self.deliver(&transcript);
                }
            }
        }
    }

    /// Ends session `id` if it is still the active one.
    async fn finish_session(&self, id: u64) -> bool {
        {
            let mut st = self.inner.state.lock();
            if st.active.as_ref().map(|a| a.id) != Some(id) {
                return false;
            }
            st.active = None;
        }
        self.teardown_input();
        self.clear_signals();
        self.request_background().await;
        true
    }

    fn deliver(&self, transcript: &str) {
        let text = transcript.trim();
        if text.is_empty() {
            return;
        }
        let inner = &self.inner;
        if inner.destination.is_active() {
            inner.destination.handle_transcript(text);
            if inner.destination.is_active() {
                self.schedule_restart(inner.config.destination_restart(), true);
            }
        } else {
            inner.commands.interpret(text);
        }
    }

    /// Starts capture again after `delay` unless capture is running by then,
    /// or, with `destination_only`, destination mode has ended.
    fn schedule_restart(&self, delay: Duration, destination_only: bool) {
        let token = CancellationToken::new();
        if let Some(prev) = self.inner.restart.lock().replace(token.clone()) {
            prev.cancel();
        }
        let this = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => return,
                _ = tokio::time::sleep(delay) => {}
            }
            if this.is_listening() {
                return;
            }
            if destination_only && !this.inner.destination.is_active() {
                return;
            }
            info!("capture: restarting");
            if let Err(e) = this.start_boxed().await {
                warn!(error = %e, "capture: restart failed");
            }
        });
    }

    fn cancel_restart(&self) {
        if let Some(token) = self.inner.restart.lock().take() {
            token.cancel();
        }
    }

    fn teardown_input(&self) {
        let input = &self.inner.input;
        if input.has_tap() {
            input.remove_tap();
        }
        if input.is_running() {
            input.stop();
        }
    }

    fn clear_signals(&self) {
        let inner = &self.inner;
        inner.voice_detected.send_replace(false);
        inner.animation.send_replace(false);
        inner.listening.send_replace(false);
    }

    async fn request_background(&self) {
        if let Err(e) = self
            .inner
            .coordinator
            .request_mode(AudioMode::BackgroundAudio)
            .await
        {
            warn!(error = %e, "capture: failed to restore background audio");
        }
    }

    /// Stops capture. Safe to call at any time.
    pub async fn stop_capture(&self) {
        self.cancel_restart();
        let active = {
            let mut st = self.inner.state.lock();
            st.generation += 1;
            st.active.take()
        };
        if let Some(active) = active {
            info!(session = active.id, "capture: stopping");
            active.cancel.cancel();
            active.asr_cancel.cancel();
        }
        self.teardown_input();
        self.clear_signals();
        self.request_background().await;
    }

    /// Stops capture if listening, starts it otherwise.
    pub async fn toggle_capture(&self) -> Result<(), CaptureError> {
        if self.is_listening() {
            self.stop_capture().await;
            Ok(())
        } else {
            self.start_capture().await
        }
    }

    pub fn enable_destination_mode(&self) {
        self.inner.destination.enable();
        self.inner.recognized_text.send_replace(String::new());
    }

    pub fn disable_destination_mode(&self) {
        self.inner.destination.disable();
    }

    pub fn is_destination_mode(&self) -> bool {
        self.inner.destination.is_active()
    }

    pub fn set_app_lifecycle(&self, lifecycle: AppLifecycle) {
        self.inner.commands.set_app_lifecycle(lifecycle);
    }

    pub fn destination(&self) -> &DestinationModeParser {
        &self.inner.destination
    }

    pub fn commands(&self) -> &CommandInterpreter {
        &self.inner.commands
    }

    pub fn is_listening(&self) -> bool {
        *self.inner.listening.borrow()
    }

    pub fn voice_detected(&self) -> bool {
        *self.inner.voice_detected.borrow()
    }

    pub fn recognized_text(&self) -> String {
        self.inner.recognized_text.borrow().clone()
    }

    pub fn subscribe_listening(&self) -> watch::Receiver<bool> {
        self.inner.listening.subscribe()
    }

    pub fn subscribe_voice_detected(&self) -> watch::Receiver<bool> {
        self.inner.voice_detected.subscribe()
    }

    pub fn subscribe_recognized_text(&self) -> watch::Receiver<String> {
        self.inner.recognized_text.subscribe()
    }

    /// Listening animation signal.
    pub fn subscribe_animation(&self) -> watch::Receiver<bool> {
        self.inner.animation.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.inner.bus
    }
}

#[async_trait]
impl CaptureControl for SpeechCaptureController {
    fn is_capturing(&self) -> bool {
        let st = self.inner.state.lock();
        st.starting || st.active.is_some()
    }

    async fn release_capture(&self) {
        self.stop_capture().await;
    }
}

async fn sleep_until_opt(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod capture_tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.voice_threshold_db, -40.0);
        assert_eq!(config.silence_timeout(), Duration::from_secs(3));
        assert_eq!(config.start_retry(), Duration::from_millis(500));
        assert_eq!(config.destination_restart(), Duration::from_millis(1500));
        assert_eq!(config.command.action_delay_ms, 200);
    }

    #[test]
    fn test_config_partial() {
        let config: CaptureConfig = serde_json::from_str(r#"{"silence_timeout_ms": 1000}"#).unwrap();
        assert_eq!(config.silence_timeout(), Duration::from_secs(1));
        assert_eq!(config.empty_restart_ms, 500);
    }
}
