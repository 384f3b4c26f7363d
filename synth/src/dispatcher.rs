//! Serialized speech output.
//!
//! [`SynthesisDispatcher`] owns the speech queue. One processing loop at a time
//! pops requests, picks an engine, holds the `Speaking` audio mode while the
//! request plays and returns the session to `BackgroundAudio` once the queue
//! drains. `stop_speaking` bumps an epoch so a loop that is still awaiting a
//! cancelled playback exits without touching the queue again.

use crate::{
    AudioOutput, Engine, EngineStatus, OnDeviceTts, PerformanceMonitor, PlatformTts,
    PlaybackOutcome, Priority, SpeechQueue, SpeechRequest, SynthesisSession, TtsError,
    VoiceContext, VoicePersonality, VoiceProfile, preprocess_text, select_engine, wait_playback,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use roadtrip_session::{AudioMode, AudioSessionCoordinator, CaptureControl, PlaybackControl};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Dispatcher settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Pause between consecutive utterances.
    pub inter_request_gap_ms: u64,
    /// On-device latency below which it is preferred outright.
    pub fast_on_device_ms: u64,
    pub voice: VoiceProfile,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            inter_request_gap_ms: 100,
            fast_on_device_ms: 200,
            voice: VoiceProfile::default(),
        }
    }
}

/// Lifecycle of a dispatched request.
#[derive(Debug, Clone)]
pub enum SynthesisEvent {
    Started {
        id: Uuid,
        engine: Engine,
        context: VoiceContext,
    },
    Finished {
        id: Uuid,
        engine: Engine,
        latency: Duration,
    },
    Cancelled {
        id: Uuid,
    },
    Failed {
        id: Uuid,
        error: TtsError,
    },
}

/// Engines and collaborators the dispatcher drives.
#[derive(Clone)]
pub struct SynthesisEngines {
    pub platform: Arc<dyn PlatformTts>,
    pub on_device: Arc<dyn OnDeviceTts>,
    pub output: Arc<dyn AudioOutput>,
}

#[derive(Default)]
struct State {
    queue: SpeechQueue,
    running: bool,
    epoch: u64,
    current: Option<SynthesisSession>,
}

struct Inner {
    config: DispatcherConfig,
    coordinator: AudioSessionCoordinator,
    engines: SynthesisEngines,
    monitor: Arc<PerformanceMonitor>,
    profile: Mutex<VoiceProfile>,
    capture: Mutex<Option<Weak<dyn CaptureControl>>>,
    state: Mutex<State>,
    speaking: watch::Sender<bool>,
    events: broadcast::Sender<SynthesisEvent>,
}

/// Priority queue of speech requests with serialized playback.
#[derive(Clone)]
pub struct SynthesisDispatcher {
    inner: Arc<Inner>,
}

impl SynthesisDispatcher {
    pub fn new(
        coordinator: AudioSessionCoordinator,
        engines: SynthesisEngines,
        monitor: Arc<PerformanceMonitor>,
        config: DispatcherConfig,
    ) -> Self {
        let (speaking, _) = watch::channel(false);
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(Inner {
                profile: Mutex::new(config.voice),
                capture: Mutex::new(None),
                config,
                coordinator,
                engines,
                monitor,
                state: Mutex::new(State::default()),
                speaking,
                events,
            }),
        }
    }

    /// Attaches the capture that is stopped before anything is spoken.
    pub fn set_capture(&self, capture: Weak<dyn CaptureControl>) {
        *self.inner.capture.lock() = Some(capture);
    }

    /// Queues a request and starts the processing loop if it is idle.
    ///
    /// Must be called within a tokio runtime.
    pub fn enqueue(&self, request: SpeechRequest) -> Uuid {
        let id = request.id;
        let spawn_epoch = {
            let mut st = self.inner.state.lock();
            debug!(id = %id, priority = ?request.priority, context = ?request.context, "dispatch: enqueue");
            st.queue.push(request);
            if st.running {
                None
            } else {
                st.running = true;
                Some(st.epoch)
            }
        };
        if let Some(epoch) = spawn_epoch {
            tokio::spawn(self.inner.clone().run(epoch));
        }
        id
    }

    /// Queues text.
    pub fn speak(&self, text: impl Into<String>, priority: Priority, context: VoiceContext) -> Uuid {
        self.enqueue(SpeechRequest::new(text, priority, context))
    }

    /// Queues a short confirmation for a voice command.
    pub fn speak_command_feedback(&self, text: impl Into<String>) -> Uuid {
        self.speak(text, Priority::Normal, VoiceContext::CommandFeedback)
    }

    /// Cancels active playback, clears the queue and returns the session to
    /// `BackgroundAudio`. Safe to call at any time.
    pub async fn stop_speaking(&self) {
        let (dropped, current) = {
            let mut st = self.inner.state.lock();
            st.epoch += 1;
            st.running = false;
            (st.queue.clear(), st.current.take())
        };

        let engines = &self.inner.engines;
        engines.platform.cancel().await;
        engines.on_device.stop().await;
        engines.output.stop().await;
        self.inner.speaking.send_replace(false);

        if let Some(session) = current {
            let _ = self.inner.events.send(SynthesisEvent::Cancelled {
                id: session.request_id,
            });
        }
        info!(dropped, "dispatch: stopped");

        if let Err(e) = self.inner.coordinator.request_mode(AudioMode::BackgroundAudio).await {
            warn!(error = %e, "dispatch: background mode after stop failed");
        }
    }

    /// Changes the default personality.
    pub fn configure_voice(&self, personality: VoicePersonality) {
        self.inner.profile.lock().personality = personality;
    }

    pub fn set_battery_saver(&self, enabled: bool) {
        self.inner.profile.lock().battery_saver = enabled;
    }

    pub fn profile(&self) -> VoiceProfile {
        *self.inner.profile.lock()
    }

    pub fn is_speaking(&self) -> bool {
        *self.inner.speaking.borrow()
    }

    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.inner.speaking.subscribe()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<SynthesisEvent> {
        self.inner.events.subscribe()
    }

    /// Requests waiting to be served.
    pub fn queue_len(&self) -> usize {
        self.inner.state.lock().queue.len()
    }

    /// The request currently being served.
    pub fn current(&self) -> Option<SynthesisSession> {
        self.inner.state.lock().current.clone()
    }

    pub fn monitor(&self) -> &Arc<PerformanceMonitor> {
        &self.inner.monitor
    }
}

#[async_trait]
impl PlaybackControl for SynthesisDispatcher {
    fn is_playing(&self) -> bool {
        self.inner.state.lock().current.is_some()
    }

    async fn cancel_playback(&self) {
        self.stop_speaking().await;
    }
}

enum Next {
    Serve(SpeechRequest),
    Drained,
    Stale,
}

impl Inner {
    fn is_current(&self, epoch: u64) -> bool {
        self.state.lock().epoch == epoch
    }

    fn next(&self, epoch: u64) -> Next {
        let mut st = self.state.lock();
        if st.epoch != epoch {
            return Next::Stale;
        }
        match st.queue.pop() {
            Some(request) => Next::Serve(request),
            None => Next::Drained,
        }
    }

    async fn run(self: Arc<Self>, epoch: u64) {
        let gap = Duration::from_millis(self.config.inter_request_gap_ms);
        loop {
            loop {
                match self.next(epoch) {
                    Next::Serve(request) => {
                        self.serve(epoch, request).await;
                        tokio::time::sleep(gap).await;
                    }
                    Next::Drained => break,
                    Next::Stale => return,
                }
            }

            self.speaking.send_replace(false);
            if let Err(e) = self.coordinator.request_mode(AudioMode::BackgroundAudio).await {
                warn!(error = %e, "dispatch: background mode failed");
            }

            // Requests queued while switching back are served by this loop.
            let done = {
                let mut st = self.state.lock();
                if st.epoch != epoch {
                    true
                } else if st.queue.is_empty() {
                    st.running = false;
                    true
                } else {
                    false
                }
            };
            if done {
                return;
            }
        }
    }

    fn engine_status(&self) -> EngineStatus {
        EngineStatus {
            on_device_available: self.engines.on_device.is_available(),
            on_device_latency: self.monitor.average_latency(Engine::OnDevice),
            alert_level: self.monitor.alert_level(),
        }
    }

    async fn serve(&self, epoch: u64, request: SpeechRequest) {
        let engine = if request.rendered.is_some() {
            Engine::OnDevice
        } else {
            let fast = Duration::from_millis(self.config.fast_on_device_ms);
            select_engine(&request, &self.engine_status(), fast)
        };

        let capture = self.capture.lock().as_ref().and_then(Weak::upgrade);
        if let Some(capture) = capture.filter(|c| c.is_capturing()) {
            debug!(id = %request.id, "dispatch: stopping capture before speaking");
            capture.release_capture().await;
            if !self.is_current(epoch) {
                return;
            }
        }

        if let Err(e) = self.coordinator.request_mode(AudioMode::Speaking).await {
            warn!(id = %request.id, error = %e, "dispatch: speaking mode unavailable");
            let _ = self.events.send(SynthesisEvent::Failed {
                id: request.id,
                error: e.into(),
            });
            return;
        }
        {
            let mut st = self.state.lock();
            if st.epoch != epoch {
                return;
            }
            st.current = Some(SynthesisSession {
                request_id: request.id,
                engine,
                context: request.context,
                started: Instant::now(),
            });
        }
        self.speaking.send_replace(true);
        let _ = self.events.send(SynthesisEvent::Started {
            id: request.id,
            engine,
            context: request.context,
        });

        let mut result = self.play(epoch, engine, &request).await;
        let retry = match &result {
            Err(e) if !e.is_cancelled() && request.rendered.is_none() => {
                warn!(id = %request.id, engine = %engine, error = %e, "dispatch: engine failed, falling back");
                self.is_current(epoch)
            }
            _ => false,
        };
        if retry {
            result = self.play(epoch, engine.other(), &request).await;
        }

        {
            let mut st = self.state.lock();
            if st.epoch != epoch {
                // Already reported by stop_speaking.
                return;
            }
            st.current = None;
        }

        let event = match result {
            Ok((engine, latency, PlaybackOutcome::Finished)) => {
                debug!(id = %request.id, engine = %engine, latency_ms = latency.as_millis() as u64, "dispatch: finished");
                SynthesisEvent::Finished {
                    id: request.id,
                    engine,
                    latency,
                }
            }
            Ok((_, _, PlaybackOutcome::Cancelled)) | Err(TtsError::Cancelled) => {
                SynthesisEvent::Cancelled { id: request.id }
            }
            Err(error) => {
                warn!(id = %request.id, error = %error, "dispatch: synthesis failed");
                SynthesisEvent::Failed {
                    id: request.id,
                    error,
                }
            }
        };
        let _ = self.events.send(event);
    }

    /// Plays a request on one engine and records the synthesis sample.
    /// Audio synthesized after a stop is discarded.
    ///
    /// Returns the engine used, its synthesis latency and how playback ended.
    async fn play(
        &self,
        epoch: u64,
        engine: Engine,
        request: &SpeechRequest,
    ) -> Result<(Engine, Duration, PlaybackOutcome), TtsError> {
        if let Some(audio) = &request.rendered {
            let outcome = self.engines.output.play(audio.clone()).await?;
            return Ok((engine, Duration::ZERO, outcome));
        }

        let profile = *self.profile.lock();
        let text = preprocess_text(&request.text, request.context);
        let started = Instant::now();

        let synthesized = match engine {
            Engine::Platform => self
                .engines
                .platform
                .speak(profile.utterance(&text, request.context, request.personality))
                .await
                .map(Rendered::Platform),
            Engine::OnDevice => {
                if self.engines.on_device.is_available() {
                    let params = profile.on_device_params(request.context, request.personality);
                    self.engines
                        .on_device
                        .synthesize(&text, &params)
                        .await
                        .map(Rendered::Buffer)
                } else {
                    Err(TtsError::EngineUnavailable(Engine::OnDevice))
                }
            }
        };
        let latency = started.elapsed();

        if !matches!(synthesized, Err(TtsError::Cancelled | TtsError::EngineUnavailable(_))) {
            let sample = self.monitor.record_synthesis(
                engine,
                latency,
                text.chars().count(),
                synthesized.is_ok(),
            );
            self.adapt(&sample).await;
        }

        let outcome = match synthesized? {
            Rendered::Platform(handle) => wait_playback(handle).await,
            Rendered::Buffer(audio) => {
                if !self.is_current(epoch) {
                    debug!(id = %request.id, "dispatch: stopped during synthesis, dropping audio");
                    return Err(TtsError::Cancelled);
                }
                self.engines.output.play(audio).await?
            }
        };
        Ok((engine, latency, outcome))
    }

    async fn adapt(&self, sample: &crate::PerformanceSample) {
        let adaptation = self.monitor.adaptation(sample);
        if adaptation.optimize_memory {
            debug!(pressure = sample.memory_pressure, "dispatch: optimizing model memory");
            self.engines.on_device.optimize_for_memory().await;
        }
        if adaptation.battery_saver {
            let mut profile = self.profile.lock();
            if !profile.battery_saver {
                info!(drain = sample.battery_drain_per_hour, "dispatch: battery saver enabled");
                profile.battery_saver = true;
            }
        }
    }
}

enum Rendered {
    Platform(crate::PlaybackHandle),
    Buffer(roadtrip_audio::AudioBuffer),
}
