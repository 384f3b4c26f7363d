//! The app-facing voice assistant.

use crate::{AssistantConfig, VoiceError};
use parking_lot::Mutex;
use roadtrip_session::{
    AudioMode, AudioPlatform, AudioSessionCoordinator, CaptureControl, ConnectivityObserver,
    RouteChangeEvent, RouteOutcome, SessionSnapshot,
};
use roadtrip_speech::{
    AppLifecycle, AsrEngine, AudioInput, EventBus, SpeechCaptureController, VoiceEvent,
};
use roadtrip_synth::{
    Announcement, AudioOutput, DeviceTelemetry, DurationTargetedSynthesizer, OnDeviceTts,
    PerformanceAlert, PerformanceMetrics, PerformanceMonitor, PerformanceReport, PlatformTts, Poi,
    Priority, SpeechRequest, SynthesisDispatcher, SynthesisEngines, SynthesisEvent, Variation,
    VoiceContext, VoicePersonality,
};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// External collaborators the assistant drives.
#[derive(Clone)]
pub struct AssistantEngines {
    pub platform: Arc<dyn AudioPlatform>,
    pub asr: Arc<dyn AsrEngine>,
    pub input: Arc<dyn AudioInput>,
    pub platform_tts: Arc<dyn PlatformTts>,
    pub on_device: Arc<dyn OnDeviceTts>,
    pub output: Arc<dyn AudioOutput>,
    pub telemetry: Arc<dyn DeviceTelemetry>,
}

/// Voice interaction for the navigation app.
///
/// Owns one audio session coordinator and wires capture, synthesis,
/// route observation and performance monitoring around it. Must be created
/// within a tokio runtime.
pub struct VoiceAssistant {
    coordinator: AudioSessionCoordinator,
    observer: Arc<ConnectivityObserver>,
    dispatcher: SynthesisDispatcher,
    capture: Arc<SpeechCaptureController>,
    podcast: DurationTargetedSynthesizer,
    monitor: Arc<PerformanceMonitor>,
    bus: EventBus,
    cancel: CancellationToken,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl VoiceAssistant {
    pub fn new(engines: AssistantEngines, config: AssistantConfig) -> Self {
        let coordinator = AudioSessionCoordinator::new(engines.platform, config.session);
        let monitor = Arc::new(PerformanceMonitor::new(engines.telemetry, config.monitor));
        let dispatcher = SynthesisDispatcher::new(
            coordinator.clone(),
            SynthesisEngines {
                platform: engines.platform_tts,
                on_device: engines.on_device.clone(),
                output: engines.output,
            },
            monitor.clone(),
            config.dispatcher,
        );

        let observer = Arc::new(ConnectivityObserver::new(coordinator.clone()));
        observer.set_playback(Arc::new(dispatcher.clone()));

        let bus = EventBus::new(config.event_capacity);
        let capture = Arc::new(SpeechCaptureController::new(
            engines.asr,
            engines.input,
            coordinator.clone(),
            Arc::new(dispatcher.clone()),
            bus.clone(),
            config.capture,
        ));
        let control: Weak<dyn CaptureControl> = Arc::<SpeechCaptureController>::downgrade(&capture);
        dispatcher.set_capture(control);
        let podcast = DurationTargetedSynthesizer::new(engines.on_device, config.podcast);

        let cancel = CancellationToken::new();
        let ticker = monitor.clone().spawn(cancel.child_token());

        Self {
            coordinator,
            observer,
            dispatcher,
            capture,
            podcast,
            monitor,
            bus,
            cancel,
            tasks: Mutex::new(vec![ticker]),
        }
    }

    // ------------------------------------------------------------------
    // Speech output
    // ------------------------------------------------------------------

    /// Queues text for speaking. Capture is stopped before it plays.
    pub fn speak(&self, text: impl Into<String>, priority: Priority, context: VoiceContext) -> Uuid {
        self.dispatcher.speak(text, priority, context)
    }

    /// Cancels speech and clears the queue.
    pub async fn stop_speaking(&self) {
        self.dispatcher.stop_speaking().await;
    }

    pub fn configure_voice(&self, personality: VoicePersonality) {
        info!(personality = %personality, "assistant: voice configured");
        self.dispatcher.configure_voice(personality);
    }

    /// Generates a duration-targeted announcement for a POI.
    pub async fn generate_poi_announcement(&self, poi: &Poi) -> Result<Announcement, VoiceError> {
        Ok(self.podcast.generate(poi).await?)
    }

    /// Renders the announcement in every preset style.
    pub async fn generate_variations(&self, poi: &Poi) -> Vec<Variation> {
        self.podcast.generate_variations(poi).await
    }

    /// Queues a generated announcement for playback.
    pub fn play_announcement(&self, announcement: &Announcement, priority: Priority) -> Uuid {
        self.dispatcher.enqueue(SpeechRequest::prerendered(
            announcement.audio.clone(),
            announcement.script.clone(),
            priority,
            VoiceContext::PoiAnnouncement,
        ))
    }

    // ------------------------------------------------------------------
    // Speech input
    // ------------------------------------------------------------------

    /// Starts listening. Any speech in progress is stopped first.
    pub async fn start_listening(&self) -> Result<(), VoiceError> {
        if self.dispatcher.is_speaking() || self.dispatcher.queue_len() > 0 {
            debug!("assistant: stopping speech before listening");
            self.dispatcher.stop_speaking().await;
        }
        self.capture.start_capture().await?;
        Ok(())
    }

    pub async fn stop_listening(&self) {
        self.capture.stop_capture().await;
    }

    /// Voice button: stop if listening, start otherwise.
    pub async fn toggle_listening(&self) -> Result<(), VoiceError> {
        if self.capture.is_listening() {
            self.capture.stop_capture().await;
            Ok(())
        } else {
            self.start_listening().await
        }
    }

    pub fn enable_destination_mode(&self) {
        self.capture.enable_destination_mode();
    }

    pub fn disable_destination_mode(&self) {
        self.capture.disable_destination_mode();
    }

    pub fn set_app_lifecycle(&self, lifecycle: AppLifecycle) {
        self.capture.set_app_lifecycle(lifecycle);
    }

    // ------------------------------------------------------------------
    // Audio routes
    // ------------------------------------------------------------------

    pub async fn handle_route_change(&self, event: &RouteChangeEvent) -> RouteOutcome {
        self.observer.handle(event).await
    }

    /// The vehicle head unit connected.
    pub async fn vehicle_connected(&self) -> RouteOutcome {
        self.observer.vehicle_connected().await
    }

    pub async fn vehicle_disconnected(&self) -> RouteOutcome {
        self.observer.vehicle_disconnected().await
    }

    /// Feeds route changes from `rx` until it closes or the assistant shuts
    /// down.
    pub fn attach_route_feed(&self, rx: mpsc::Receiver<RouteChangeEvent>) {
        let handle = self.observer.clone().spawn(rx, self.cancel.child_token());
        self.tasks.lock().push(handle);
    }

    // ------------------------------------------------------------------
    // State
    // ------------------------------------------------------------------

    pub fn is_listening(&self) -> bool {
        self.capture.is_listening()
    }

    pub fn is_speaking(&self) -> bool {
        self.dispatcher.is_speaking()
    }

    pub fn recognized_text(&self) -> String {
        self.capture.recognized_text()
    }

    pub fn current_mode(&self) -> AudioMode {
        self.coordinator.current_mode()
    }

    pub fn performance_metrics(&self) -> PerformanceMetrics {
        self.monitor.metrics()
    }

    pub fn performance_report(&self) -> PerformanceReport {
        self.monitor.report()
    }

    pub fn subscribe_listening(&self) -> watch::Receiver<bool> {
        self.capture.subscribe_listening()
    }

    pub fn subscribe_speaking(&self) -> watch::Receiver<bool> {
        self.dispatcher.subscribe_speaking()
    }

    pub fn subscribe_recognized_text(&self) -> watch::Receiver<String> {
        self.capture.subscribe_recognized_text()
    }

    pub fn subscribe_voice_detected(&self) -> watch::Receiver<bool> {
        self.capture.subscribe_voice_detected()
    }

    /// Audio session mode and stability.
    pub fn subscribe_session(&self) -> watch::Receiver<SessionSnapshot> {
        self.coordinator.subscribe()
    }

    pub fn subscribe_metrics(&self) -> watch::Receiver<PerformanceMetrics> {
        self.monitor.subscribe_metrics()
    }

    pub fn subscribe_alerts(&self) -> broadcast::Receiver<PerformanceAlert> {
        self.monitor.subscribe_alerts()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<VoiceEvent> {
        self.bus.subscribe()
    }

    pub fn subscribe_synthesis(&self) -> broadcast::Receiver<SynthesisEvent> {
        self.dispatcher.subscribe_events()
    }

    pub fn coordinator(&self) -> &AudioSessionCoordinator {
        &self.coordinator
    }

    pub fn dispatcher(&self) -> &SynthesisDispatcher {
        &self.dispatcher
    }

    pub fn capture(&self) -> &SpeechCaptureController {
        &self.capture
    }

    pub fn podcast(&self) -> &DurationTargetedSynthesizer {
        &self.podcast
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Stops capture and speech, then releases the audio session.
    pub async fn shutdown(&self) {
        info!("assistant: shutting down");
        self.capture.stop_capture().await;
        self.dispatcher.stop_speaking().await;
        if let Err(e) = self.coordinator.request_mode(AudioMode::Inactive).await {
            debug!(error = %e, "assistant: failed to deactivate session");
        }
        self.cancel.cancel();
        for handle in self.tasks.lock().drain(..) {
            handle.abort();
        }
        self.coordinator.close();
    }
}

impl Drop for VoiceAssistant {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.coordinator.close();
    }
}
