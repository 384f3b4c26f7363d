//! Integration tests for the session crate.

use super::*;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Implementations
// ============================================================================

#[derive(Default)]
struct MockPlatform {
    applied: Mutex<Vec<SessionConfig>>,
    deactivations: AtomicUsize,
    activations: AtomicUsize,
    failures: AtomicUsize,
    delay: Duration,
    hang: AtomicBool,
}

impl MockPlatform {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Default::default()
        })
    }

    fn fail_next(&self, n: usize) {
        self.failures.store(n, Ordering::SeqCst);
    }

    fn applied_modes(&self) -> Vec<AudioMode> {
        self.applied.lock().iter().map(mode_of).collect()
    }
}

fn mode_of(cfg: &SessionConfig) -> AudioMode {
    [
        AudioMode::Inactive,
        AudioMode::Listening,
        AudioMode::Speaking,
        AudioMode::VehicleAudio,
        AudioMode::BackgroundAudio,
    ]
    .into_iter()
    .find(|m| &m.session_config() == cfg)
    .unwrap()
}

#[async_trait]
impl AudioPlatform for MockPlatform {
    async fn deactivate(&self) -> Result<(), AudioError> {
        self.deactivations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn set_category(&self, config: &SessionConfig) -> Result<(), AudioError> {
        if self.hang.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_secs(60)).await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let failing = self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(AudioError::HardwareConfig("category rejected".to_string()));
        }
        self.applied.lock().push(config.clone());
        Ok(())
    }

    async fn activate(&self, _notify_others: bool) -> Result<(), AudioError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
struct MockPlayback {
    playing: AtomicBool,
    cancels: AtomicUsize,
}

#[async_trait]
impl PlaybackControl for MockPlayback {
    fn is_playing(&self) -> bool {
        self.playing.load(Ordering::SeqCst)
    }

    async fn cancel_playback(&self) {
        self.playing.store(false, Ordering::SeqCst);
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}

fn coordinator(platform: Arc<MockPlatform>) -> AudioSessionCoordinator {
    AudioSessionCoordinator::new(platform, CoordinatorConfig::default())
}

fn car_event(reason: RouteChangeReason) -> RouteChangeEvent {
    RouteChangeEvent::new(reason, vec![OutputPort::new(PortType::CarAudio, "Head Unit")])
}

fn speaker_event(reason: RouteChangeReason) -> RouteChangeEvent {
    RouteChangeEvent::new(
        reason,
        vec![OutputPort::new(PortType::BuiltInSpeaker, "Speaker")],
    )
}

// ============================================================================
// Coordinator
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_request_mode_applies() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    let ack = coord.request_mode(AudioMode::Listening).await.unwrap();
    assert_eq!(ack.requested, AudioMode::Listening);
    assert_eq!(ack.applied, AudioMode::Listening);
    assert!(ack.changed);
    assert!(!ack.coalesced);

    assert_eq!(coord.current_mode(), AudioMode::Listening);
    assert!(coord.is_stable());
    assert_eq!(platform.applied_modes(), vec![AudioMode::Listening]);
    assert_eq!(platform.activations.load(Ordering::SeqCst), 1);
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_unchanged_mode_is_noop() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    coord.request_mode(AudioMode::Speaking).await.unwrap();
    let ack = coord.request_mode(AudioMode::Speaking).await.unwrap();
    assert!(!ack.changed);
    assert_eq!(platform.applied_modes().len(), 1);
    assert_eq!(coord.transitions_applied(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_switch_deactivates_previous() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    coord.request_mode(AudioMode::Listening).await.unwrap();
    coord.request_mode(AudioMode::Speaking).await.unwrap();
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
    assert_eq!(
        platform.applied_modes(),
        vec![AudioMode::Listening, AudioMode::Speaking]
    );
}

#[tokio::test(start_paused = true)]
async fn test_inactive_is_not_activated() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    coord.request_mode(AudioMode::BackgroundAudio).await.unwrap();
    coord.request_mode(AudioMode::Inactive).await.unwrap();
    assert_eq!(coord.current_mode(), AudioMode::Inactive);
    assert_eq!(platform.activations.load(Ordering::SeqCst), 1);
    assert_eq!(platform.deactivations.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_coalescing_before_worker_runs() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    let (a, b, c) = tokio::join!(
        coord.request_mode(AudioMode::Listening),
        coord.request_mode(AudioMode::Speaking),
        coord.request_mode(AudioMode::BackgroundAudio),
    );
    let (a, b, c) = (a.unwrap(), b.unwrap(), c.unwrap());

    assert_eq!(coord.current_mode(), AudioMode::BackgroundAudio);
    assert_eq!(platform.applied_modes(), vec![AudioMode::BackgroundAudio]);

    assert_eq!(a.requested, AudioMode::Listening);
    assert_eq!(a.applied, AudioMode::BackgroundAudio);
    assert!(a.coalesced);
    assert!(b.coalesced);
    assert!(!c.coalesced);
}

#[tokio::test(start_paused = true)]
async fn test_coalescing_at_most_one_intermediate() {
    let platform = MockPlatform::with_delay(Duration::from_millis(50));
    let coord = coordinator(platform.clone());

    let first = {
        let coord = coord.clone();
        tokio::spawn(async move { coord.request_mode(AudioMode::Listening).await })
    };
    // Let the worker pick up the first request.
    tokio::time::sleep(Duration::from_millis(10)).await;

    let (b, c) = tokio::join!(
        coord.request_mode(AudioMode::Speaking),
        coord.request_mode(AudioMode::BackgroundAudio),
    );
    let a = first.await.unwrap().unwrap();
    let b = b.unwrap();
    let c = c.unwrap();

    assert_eq!(a.applied, AudioMode::Listening);
    assert!(!a.coalesced);
    assert_eq!(b.applied, AudioMode::BackgroundAudio);
    assert!(b.coalesced);
    assert!(!c.coalesced);

    assert_eq!(
        platform.applied_modes(),
        vec![AudioMode::Listening, AudioMode::BackgroundAudio]
    );
    assert_eq!(coord.current_mode(), AudioMode::BackgroundAudio);
}

#[tokio::test(start_paused = true)]
async fn test_vehicle_requires_route() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    let err = coord.request_mode(AudioMode::VehicleAudio).await.unwrap_err();
    assert_eq!(err, AudioError::RouteUnavailable);
    assert!(platform.applied_modes().is_empty());

    coord.set_vehicle_route(true);
    let ack = coord.request_mode(AudioMode::VehicleAudio).await.unwrap();
    assert_eq!(ack.applied, AudioMode::VehicleAudio);
}

#[tokio::test(start_paused = true)]
async fn test_failure_schedules_recovery() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    platform.fail_next(1);

    let err = coord.request_mode(AudioMode::Listening).await.unwrap_err();
    assert!(matches!(err, AudioError::HardwareConfig(_)));
    let snap = coord.snapshot();
    assert!(!snap.stable);
    assert!(snap.recovering);

    tokio::time::sleep(Duration::from_millis(1200)).await;

    let snap = coord.snapshot();
    assert_eq!(snap.mode, AudioMode::Inactive);
    assert!(snap.stable);
    assert!(!snap.recovering);
    assert!(!snap.recovery_failed);
    assert_eq!(platform.applied_modes(), vec![AudioMode::Inactive]);
}

#[tokio::test(start_paused = true)]
async fn test_recovery_exhausted_is_surfaced() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    platform.fail_next(100);

    assert!(coord.request_mode(AudioMode::Speaking).await.is_err());
    tokio::time::sleep(Duration::from_secs(3)).await;

    let snap = coord.snapshot();
    assert!(snap.recovery_failed);
    assert!(!snap.recovering);
    assert!(!snap.stable);

    // A later successful transition clears the failure.
    platform.fail_next(0);
    coord.request_mode(AudioMode::Speaking).await.unwrap();
    let snap = coord.snapshot();
    assert!(snap.stable);
    assert!(!snap.recovery_failed);
}

#[tokio::test(start_paused = true)]
async fn test_platform_timeout() {
    let platform = MockPlatform::new();
    platform.hang.store(true, Ordering::SeqCst);
    let coord = coordinator(platform.clone());

    let err = coord.request_mode(AudioMode::Listening).await.unwrap_err();
    assert_eq!(err, AudioError::Timeout("set_category"));
    assert!(!coord.is_stable());
}

#[tokio::test(start_paused = true)]
async fn test_reassert_reapplies() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());

    coord.request_mode(AudioMode::Listening).await.unwrap();
    let ack = coord.reassert_mode().await.unwrap();
    assert!(ack.changed);
    assert_eq!(
        platform.applied_modes(),
        vec![AudioMode::Listening, AudioMode::Listening]
    );
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_observes_modes() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform);
    let mut rx = coord.subscribe();

    coord.request_mode(AudioMode::Speaking).await.unwrap();
    rx.wait_for(|s| s.mode == AudioMode::Speaking && s.stable)
        .await
        .unwrap();
    assert_eq!(rx.borrow().mode, AudioMode::Speaking);
}

#[tokio::test(start_paused = true)]
async fn test_close() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform);

    coord.close();
    assert!(coord.is_closed());
    let err = coord.request_mode(AudioMode::Listening).await.unwrap_err();
    assert_eq!(err, AudioError::Closed);
}

// ============================================================================
// Connectivity Observer
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_vehicle_connect_and_restore() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    let observer = ConnectivityObserver::new(coord.clone());

    coord.request_mode(AudioMode::Speaking).await.unwrap();

    let outcome = observer.handle(&car_event(RouteChangeReason::NewDevice)).await;
    assert!(outcome.vehicle_connected);
    assert_eq!(outcome.action, RouteAction::SwitchedToVehicle);
    assert_eq!(coord.current_mode(), AudioMode::VehicleAudio);

    let outcome = observer
        .handle(&speaker_event(RouteChangeReason::OldDeviceGone))
        .await;
    assert!(!outcome.vehicle_connected);
    assert_eq!(outcome.action, RouteAction::Restored(AudioMode::Speaking));
    assert_eq!(coord.current_mode(), AudioMode::Speaking);
    assert!(!coord.vehicle_route_connected());
}

#[tokio::test(start_paused = true)]
async fn test_vehicle_connect_while_inactive() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    let observer = ConnectivityObserver::new(coord.clone());

    let outcome = observer.handle(&car_event(RouteChangeReason::NewDevice)).await;
    assert_eq!(outcome.action, RouteAction::None);
    assert_eq!(coord.current_mode(), AudioMode::Inactive);
    assert!(observer.is_vehicle_connected());
    assert!(coord.vehicle_route_connected());
    assert!(platform.applied_modes().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_repeated_connect_is_debounced() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    let observer = ConnectivityObserver::new(coord.clone());
    coord.request_mode(AudioMode::BackgroundAudio).await.unwrap();

    observer.handle(&car_event(RouteChangeReason::NewDevice)).await;
    let outcome = observer.handle(&car_event(RouteChangeReason::NewDevice)).await;
    assert_eq!(outcome.action, RouteAction::None);
    assert_eq!(
        platform.applied_modes(),
        vec![AudioMode::BackgroundAudio, AudioMode::VehicleAudio]
    );
}

#[tokio::test(start_paused = true)]
async fn test_config_change_reasserts() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform.clone());
    let observer = ConnectivityObserver::new(coord.clone());
    coord.request_mode(AudioMode::Listening).await.unwrap();

    let outcome = observer
        .handle(&speaker_event(RouteChangeReason::ConfigChange))
        .await;
    assert_eq!(outcome.action, RouteAction::Reasserted(AudioMode::Listening));
    assert_eq!(platform.applied_modes().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disruptive_change_cancels_playback() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform);
    let observer = ConnectivityObserver::new(coord.clone());
    let playback = Arc::new(MockPlayback::default());
    observer.set_playback(playback.clone());

    playback.playing.store(true, Ordering::SeqCst);
    let outcome = observer
        .handle(&speaker_event(RouteChangeReason::ConfigChange))
        .await;
    assert!(!outcome.playback_cancelled);

    let outcome = observer
        .handle(&speaker_event(RouteChangeReason::OldDeviceGone))
        .await;
    assert!(outcome.playback_cancelled);
    assert_eq!(playback.cancels.load(Ordering::SeqCst), 1);

    // Nothing playing, nothing cancelled.
    let outcome = observer
        .handle(&speaker_event(RouteChangeReason::NewDevice))
        .await;
    assert!(!outcome.playback_cancelled);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_vehicle_notifications() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform);
    let observer = ConnectivityObserver::new(coord.clone());
    coord.request_mode(AudioMode::Listening).await.unwrap();

    let outcome = observer.vehicle_connected().await;
    assert_eq!(outcome.action, RouteAction::SwitchedToVehicle);
    let outcome = observer.vehicle_disconnected().await;
    assert_eq!(outcome.action, RouteAction::Restored(AudioMode::Listening));
}

#[tokio::test(start_paused = true)]
async fn test_spawned_observer_handles_feed() {
    let platform = MockPlatform::new();
    let coord = coordinator(platform);
    let observer = Arc::new(ConnectivityObserver::new(coord.clone()));
    coord.request_mode(AudioMode::BackgroundAudio).await.unwrap();

    let (tx, rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let handle = observer.clone().spawn(rx, cancel.clone());

    tx.send(car_event(RouteChangeReason::NewDevice)).await.unwrap();
    let mut state = coord.subscribe();
    state
        .wait_for(|s| s.mode == AudioMode::VehicleAudio && s.stable)
        .await
        .unwrap();

    cancel.cancel();
    handle.await.unwrap();
}
