//! Hardware route-change handling.
//!
//! [`ConnectivityObserver`] turns route-change notifications into mode
//! requests on the [`AudioSessionCoordinator`]. Only genuine changes of the
//! "vehicle audio connected" state switch modes; generic route churn
//! re-applies the current mode.

use crate::{AudioMode, AudioSessionCoordinator};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Why the platform changed the audio route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteChangeReason {
    NewDevice,
    OldDeviceGone,
    ConfigChange,
    Other,
}

impl RouteChangeReason {
    /// Returns true if the change can produce audible artifacts mid-playback.
    pub fn is_disruptive(&self) -> bool {
        matches!(self, RouteChangeReason::NewDevice | RouteChangeReason::OldDeviceGone)
    }
}

/// Kind of an output port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PortType {
    BuiltInSpeaker,
    BuiltInReceiver,
    Headphones,
    BluetoothA2dp,
    BluetoothHfp,
    CarAudio,
    Usb,
    Other,
}

/// A current output of the audio route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputPort {
    pub kind: PortType,
    #[serde(default)]
    pub name: String,
}

impl OutputPort {
    pub fn new(kind: PortType, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }

    /// Returns true if this port leads to an in-vehicle head unit.
    pub fn is_vehicle(&self) -> bool {
        matches!(self.kind, PortType::CarAudio | PortType::BluetoothA2dp)
            || self.name.to_lowercase().contains("carplay")
    }
}

/// A route-change notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteChangeEvent {
    pub reason: RouteChangeReason,
    #[serde(default)]
    pub outputs: Vec<OutputPort>,
}

impl RouteChangeEvent {
    pub fn new(reason: RouteChangeReason, outputs: Vec<OutputPort>) -> Self {
        Self { reason, outputs }
    }

    /// Returns true if any current output is a vehicle route.
    pub fn has_vehicle_route(&self) -> bool {
        self.outputs.iter().any(OutputPort::is_vehicle)
    }
}

/// Playback that can be interrupted on a disruptive route change.
#[async_trait]
pub trait PlaybackControl: Send + Sync {
    /// Returns true while speech is playing.
    fn is_playing(&self) -> bool;

    /// Cancels playback and any queued speech.
    async fn cancel_playback(&self);
}

/// Microphone capture that must be released before speech plays.
#[async_trait]
pub trait CaptureControl: Send + Sync {
    /// Returns true while capture is starting or running.
    fn is_capturing(&self) -> bool;

    /// Stops capture and returns the session to background audio.
    async fn release_capture(&self);
}

/// What the observer did for one event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "action", content = "mode")]
pub enum RouteAction {
    /// Nothing to do.
    None,
    /// Switched to vehicle audio after a connect.
    SwitchedToVehicle,
    /// Restored the prior non-vehicle mode after a disconnect.
    Restored(AudioMode),
    /// Re-applied the current mode.
    Reasserted(AudioMode),
}

/// Outcome of handling a route-change event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RouteOutcome {
    pub vehicle_connected: bool,
    pub action: RouteAction,
    pub playback_cancelled: bool,
}

#[derive(Default)]
struct RouteState {
    vehicle_connected: bool,
    prior_mode: Option<AudioMode>,
}

/// Requests mode changes in response to hardware route changes.
pub struct ConnectivityObserver {
    coordinator: AudioSessionCoordinator,
    playback: Mutex<Option<Arc<dyn PlaybackControl>>>,
    state: Mutex<RouteState>,
    // Serializes event handling so transitions are evaluated in order.
    handling: tokio::sync::Mutex<()>,
}

impl ConnectivityObserver {
    /// Creates an observer for the given coordinator.
    pub fn new(coordinator: AudioSessionCoordinator) -> Self {
        Self {
            coordinator,
            playback: Mutex::new(None),
            state: Mutex::new(RouteState::default()),
            handling: tokio::sync::Mutex::new(()),
        }
    }

    /// Attaches the playback that is cancelled on disruptive changes.
    pub fn set_playback(&self, playback: Arc<dyn PlaybackControl>) {
        *self.playback.lock() = Some(playback);
    }

    /// Returns the last observed vehicle connection state.
    pub fn is_vehicle_connected(&self) -> bool {
        self.state.lock().vehicle_connected
    }

    /// Handles one route-change event.
    pub async fn handle(&self, event: &RouteChangeEvent) -> RouteOutcome {
        let _guard = self.handling.lock().await;
        debug!(reason = ?event.reason, outputs = event.outputs.len(), "route: change");

        let mut playback_cancelled = false;
        if event.reason.is_disruptive() {
            let playback = self.playback.lock().clone();
            if let Some(playback) = playback {
                if playback.is_playing() {
                    info!(reason = ?event.reason, "route: cancelling playback");
                    playback.cancel_playback().await;
                    playback_cancelled = true;
                }
            }
        }

        let connected = event.has_vehicle_route();
        let action = self.update(connected, Some(event.reason)).await;
        RouteOutcome {
            vehicle_connected: connected,
            action,
            playback_cancelled,
        }
    }

    /// Handles an explicit head-unit connect notification.
    pub async fn vehicle_connected(&self) -> RouteOutcome {
        let _guard = self.handling.lock().await;
        let action = self.update(true, None).await;
        RouteOutcome {
            vehicle_connected: true,
            action,
            playback_cancelled: false,
        }
    }

    /// Handles an explicit head-unit disconnect notification.
    pub async fn vehicle_disconnected(&self) -> RouteOutcome {
        let _guard = self.handling.lock().await;
        let action = self.update(false, None).await;
        RouteOutcome {
            vehicle_connected: false,
            action,
            playback_cancelled: false,
        }
    }

    async fn update(&self, connected: bool, reason: Option<RouteChangeReason>) -> RouteAction {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut state.vehicle_connected, connected)
        };
        self.coordinator.set_vehicle_route(connected);

        let current = self.coordinator.current_mode();

        if connected != previous {
            info!(connected, mode = %current, "route: vehicle connection changed");
            if !current.is_active() {
                return RouteAction::None;
            }
            if connected {
                if current != AudioMode::VehicleAudio {
                    self.state.lock().prior_mode = Some(current);
                }
                return match self.coordinator.request_mode(AudioMode::VehicleAudio).await {
                    Ok(_) => RouteAction::SwitchedToVehicle,
                    Err(e) => {
                        warn!(error = %e, "route: switching to vehicle audio failed");
                        RouteAction::None
                    }
                };
            }
            if current != AudioMode::VehicleAudio {
                return RouteAction::None;
            }
            let restore = self
                .state
                .lock()
                .prior_mode
                .take()
                .unwrap_or(AudioMode::BackgroundAudio);
            return match self.coordinator.request_mode(restore).await {
                Ok(ack) => RouteAction::Restored(ack.applied),
                Err(e) => {
                    warn!(mode = %restore, error = %e, "route: restoring mode failed");
                    RouteAction::None
                }
            };
        }

        let ambiguous = matches!(
            reason,
            Some(RouteChangeReason::ConfigChange) | Some(RouteChangeReason::Other)
        );
        if ambiguous && current.is_active() {
            return match self.coordinator.reassert_mode().await {
                Ok(ack) => RouteAction::Reasserted(ack.applied),
                Err(e) => {
                    warn!(mode = %current, error = %e, "route: reasserting mode failed");
                    RouteAction::None
                }
            };
        }
        RouteAction::None
    }

    /// Spawns a task that handles events from `rx` until it closes or
    /// `cancel` fires.
    pub fn spawn(
        self: Arc<Self>,
        mut rx: mpsc::Receiver<RouteChangeEvent>,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = rx.recv() => {
                        match event {
                            Some(event) => {
                                self.handle(&event).await;
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("route: observer stopped");
        })
    }
}
