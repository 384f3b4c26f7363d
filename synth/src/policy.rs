//! Engine selection policy.

use crate::{AlertLevel, Engine, Priority, SpeechRequest, VoiceContext};
use std::time::Duration;

/// Latency below which the on-device model is preferred outright.
pub const FAST_ON_DEVICE_LATENCY: Duration = Duration::from_millis(200);

/// Inputs to [`select_engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineStatus {
    /// The on-device model is loaded.
    pub on_device_available: bool,
    /// Rolling average on-device latency; `None` before any sample.
    pub on_device_latency: Option<Duration>,
    /// Current performance alert level.
    pub alert_level: AlertLevel,
}

impl EngineStatus {
    /// The on-device model is usable and the device is not under critical
    /// performance pressure.
    pub fn on_device_ready(&self) -> bool {
        self.on_device_available && self.alert_level != AlertLevel::Critical
    }
}

/// Picks the engine for a request.
///
/// 1. Urgent requests and command feedback use the platform engine.
/// 2. A ready on-device model with low measured latency is preferred.
/// 3. Otherwise the context decides, falling back to the platform engine
///    when the on-device model is not ready.
pub fn select_engine(request: &SpeechRequest, status: &EngineStatus, fast: Duration) -> Engine {
    if request.priority == Priority::Urgent || request.context == VoiceContext::CommandFeedback {
        return Engine::Platform;
    }

    let ready = status.on_device_ready();
    let fast_enough = status.on_device_latency.is_none_or(|l| l < fast);
    if ready && fast_enough {
        return Engine::OnDevice;
    }

    // Announcements and general speech both prefer the on-device voice
    // when it is usable at all.
    if ready {
        Engine::OnDevice
    } else {
        Engine::Platform
    }
}
