//! Typed event bus for voice interaction.

use crate::{CommandAction, NavigationAction};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// An event published by capture and transcript interpretation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VoiceEvent {
    /// A transcript that matched no command.
    UnhandledTranscript { text: String },
    /// The app should come to the foreground before acting on a command.
    BringToForeground,
    /// A command was recognized. Drives the button animation.
    CommandFeedback { action: CommandAction },
    /// The command to perform.
    CommandAction {
        action: CommandAction,
        original_text: String,
    },
    /// A destination was spoken in destination mode.
    DestinationSelected {
        destination: String,
        action: Option<NavigationAction>,
    },
    /// Capture stopped on an unrecoverable error.
    CaptureFailed { message: String },
}

/// Whether the app is in front of the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppLifecycle {
    #[default]
    Foreground,
    Background,
}

/// Broadcast bus of [`VoiceEvent`]s.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<VoiceEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event. Events without subscribers are dropped.
    pub fn publish(&self, event: VoiceEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<VoiceEvent> {
        self.tx.subscribe()
    }
}

#[cfg(test)]
mod event_tests {
    use super::*;

    #[test]
    fn test_publish_without_subscribers() {
        let bus = EventBus::default();
        bus.publish(VoiceEvent::BringToForeground);

        let mut rx = bus.subscribe();
        bus.publish(VoiceEvent::UnhandledTranscript {
            text: "hello".to_string(),
        });
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::UnhandledTranscript {
                text: "hello".to_string()
            }
        );
    }

    #[test]
    fn test_event_json() {
        let json = serde_json::to_value(VoiceEvent::DestinationSelected {
            destination: "Lost Lake".to_string(),
            action: Some(NavigationAction::Navigate),
        })
        .unwrap();
        assert_eq!(json["type"], "destination_selected");
        assert_eq!(json["action"], "navigate");
    }
}
