//! Voice command matching.

use crate::{AppLifecycle, EventBus, VoiceEvent};
use parking_lot::Mutex;
use roadtrip_synth::SynthesisDispatcher;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// A command the assistant understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandAction {
    Save,
    Like,
    Dislike,
    Next,
    Previous,
    Navigate,
    Call,
    Mute,
    Unmute,
    Back,
    Exit,
}

impl CommandAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommandAction::Save => "save",
            CommandAction::Like => "like",
            CommandAction::Dislike => "dislike",
            CommandAction::Next => "next",
            CommandAction::Previous => "previous",
            CommandAction::Navigate => "navigate",
            CommandAction::Call => "call",
            CommandAction::Mute => "mute",
            CommandAction::Unmute => "unmute",
            CommandAction::Back => "back",
            CommandAction::Exit => "exit",
        }
    }

    /// Spoken confirmation.
    pub fn confirmation(&self) -> &'static str {
        match self {
            CommandAction::Save => "Saving to favorites",
            CommandAction::Like => "Liked",
            CommandAction::Dislike => "Skipped",
            CommandAction::Next => "Next location",
            CommandAction::Previous => "Previous location",
            CommandAction::Navigate => "Getting directions",
            CommandAction::Call => "Calling location",
            CommandAction::Mute => "Microphone muted",
            CommandAction::Unmute => "Microphone active",
            CommandAction::Back => "Going back",
            CommandAction::Exit => "Exiting",
        }
    }
}

impl fmt::Display for CommandAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Command patterns in match order. Each entry lists the primary pattern
/// first, then synonyms.
pub const COMMAND_TABLE: &[(CommandAction, &[&str])] = &[
    (CommandAction::Save, &["save", "favorite", "bookmark", "remember"]),
    (CommandAction::Like, &["like", "love", "good", "great", "awesome"]),
    (
        CommandAction::Dislike,
        &["dislike", "skip", "bad", "not interested", "pass", "hate"],
    ),
    (CommandAction::Next, &["next", "forward", "continue", "move on"]),
    (CommandAction::Previous, &["previous", "last one", "before"]),
    (
        CommandAction::Navigate,
        &[
            "navigate",
            "directions",
            "go to",
            "take me to",
            "drive to",
            "start",
            "begin",
            "go",
        ],
    ),
    (CommandAction::Call, &["call", "phone", "contact", "dial"]),
    (CommandAction::Mute, &["mute", "silence", "quiet", "turn off mic"]),
    (
        CommandAction::Unmute,
        &["unmute", "activate mic", "turn on mic", "enable mic"],
    ),
    (CommandAction::Back, &["back", "go back", "return"]),
    (CommandAction::Exit, &["exit", "close", "stop"]),
];

/// Matches a transcript against [`COMMAND_TABLE`].
///
/// The transcript is lower-cased and trimmed; the first entry with a pattern
/// contained in it wins.
pub fn match_command(transcript: &str) -> Option<(CommandAction, &'static str)> {
    let text = transcript.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    COMMAND_TABLE.iter().find_map(|(action, patterns)| {
        patterns
            .iter()
            .find(|p| text.contains(*p))
            .map(|p| (*action, *p))
    })
}

/// Speaks command confirmations.
pub trait ConfirmationSpeaker: Send + Sync {
    fn confirm(&self, text: &str);
}

impl ConfirmationSpeaker for SynthesisDispatcher {
    fn confirm(&self, text: &str) {
        self.speak_command_feedback(text);
    }
}

/// Delays between a match and its follow-up signals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommandConfig {
    /// From the feedback event to the action event.
    pub action_delay_ms: u64,
    /// From the action event to the spoken confirmation.
    pub confirmation_delay_ms: u64,
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            action_delay_ms: 200,
            confirmation_delay_ms: 100,
        }
    }
}

/// Turns final transcripts into command events.
pub struct CommandInterpreter {
    bus: EventBus,
    speaker: Arc<dyn ConfirmationSpeaker>,
    lifecycle: Mutex<AppLifecycle>,
    config: CommandConfig,
}

impl CommandInterpreter {
    pub fn new(bus: EventBus, speaker: Arc<dyn ConfirmationSpeaker>, config: CommandConfig) -> Self {
        Self {
            bus,
            speaker,
            lifecycle: Mutex::new(AppLifecycle::Foreground),
            config,
        }
    }

    pub fn set_app_lifecycle(&self, lifecycle: AppLifecycle) {
        *self.lifecycle.lock() = lifecycle;
    }

    pub fn app_lifecycle(&self) -> AppLifecycle {
        *self.lifecycle.lock()
    }

    /// Interprets a final transcript.
    ///
    /// Publishes the feedback event right away; the action event and the
    /// spoken confirmation follow on a spawned task. Must be called within a
    /// tokio runtime.
    pub fn interpret(&self, transcript: &str) -> Option<CommandAction> {
        let Some((action, pattern)) = match_command(transcript) else {
            debug!(text = transcript, "command: no match");
            self.bus.publish(VoiceEvent::UnhandledTranscript {
                text: transcript.to_string(),
            });
            return None;
        };
        info!(action = %action, pattern, "command: matched");

        if self.app_lifecycle() == AppLifecycle::Background {
            self.bus.publish(VoiceEvent::BringToForeground);
        }
        self.bus.publish(VoiceEvent::CommandFeedback { action });

        let bus = self.bus.clone();
        let speaker = self.speaker.clone();
        let action_delay = Duration::from_millis(self.config.action_delay_ms);
        let confirmation_delay = Duration::from_millis(self.config.confirmation_delay_ms);
        let original_text = transcript.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(action_delay).await;
            bus.publish(VoiceEvent::CommandAction {
                action,
                original_text,
            });
            tokio::time::sleep(confirmation_delay).await;
            speaker.confirm(action.confirmation());
        });
        Some(action)
    }
}
