//! Destination mode: free-form destination names with an optional
//! navigation action.

use crate::{EventBus, VoiceEvent};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Single words that trigger navigation before or after a destination.
const ACTION_KEYWORDS: [&str; 8] = [
    "start", "go", "discover", "view", "navigate", "explore", "show", "begin",
];

/// Phrases followed by a destination.
const NAVIGATION_PHRASES: [&str; 6] = [
    "navigate to",
    "go to",
    "drive to",
    "take me to",
    "start trip to",
    "begin trip to",
];

/// Utterances that confirm a destination given earlier.
const STANDALONE_COMMANDS: [&str; 8] = [
    "go",
    "let's go",
    "start",
    "navigate",
    "begin",
    "start trip",
    "take me there",
    "drive",
];

/// What to do with a selected destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavigationAction {
    Navigate,
}

/// A parsed destination utterance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DestinationParse {
    pub destination: String,
    pub action: Option<NavigationAction>,
}

impl DestinationParse {
    fn navigate(destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            action: Some(NavigationAction::Navigate),
        }
    }
}

fn strip_sentence_end(text: &str) -> &str {
    text.trim()
        .trim_end_matches(['.', '!', '?'])
        .trim_end()
}

fn clean(text: &str) -> &str {
    text.trim().trim_matches(',').trim()
}

fn is_standalone(lower: &str) -> bool {
    STANDALONE_COMMANDS
        .iter()
        .any(|c| lower == *c || lower == c.replace(' ', ""))
}

/// Finds `phrase` in `lower` where it starts a word.
fn find_phrase(lower: &str, phrase: &str) -> Option<usize> {
    lower.match_indices(phrase).map(|(i, _)| i).find(|&i| {
        lower[..i]
            .chars()
            .next_back()
            .is_none_or(|c| !c.is_alphanumeric())
    })
}

/// Splits a transcript into a destination and an optional action.
///
/// Rules, first match wins:
/// 1. a navigation phrase ("take me to Lost Lake") yields the text after it;
/// 2. a leading action keyword ("go Lost Lake") yields the remainder;
/// 3. a standalone command ("let's go") confirms `accumulated`;
/// 4. a trailing keyword ("Lost Lake, go") yields the text before it;
/// 5. anything else is a destination without action.
///
/// Returns `None` when no destination can be extracted.
pub fn parse_destination(text: &str, accumulated: Option<&str>) -> Option<DestinationParse> {
    let trimmed = strip_sentence_end(text);
    if trimmed.is_empty() {
        return None;
    }
    // ASCII lowering keeps byte offsets aligned with `trimmed`.
    let lower = trimmed.to_ascii_lowercase();

    for phrase in NAVIGATION_PHRASES {
        if let Some(i) = find_phrase(&lower, phrase) {
            let destination = clean(&trimmed[i + phrase.len()..]);
            if !destination.is_empty() {
                return Some(DestinationParse::navigate(destination));
            }
        }
    }

    let standalone = is_standalone(&lower);

    if !standalone {
        for keyword in ACTION_KEYWORDS {
            let prefix = format!("{keyword} ");
            if lower.starts_with(&prefix) {
                let destination = clean(&trimmed[prefix.len()..]);
                if !destination.is_empty() {
                    return Some(DestinationParse::navigate(destination));
                }
            }
        }
    }

    if standalone {
        let destination = accumulated.map(clean).filter(|d| !d.is_empty())?;
        return Some(DestinationParse::navigate(destination));
    }

    for keyword in ACTION_KEYWORDS {
        for suffix in [format!(", {keyword}"), format!(" {keyword}"), format!(",{keyword}")] {
            if lower.ends_with(&suffix) {
                let destination = clean(&trimmed[..trimmed.len() - suffix.len()]);
                if !destination.is_empty() {
                    return Some(DestinationParse::navigate(destination));
                }
            }
        }
    }

    let destination = clean(trimmed);
    if destination.is_empty() {
        return None;
    }
    Some(DestinationParse {
        destination: destination.to_string(),
        action: None,
    })
}

/// Destination mode state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DestinationCaptureState {
    pub active: bool,
    /// Last destination heard without an action.
    pub accumulated: Option<String>,
}

/// Result of feeding a transcript to the parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationOutcome {
    /// Destination mode is off, or nothing usable was said.
    Ignored,
    /// A destination with an action. Destination mode has exited.
    Selected(DestinationParse),
    /// A destination without an action. Destination mode stays on.
    Pending(DestinationParse),
}

/// Interprets transcripts while the user is choosing a destination.
pub struct DestinationModeParser {
    bus: EventBus,
    state: Mutex<DestinationCaptureState>,
}

impl DestinationModeParser {
    pub fn new(bus: EventBus) -> Self {
        Self {
            bus,
            state: Mutex::new(DestinationCaptureState::default()),
        }
    }

    pub fn enable(&self) {
        let mut st = self.state.lock();
        st.active = true;
        st.accumulated = None;
        info!("destination: mode enabled");
    }

    pub fn disable(&self) {
        let mut st = self.state.lock();
        if st.active {
            info!("destination: mode disabled");
        }
        *st = DestinationCaptureState::default();
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    pub fn state(&self) -> DestinationCaptureState {
        self.state.lock().clone()
    }

    /// Handles a final transcript.
    ///
    /// Every extracted destination is published as
    /// [`VoiceEvent::DestinationSelected`].
    pub fn handle_transcript(&self, text: &str) -> DestinationOutcome {
        let parsed = {
            let mut st = self.state.lock();
            if !st.active {
                return DestinationOutcome::Ignored;
            }
            let Some(parsed) = parse_destination(text, st.accumulated.as_deref()) else {
                debug!(text, "destination: nothing to select");
                return DestinationOutcome::Ignored;
            };
            if parsed.action.is_some() {
                *st = DestinationCaptureState::default();
            } else {
                st.accumulated = Some(parsed.destination.clone());
            }
            parsed
        };

        info!(
            destination = %parsed.destination,
            action = ?parsed.action,
            "destination: selected"
        );
        self.bus.publish(VoiceEvent::DestinationSelected {
            destination: parsed.destination.clone(),
            action: parsed.action,
        });

        if parsed.action.is_some() {
            DestinationOutcome::Selected(parsed)
        } else {
            DestinationOutcome::Pending(parsed)
        }
    }
}

#[cfg(test)]
mod destination_tests {
    use super::*;

    fn parse(text: &str) -> Option<DestinationParse> {
        parse_destination(text, None)
    }

    fn navigate(destination: &str) -> Option<DestinationParse> {
        Some(DestinationParse::navigate(destination))
    }

    #[test]
    fn test_navigation_phrase() {
        assert_eq!(parse("Take me to Crater Lake"), navigate("Crater Lake"));
        assert_eq!(parse("please navigate to Multnomah Falls."), navigate("Multnomah Falls"));
        assert_eq!(parse("start trip to Bend"), navigate("Bend"));
    }

    #[test]
    fn test_phrase_must_start_a_word() {
        // "chicago tower" contains "go to".
        assert_eq!(
            parse("Chicago Tower"),
            Some(DestinationParse {
                destination: "Chicago Tower".to_string(),
                action: None,
            })
        );
    }

    #[test]
    fn test_leading_keyword() {
        assert_eq!(parse("Explore Mount Hood"), navigate("Mount Hood"));
        assert_eq!(parse("show Cannon Beach"), navigate("Cannon Beach"));
    }

    #[test]
    fn test_trailing_keyword() {
        assert_eq!(parse("Lost Lake, Oregon, Go"), navigate("Lost Lake, Oregon"));
        assert_eq!(parse("Lost Lake, Oregon, Go!"), navigate("Lost Lake, Oregon"));
        assert_eq!(parse("Smith Rock,start"), navigate("Smith Rock"));
        assert_eq!(parse("Painted Hills navigate"), navigate("Painted Hills"));
    }

    #[test]
    fn test_destination_only() {
        assert_eq!(
            parse("Lost Lake, Oregon"),
            Some(DestinationParse {
                destination: "Lost Lake, Oregon".to_string(),
                action: None,
            })
        );
    }

    #[test]
    fn test_standalone_command() {
        assert_eq!(parse_destination("Let's go", Some("Lost Lake")), navigate("Lost Lake"));
        assert_eq!(parse_destination("StartTrip", Some("Lost Lake")), navigate("Lost Lake"));
        assert_eq!(parse_destination("start trip", Some("Bend")), navigate("Bend"));
        assert_eq!(parse_destination("take me there.", Some("Bend")), navigate("Bend"));
        assert_eq!(parse("go"), None);
    }

    #[test]
    fn test_empty() {
        assert_eq!(parse(""), None);
        assert_eq!(parse("  ?! "), None);
    }

    #[test]
    fn test_parser_state() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let parser = DestinationModeParser::new(bus);

        assert_eq!(parser.handle_transcript("Lost Lake"), DestinationOutcome::Ignored);

        parser.enable();
        let outcome = parser.handle_transcript("Lost Lake, Oregon");
        assert!(matches!(outcome, DestinationOutcome::Pending(_)));
        assert!(parser.is_active());
        assert_eq!(parser.state().accumulated.as_deref(), Some("Lost Lake, Oregon"));

        let outcome = parser.handle_transcript("let's go");
        assert_eq!(
            outcome,
            DestinationOutcome::Selected(DestinationParse::navigate("Lost Lake, Oregon"))
        );
        assert!(!parser.is_active());

        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::DestinationSelected {
                destination: "Lost Lake, Oregon".to_string(),
                action: None,
            }
        );
        assert_eq!(
            rx.try_recv().unwrap(),
            VoiceEvent::DestinationSelected {
                destination: "Lost Lake, Oregon".to_string(),
                action: Some(NavigationAction::Navigate),
            }
        );
    }
}
