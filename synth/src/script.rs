//! Announcement scripts for points of interest.

use crate::{VoiceId, VoicePersonality};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Description used when a POI carries none.
pub const DEFAULT_DESCRIPTION: &str = "amazing experiences and activities";

/// Approximate speaking pace used to size scripts.
pub const WORDS_PER_SECOND: f64 = 3.0;

/// Kind of point of interest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum PoiCategory {
    Restaurants,
    #[default]
    Attractions,
    Parks,
    Shopping,
    Entertainment,
    Lodging,
    Museums,
    HistoricSites,
    Beaches,
    Wineries,
    GasStations,
    Viewpoints,
    Other,
}

impl PoiCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoiCategory::Restaurants => "restaurants",
            PoiCategory::Attractions => "attractions",
            PoiCategory::Parks => "parks",
            PoiCategory::Shopping => "shopping",
            PoiCategory::Entertainment => "entertainment",
            PoiCategory::Lodging => "lodging",
            PoiCategory::Museums => "museums",
            PoiCategory::HistoricSites => "historicsites",
            PoiCategory::Beaches => "beaches",
            PoiCategory::Wineries => "wineries",
            PoiCategory::GasStations => "gasstations",
            PoiCategory::Viewpoints => "viewpoints",
            PoiCategory::Other => "other",
        }
    }

    /// Parses a category name. Case, spaces, dashes and underscores are
    /// ignored; unknown names map to [`PoiCategory::Other`].
    pub fn from_str(s: &str) -> PoiCategory {
        let key: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "restaurants" | "restaurant" => PoiCategory::Restaurants,
            "attractions" | "attraction" => PoiCategory::Attractions,
            "parks" | "park" => PoiCategory::Parks,
            "shopping" => PoiCategory::Shopping,
            "entertainment" => PoiCategory::Entertainment,
            "lodging" => PoiCategory::Lodging,
            "museums" | "museum" => PoiCategory::Museums,
            "historicsites" | "historicsite" => PoiCategory::HistoricSites,
            "beaches" | "beach" => PoiCategory::Beaches,
            "wineries" | "winery" => PoiCategory::Wineries,
            "gasstations" | "gasstation" => PoiCategory::GasStations,
            "viewpoints" | "viewpoint" => PoiCategory::Viewpoints,
            _ => PoiCategory::Other,
        }
    }

    /// On-device voice used for announcements in this category.
    pub fn voice(&self) -> VoiceId {
        match self {
            PoiCategory::Restaurants => VoiceId::V2,
            PoiCategory::Attractions => VoiceId::V3,
            PoiCategory::Parks => VoiceId::V7,
            PoiCategory::Shopping => VoiceId::V0,
            PoiCategory::Entertainment => VoiceId::V3,
            PoiCategory::Lodging => VoiceId::V1,
            PoiCategory::Museums => VoiceId::V6,
            PoiCategory::HistoricSites => VoiceId::V5,
            PoiCategory::Beaches => VoiceId::V7,
            PoiCategory::Wineries => VoiceId::V3,
            PoiCategory::GasStations => VoiceId::V1,
            PoiCategory::Viewpoints => VoiceId::V7,
            PoiCategory::Other => VoiceId::V2,
        }
    }

    fn templates(&self) -> &'static [&'static str] {
        match self {
            PoiCategory::Restaurants => &RESTAURANT_TEMPLATES,
            PoiCategory::Parks => &PARK_TEMPLATES,
            _ => &ATTRACTION_TEMPLATES,
        }
    }
}

impl fmt::Display for PoiCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl From<PoiCategory> for String {
    fn from(c: PoiCategory) -> String {
        c.as_str().to_string()
    }
}

impl From<String> for PoiCategory {
    fn from(s: String) -> Self {
        PoiCategory::from_str(&s)
    }
}

const RESTAURANT_TEMPLATES: [&str; 3] = [
    "Discover {name}, a hidden culinary gem offering {description}. Perfect for food lovers seeking authentic flavors.",
    "Hungry? Try {name}! This local favorite serves {description} that'll make your taste buds dance.",
    "Pull over for {name}, where {description} meets incredible hospitality. A true roadside treasure.",
];

const ATTRACTION_TEMPLATES: [&str; 3] = [
    "Don't miss {name}! This amazing {description} offers unforgettable experiences for the whole family.",
    "Adventure awaits at {name}. Experience {description} that creates memories lasting a lifetime.",
    "Stop and explore {name}, featuring {description}. It's worth every minute of your detour.",
];

const PARK_TEMPLATES: [&str; 3] = [
    "Nature lovers, meet {name}! Enjoy {description} surrounded by breathtaking natural beauty.",
    "Escape to {name} for {description}. Connect with nature and recharge your adventure spirit.",
    "Discover {name}, where {description} creates the perfect outdoor adventure experience.",
];

const CLOSING_PHRASES: [&str; 4] = [
    "It's right along your route.",
    "Worth a quick stop.",
    "Plan a visit today.",
    "Enjoy the drive.",
];

/// A point of interest to announce.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Poi {
    pub name: String,
    pub category: PoiCategory,
    pub short_description: Option<String>,
    pub photos: Vec<String>,
    /// Distance from the vehicle in meters.
    pub distance_m: Option<f64>,
    pub operating_hours: Option<String>,
}

impl Poi {
    pub fn new(name: impl Into<String>, category: PoiCategory) -> Self {
        Self {
            name: name.into(),
            category,
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.short_description = Some(description.into());
        self
    }

    /// Returns the description, or [`DEFAULT_DESCRIPTION`].
    pub fn description(&self) -> &str {
        match self.short_description.as_deref() {
            Some(d) if !d.trim().is_empty() => d.trim(),
            _ => DEFAULT_DESCRIPTION,
        }
    }
}

/// Fills a template with the POI name and description.
fn fill(template: &str, poi: &Poi) -> String {
    template
        .replace("{name}", poi.name.trim())
        .replace("{description}", poi.description())
}

/// Builds the category script for a POI.
///
/// The template is picked from the POI name so the same POI always gets the
/// same script.
pub fn template_script(poi: &Poi) -> String {
    let templates = poi.category.templates();
    let hash = poi
        .name
        .bytes()
        .fold(0usize, |acc, b| acc.wrapping_mul(31).wrapping_add(b as usize));
    fill(templates[hash % templates.len()], poi)
}

/// Expands symbols and abbreviations the synthesizer reads poorly.
pub fn optimize_for_speech(script: &str) -> String {
    script
        .replace('&', "and")
        .replace("GPS", "G P S")
        .replace("POI", "point of interest")
        .replace("...", ".")
}

pub fn word_count(script: &str) -> usize {
    script.split_whitespace().count()
}

fn ends_sentence(s: &str) -> bool {
    s.ends_with('.') || s.ends_with('!') || s.ends_with('?')
}

/// Truncates a script to at most `target_words` words.
///
/// Scripts already within the limit are returned unchanged. Truncated scripts
/// hold exactly `target_words` words and end with sentence punctuation.
pub fn optimize_word_count(script: &str, target_words: usize) -> String {
    let words: Vec<&str> = script.split_whitespace().collect();
    if words.len() <= target_words {
        return script.to_string();
    }
    if target_words == 0 {
        return String::new();
    }

    let mut out = words[..target_words].join(" ");
    let trimmed = out.trim_end_matches([',', ';', ':', '-']).len();
    out.truncate(trimmed);
    if !ends_sentence(&out) {
        out.push('.');
    }
    out
}

/// Appends closing phrases until the script holds at least `target_words`
/// words.
pub fn pad_to_word_count(script: &str, target_words: usize) -> String {
    let mut out = script.trim().to_string();
    if !out.is_empty() && !ends_sentence(&out) {
        out.push('.');
    }
    let mut phrases = CLOSING_PHRASES.iter().cycle();
    while word_count(&out) < target_words {
        let Some(phrase) = phrases.next() else { break };
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(phrase);
    }
    out
}

/// Rescales a script by the ratio between the target and measured duration.
pub fn adjust_for_duration(script: &str, measured_secs: f64, target_secs: f64) -> String {
    if measured_secs <= 0.0 || target_secs <= 0.0 {
        return script.to_string();
    }
    let words = word_count(script);
    let target_words = ((words as f64) * (target_secs / measured_secs)).floor() as usize;
    let target_words = target_words.max(1);

    if target_words < words {
        optimize_word_count(script, target_words)
    } else if target_words > words {
        pad_to_word_count(script, target_words)
    } else {
        script.to_string()
    }
}

/// A styled alternative announcement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VariationPreset {
    pub personality: VoicePersonality,
    pub voice: VoiceId,
    pub speed: f32,
    pub pitch: f32,
    template: &'static str,
}

impl VariationPreset {
    pub fn script(&self, poi: &Poi) -> String {
        optimize_for_speech(&fill(self.template, poi))
    }
}

pub const VARIATION_PRESETS: [VariationPreset; 3] = [
    VariationPreset {
        personality: VoicePersonality::Enthusiastic,
        voice: VoiceId::V3,
        speed: 0.9,
        pitch: 0.2,
        template: "Amazing discovery! {name} offers incredible {description}. This is exactly what makes road trips special!",
    },
    VariationPreset {
        personality: VoicePersonality::Professional,
        voice: VoiceId::V1,
        speed: 0.85,
        pitch: 0.0,
        template: "Introducing {name}, featuring {description}. An excellent addition to your journey itinerary.",
    },
    VariationPreset {
        personality: VoicePersonality::Casual,
        voice: VoiceId::V4,
        speed: 0.95,
        pitch: 0.1,
        template: "Check out {name}! They've got {description} that's definitely worth a stop on your trip.",
    },
];

#[cfg(test)]
mod script_tests {
    use super::*;

    #[test]
    fn test_category_parse() {
        assert_eq!(PoiCategory::from_str("Restaurants"), PoiCategory::Restaurants);
        assert_eq!(PoiCategory::from_str("historic_sites"), PoiCategory::HistoricSites);
        assert_eq!(PoiCategory::from_str("Gas Station"), PoiCategory::GasStations);
        assert_eq!(PoiCategory::from_str("spaceport"), PoiCategory::Other);
    }

    #[test]
    fn test_category_voice() {
        assert_eq!(PoiCategory::Parks.voice(), VoiceId::V7);
        assert_eq!(PoiCategory::Museums.voice(), VoiceId::V6);
        assert_eq!(PoiCategory::Other.voice(), VoiceId::V2);
    }

    #[test]
    fn test_template_is_deterministic() {
        let poi = Poi::new("Lost Lake", PoiCategory::Parks).with_description("alpine trails");
        let a = template_script(&poi);
        assert_eq!(a, template_script(&poi));
        assert!(a.contains("Lost Lake"));
        assert!(a.contains("alpine trails"));
    }

    #[test]
    fn test_unknown_category_uses_attraction_templates() {
        let poi = Poi::new("Outlet Mall", PoiCategory::Shopping);
        let script = template_script(&poi);
        assert!(ATTRACTION_TEMPLATES.iter().any(|t| fill(t, &poi) == script));
        assert!(script.contains(DEFAULT_DESCRIPTION));
    }

    #[test]
    fn test_optimize_for_speech() {
        assert_eq!(
            optimize_for_speech("Fish & chips... near the POI by GPS"),
            "Fish and chips. near the point of interest by G P S"
        );
    }

    #[test]
    fn test_word_count_under_limit_unchanged() {
        let s = "A short, unpunctuated script";
        assert_eq!(optimize_word_count(s, 4), s);
        assert_eq!(optimize_word_count(s, 10), s);
    }

    #[test]
    fn test_word_count_truncates_with_punctuation() {
        let out = optimize_word_count("one two, three four five six", 3);
        assert_eq!(out, "one two, three.");
        assert_eq!(word_count(&out), 3);

        let out = optimize_word_count("Stop here! Then continue on", 2);
        assert_eq!(out, "Stop here!");

        let out = optimize_word_count("alpha, beta, gamma", 2);
        assert_eq!(out, "alpha, beta.");
    }

    #[test]
    fn test_word_count_zero_target() {
        assert_eq!(optimize_word_count("one two three", 0), "");
        assert_eq!(optimize_word_count("", 0), "");
    }

    #[test]
    fn test_pad_reaches_target() {
        let out = pad_to_word_count("Visit the lake", 12);
        assert!(word_count(&out) >= 12);
        assert!(out.starts_with("Visit the lake. "));
        assert!(ends_sentence(&out));
    }

    #[test]
    fn test_adjust_for_duration() {
        let script = "one two three four five six seven eight nine ten.";
        let shorter = adjust_for_duration(script, 10.0, 6.0);
        assert_eq!(word_count(&shorter), 6);
        assert!(ends_sentence(&shorter));

        let longer = adjust_for_duration(script, 3.0, 6.0);
        assert!(word_count(&longer) >= 20);

        assert_eq!(adjust_for_duration(script, 6.0, 6.0), script);
        assert_eq!(adjust_for_duration(script, 0.0, 6.0), script);
    }

    #[test]
    fn test_variation_scripts() {
        let poi = Poi::new("Pine Diner", PoiCategory::Restaurants).with_description("pancakes & pie");
        let scripts: Vec<String> = VARIATION_PRESETS.iter().map(|p| p.script(&poi)).collect();
        assert!(scripts[0].starts_with("Amazing discovery! Pine Diner"));
        assert!(scripts[1].contains("pancakes and pie"));
        assert_eq!(VARIATION_PRESETS[2].voice, VoiceId::V4);
    }

    #[test]
    fn test_poi_serde() {
        let poi: Poi = serde_json::from_str(
            r#"{"name":"Crater Lake","category":"Viewpoints","distance_m":1200.0}"#,
        )
        .unwrap();
        assert_eq!(poi.category, PoiCategory::Viewpoints);
        assert_eq!(poi.description(), DEFAULT_DESCRIPTION);
        assert_eq!(
            serde_json::to_value(&poi).unwrap()["category"],
            serde_json::json!("viewpoints")
        );
    }
}
