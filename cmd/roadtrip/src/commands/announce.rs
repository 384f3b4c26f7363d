//! POI announcement commands.

use clap::Args;
use serde::Serialize;

use roadtrip_voice::VoiceAssistant;
use roadtrip_voice::sim::SimEngines;
use roadtrip_voice::synth::{
    Announcement, GenerationAttempt, Poi, PoiCategory, Variation, VoicePersonality,
};

use super::{get_assistant_config, load_request, output_result, print_verbose};
use crate::Cli;

/// Generate a POI announcement on the simulated on-device synthesizer.
///
/// The POI comes from the input file (-f) or from the flags. Synthesis is
/// retried at adjusted speeds and script lengths until the audio lands near
/// the target duration of the selected profile.
#[derive(Args)]
pub struct AnnounceCommand {
    /// POI name
    #[arg(long)]
    name: Option<String>,

    /// POI category (restaurants, parks, museums, ...)
    #[arg(long, default_value = "attractions")]
    category: String,

    /// Short description
    #[arg(long)]
    description: Option<String>,

    /// Also render every personality variation
    #[arg(long)]
    variations: bool,
}

#[derive(Serialize)]
struct AnnounceResult {
    poi: Poi,
    script: String,
    voice: String,
    duration_secs: f64,
    suboptimal: bool,
    attempts: Vec<GenerationAttempt>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    variations: Vec<VariationSummary>,
}

#[derive(Serialize)]
struct VariationSummary {
    id: String,
    personality: VoicePersonality,
    script: String,
    voice: String,
    duration_secs: f64,
}

impl From<&Variation> for VariationSummary {
    fn from(v: &Variation) -> Self {
        Self {
            id: v.id.clone(),
            personality: v.personality,
            script: v.script.clone(),
            voice: v.voice.to_string(),
            duration_secs: v.duration_secs,
        }
    }
}

impl AnnounceCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let poi = self.poi(cli)?;
        let config = get_assistant_config(cli)?;
        print_verbose(
            cli,
            &format!(
                "Target: {:.1}s +/- {:.1}s",
                config.podcast.target_secs, config.podcast.tolerance_secs
            ),
        );

        let sim = SimEngines::new(Vec::new());
        let assistant = VoiceAssistant::new(sim.engines(), config);

        let announcement = assistant.generate_poi_announcement(&poi).await?;
        let variations = if self.variations {
            assistant.generate_variations(&poi).await
        } else {
            Vec::new()
        };
        assistant.shutdown().await;

        output_result(cli, &summarize(poi, announcement, &variations))
    }

    fn poi(&self, cli: &Cli) -> anyhow::Result<Poi> {
        if let Some(path) = cli.input.as_deref() {
            return load_request(path);
        }
        let name = self
            .name
            .as_deref()
            .ok_or_else(|| anyhow::anyhow!("--name or an input file (-f) is required"))?;
        let mut poi = Poi::new(name, PoiCategory::from_str(&self.category));
        if let Some(description) = &self.description {
            poi = poi.with_description(description.clone());
        }
        Ok(poi)
    }
}

fn summarize(poi: Poi, announcement: Announcement, variations: &[Variation]) -> AnnounceResult {
    AnnounceResult {
        poi,
        script: announcement.script,
        voice: announcement.voice.to_string(),
        duration_secs: announcement.duration_secs,
        suboptimal: announcement.suboptimal,
        attempts: announcement.attempts,
        variations: variations.iter().map(VariationSummary::from).collect(),
    }
}
