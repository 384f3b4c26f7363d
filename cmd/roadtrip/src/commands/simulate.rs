//! Scripted trip simulation.

use std::time::{Duration, Instant};

use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use roadtrip_voice::session::{RouteChangeEvent, SessionSnapshot};
use roadtrip_voice::sim::{SimEngines, SimUtterance};
use roadtrip_voice::speech::AppLifecycle;
use roadtrip_voice::synth::{
    PerformanceReport, Poi, Priority, SynthesisEvent, VoiceContext, VoicePersonality,
};
use roadtrip_voice::{AssistantConfig, VoiceAssistant};

use super::{
    get_assistant_config, get_paths, load_request, output_result, print_info, print_verbose,
    print_warning,
};
use crate::Cli;

/// Longest wait for a listening session to pick up and finish an utterance.
const LISTEN_TIMEOUT: Duration = Duration::from_secs(15);

/// Pause after listening ends for the command action and confirmation.
const SETTLE: Duration = Duration::from_millis(400);

/// Run a scripted trip on simulated engines.
///
/// The scenario is a YAML or JSON file (-f, or a name resolved under
/// ~/.roadtrip/roadtrip/scenarios/). Without one, each --say phrase is
/// spoken in its own listening session. Prints a timeline of what the
/// assistant did.
#[derive(Args)]
pub struct SimulateCommand {
    /// Scenario name or file
    scenario: Option<String>,

    /// Phrase to say, one listening session each
    #[arg(long = "say")]
    say: Vec<String>,

    /// Start in destination mode
    #[arg(long)]
    destination: bool,

    /// Simulate a device without the on-device voice model
    #[arg(long)]
    no_on_device: bool,
}

/// A scripted trip.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Scenario {
    pub name: String,
    /// The on-device voice model is missing.
    pub no_on_device: bool,
    pub steps: Vec<Step>,
}

/// One scenario step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Step {
    /// Press the voice button and say a phrase.
    Listen { say: String },
    Wait { ms: u64 },
    Speak {
        text: String,
        #[serde(default)]
        priority: Priority,
    },
    /// Generate and play a POI announcement.
    Announce(Poi),
    Route(RouteChangeEvent),
    Vehicle { connected: bool },
    DestinationMode { enabled: bool },
    App { lifecycle: AppLifecycle },
    Personality { personality: VoicePersonality },
    StopSpeaking,
}

impl Scenario {
    /// One listening step per phrase.
    pub fn from_phrases(phrases: &[String], destination: bool, no_on_device: bool) -> Self {
        let mut steps = Vec::new();
        if destination {
            steps.push(Step::DestinationMode { enabled: true });
        }
        steps.extend(phrases.iter().map(|p| Step::Listen { say: p.clone() }));
        Self {
            name: "command line".to_string(),
            no_on_device,
            steps,
        }
    }
}

/// A timestamped entry of the simulation timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineEntry {
    pub at_ms: u64,
    pub source: &'static str,
    pub event: Value,
}

#[derive(Serialize)]
struct SimulationReport {
    scenario: String,
    timeline: Vec<TimelineEntry>,
    spoken: Vec<String>,
    final_mode: String,
    performance: PerformanceReport,
}

impl SimulateCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let scenario = self.scenario(cli)?;
        let config = get_assistant_config(cli)?;
        print_info(&format!(
            "Running scenario \"{}\" ({} steps)",
            scenario.name,
            scenario.steps.len()
        ));

        let report = simulate(&scenario, config).await?;
        output_result(cli, &report)
    }

    fn scenario(&self, cli: &Cli) -> anyhow::Result<Scenario> {
        let source = cli.input.clone().or_else(|| self.scenario.clone());
        match source {
            Some(name) => {
                let path = get_paths()?.scenario_path(&name);
                print_verbose(cli, &format!("Loading scenario: {}", path.display()));
                let mut scenario: Scenario = load_request(&path.to_string_lossy())?;
                if scenario.name.is_empty() {
                    scenario.name = name;
                }
                scenario.no_on_device |= self.no_on_device;
                Ok(scenario)
            }
            None => {
                if self.say.is_empty() {
                    anyhow::bail!("nothing to simulate, give a scenario or --say phrases");
                }
                Ok(Scenario::from_phrases(
                    &self.say,
                    self.destination,
                    self.no_on_device,
                ))
            }
        }
    }
}

async fn simulate(
    scenario: &Scenario,
    config: AssistantConfig,
) -> anyhow::Result<SimulationReport> {
    let sim = SimEngines::new(Vec::new());
    sim.on_device.set_available(!scenario.no_on_device);
    let assistant = VoiceAssistant::new(sim.engines(), config);

    let started = Instant::now();
    let (tx, mut rx) = mpsc::unbounded_channel();
    let recorders = record(&assistant, started, tx.clone());

    for (i, step) in scenario.steps.iter().enumerate() {
        debug!(step = i + 1, ?step, "simulate: step");
        let note = |source: &'static str, event: Value| {
            let _ = tx.send(entry(started, source, event));
        };
        match step {
            Step::Listen { say } => {
                sim.asr.push(SimUtterance::phrase(say.clone()));
                listen(&assistant, &sim).await?;
            }
            Step::Wait { ms } => tokio::time::sleep(Duration::from_millis(*ms)).await,
            Step::Speak { text, priority } => {
                let id = assistant.speak(text.clone(), *priority, VoiceContext::General);
                note("speak", json!({ "id": id, "text": text }));
                wait_quiet(&assistant).await;
            }
            Step::Announce(poi) => match assistant.generate_poi_announcement(poi).await {
                Ok(announcement) => {
                    note(
                        "announce",
                        json!({
                            "poi": announcement.poi_name,
                            "duration_secs": announcement.duration_secs,
                            "attempts": announcement.attempts.len(),
                            "suboptimal": announcement.suboptimal,
                        }),
                    );
                    assistant.play_announcement(&announcement, Priority::Normal);
                    wait_quiet(&assistant).await;
                }
                Err(e) => {
                    print_warning(&format!("Announcement for {} failed: {}", poi.name, e));
                    note("announce", json!({ "poi": poi.name, "error": e.to_string() }));
                }
            },
            Step::Route(event) => {
                let outcome = assistant.handle_route_change(event).await;
                note("route", serde_json::to_value(outcome)?);
            }
            Step::Vehicle { connected } => {
                let outcome = if *connected {
                    assistant.vehicle_connected().await
                } else {
                    assistant.vehicle_disconnected().await
                };
                note("route", serde_json::to_value(outcome)?);
            }
            Step::DestinationMode { enabled } => {
                if *enabled {
                    assistant.enable_destination_mode();
                } else {
                    assistant.disable_destination_mode();
                }
            }
            Step::App { lifecycle } => assistant.set_app_lifecycle(*lifecycle),
            Step::Personality { personality } => assistant.configure_voice(*personality),
            Step::StopSpeaking => assistant.stop_speaking().await,
        }
    }

    assistant.shutdown().await;
    // Let the recorders drain what the shutdown produced.
    tokio::time::sleep(Duration::from_millis(50)).await;
    for handle in recorders {
        handle.abort();
    }
    drop(tx);

    let mut timeline = Vec::new();
    while let Ok(e) = rx.try_recv() {
        timeline.push(e);
    }
    timeline.sort_by_key(|e| e.at_ms);

    Ok(SimulationReport {
        scenario: scenario.name.clone(),
        timeline,
        spoken: sim.platform_tts.spoken(),
        final_mode: assistant.current_mode().to_string(),
        performance: assistant.performance_report(),
    })
}

/// Presses the voice button unless a session is already open, then waits
/// for the session that hears the queued phrase to end.
async fn listen(assistant: &VoiceAssistant, sim: &SimEngines) -> anyhow::Result<()> {
    let before = sim.asr.sessions();
    if !assistant.is_listening() {
        assistant.start_listening().await?;
    }

    let mut listening = assistant.subscribe_listening();
    let heard = async {
        // A session opened before the phrase was queued hears silence; the
        // phrase goes to the next one.
        while sim.asr.sessions() <= before {
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        let _ = listening.wait_for(|l| *l).await;
        let _ = listening.wait_for(|l| !*l).await;
    };
    if tokio::time::timeout(LISTEN_TIMEOUT, heard).await.is_err() {
        print_warning("Listening timed out");
        assistant.stop_listening().await;
    }

    tokio::time::sleep(SETTLE).await;
    wait_quiet(assistant).await;
    Ok(())
}

async fn wait_quiet(assistant: &VoiceAssistant) {
    let mut speaking = assistant.subscribe_speaking();
    // Give queued speech a moment to start.
    tokio::time::sleep(Duration::from_millis(20)).await;
    let _ = speaking.wait_for(|s| !*s).await;
    while assistant.dispatcher().queue_len() > 0 {
        let _ = speaking.changed().await;
        let _ = speaking.wait_for(|s| !*s).await;
    }
}

fn entry(started: Instant, source: &'static str, event: Value) -> TimelineEntry {
    TimelineEntry {
        at_ms: started.elapsed().as_millis() as u64,
        source,
        event,
    }
}

/// Spawns tasks copying assistant events into the timeline.
fn record(
    assistant: &VoiceAssistant,
    started: Instant,
    tx: mpsc::UnboundedSender<TimelineEntry>,
) -> Vec<JoinHandle<()>> {
    let mut handles = Vec::new();

    let mut events = assistant.subscribe_events();
    let events_tx = tx.clone();
    handles.push(tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            let value = serde_json::to_value(&event).unwrap_or(Value::Null);
            let _ = events_tx.send(entry(started, "voice", value));
        }
    }));

    let mut synthesis = assistant.subscribe_synthesis();
    let synthesis_tx = tx.clone();
    handles.push(tokio::spawn(async move {
        while let Ok(event) = synthesis.recv().await {
            let _ = synthesis_tx.send(entry(started, "synthesis", describe(&event)));
        }
    }));

    let mut session = assistant.subscribe_session();
    let session_tx = tx.clone();
    handles.push(tokio::spawn(async move {
        let mut last = None;
        while session.changed().await.is_ok() {
            let snapshot: SessionSnapshot = *session.borrow_and_update();
            if last == Some(snapshot.mode) {
                continue;
            }
            last = Some(snapshot.mode);
            let value = json!({
                "mode": snapshot.mode.to_string(),
                "recovering": snapshot.recovering,
            });
            let _ = session_tx.send(entry(started, "session", value));
        }
    }));

    let mut listening = assistant.subscribe_listening();
    handles.push(tokio::spawn(async move {
        while listening.changed().await.is_ok() {
            let value = json!({ "listening": *listening.borrow_and_update() });
            let _ = tx.send(entry(started, "capture", value));
        }
    }));

    handles
}

fn describe(event: &SynthesisEvent) -> Value {
    match event {
        SynthesisEvent::Started {
            id,
            engine,
            context,
        } => json!({ "type": "started", "id": id, "engine": engine, "context": context }),
        SynthesisEvent::Finished {
            id,
            engine,
            latency,
        } => json!({
            "type": "finished",
            "id": id,
            "engine": engine,
            "latency_ms": latency.as_millis() as u64,
        }),
        SynthesisEvent::Cancelled { id } => json!({ "type": "cancelled", "id": id }),
        SynthesisEvent::Failed { id, error } => {
            json!({ "type": "failed", "id": id, "error": error.to_string() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roadtrip_voice::session::{PortType, RouteChangeReason};
    use roadtrip_voice::synth::PoiCategory;
    use uuid::Uuid;

    #[test]
    fn test_parse_scenario() {
        let yaml = r#"
name: coast
steps:
  - type: destination_mode
    enabled: true
  - type: listen
    say: Cannon Beach
  - type: listen
    say: let's go
  - type: route
    reason: new_device
    outputs:
      - kind: car_audio
        name: CarPlay
  - type: speak
    text: Tillamook in ten miles
    priority: high
  - type: announce
    name: Haystack Rock
    category: beaches
  - type: wait
    ms: 500
  - type: stop_speaking
"#;
        let scenario: Scenario = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(scenario.name, "coast");
        assert!(!scenario.no_on_device);
        assert_eq!(scenario.steps.len(), 8);
        assert_eq!(
            scenario.steps[1],
            Step::Listen {
                say: "Cannon Beach".to_string()
            }
        );
        match &scenario.steps[3] {
            Step::Route(event) => {
                assert_eq!(event.reason, RouteChangeReason::NewDevice);
                assert_eq!(event.outputs[0].kind, PortType::CarAudio);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &scenario.steps[5] {
            Step::Announce(poi) => assert_eq!(poi.category, PoiCategory::Beaches),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(scenario.steps[7], Step::StopSpeaking);
    }

    #[test]
    fn test_from_phrases() {
        let phrases = vec!["Lost Lake".to_string(), "let's go".to_string()];
        let scenario = Scenario::from_phrases(&phrases, true, false);
        assert_eq!(scenario.steps.len(), 3);
        assert_eq!(scenario.steps[0], Step::DestinationMode { enabled: true });
    }

    #[test]
    fn test_describe_synthesis() {
        let value = describe(&SynthesisEvent::Cancelled { id: Uuid::nil() });
        assert_eq!(value["type"], "cancelled");
        assert_eq!(value["id"], Uuid::nil().to_string());
    }
}
