//! Configuration management commands.

use clap::{Args, Subcommand};

use roadtrip_cli::Profile;
use roadtrip_voice::AssistantConfig;
use roadtrip_voice::synth::VoicePersonality;

use super::{get_config, get_paths, load_request, output_result, print_success};
use crate::Cli;

/// Manage CLI configuration.
///
/// Profiles hold named sets of assistant settings, e.g. one per vehicle.
///
/// Configuration is stored in ~/.roadtrip/roadtrip/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a profile
    ///
    /// Settings start from the input file (-f) when given, else from the
    /// defaults. Flags override individual values.
    #[command(name = "add-profile")]
    AddProfile {
        /// Profile name
        name: String,
        /// Free-form description
        #[arg(long)]
        description: Option<String>,
        /// Default voice personality (friendly, professional, casual, enthusiastic)
        #[arg(long)]
        personality: Option<String>,
        /// Silence before listening stops, in milliseconds
        #[arg(long)]
        silence_timeout_ms: Option<u64>,
        /// Target announcement length in seconds
        #[arg(long)]
        target_secs: Option<f64>,
    },
    /// Delete a profile
    #[command(name = "delete-profile")]
    DeleteProfile {
        /// Profile name
        name: String,
    },
    /// Set the current profile
    #[command(name = "use-profile")]
    UseProfile {
        /// Profile name
        name: String,
    },
    /// Display the current profile name
    #[command(name = "get-profile")]
    GetProfile,
    /// List all profiles
    #[command(name = "list-profiles", alias = "get-profiles")]
    ListProfiles,
    /// Print the settings of a profile (-p) or the current one
    View,
    /// Print the default assistant settings
    Defaults,
    /// Print the config file and scenario directory locations
    Paths,
}

fn parse_personality(s: &str) -> anyhow::Result<VoicePersonality> {
    serde_yaml::from_str(s).map_err(|_| anyhow::anyhow!("unknown personality '{}'", s))
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddProfile {
                name,
                description,
                personality,
                silence_timeout_ms,
                target_secs,
            } => {
                let mut cfg = get_config(cli)?;

                let mut assistant: AssistantConfig = match cli.input.as_deref() {
                    Some(path) => load_request(path)?,
                    None => AssistantConfig::default(),
                };
                if let Some(p) = personality {
                    assistant.dispatcher.voice.personality = parse_personality(p)?;
                }
                if let Some(ms) = silence_timeout_ms {
                    assistant.capture.silence_timeout_ms = *ms;
                }
                if let Some(secs) = target_secs {
                    assistant.podcast.target_secs = *secs;
                }

                let profile = Profile {
                    description: description.clone().unwrap_or_default(),
                    assistant,
                    ..Default::default()
                };
                cfg.add_profile(name, profile)?;
                print_success(&format!("Profile \"{}\" saved", name));
                Ok(())
            }

            ConfigSubcommand::DeleteProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_profile(name)?;
                print_success(&format!("Profile \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_profile(name)?;
                print_success(&format!("Switched to profile \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetProfile => {
                let cfg = get_config(cli)?;
                if cfg.current_profile.is_empty() {
                    println!("No current profile set");
                } else {
                    println!("{}", cfg.current_profile);
                }
                Ok(())
            }

            ConfigSubcommand::ListProfiles => {
                let cfg = get_config(cli)?;

                if cfg.profiles.is_empty() {
                    println!("No profiles configured");
                    return Ok(());
                }

                println!("{:<8} {:<20} {:<14} {}", "CURRENT", "NAME", "PERSONALITY", "DESCRIPTION");
                for name in cfg.list_profiles() {
                    let Some(profile) = cfg.get_profile(name) else {
                        continue;
                    };
                    let current = if name == cfg.current_profile { "*" } else { "" };
                    println!(
                        "{:<8} {:<20} {:<14} {}",
                        current,
                        name,
                        profile.assistant.dispatcher.voice.personality.to_string(),
                        profile.description
                    );
                }

                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                eprintln!("Config file: {}", cfg.path().display());
                let profile = cfg
                    .resolve_profile(cli.profile.as_deref())
                    .ok_or_else(|| anyhow::anyhow!("no profile selected, use -p or 'roadtrip config use-profile'"))?;
                output_result(cli, profile)
            }

            ConfigSubcommand::Defaults => output_result(cli, &AssistantConfig::default()),

            ConfigSubcommand::Paths => {
                let cfg = get_config(cli)?;
                let paths = get_paths()?;
                paths.ensure_scenario_dir()?;
                println!("config:    {}", cfg.path().display());
                println!("scenarios: {}", paths.scenario_dir().display());
                Ok(())
            }
        }
    }
}
