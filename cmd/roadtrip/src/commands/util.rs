//! Utility functions for CLI commands.

use roadtrip_cli::{Config, Output, Paths, load_config, load_document};
use roadtrip_voice::AssistantConfig;

use crate::Cli;

pub const APP_NAME: &str = "roadtrip";

/// Gets the global configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(APP_NAME, cli.config.as_deref())
}

/// Gets the assistant settings of the selected profile.
pub fn get_assistant_config(cli: &Cli) -> anyhow::Result<AssistantConfig> {
    let cfg = get_config(cli)?;
    let assistant = cfg.resolve_assistant(cli.profile.as_deref())?;
    if let Some(profile) = cfg.resolve_profile(cli.profile.as_deref()) {
        print_verbose(cli, &format!("Using profile: {}", profile.name));
    }
    Ok(assistant)
}

/// Gets the app paths.
pub fn get_paths() -> anyhow::Result<Paths> {
    Ok(Paths::new(APP_NAME)?)
}

/// Loads a YAML or JSON input file.
pub fn load_request<T: serde::de::DeserializeOwned>(path: &str) -> anyhow::Result<T> {
    Ok(load_document(path)?)
}

/// Outputs result as JSON or YAML.
pub fn output_result<T: serde::Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    Output::from_flags(cli.json, cli.output.as_deref()).write(result)
}

/// Prints verbose output if enabled.
pub fn print_verbose(cli: &Cli, msg: &str) {
    roadtrip_cli::print_verbose(cli.verbose, msg);
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Prints info message.
pub fn print_info(msg: &str) {
    eprintln!("\x1b[34mℹ\x1b[0m {}", msg);
}

/// Prints warning message.
pub fn print_warning(msg: &str) {
    eprintln!("\x1b[33m⚠\x1b[0m {}", msg);
}
