//! Roadtrip CLI - drive the voice assistant from the command line.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{
    AnnounceCommand, CommandCommand, ConfigCommand, DestinationCommand, SimulateCommand,
};

/// Roadtrip CLI - drive the voice assistant from the command line.
///
/// Runs the assistant on simulated audio engines:
///   - Scripted trips with listening, speech and route changes
///   - Voice command and destination parsing
///   - Duration-targeted POI announcements
///
/// Configuration is stored in ~/.roadtrip/roadtrip/ and supports multiple
/// named profiles of assistant settings.
#[derive(Parser)]
#[command(name = "roadtrip")]
#[command(about = "Road trip voice assistant CLI")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.roadtrip/roadtrip/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Profile name to use
    #[arg(short = 'p', long, global = true)]
    pub profile: Option<String>,

    /// Output file (default: stdout)
    #[arg(short = 'o', long, global = true)]
    pub output: Option<String>,

    /// Input file (YAML or JSON)
    #[arg(short = 'f', long = "file", global = true)]
    pub input: Option<String>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage CLI configuration
    Config(ConfigCommand),
    /// Run a scripted trip on simulated engines
    Simulate(SimulateCommand),
    /// Match a transcript against the voice commands
    Command(CommandCommand),
    /// Extract a destination from a transcript
    Destination(DestinationCommand),
    /// Generate a POI announcement
    Announce(AnnounceCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug")),
            )
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    match &cli.command {
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Simulate(cmd) => cmd.run(&cli).await,
        Commands::Command(cmd) => cmd.run(&cli).await,
        Commands::Destination(cmd) => cmd.run(&cli).await,
        Commands::Announce(cmd) => cmd.run(&cli).await,
    }
}
