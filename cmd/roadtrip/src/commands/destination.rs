//! Destination parsing commands.

use clap::Args;
use serde::Serialize;

use roadtrip_voice::speech::{DestinationParse, parse_destination};

use super::output_result;
use crate::Cli;

/// Extract a destination from a transcript.
///
/// Recognizes navigation phrases ("take me to ..."), leading or trailing
/// action keywords ("Portland, let's go") and standalone confirmations
/// ("let's go") that apply to a destination heard earlier.
#[derive(Args)]
pub struct DestinationCommand {
    /// Transcript to parse
    text: String,

    /// Destination heard earlier without an action
    #[arg(long)]
    accumulated: Option<String>,
}

#[derive(Serialize)]
struct ParseResult<'a> {
    input: &'a str,
    #[serde(flatten)]
    parsed: Option<DestinationParse>,
}

impl DestinationCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let parsed = parse_destination(&self.text, self.accumulated.as_deref());
        output_result(
            cli,
            &ParseResult {
                input: &self.text,
                parsed,
            },
        )
    }
}
