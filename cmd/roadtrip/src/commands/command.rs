//! Voice command matching commands.

use clap::Args;
use serde::Serialize;

use roadtrip_voice::speech::{COMMAND_TABLE, CommandAction, match_command};

use super::output_result;
use crate::Cli;

/// Match a transcript against the voice commands.
///
/// Patterns are checked in table order and the first one contained in the
/// transcript wins.
#[derive(Args)]
pub struct CommandCommand {
    /// Transcript to match
    #[arg(required_unless_present = "table")]
    text: Option<String>,

    /// Print the command table instead
    #[arg(long)]
    table: bool,
}

#[derive(Serialize)]
struct MatchResult<'a> {
    input: &'a str,
    action: Option<CommandAction>,
    pattern: Option<&'static str>,
    confirmation: Option<&'static str>,
}

#[derive(Serialize)]
struct TableEntry {
    action: CommandAction,
    patterns: &'static [&'static str],
    confirmation: &'static str,
}

impl CommandCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        if self.table {
            let table: Vec<TableEntry> = COMMAND_TABLE
                .iter()
                .map(|(action, patterns)| TableEntry {
                    action: *action,
                    patterns,
                    confirmation: action.confirmation(),
                })
                .collect();
            return output_result(cli, &table);
        }

        let text = self.text.as_deref().unwrap_or_default();
        let matched = match_command(text);
        output_result(
            cli,
            &MatchResult {
                input: text,
                action: matched.map(|(a, _)| a),
                pattern: matched.map(|(_, p)| p),
                confirmation: matched.map(|(a, _)| a.confirmation()),
            },
        )
    }
}
