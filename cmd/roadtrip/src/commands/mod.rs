//! CLI commands module.

mod announce;
mod command;
mod config;
mod destination;
mod simulate;
mod util;

pub use announce::AnnounceCommand;
pub use command::CommandCommand;
pub use config::ConfigCommand;
pub use destination::DestinationCommand;
pub use simulate::SimulateCommand;

pub(crate) use util::*;
