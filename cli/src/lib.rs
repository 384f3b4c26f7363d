//! CLI utilities for roadtrip tools.
//!
//! Shared by the command line applications: config profiles stored under
//! `~/.roadtrip/<app>/`, YAML or JSON document loading, and output
//! formatting.

pub mod config;
pub mod document;
pub mod output;
pub mod paths;

pub use config::{Config, Profile, load_config, save_config};
pub use document::{DocumentError, load_document, parse_document};
pub use output::{Output, OutputFormat, print_verbose};
pub use paths::Paths;
