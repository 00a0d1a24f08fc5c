//! CLI command implementations
//!
//! Each subcommand has its own module with a `run` function.

pub mod config;
pub mod migrate;
pub mod retry;
pub mod select;
pub mod status;

use crate::error::Result;
use serde::Serialize;

/// Output format of report-producing commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// Pretty-printed JSON on stdout
    Json,
}

/// How a command finished, beyond success or error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Clean,
    /// The command ran to the end but some items failed
    WithFailures,
}

impl Completion {
    pub fn from_failures(failed: usize) -> Self {
        if failed > 0 {
            Completion::WithFailures
        } else {
            Completion::Clean
        }
    }
}

pub(crate) fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
