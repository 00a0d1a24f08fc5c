//! mpmigrate CLI Library
//!
//! Idempotent, marker-driven migration of media packages into single-slot
//! ingest queues.
//!
//! # Overview
//!
//! - **Selection**: move at most one bundle from a source tree into the queue
//!   its membership routes it to (`mpmigrate select`)
//! - **Migration**: walk a series list and migrate one item per run, with
//!   progress kept in marker files (`mpmigrate migrate`)
//! - **Status**: per-series progress, queue occupancy and lock holder
//!   (`mpmigrate status`)
//! - **Retry**: return failed items and series to pending (`mpmigrate retry`)
//! - **Configuration**: show the resolved settings (`mpmigrate config show`)
//!
//! Every invocation is short-lived and meant to be called repeatedly by an
//! external scheduler. The queues provide the pacing: a queue that still holds
//! an unconsumed bundle receives nothing new.

pub mod commands;
pub mod config;
pub mod confirm;
pub mod coordinator;
pub mod error;
pub mod lock;
pub mod markers;
pub mod membership;
pub mod model;
pub mod queue;
pub mod selector;

// Re-export commonly used types
pub use config::MigrateConfig;
pub use coordinator::{Coordinator, SeriesSource, StopReason, Summary};
pub use error::{CliError, ErrorKind, Result};
pub use selector::{Outcome, SelectionReport, Selector};

use clap::{Args, Parser, Subcommand};
use commands::OutputFormat;
use config::ConfigOverrides;
use membership::MatchMode;
use queue::TransferMode;
use std::path::PathBuf;

/// mpmigrate - media package migration coordinator
#[derive(Parser, Debug)]
#[command(name = "mpmigrate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Configuration file (defaults to <config dir>/mpmigrate/config.toml)
    #[arg(long, env = "MPMIGRATE_CONFIG", value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Also write daily rolling log files to this directory
    #[arg(long, env = "MPMIGRATE_LOG_DIR", value_name = "DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print the CLI reference as markdown and exit
    #[arg(long, hide = true)]
    pub markdown_help: bool,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Move at most one bundle from a source tree into its destination queue
    Select {
        /// Directory holding one subdirectory per item
        source_dir: PathBuf,

        /// Membership list used for routing
        membership_file: PathBuf,

        /// Queue for items on the membership list
        dest_in_list: PathBuf,

        /// Queue for every other item
        dest_not_in_list: PathBuf,

        /// How list entries are compared with item IDs
        #[arg(long, env = "MPMIGRATE_MATCH_MODE", value_enum)]
        match_mode: Option<MatchMode>,

        /// Move or copy the bundle
        #[arg(long, env = "MPMIGRATE_TRANSFER_MODE", value_enum)]
        transfer_mode: Option<TransferMode>,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Migrate the next pending item of a series or series list
    Migrate {
        /// Series ID, or @FILE naming a series list
        series: String,

        /// Stop after the first attempted item
        #[arg(short = 'i', long, visible_alias = "do-not-iterate")]
        no_iterate: bool,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Delete item contents except markers after delivery
        #[arg(long, env = "MPMIGRATE_PRUNE_INGESTED")]
        prune: bool,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Show progress of a series or series list
    Status {
        /// Series ID, or @FILE naming a series list
        series: String,

        #[command(flatten)]
        settings: SettingsArgs,

        /// Output format
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Return failed items of a series to pending
    Retry {
        /// Series ID
        series: String,

        /// Only retry this item
        #[arg(long, value_name = "ID")]
        item: Option<String>,

        /// Skip confirmation prompt
        #[arg(short, long)]
        yes: bool,

        #[command(flatten)]
        settings: SettingsArgs,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Configuration subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show the resolved configuration as TOML
    Show {
        #[command(flatten)]
        settings: SettingsArgs,
    },
}

/// Settings that override the configuration file
#[derive(Args, Debug, Clone, Default)]
pub struct SettingsArgs {
    /// Root of the series tree
    #[arg(long, env = "MPMIGRATE_WORK_ROOT", value_name = "DIR")]
    pub work_root: Option<PathBuf>,

    /// Membership list used for routing
    #[arg(long, env = "MPMIGRATE_MEMBERSHIP_FILE", value_name = "FILE")]
    pub membership_file: Option<PathBuf>,

    /// Queue for items on the membership list
    #[arg(long, env = "MPMIGRATE_DEST_IN_LIST", value_name = "DIR")]
    pub dest_in_list: Option<PathBuf>,

    /// Queue for every other item
    #[arg(long, env = "MPMIGRATE_DEST_NOT_IN_LIST", value_name = "DIR")]
    pub dest_not_in_list: Option<PathBuf>,

    /// Process lock file
    #[arg(long, env = "MPMIGRATE_LOCK_FILE", value_name = "FILE")]
    pub lock_file: Option<PathBuf>,

    /// How list entries are compared with item IDs
    #[arg(long, env = "MPMIGRATE_MATCH_MODE", value_enum)]
    pub match_mode: Option<MatchMode>,

    /// Move or copy bundles
    #[arg(long, env = "MPMIGRATE_TRANSFER_MODE", value_enum)]
    pub transfer_mode: Option<TransferMode>,
}

impl SettingsArgs {
    pub fn overrides(&self, prune_ingested: bool) -> ConfigOverrides {
        ConfigOverrides {
            work_root: self.work_root.clone(),
            membership_file: self.membership_file.clone(),
            dest_in_list: self.dest_in_list.clone(),
            dest_not_in_list: self.dest_not_in_list.clone(),
            lock_file: self.lock_file.clone(),
            match_mode: self.match_mode,
            transfer_mode: self.transfer_mode,
            prune_ingested,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_migrate() {
        let cli = Cli::try_parse_from([
            "mpmigrate",
            "migrate",
            "@series.txt",
            "-i",
            "--work-root",
            "/srv/work",
            "--match-mode",
            "substring",
        ])
        .unwrap_or_else(|e| panic!("{e}"));

        let Some(Commands::Migrate {
            series,
            no_iterate,
            settings,
            ..
        }) = cli.command
        else {
            panic!("expected migrate");
        };
        assert_eq!(series, "@series.txt");
        assert!(no_iterate);
        assert_eq!(settings.work_root, Some(PathBuf::from("/srv/work")));
        assert_eq!(settings.match_mode, Some(MatchMode::Substring));
    }

    #[test]
    fn test_select_requires_four_paths() {
        assert!(Cli::try_parse_from(["mpmigrate", "select", "a", "b", "c"]).is_err());
    }
}
