//! `mpmigrate select` command implementation
//!
//! Moves at most one bundle from a source tree into its destination queue.

use super::{print_json, Completion, OutputFormat};
use crate::config::{ConfigOverrides, MigrateConfig};
use crate::error::Result;
use crate::membership::MatchMode;
use crate::queue::TransferMode;
use crate::selector::{self, Outcome, SelectionReport, SkipReason};
use colored::Colorize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Arguments of `mpmigrate select`
#[derive(Debug, Clone)]
pub struct SelectArgs {
    pub source_dir: PathBuf,
    pub membership_file: PathBuf,
    pub dest_in_list: PathBuf,
    pub dest_not_in_list: PathBuf,
    pub match_mode: Option<MatchMode>,
    pub transfer_mode: Option<TransferMode>,
    pub format: OutputFormat,
}

/// Run one selection
pub fn run(config_path: Option<&Path>, args: &SelectArgs) -> Result<Completion> {
    let config = MigrateConfig::load(config_path)?.apply(ConfigOverrides {
        match_mode: args.match_mode,
        transfer_mode: args.transfer_mode,
        ..Default::default()
    });
    config.validate_markers()?;

    info!(
        source = %args.source_dir.display(),
        match_mode = %config.match_mode,
        transfer_mode = %config.transfer_mode,
        "Selecting next item"
    );

    let report = selector::select_and_transfer(
        &args.source_dir,
        &args.membership_file,
        &args.dest_in_list,
        &args.dest_not_in_list,
        &config.transfer_settings(),
    )?;

    match args.format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }

    Ok(Completion::from_failures(report.failures.len()))
}

fn print_report(report: &SelectionReport) {
    match &report.outcome {
        Outcome::Transferred { id, queue, path } => {
            println!(
                "{} Transferred {} to the {} queue ({})",
                "✓".green(),
                id.bold(),
                queue,
                path.display()
            );
        },
        Outcome::Skipped {
            reason: SkipReason::AllQueuesBusy,
        } => println!("{}", "Both destination queues are busy, nothing transferred.".yellow()),
        Outcome::Skipped {
            reason: SkipReason::TargetQueueBusy,
        } => println!(
            "{}",
            "Pending items are waiting for their destination queue, nothing transferred.".yellow()
        ),
        Outcome::NoWorkAvailable => println!("No pending items."),
    }

    for failure in &report.failures {
        println!("{} {}: {}", "✗".red(), failure.id.bold(), failure.error);
    }
}
