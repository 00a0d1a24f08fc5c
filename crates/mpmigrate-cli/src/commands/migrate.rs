//! `mpmigrate migrate` command implementation
//!
//! Migrates the next pending item of a series list. Called repeatedly by a
//! scheduler; each call holds the process lock for its whole run.

use super::{print_json, Completion, OutputFormat};
use crate::config::MigrateConfig;
use crate::coordinator::{Coordinator, SeriesSource, StopReason, Summary};
use crate::error::Result;
use crate::SettingsArgs;
use colored::Colorize;
use std::path::Path;
use tracing::info;

/// Run the coordinator once
pub fn run(
    config_path: Option<&Path>,
    series: &str,
    no_iterate: bool,
    settings: &SettingsArgs,
    prune: bool,
    format: OutputFormat,
) -> Result<Completion> {
    let config = MigrateConfig::load(config_path)?.apply(settings.overrides(prune));
    let coordinator = Coordinator::from_config(&config)?;
    let source = SeriesSource::parse(series);

    info!(series = %source, single_step = no_iterate, "Starting migration run");
    let summary = coordinator.run_once(&source, no_iterate)?;
    info!(
        migrated = summary.migrated,
        skipped = summary.skipped,
        failed = summary.failed,
        stop = ?summary.stop,
        "Migration run finished"
    );

    match format {
        OutputFormat::Json => print_json(&summary)?,
        OutputFormat::Text => print_summary(&summary),
    }

    Ok(Completion::from_failures(summary.failed))
}

fn print_summary(summary: &Summary) {
    if summary.stop == StopReason::AlreadyRunning {
        println!("{}", "Another migration run is in progress, nothing done.".yellow());
        if let Some(notice) = &summary.notice {
            println!("  {notice}");
        }
        return;
    }

    let failed = if summary.failed > 0 {
        summary.failed.to_string().red().to_string()
    } else {
        summary.failed.to_string()
    };
    println!(
        "Migrated: {}  Skipped: {}  Failed: {}",
        summary.migrated.to_string().green(),
        summary.skipped,
        failed
    );
    println!("Stopped: {}", summary.stop);
    if let Some(notice) = &summary.notice {
        println!("{}", notice.red());
    }
}
