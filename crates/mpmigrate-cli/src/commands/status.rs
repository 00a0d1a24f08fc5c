//! `mpmigrate status` command implementation
//!
//! Shows per-series progress, queue occupancy and the current lock holder.

use super::{print_json, OutputFormat};
use crate::config::MigrateConfig;
use crate::coordinator::{is_plain_name, SeriesSource};
use crate::error::Result;
use crate::lock::{LockRecord, LockState, ProcessLock};
use crate::markers::{MarkerStore, SeriesState};
use crate::model::{Series, SeriesOverview};
use crate::queue::{DestinationQueue, QueueKind};
use crate::SettingsArgs;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Occupancy of one destination queue
#[derive(Debug, Serialize)]
pub struct QueueStatus {
    pub queue: QueueKind,
    pub path: PathBuf,
    pub entries: Vec<PathBuf>,
}

/// Everything `status` reports
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub series: Vec<SeriesOverview>,
    pub queues: Vec<QueueStatus>,
    pub lock: Option<LockRecord>,
}

/// Collect the status of the series named by `source`
pub fn collect(config: &MigrateConfig, source: &SeriesSource) -> Result<StatusReport> {
    let work_root = config.work_root()?;
    crate::config::require_dir("work root", work_root)?;
    let markers = MarkerStore::new(config.markers.clone());

    let mut series = Vec::new();
    for id in source.load()?.ids() {
        if !is_plain_name(id) {
            warn!(series = %id, "Skipping series ID that is not a plain directory name");
            continue;
        }
        series.push(Series::new(id, work_root).overview(&markers)?);
    }

    let mut queues = Vec::new();
    let configured = [
        (QueueKind::InMembershipList, &config.dest_in_list),
        (QueueKind::NotInMembershipList, &config.dest_not_in_list),
    ];
    for (kind, dir) in configured {
        let Some(dir) = dir.as_deref().filter(|d| d.is_dir()) else {
            continue;
        };
        let queue = DestinationQueue::new(kind, dir);
        queues.push(QueueStatus {
            queue: kind,
            path: dir.to_path_buf(),
            entries: queue.pending_entries()?,
        });
    }

    let lock = match ProcessLock::read(&config.lock_file)? {
        LockState::Held(record) => Some(record),
        LockState::Free | LockState::Unreadable(_) => None,
    };

    Ok(StatusReport {
        series,
        queues,
        lock,
    })
}

/// Show status
pub fn run(
    config_path: Option<&Path>,
    series: &str,
    settings: &SettingsArgs,
    format: OutputFormat,
) -> Result<()> {
    let config = MigrateConfig::load(config_path)?.apply(settings.overrides(false));
    let report = collect(&config, &SeriesSource::parse(series))?;

    match format {
        OutputFormat::Json => print_json(&report)?,
        OutputFormat::Text => print_report(&report),
    }
    Ok(())
}

fn print_report(report: &StatusReport) {
    use comfy_table::{modifiers::UTF8_ROUND_CORNERS, presets::UTF8_FULL, Table};

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_header(vec!["Series", "State", "Pending", "Ingested", "Failed"]);

    for overview in &report.series {
        let state = match overview.state {
            None => "missing".to_string(),
            Some(state) => state.to_string(),
        };
        table.add_row(vec![
            overview.id.clone(),
            state,
            overview.pending.to_string(),
            overview.ingested.to_string(),
            overview.failed.to_string(),
        ]);
    }
    println!("{table}");

    let failed = report
        .series
        .iter()
        .filter(|s| s.state == Some(SeriesState::Failed))
        .count();
    if failed > 0 {
        println!(
            "{}",
            format!("{failed} series failed; see 'mpmigrate retry --help'.").red()
        );
    }

    println!();
    println!("{}", "Queues:".cyan().bold());
    if report.queues.is_empty() {
        println!("  (not configured)");
    }
    for queue in &report.queues {
        let state = match queue.entries.first() {
            None => "free".green().to_string(),
            Some(entry) => format!(
                "{} ({})",
                "busy".yellow(),
                entry.file_name().unwrap_or_default().to_string_lossy()
            ),
        };
        println!("  {:<24} {}", queue.queue.name(), state);
    }

    println!();
    match &report.lock {
        None => println!("{} free", "Lock:".cyan().bold()),
        Some(holder) => println!(
            "{} held by process {} on {} since {} ({})",
            "Lock:".cyan().bold(),
            holder.pid,
            holder.hostname,
            holder.acquired_at.format("%Y-%m-%d %H:%M:%S UTC"),
            holder.command
        ),
    }
}
