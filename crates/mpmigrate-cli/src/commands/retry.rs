//! `mpmigrate retry` command implementation
//!
//! Clears failure markers so the next migration run picks the items up again.

use crate::config::{require_dir, MigrateConfig};
use crate::confirm::{self, Confirm};
use crate::coordinator::is_plain_name;
use crate::error::{CliError, Result};
use crate::lock::ProcessLock;
use crate::markers::{ItemState, MarkerKind, MarkerStore};
use crate::model::Series;
use crate::SettingsArgs;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tracing::info;

/// What a retry changed
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct RetryReport {
    pub series: String,
    pub items: Vec<String>,
    pub series_reset: bool,
    pub cancelled: bool,
}

/// Return the failed items of `series_id` (or only `item`) to pending.
///
/// The series failure marker is cleared as well, so the coordinator visits
/// the series again and re-evaluates it once its items are resolved.
pub fn retry(
    config: &MigrateConfig,
    series_id: &str,
    item: Option<&str>,
    confirm: &dyn Confirm,
) -> Result<RetryReport> {
    let work_root = config.work_root()?;
    require_dir("work root", work_root)?;
    if !is_plain_name(series_id) {
        return Err(CliError::config(format!(
            "series ID '{series_id}' is not a plain directory name"
        )));
    }
    let series = Series::new(series_id, work_root);
    require_dir("series directory", &series.path)?;
    let markers = MarkerStore::new(config.markers.clone());

    let mut failed_items = Vec::new();
    for candidate in series.items()? {
        if item.is_some_and(|wanted| wanted != candidate.id) {
            continue;
        }
        if candidate.state(&markers) == ItemState::Failed {
            failed_items.push(candidate);
        }
    }
    if let Some(wanted) = item {
        if !series.path.join(wanted).is_dir() {
            return Err(CliError::invalid_path(
                "item directory",
                series.path.join(wanted),
                "does not exist",
            ));
        }
    }
    let series_failed = markers.has_marker(&series.path, MarkerKind::Failed);

    let mut report = RetryReport {
        series: series.id.clone(),
        ..Default::default()
    };
    if failed_items.is_empty() && !series_failed {
        return Ok(report);
    }

    let question = format!(
        "Reset {} failed item(s) of series {}?",
        failed_items.len(),
        series.id
    );
    if !confirm.confirm(&question)? {
        report.cancelled = true;
        return Ok(report);
    }

    let _lock = ProcessLock::acquire(&config.lock_file, &format!("retry {}", series.id))?;
    for failed in failed_items {
        markers.clear_marker(&failed.path, MarkerKind::Failed)?;
        info!(series = %series.id, item = %failed.id, "Item reset to pending");
        report.items.push(failed.id);
    }
    report.series_reset = markers.clear_marker(&series.path, MarkerKind::Failed)?;
    if report.series_reset {
        info!(series = %series.id, "Series reset to pending");
    }
    Ok(report)
}

/// Reset failures after asking for confirmation
pub fn run(
    config_path: Option<&Path>,
    series: &str,
    item: Option<&str>,
    yes: bool,
    settings: &SettingsArgs,
) -> Result<()> {
    let config = MigrateConfig::load(config_path)?.apply(settings.overrides(false));
    let report = retry(&config, series, item, confirm::policy(yes).as_ref())?;

    if report.cancelled {
        println!("Retry cancelled.");
    } else if report.items.is_empty() && !report.series_reset {
        println!("Nothing to retry in series {}.", report.series);
    } else {
        for id in &report.items {
            println!("{} {} reset to pending", "✓".green(), id.bold());
        }
        if report.series_reset {
            println!("{} series {} reset to pending", "✓".green(), report.series.bold());
        }
    }
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::confirm::AutoConfirm;
    use crate::markers::SeriesState;
    use std::fs;
    use tempfile::TempDir;

    struct Decline;

    impl Confirm for Decline {
        fn confirm(&self, _question: &str) -> Result<bool> {
            Ok(false)
        }
    }

    fn setup() -> (TempDir, MigrateConfig, MarkerStore) {
        let root = TempDir::new().unwrap();
        let work = root.path().join("work");
        let markers = MarkerStore::default();
        for id in ["a", "b", "c"] {
            fs::create_dir_all(work.join("S1").join(id)).unwrap();
        }
        markers.set_marker(&work.join("S1/a"), MarkerKind::Failed, None).unwrap();
        markers.set_marker(&work.join("S1/b"), MarkerKind::Failed, None).unwrap();
        markers.set_marker(&work.join("S1/c"), MarkerKind::Ingested, None).unwrap();
        markers.set_marker(&work.join("S1"), MarkerKind::Failed, None).unwrap();
        let config = MigrateConfig {
            work_root: Some(work),
            lock_file: root.path().join("mpmigrate.pid"),
            ..Default::default()
        };
        (root, config, markers)
    }

    #[test]
    fn test_retry_whole_series() {
        let (_root, config, markers) = setup();
        let report = retry(&config, "S1", None, &AutoConfirm).unwrap();

        assert_eq!(report.items, vec!["a", "b"]);
        assert!(report.series_reset);
        let series = config.work_root.unwrap().join("S1");
        assert_eq!(markers.series_state(&series), SeriesState::Pending);
        assert_eq!(markers.item_state(&series.join("c")), ItemState::Ingested);
    }

    #[test]
    fn test_retry_single_item() {
        let (_root, config, markers) = setup();
        let report = retry(&config, "S1", Some("b"), &AutoConfirm).unwrap();

        assert_eq!(report.items, vec!["b"]);
        let series = config.work_root.unwrap().join("S1");
        assert_eq!(markers.item_state(&series.join("a")), ItemState::Failed);
        assert_eq!(markers.item_state(&series.join("b")), ItemState::Pending);
    }

    #[test]
    fn test_retry_declined_changes_nothing() {
        let (_root, config, markers) = setup();
        let report = retry(&config, "S1", None, &Decline).unwrap();

        assert!(report.cancelled);
        let series = config.work_root.unwrap().join("S1");
        assert_eq!(markers.series_state(&series), SeriesState::Failed);
    }

    #[test]
    fn test_retry_unknown_item() {
        let (_root, config, _) = setup();
        let err = retry(&config, "S1", Some("zz"), &AutoConfirm).unwrap_err();
        assert!(err.to_string().contains("item directory"));
    }
}
