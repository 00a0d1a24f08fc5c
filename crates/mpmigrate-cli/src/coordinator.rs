//! Migration coordinator
//!
//! Walks an ordered list of series and migrates their items one at a time
//! through the [`Selector`], recording progress as markers so that every
//! later invocation resumes where the previous one stopped.

use crate::config::MigrateConfig;
use crate::error::{CliError, Result};
use crate::lock::ProcessLock;
use crate::markers::{MarkerKind, MarkerStore, SeriesState};
use crate::membership::MembershipList;
use crate::model::{Series, WorkItem};
use crate::selector::{ItemTransfer, Selector};
use chrono::Utc;
use mpmigrate_common::IdList;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, warn};

/// Where the series to migrate come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeriesSource {
    /// One series ID given directly
    Single(String),
    /// A series list file, given as `@path`
    ListFile(PathBuf),
}

impl SeriesSource {
    /// `@path` names a list file, anything else is a series ID
    pub fn parse(arg: &str) -> Self {
        match arg.strip_prefix('@') {
            Some(path) => Self::ListFile(PathBuf::from(path)),
            None => Self::Single(arg.to_string()),
        }
    }

    /// Series IDs in order
    pub fn load(&self) -> Result<IdList> {
        match self {
            Self::Single(id) => Ok(IdList::from_ids([id.clone()])),
            Self::ListFile(path) => {
                IdList::load(path).map_err(|e| CliError::classification("series list", e))
            },
        }
    }
}

impl fmt::Display for SeriesSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Single(id) => f.write_str(id),
            Self::ListFile(path) => write!(f, "@{}", path.display()),
        }
    }
}

/// Why a run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StopReason {
    /// An item was migrated
    Migrated,
    /// Single-step mode made its one attempt
    SingleStep,
    /// Every series was visited without a migration
    #[default]
    Exhausted,
    /// Both queues were busy when the run started
    QueuesBusy,
    /// Another run holds the process lock
    AlreadyRunning,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            StopReason::Migrated => "migrated one item",
            StopReason::SingleStep => "single step completed",
            StopReason::Exhausted => "no pending work in the series list",
            StopReason::QueuesBusy => "both destination queues are busy",
            StopReason::AlreadyRunning => "another run is in progress",
        };
        f.write_str(text)
    }
}

/// Counts of one run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub migrated: usize,
    pub skipped: usize,
    pub failed: usize,
    pub stop: StopReason,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

impl Summary {
    fn stopped(mut self, stop: StopReason) -> Self {
        self.stop = stop;
        self
    }
}

/// Drives migrations over a work tree
#[derive(Debug)]
pub struct Coordinator {
    work_root: PathBuf,
    lock_file: PathBuf,
    selector: Selector,
}

impl Coordinator {
    pub fn new(work_root: impl Into<PathBuf>, lock_file: impl Into<PathBuf>, selector: Selector) -> Self {
        Self {
            work_root: work_root.into(),
            lock_file: lock_file.into(),
            selector,
        }
    }

    /// Validate `config` and build a coordinator from it
    pub fn from_config(config: &MigrateConfig) -> Result<Self> {
        config.validate_for_migration()?;
        let settings = config.transfer_settings();
        let membership = MembershipList::load(config.membership_file()?, settings.match_mode)?;
        let selector = Selector::new(
            MarkerStore::new(settings.markers),
            membership,
            config.dest_in_list()?,
            config.dest_not_in_list()?,
        )
        .with_mode(settings.transfer_mode)
        .with_prune(settings.prune_ingested);
        Ok(Self::new(config.work_root()?, &config.lock_file, selector))
    }

    pub fn work_root(&self) -> &Path {
        &self.work_root
    }

    fn markers(&self) -> &MarkerStore {
        self.selector.markers()
    }

    /// Run once over the series named by `source`.
    ///
    /// With `single_step` the run ends after the first attempted item,
    /// whatever its result. Otherwise it continues past failures until one
    /// item is migrated or the list is exhausted.
    pub fn run_once(&self, source: &SeriesSource, single_step: bool) -> Result<Summary> {
        let _lock = match ProcessLock::acquire(&self.lock_file, &format!("migrate {source}")) {
            Ok(lock) => lock,
            Err(e @ CliError::AlreadyLocked { .. }) => {
                info!(error = %e, "Another migration run is active");
                return Ok(Summary {
                    stop: StopReason::AlreadyRunning,
                    notice: Some(e.to_string()),
                    ..Default::default()
                });
            },
            Err(e) => return Err(e),
        };

        let series_list = source.load()?;
        self.run_series(&series_list, single_step)
    }

    /// Run over an already loaded series list. The caller holds the lock.
    pub fn run_series(&self, series_list: &IdList, single_step: bool) -> Result<Summary> {
        let mut summary = Summary::default();

        if self.selector.all_queues_busy()? {
            info!("Both destination queues are busy, nothing to do");
            return Ok(summary.stopped(StopReason::QueuesBusy));
        }

        for series_id in series_list.ids() {
            if !is_plain_name(series_id) {
                warn!(series = %series_id, "Skipping series ID that is not a plain directory name");
                summary.skipped += 1;
                continue;
            }
            let series = Series::new(series_id, &self.work_root);

            let state = series.state(self.markers());
            if state.is_terminal() {
                debug!(series = %series.id, state = %state, "Series already resolved");
                continue;
            }
            if !series.exists() {
                warn!(series = %series.id, path = %series.path.display(), "Series directory not found");
                summary.skipped += 1;
                continue;
            }

            let pending: Vec<WorkItem> = series
                .items()?
                .into_iter()
                .filter(|item| !item.state(self.markers()).is_terminal())
                .collect();

            if pending.is_empty() {
                self.finalize(&series)?;
                continue;
            }

            for item in &pending {
                match self.selector.transfer_item(item) {
                    Ok(ItemTransfer::Delivered { queue, unmarked, .. }) => {
                        summary.migrated += 1;
                        match unmarked {
                            // The bundle is gone; the item must not be failed or retried here.
                            Some(cause) => {
                                summary.failed += 1;
                                summary.notice = Some(format!(
                                    "Item {} of series {} was delivered to {} but could not be marked: {}",
                                    item.id, series.id, queue, cause
                                ));
                            },
                            None => {
                                info!(series = %series.id, item = %item.id, queue = %queue, "Item migrated");
                                self.finalize(&series)?;
                            },
                        }
                        let stop = if single_step {
                            StopReason::SingleStep
                        } else {
                            StopReason::Migrated
                        };
                        return Ok(summary.stopped(stop));
                    },
                    Ok(ItemTransfer::TargetBusy { queue }) => {
                        debug!(series = %series.id, item = %item.id, queue = %queue, "Item waits for its queue");
                        summary.skipped += 1;
                        if single_step {
                            return Ok(summary.stopped(StopReason::SingleStep));
                        }
                    },
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        summary.failed += 1;
                        self.record_failure(&series, item, &e)?;
                        if single_step {
                            return Ok(summary.stopped(StopReason::SingleStep));
                        }
                        break;
                    },
                }
            }
        }

        Ok(summary.stopped(StopReason::Exhausted))
    }

    fn record_failure(&self, series: &Series, item: &WorkItem, cause: &CliError) -> Result<()> {
        error!(series = %series.id, item = %item.id, error = %cause, "Migration failed");
        let note = format!("{} {}\n", Utc::now().to_rfc3339(), cause);
        self.markers()
            .set_marker(&item.path, MarkerKind::Failed, Some(&note))?;
        self.markers().set_marker(
            &series.path,
            MarkerKind::Failed,
            Some(&format!("{} item {} failed\n", Utc::now().to_rfc3339(), item.id)),
        )
    }

    /// Mark the series resolved once no item is pending
    fn finalize(&self, series: &Series) -> Result<Option<SeriesState>> {
        let overview = series.overview(self.markers())?;
        if overview.pending > 0 {
            return Ok(None);
        }
        let (kind, state) = if overview.failed > 0 {
            (MarkerKind::Failed, SeriesState::Failed)
        } else {
            (MarkerKind::Ingested, SeriesState::Done)
        };
        let note = format!(
            "{} {} ingested, {} failed\n",
            Utc::now().to_rfc3339(),
            overview.ingested,
            overview.failed
        );
        self.markers().set_marker(&series.path, kind, Some(&note))?;
        info!(series = %series.id, state = %state, "Series finished");
        Ok(Some(state))
    }
}

/// A series ID must name a directory directly under the work root
pub(crate) fn is_plain_name(id: &str) -> bool {
    !id.is_empty() && id != "." && id != ".." && !id.contains(['/', '\\'])
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::lock::LockRecord;
    use crate::markers::MarkerNames;
    use crate::membership::MatchMode;
    use crate::queue::TransferMode;
    use std::fs;
    use tempfile::TempDir;

    struct Tree {
        root: TempDir,
        work: PathBuf,
        dest_in: PathBuf,
        dest_out: PathBuf,
    }

    impl Tree {
        fn new() -> Self {
            let root = TempDir::new().unwrap();
            let work = root.path().join("work");
            let dest_in = root.path().join("in");
            let dest_out = root.path().join("out");
            for dir in [&work, &dest_in, &dest_out] {
                fs::create_dir(dir).unwrap();
            }
            Self {
                root,
                work,
                dest_in,
                dest_out,
            }
        }

        fn item(&self, series: &str, id: &str) -> PathBuf {
            let dir = self.work.join(series).join(id);
            fs::create_dir_all(&dir).unwrap();
            fs::write(dir.join(format!("{id}.zip")), format!("{series}/{id}")).unwrap();
            dir
        }

        fn coordinator(&self, members: &str) -> Coordinator {
            let selector = Selector::new(
                MarkerStore::default(),
                MembershipList::from_id_list(&IdList::parse(members), MatchMode::Exact),
                &self.dest_in,
                &self.dest_out,
            )
            .with_mode(TransferMode::Move);
            Coordinator::new(&self.work, self.root.path().join("mpmigrate.pid"), selector)
        }

        fn consume(&self) {
            for dir in [&self.dest_in, &self.dest_out] {
                for entry in fs::read_dir(dir).unwrap() {
                    fs::remove_file(entry.unwrap().path()).unwrap();
                }
            }
        }

        fn series_state(&self, id: &str) -> SeriesState {
            MarkerStore::default().series_state(&self.work.join(id))
        }
    }

    #[test]
    fn test_series_source_parse() {
        assert_eq!(SeriesSource::parse("S1"), SeriesSource::Single("S1".to_string()));
        assert_eq!(
            SeriesSource::parse("@/srv/series.txt"),
            SeriesSource::ListFile(PathBuf::from("/srv/series.txt"))
        );
        assert_eq!(SeriesSource::parse("@lists/a.txt").to_string(), "@lists/a.txt");
    }

    #[test]
    fn test_done_series_skipped_and_single_step() {
        let tree = Tree::new();
        tree.item("S1", "a");
        MarkerStore::default()
            .set_marker(&tree.work.join("S1"), MarkerKind::Ingested, None)
            .unwrap();
        let b = tree.item("S2", "b");
        let c = tree.item("S2", "c");

        let coordinator = tree.coordinator("");
        let summary = coordinator
            .run_series(&IdList::from_ids(["S1", "S2"]), true)
            .unwrap();

        assert_eq!(summary.migrated, 1);
        assert_eq!(summary.stop, StopReason::SingleStep);
        assert!(tree.work.join("S1/a/a.zip").exists());
        assert!(b.join("ingested").is_file());
        assert!(tree.dest_out.join("b.zip").is_file());
        assert!(c.join("c.zip").is_file());
        assert_eq!(tree.series_state("S2"), SeriesState::Pending);
    }

    #[test]
    fn test_last_item_completes_series() {
        let tree = Tree::new();
        tree.item("S1", "a");
        tree.item("S1", "b");
        let coordinator = tree.coordinator("");
        let series = IdList::from_ids(["S1"]);

        coordinator.run_series(&series, false).unwrap();
        tree.consume();
        let summary = coordinator.run_series(&series, false).unwrap();

        assert_eq!(summary.stop, StopReason::Migrated);
        assert_eq!(tree.series_state("S1"), SeriesState::Done);

        tree.consume();
        let summary = coordinator.run_series(&series, false).unwrap();
        assert_eq!(summary.stop, StopReason::Exhausted);
        assert_eq!(summary.migrated, 0);
    }

    #[test]
    fn test_failure_marks_item_and_series_and_advances() {
        let tree = Tree::new();
        let broken = tree.work.join("S1/a");
        fs::create_dir_all(&broken).unwrap();
        tree.item("S1", "b");
        tree.item("S2", "x");

        let coordinator = tree.coordinator("");
        let summary = coordinator
            .run_series(&IdList::from_ids(["S1", "S2"]), false)
            .unwrap();

        assert_eq!((summary.failed, summary.migrated), (1, 1));
        assert!(broken.join("failed").is_file());
        assert_eq!(tree.series_state("S1"), SeriesState::Failed);
        assert!(tree.dest_out.join("x.zip").is_file());
        // The failed series is never resumed.
        assert!(tree.work.join("S1/b/b.zip").is_file());

        tree.consume();
        let summary = coordinator
            .run_series(&IdList::from_ids(["S1", "S2"]), false)
            .unwrap();
        assert_eq!(summary.stop, StopReason::Exhausted);
        assert!(tree.work.join("S1/b/b.zip").is_file());
    }

    #[test]
    fn test_single_step_stops_after_failure() {
        let tree = Tree::new();
        fs::create_dir_all(tree.work.join("S1/a")).unwrap();
        tree.item("S2", "x");

        let summary = tree
            .coordinator("")
            .run_series(&IdList::from_ids(["S1", "S2"]), true)
            .unwrap();

        assert_eq!(summary.stop, StopReason::SingleStep);
        assert_eq!((summary.failed, summary.migrated), (1, 0));
        assert!(tree.work.join("S2/x/x.zip").is_file());
    }

    #[test]
    fn test_unwritable_marker_after_delivery_ends_run() {
        let tree = Tree::new();
        let a = tree.item("S1", "a");
        tree.item("S1", "b");
        tree.item("S2", "x");

        let markers = MarkerStore::new(MarkerNames {
            ingested: "missing/ingested".to_string(),
            ..MarkerNames::default()
        });
        let selector = Selector::new(
            markers,
            MembershipList::from_id_list(&IdList::parse("a\n"), MatchMode::Exact),
            &tree.dest_in,
            &tree.dest_out,
        );
        let coordinator = Coordinator::new(&tree.work, tree.root.path().join("mpmigrate.pid"), selector);

        let summary = coordinator
            .run_series(&IdList::from_ids(["S1", "S2"]), false)
            .unwrap();

        assert_eq!((summary.migrated, summary.failed), (1, 1));
        assert_eq!(summary.stop, StopReason::Migrated);
        assert!(summary.notice.unwrap().contains("could not be marked"));
        assert!(tree.dest_in.join("a.zip").is_file());
        assert!(!tree.dest_out.join("x.zip").exists());
        assert!(!a.join("failed").exists());
        assert_eq!(tree.series_state("S1"), SeriesState::Pending);
    }

    #[test]
    fn test_queues_busy_touches_nothing() {
        let tree = Tree::new();
        let a = tree.item("S1", "a");
        fs::write(tree.dest_in.join("q.zip"), b"q").unwrap();
        fs::write(tree.dest_out.join("r.zip"), b"r").unwrap();

        let summary = tree
            .coordinator("")
            .run_series(&IdList::from_ids(["S1"]), false)
            .unwrap();

        assert_eq!(summary.stop, StopReason::QueuesBusy);
        assert!(!a.join("ingested").exists());
        assert_eq!(tree.series_state("S1"), SeriesState::Pending);
    }

    #[test]
    fn test_busy_target_skips_item() {
        let tree = Tree::new();
        let a = tree.item("S1", "a");
        tree.item("S1", "b");
        fs::write(tree.dest_in.join("q.zip"), b"q").unwrap();

        let summary = tree
            .coordinator("a\n")
            .run_series(&IdList::from_ids(["S1"]), false)
            .unwrap();

        assert_eq!((summary.skipped, summary.migrated), (1, 1));
        assert!(a.join("a.zip").is_file());
        assert!(tree.dest_out.join("b.zip").is_file());
        assert_eq!(tree.series_state("S1"), SeriesState::Pending);
    }

    #[test]
    fn test_missing_series_directory_is_skipped() {
        let tree = Tree::new();
        let summary = tree
            .coordinator("")
            .run_series(&IdList::from_ids(["ghost", "../escape"]), false)
            .unwrap();

        assert_eq!(summary.skipped, 2);
        assert!(!tree.work.join("ghost").exists());
    }

    #[test]
    fn test_empty_and_resolved_series_are_finalized() {
        let tree = Tree::new();
        fs::create_dir_all(tree.work.join("empty")).unwrap();
        let item = tree.item("mixed", "a");
        MarkerStore::default()
            .set_marker(&item, MarkerKind::Failed, None)
            .unwrap();

        tree.coordinator("")
            .run_series(&IdList::from_ids(["empty", "mixed"]), false)
            .unwrap();

        assert_eq!(tree.series_state("empty"), SeriesState::Done);
        assert_eq!(tree.series_state("mixed"), SeriesState::Failed);
    }

    #[test]
    fn test_already_running() {
        let tree = Tree::new();
        tree.item("S1", "a");
        let lock_path = tree.root.path().join("mpmigrate.pid");
        let mut holder = LockRecord::current("migrate S1");
        holder.hostname = "other-host".to_string();
        fs::write(&lock_path, serde_json::to_string(&holder).unwrap()).unwrap();

        let summary = tree.coordinator("").run_once(&SeriesSource::parse("S1"), false).unwrap();

        assert_eq!(summary.stop, StopReason::AlreadyRunning);
        assert!(summary.notice.unwrap().contains("other-host"));
        assert!(tree.work.join("S1/a/a.zip").is_file());
        assert!(lock_path.exists());
    }

    #[test]
    fn test_run_once_releases_lock() {
        let tree = Tree::new();
        tree.item("S1", "a");
        let coordinator = tree.coordinator("");

        let summary = coordinator.run_once(&SeriesSource::parse("S1"), false).unwrap();
        assert_eq!(summary.migrated, 1);
        assert!(!tree.root.path().join("mpmigrate.pid").exists());
    }

    #[test]
    fn test_unreadable_series_list_is_fatal() {
        let tree = Tree::new();
        let source = SeriesSource::ListFile(tree.root.path().join("missing.txt"));

        let err = tree.coordinator("").run_once(&source, false).unwrap_err();
        assert!(err.is_fatal());
        assert!(!tree.root.path().join("mpmigrate.pid").exists());
    }
}
