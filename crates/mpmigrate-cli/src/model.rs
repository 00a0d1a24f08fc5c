//! Work items and series on disk
//!
//! ```text
//! <work_root>/<series_id>/            series markers live here
//! <work_root>/<series_id>/<item_id>/  one media package
//!     <item_id>.zip                   the bundle handed to a queue
//!     manifest.xml
//!     ingested | failed               item markers
//! ```

use crate::error::{CliError, Result};
use crate::markers::{ItemState, MarkerStore, SeriesState};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Extension of the bundle file inside an item directory
pub const BUNDLE_EXTENSION: &str = "zip";

/// One media package awaiting migration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    pub id: String,
    pub path: PathBuf,
}

impl WorkItem {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
        }
    }

    /// `<path>/<id>.zip`
    pub fn bundle_path(&self) -> PathBuf {
        self.path.join(format!("{}.{}", self.id, BUNDLE_EXTENSION))
    }

    pub fn state(&self, markers: &MarkerStore) -> ItemState {
        markers.item_state(&self.path)
    }

    /// Delete everything in the item directory except its markers
    pub fn prune(&self, markers: &MarkerStore) -> Result<usize> {
        let mut removed = 0;
        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if markers.names().is_marker(&entry.file_name().to_string_lossy()) {
                continue;
            }
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                std::fs::remove_dir_all(&path)?;
            } else {
                std::fs::remove_file(&path)?;
            }
            removed += 1;
        }
        Ok(removed)
    }
}

/// Immediate, non-hidden subdirectories of `dir` as work items, sorted by name.
///
/// Links to directories count as items.
pub fn discover_items(dir: &Path) -> Result<Vec<WorkItem>> {
    let mut items = Vec::new();
    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry.map_err(|e| {
            CliError::Io(
                e.into_io_error()
                    .unwrap_or_else(|| std::io::Error::other("directory loop while scanning")),
            )
        })?;
        let file_type = entry.file_type();
        if file_type.is_symlink() {
            if !entry.path().is_dir() {
                debug!(path = %entry.path().display(), "Skipping link that is not a directory");
                continue;
            }
        } else if !file_type.is_dir() {
            continue;
        }
        let Some(name) = entry.file_name().to_str() else {
            warn!(path = %entry.path().display(), "Skipping directory with a non UTF-8 name");
            continue;
        };
        if name.starts_with('.') {
            continue;
        }
        items.push(WorkItem::new(name, entry.path()));
    }
    Ok(items)
}

/// A named group of work items
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Series {
    pub id: String,
    pub path: PathBuf,
}

/// Counts of item states within a series
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SeriesOverview {
    pub id: String,
    pub state: Option<SeriesState>,
    pub exists: bool,
    pub pending: usize,
    pub ingested: usize,
    pub failed: usize,
}

impl Series {
    pub fn new(id: impl Into<String>, work_root: &Path) -> Self {
        let id = id.into();
        let path = work_root.join(&id);
        Self { id, path }
    }

    pub fn state(&self, markers: &MarkerStore) -> SeriesState {
        markers.series_state(&self.path)
    }

    pub fn exists(&self) -> bool {
        self.path.is_dir()
    }

    pub fn items(&self) -> Result<Vec<WorkItem>> {
        discover_items(&self.path)
    }

    /// Snapshot of the series for status reporting
    pub fn overview(&self, markers: &MarkerStore) -> Result<SeriesOverview> {
        let mut overview = SeriesOverview {
            id: self.id.clone(),
            exists: self.exists(),
            ..Default::default()
        };
        if !overview.exists {
            return Ok(overview);
        }
        overview.state = Some(self.state(markers));
        for item in self.items()? {
            match item.state(markers) {
                ItemState::Pending => overview.pending += 1,
                ItemState::Ingested => overview.ingested += 1,
                ItemState::Failed => overview.failed += 1,
            }
        }
        Ok(overview)
    }
}
