//! Marker files
//!
//! Items and series record their terminal state as marker files inside their
//! own directory. A marker is linked into place from a hidden temporary file,
//! so a concurrent reader sees it either absent or complete.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Kind of marker
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkerKind {
    /// Item delivered, or every item of a series delivered
    Ingested,
    /// Item could not be delivered, or a series has a failed item
    Failed,
}

impl std::fmt::Display for MarkerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MarkerKind::Ingested => write!(f, "ingested"),
            MarkerKind::Failed => write!(f, "failed"),
        }
    }
}

/// File names used for markers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkerNames {
    pub ingested: String,
    pub failed: String,
}

impl Default for MarkerNames {
    fn default() -> Self {
        Self {
            ingested: "ingested".to_string(),
            failed: "failed".to_string(),
        }
    }
}

impl MarkerNames {
    pub fn file_name(&self, kind: MarkerKind) -> &str {
        match kind {
            MarkerKind::Ingested => &self.ingested,
            MarkerKind::Failed => &self.failed,
        }
    }

    /// Whether `name` is one of the marker file names
    pub fn is_marker(&self, name: &str) -> bool {
        name == self.ingested || name == self.failed
    }
}

/// State of a work item, derived from its markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemState {
    Pending,
    Ingested,
    Failed,
}

impl ItemState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, ItemState::Pending)
    }
}

/// State of a series, derived from its markers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeriesState {
    Pending,
    Done,
    Failed,
}

impl SeriesState {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SeriesState::Pending)
    }
}

impl std::fmt::Display for SeriesState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SeriesState::Pending => write!(f, "pending"),
            SeriesState::Done => write!(f, "done"),
            SeriesState::Failed => write!(f, "failed"),
        }
    }
}

/// Reads and writes markers in entity directories
#[derive(Debug, Clone, Default)]
pub struct MarkerStore {
    names: MarkerNames,
}

impl MarkerStore {
    pub fn new(names: MarkerNames) -> Self {
        Self { names }
    }

    pub fn names(&self) -> &MarkerNames {
        &self.names
    }

    /// Path of the marker of `kind` inside `dir`
    pub fn marker_path(&self, dir: &Path, kind: MarkerKind) -> PathBuf {
        dir.join(self.names.file_name(kind))
    }

    /// Whether `dir` carries a marker of `kind`.
    ///
    /// Missing directories simply report `false`.
    pub fn has_marker(&self, dir: &Path, kind: MarkerKind) -> bool {
        self.marker_path(dir, kind).is_file()
    }

    /// Create the marker of `kind` in `dir`, with optional content.
    ///
    /// Creates `dir` when needed. Setting a marker that already exists is a
    /// no-op and keeps the original content.
    pub fn set_marker(&self, dir: &Path, kind: MarkerKind, content: Option<&str>) -> Result<()> {
        let path = self.marker_path(dir, kind);
        if path.is_file() {
            trace!(marker = %path.display(), "Marker already present");
            return Ok(());
        }

        std::fs::create_dir_all(dir).map_err(|e| CliError::marker(&path, e))?;

        let mut staged = NamedTempFile::new_in(dir).map_err(|e| CliError::marker(&path, e))?;
        if let Some(content) = content {
            staged
                .write_all(content.as_bytes())
                .and_then(|()| staged.as_file().sync_all())
                .map_err(|e| CliError::marker(&path, e))?;
        }

        match staged.persist_noclobber(&path) {
            Ok(_) => {
                debug!(marker = %path.display(), "Marker set");
                Ok(())
            },
            // Another run won the race; its marker is just as good.
            Err(e) if e.error.kind() == std::io::ErrorKind::AlreadyExists && path.is_file() => Ok(()),
            Err(e) => Err(CliError::marker(&path, e.error)),
        }
    }

    /// Remove the marker of `kind` from `dir`.
    ///
    /// Returns whether a marker was removed; a missing marker is not an error.
    pub fn clear_marker(&self, dir: &Path, kind: MarkerKind) -> Result<bool> {
        let path = self.marker_path(dir, kind);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                debug!(marker = %path.display(), "Marker cleared");
                Ok(true)
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(CliError::marker(&path, e)),
        }
    }

    /// State of the item stored in `dir`. A failure marker wins over an
    /// ingested marker.
    pub fn item_state(&self, dir: &Path) -> ItemState {
        if self.has_marker(dir, MarkerKind::Failed) {
            ItemState::Failed
        } else if self.has_marker(dir, MarkerKind::Ingested) {
            ItemState::Ingested
        } else {
            ItemState::Pending
        }
    }

    /// State of the series stored in `dir`
    pub fn series_state(&self, dir: &Path) -> SeriesState {
        if self.has_marker(dir, MarkerKind::Failed) {
            SeriesState::Failed
        } else if self.has_marker(dir, MarkerKind::Ingested) {
            SeriesState::Done
        } else {
            SeriesState::Pending
        }
    }
}
