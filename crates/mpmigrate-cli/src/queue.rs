//! Destination queues
//!
//! A queue is a flat drop directory watched by the downstream ingest
//! mechanism, which consumes one file at a time. A queue holding any visible
//! entry is busy. Deliveries are staged under a hidden name and renamed into
//! place, so the consumer never sees a partial bundle.

use crate::error::{CliError, Result};
use mpmigrate_common::checksum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Which of the two queues
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum QueueKind {
    InMembershipList,
    NotInMembershipList,
}

impl QueueKind {
    pub fn name(self) -> &'static str {
        match self {
            QueueKind::InMembershipList => "in-membership-list",
            QueueKind::NotInMembershipList => "not-in-membership-list",
        }
    }
}

impl std::fmt::Display for QueueKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// How a bundle leaves the source tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum TransferMode {
    /// Move the bundle; the source copy disappears
    #[default]
    Move,
    /// Copy the bundle and keep the source
    Copy,
}

impl std::fmt::Display for TransferMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransferMode::Move => write!(f, "move"),
            TransferMode::Copy => write!(f, "copy"),
        }
    }
}

/// A single-slot drop directory
#[derive(Debug, Clone)]
pub struct DestinationQueue {
    kind: QueueKind,
    dir: PathBuf,
}

impl DestinationQueue {
    pub fn new(kind: QueueKind, dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            dir: dir.into(),
        }
    }

    pub fn kind(&self) -> QueueKind {
        self.kind
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Visible entries currently waiting in the queue, sorted by name
    pub fn pending_entries(&self) -> Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !is_hidden(&entry.file_name()) {
                entries.push(entry.path());
            }
        }
        entries.sort();
        Ok(entries)
    }

    /// Whether the queue still holds an unconsumed item
    pub fn is_busy(&self) -> Result<bool> {
        for entry in fs::read_dir(&self.dir)? {
            if !is_hidden(&entry?.file_name()) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Deliver `bundle` into the queue and return its queued path.
    ///
    /// A bundle with identical content already queued under the same name
    /// counts as delivered; a different file under that name is an error.
    pub fn deliver(&self, item_id: &str, bundle: &Path, mode: TransferMode) -> Result<PathBuf> {
        let file_name = bundle
            .file_name()
            .ok_or_else(|| CliError::transfer(item_id, "bundle path has no file name"))?;
        let target = self.dir.join(file_name);

        if !bundle.is_file() {
            return Err(CliError::transfer(
                item_id,
                format!("bundle '{}' not found", bundle.display()),
            ));
        }

        if target.exists() {
            let identical = checksum::files_identical(bundle, &target)
                .map_err(|e| CliError::transfer(item_id, e))?;
            if !identical {
                return Err(CliError::transfer(
                    item_id,
                    format!("a different '{}' is already queued", target.display()),
                ));
            }
            warn!(
                item = %item_id,
                queue = %self.kind,
                "Bundle already queued by an earlier run"
            );
            if mode == TransferMode::Move {
                fs::remove_file(bundle).map_err(|e| CliError::transfer(item_id, e))?;
            }
            return Ok(target);
        }

        match mode {
            TransferMode::Move => match fs::rename(bundle, &target) {
                Ok(()) => {},
                Err(e) => {
                    debug!(error = %e, "Rename failed, falling back to staged copy");
                    self.staged_copy(item_id, bundle, &target)?;
                    fs::remove_file(bundle).map_err(|e| CliError::transfer(item_id, e))?;
                },
            },
            TransferMode::Copy => self.staged_copy(item_id, bundle, &target)?,
        }

        debug!(item = %item_id, queue = %self.kind, path = %target.display(), "Bundle delivered");
        Ok(target)
    }

    fn staged_copy(&self, item_id: &str, bundle: &Path, target: &Path) -> Result<()> {
        let mut staged =
            NamedTempFile::new_in(&self.dir).map_err(|e| CliError::transfer(item_id, e))?;
        let mut source = fs::File::open(bundle).map_err(|e| CliError::transfer(item_id, e))?;
        std::io::copy(&mut source, staged.as_file_mut())
            .and_then(|_| staged.as_file().sync_all())
            .map_err(|e| CliError::transfer(item_id, e))?;
        staged
            .persist_noclobber(target)
            .map_err(|e| CliError::transfer(item_id, e.error))?;
        Ok(())
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}
