//! Process lock
//!
//! A pidfile-style lock that keeps two coordinator runs from overlapping. The
//! lock file holds a JSON [`LockRecord`]. A record left behind by a dead
//! process on this host, or a file that cannot be parsed, is replaced with a
//! warning. Records from other hosts cannot be checked and count as live.
//!
//! The lock is advisory: two processes that both find a stale record may both
//! replace it. Marker writes are idempotent, so such a double run does not
//! move an item twice.

use crate::error::{CliError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Contents of the lock file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub pid: u32,
    pub hostname: String,
    pub acquired_at: DateTime<Utc>,
    pub command: String,
}

impl LockRecord {
    /// Record for the current process
    pub fn current(command: impl Into<String>) -> Self {
        Self {
            pid: std::process::id(),
            hostname: local_hostname(),
            acquired_at: Utc::now(),
            command: command.into(),
        }
    }

    /// Whether the holder may still be running
    pub fn is_holder_alive(&self) -> bool {
        if self.hostname != local_hostname() {
            return true;
        }
        is_pid_alive(self.pid)
    }

    fn is_ours(&self) -> bool {
        self.pid == std::process::id() && self.hostname == local_hostname()
    }
}

/// What a lock file currently says
#[derive(Debug)]
pub enum LockState {
    Free,
    Held(LockRecord),
    Unreadable(String),
}

/// Held process lock, released on drop
#[derive(Debug)]
#[must_use = "the lock is released as soon as the guard is dropped"]
pub struct ProcessLock {
    path: PathBuf,
    record: LockRecord,
    released: bool,
}

impl ProcessLock {
    /// Try to take the lock at `path` without blocking.
    ///
    /// Returns [`CliError::AlreadyLocked`] when a live process holds it.
    pub fn acquire(path: &Path, command: &str) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CliError::lock(path, e))?;
        }

        let record = LockRecord::current(command);
        // One retry: the first attempt may find a stale file and clear it.
        for _ in 0..2 {
            match Self::create(path, &record) {
                Ok(()) => {
                    debug!(lock = %path.display(), pid = record.pid, "Process lock acquired");
                    return Ok(Self {
                        path: path.to_path_buf(),
                        record,
                        released: false,
                    });
                },
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    Self::clear_stale(path)?;
                },
                Err(e) => return Err(CliError::lock(path, e)),
            }
        }

        match Self::read(path)? {
            LockState::Held(holder) => Err(already_locked(path, holder)),
            _ => Err(CliError::lock(
                path,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "lock file reappeared while acquiring",
                ),
            )),
        }
    }

    /// Inspect the lock file without taking it
    pub fn read(path: &Path) -> Result<LockState> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(LockState::Free),
            Err(e) => return Err(CliError::lock(path, e)),
        };
        Ok(match serde_json::from_str::<LockRecord>(&content) {
            Ok(record) => LockState::Held(record),
            Err(e) => LockState::Unreadable(e.to_string()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn record(&self) -> &LockRecord {
        &self.record
    }

    /// Release the lock.
    ///
    /// The file is removed only while it still records this process.
    pub fn release(mut self) -> Result<()> {
        self.release_inner()
    }

    fn release_inner(&mut self) -> Result<()> {
        if self.released {
            return Ok(());
        }
        self.released = true;

        match Self::read(&self.path)? {
            LockState::Held(record) if record.is_ours() => {
                std::fs::remove_file(&self.path).or_else(|e| {
                    if e.kind() == std::io::ErrorKind::NotFound {
                        Ok(())
                    } else {
                        Err(CliError::lock(&self.path, e))
                    }
                })?;
                debug!(lock = %self.path.display(), "Process lock released");
            },
            LockState::Free => {},
            _ => warn!(
                lock = %self.path.display(),
                "Lock file was taken over by another process, leaving it in place"
            ),
        }
        Ok(())
    }

    fn create(path: &Path, record: &LockRecord) -> std::io::Result<()> {
        let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
        let json = serde_json::to_string_pretty(record)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        file.write_all(json.as_bytes())?;
        file.sync_all()
    }

    /// Remove the lock file if its holder is gone; otherwise report it
    fn clear_stale(path: &Path) -> Result<()> {
        match Self::read(path)? {
            LockState::Free => Ok(()),
            LockState::Held(holder) if holder.is_holder_alive() => {
                Err(already_locked(path, holder))
            },
            LockState::Held(holder) => {
                warn!(
                    lock = %path.display(),
                    pid = holder.pid,
                    since = %holder.acquired_at,
                    "Taking over lock from a process that is no longer running"
                );
                remove_if_present(path)
            },
            LockState::Unreadable(reason) => {
                warn!(lock = %path.display(), reason = %reason, "Replacing unreadable lock file");
                remove_if_present(path)
            },
        }
    }
}

impl Drop for ProcessLock {
    fn drop(&mut self) {
        if let Err(e) = self.release_inner() {
            warn!(error = %e, "Failed to release process lock");
        }
    }
}

fn already_locked(path: &Path, holder: LockRecord) -> CliError {
    CliError::AlreadyLocked {
        path: path.to_path_buf(),
        pid: holder.pid,
        hostname: holder.hostname,
        since: holder.acquired_at,
    }
}

fn remove_if_present(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(CliError::lock(path, e)),
    }
}

fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Whether `pid` is running on this host
#[cfg(target_os = "linux")]
fn is_pid_alive(pid: u32) -> bool {
    Path::new(&format!("/proc/{pid}")).exists()
}

/// Without procfs there is no safe check; assume the holder is alive.
#[cfg(not(target_os = "linux"))]
fn is_pid_alive(_pid: u32) -> bool {
    true
}
