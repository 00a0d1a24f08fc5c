//! Error types for mpmigrate
//!
//! Every error carries a message an operator can act on. [`CliError::kind`]
//! folds the variants into the four classes the coordinator reasons about:
//! configuration, classification, transfer and lock contention.

use chrono::{DateTime, Utc};
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Coarse error classes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing or invalid paths and settings; nothing was attempted
    Configuration,
    /// A series or membership list could not be read; nothing was attempted
    Classification,
    /// A single item could not be delivered; the run may continue
    Transfer,
    /// Another run holds the process lock
    LockContention,
}

/// Comprehensive error type for CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check --config, the MPMIGRATE_* environment variables and command-line flags.")]
    Config(String),

    /// A configured path does not exist or has the wrong type
    #[error("Invalid {what} '{}': {reason}.", path.display())]
    InvalidPath {
        what: &'static str,
        path: PathBuf,
        reason: &'static str,
    },

    /// Membership or series list could not be read
    #[error("Cannot read {what}: {source}. Verify the file exists and is readable.")]
    Classification {
        what: &'static str,
        #[source]
        source: mpmigrate_common::CommonError,
    },

    /// Delivering a bundle into a destination queue failed
    #[error("Transfer of item '{item}' failed: {reason}")]
    Transfer { item: String, reason: String },

    /// Marker file could not be written or removed
    #[error("Marker '{}' could not be updated: {source}. Check permissions on the item directory.", path.display())]
    Marker {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Another process holds the lock
    #[error("Already running: lock '{}' is held by process {pid} on {hostname} since {since}.", path.display())]
    AlreadyLocked {
        path: PathBuf,
        pid: u32,
        hostname: String,
        since: DateTime<Utc>,
    },

    /// Lock file could not be created, read or removed
    #[error("Lock file '{}' error: {source}", path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Interactive confirmation failed or is unavailable
    #[error("Confirmation failed: {0}. Pass --yes to run without a prompt.")]
    Prompt(String),

    /// File system operation failed
    #[error("File operation failed: {0}. Check file permissions and disk space.")]
    Io(#[from] std::io::Error),

    /// TOML configuration parsing failed
    #[error("Failed to parse configuration file: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML configuration rendering failed
    #[error("Failed to render configuration: {0}")]
    TomlRender(#[from] toml::ser::Error),

    /// JSON rendering failed
    #[error("Failed to render JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Common crate error outside list loading
    #[error(transparent)]
    Common(#[from] mpmigrate_common::CommonError),
}

impl CliError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid path error
    pub fn invalid_path(what: &'static str, path: impl Into<PathBuf>, reason: &'static str) -> Self {
        Self::InvalidPath {
            what,
            path: path.into(),
            reason,
        }
    }

    /// Create a transfer error
    pub fn transfer(item: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Transfer {
            item: item.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a marker error
    pub fn marker(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Marker {
            path: path.into(),
            source,
        }
    }

    /// Create a lock I/O error
    pub fn lock(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Lock {
            path: path.into(),
            source,
        }
    }

    /// Create a list loading error
    pub fn classification(what: &'static str, source: mpmigrate_common::CommonError) -> Self {
        Self::Classification { what, source }
    }

    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_)
            | Self::InvalidPath { .. }
            | Self::TomlParse(_)
            | Self::TomlRender(_)
            | Self::Prompt(_) => ErrorKind::Configuration,
            Self::Classification { .. } => ErrorKind::Classification,
            Self::AlreadyLocked { .. } => ErrorKind::LockContention,
            Self::Transfer { .. }
            | Self::Marker { .. }
            | Self::Lock { .. }
            | Self::Io(_)
            | Self::Json(_)
            | Self::Common(_) => ErrorKind::Transfer,
        }
    }

    /// Whether the whole run must stop
    pub fn is_fatal(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::Configuration | ErrorKind::Classification
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(CliError::config("x").kind(), ErrorKind::Configuration);
        assert_eq!(
            CliError::invalid_path("source directory", "/nope", "does not exist").kind(),
            ErrorKind::Configuration
        );
        assert_eq!(CliError::transfer("A", "disk full").kind(), ErrorKind::Transfer);
        let locked = CliError::AlreadyLocked {
            path: PathBuf::from("/run/mpmigrate.pid"),
            pid: 42,
            hostname: "ingest01".to_string(),
            since: Utc::now(),
        };
        assert_eq!(locked.kind(), ErrorKind::LockContention);
        assert!(!locked.is_fatal());
        assert!(CliError::config("x").is_fatal());
    }

    #[test]
    fn test_messages_name_the_path() {
        let err = CliError::invalid_path("membership file", "/srv/list.txt", "is not a file");
        assert_eq!(err.to_string(), "Invalid membership file '/srv/list.txt': is not a file.");
    }
}
