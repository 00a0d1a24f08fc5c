//! Error types shared across mpmigrate crates

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Main error type for the common crate
#[derive(Error, Debug)]
pub enum CommonError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cannot read list file '{}': {source}", path.display())]
    ListFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cannot checksum '{}': {source}", path.display())]
    Checksum {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
