//! mpmigrate Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared utilities for the mpmigrate workspace.
//!
//! # Overview
//!
//! - **ID lists**: the line-oriented format shared by series lists and
//!   membership lists (`#` comments, first token is the ID, the rest of the
//!   line is a free-text annotation)
//! - **Checksums**: content comparison of bundles already sitting in a queue
//! - **Logging**: `tracing` subscriber setup for console and rolling files
//! - **Error Handling**: common error and result types
//!
//! # Example
//!
//! ```no_run
//! use mpmigrate_common::idlist::IdList;
//!
//! fn print_series(path: &str) -> mpmigrate_common::Result<()> {
//!     let list = IdList::load(path)?;
//!     for entry in list.iter() {
//!         println!("{} (line {})", entry.id, entry.line);
//!     }
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod idlist;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
pub use idlist::{IdList, ListEntry};
