//! Checksum utilities for bundle comparison
//!
//! A bundle that already sits in a destination queue under the same name is
//! only treated as "already delivered" when its content is identical to the
//! source bundle.

use crate::error::{CommonError, Result};
use sha2::{Digest, Sha256};
use std::io::Read;
use std::path::Path;

/// Compute the SHA-256 checksum of a file as lowercase hex
pub fn compute_file_checksum(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let mut file = std::fs::File::open(path).map_err(|source| CommonError::Checksum {
        path: path.to_path_buf(),
        source,
    })?;
    compute_checksum(&mut file).map_err(|source| CommonError::Checksum {
        path: path.to_path_buf(),
        source,
    })
}

/// Compute the SHA-256 checksum of any readable source
pub fn compute_checksum<R: Read>(reader: &mut R) -> std::io::Result<String> {
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = reader.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Whether two files have identical content.
///
/// Sizes are compared first so differently sized files are never hashed.
pub fn files_identical(a: impl AsRef<Path>, b: impl AsRef<Path>) -> Result<bool> {
    let (a, b) = (a.as_ref(), b.as_ref());
    let size_a = std::fs::metadata(a)?.len();
    let size_b = std::fs::metadata(b)?.len();
    if size_a != size_b {
        return Ok(false);
    }
    Ok(compute_file_checksum(a)? == compute_file_checksum(b)?)
}
