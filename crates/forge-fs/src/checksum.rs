//! SHA-256 checksum utilities
//!
//! Provides a single canonical checksum format (`sha256:<hex>`) used for
//! artifact integrity hashes, lockfile pins, and cache file names.

use sha2::{Digest, Sha256};

/// Prefix for all checksums produced by this module
pub const PREFIX: &str = "sha256:";

/// Compute the SHA-256 checksum of raw bytes.
///
/// Returns a string in the canonical format `"sha256:<hex>"`.
pub fn compute_checksum(content: &[u8]) -> String {
    format!("{}{}", PREFIX, hex_digest(content))
}

/// Bare lowercase hex SHA-256 digest, without the `sha256:` prefix.
///
/// Used where the digest becomes part of a file name.
pub fn hex_digest(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    format!("{:x}", hasher.finalize())
}
