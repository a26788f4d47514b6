//! Integrity hashes for stored definitions
//!
//! The hash covers the exact bytes of a definition file as stored in its
//! tier, in the shared `sha256:<hex>` format.

use forge_fs::checksum;

/// Hash the stored bytes of a definition.
pub fn integrity_hash(content: &[u8]) -> String {
    checksum::compute_checksum(content)
}

/// Whether `content` still hashes to `expected`.
pub fn matches(expected: &str, content: &[u8]) -> bool {
    integrity_hash(content) == expected
}

/// Whether `hash` looks like something [`integrity_hash`] produced.
pub fn is_well_formed(hash: &str) -> bool {
    hash.strip_prefix(checksum::PREFIX)
        .is_some_and(|hex| hex.len() == 64 && hex.bytes().all(|b| b.is_ascii_hexdigit()))
}
