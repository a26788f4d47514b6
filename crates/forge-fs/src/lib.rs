//! Storage primitives for the Forge artifact registry
//!
//! Every persisted registry file (definitions, manifests, cache entries,
//! the lockfile, the per-user config) goes through this crate so that
//! writes are atomic and integrity hashes share one canonical format.

pub mod checksum;
pub mod document;
pub mod error;
pub mod io;
pub mod lock;

pub use document::{DocumentFormat, DocumentStore};
pub use error::{Error, Result};
pub use lock::FileLock;
