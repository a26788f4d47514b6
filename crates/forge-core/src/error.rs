//! Error types for forge-core
//!
//! Every variant that ends an operation carries the corrective action in
//! its message. Nothing here is recovered by substituting another version,
//! tier or cached value; only [`Error::Network`] is treated as soft by the
//! source resolver.

use forge_meta::ArtifactKind;
use std::path::PathBuf;

/// Result type for forge-core operations
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No enabled tier satisfies a reference.
    #[error("{kind} '{reference}' was not found in any tier ({searched}); check the name or run `forge list {kind}`")]
    NotFound {
        kind: ArtifactKind,
        reference: String,
        searched: String,
    },

    /// A definition is malformed or lacks a required field.
    #[error("invalid definition at {location}: {message}; fix the file and retry")]
    Validation { location: String, message: String },

    #[error("circular dependency detected: {path}; remove one of these dependency declarations")]
    CircularDependency { path: String },

    /// The lockfile pins a version that is not stored in the global tier.
    #[error("{kind} '{name}@{version}' is pinned by the lockfile but not installed; run `forge install {kind} {name}@{version}`")]
    CacheMiss {
        kind: ArtifactKind,
        name: String,
        version: String,
    },

    #[error(
        "integrity check failed for {kind} '{name}@{version}': lockfile pins {expected} but stored content hashes to {actual}; restore the original content or run `forge lock` to re-pin"
    )]
    Integrity {
        kind: ArtifactKind,
        name: String,
        version: String,
        expected: String,
        actual: String,
    },

    #[error("lockfile error: {message}")]
    Lockfile { message: String },

    #[error("authentication with {registry} failed: {message}; run `forge login --token <token>` or set FORGE_REGISTRY_TOKEN")]
    Authentication { registry: String, message: String },

    #[error("access to {kind} '{artifact}' was denied by the registry; ask its owner for read access")]
    Authorization { kind: ArtifactKind, artifact: String },

    /// Transient remote failure after the retry budget was spent.
    #[error("remote registry unavailable at {url} after {attempts} attempt(s): {message}; check connectivity or set FORGE_REMOTE_ENABLED=false")]
    Network {
        url: String,
        attempts: u32,
        message: String,
    },

    #[error("merge of '{name}' aborted; the local definition was left unchanged")]
    MergeAborted { name: String },

    #[error("invalid configuration in {source_name}: {message}")]
    Config { source_name: String, message: String },

    #[error(transparent)]
    Fs(#[from] forge_fs::Error),

    #[error(transparent)]
    Meta(#[from] forge_meta::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Whether this error means the remote tier could not be reached.
    ///
    /// The resolver treats these as a tier miss as long as another tier
    /// can satisfy the request.
    pub fn is_remote_unavailable(&self) -> bool {
        matches!(self, Error::Network { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub(crate) fn validation(location: impl std::fmt::Display, message: impl std::fmt::Display) -> Self {
        Error::Validation {
            location: location.to_string(),
            message: message.to_string(),
        }
    }

    pub(crate) fn lockfile(message: impl Into<String>) -> Self {
        Error::Lockfile {
            message: message.into(),
        }
    }
}
