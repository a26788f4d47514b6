//! Error types for forge-meta

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Filesystem error: {0}")]
    Fs(#[from] forge_fs::Error),

    #[error("invalid version '{version}': {source}")]
    InvalidVersion {
        version: String,
        #[source]
        source: semver::Error,
    },

    #[error("invalid version constraint '{constraint}': {reason}")]
    InvalidConstraint { constraint: String, reason: String },

    #[error("invalid artifact reference '{input}': {reason}")]
    InvalidReference { input: String, reason: String },

    #[error("invalid artifact name '{name}': {reason}")]
    InvalidName { name: String, reason: String },

    #[error("definition '{artifact}' is missing required field `{field}`")]
    MissingField { artifact: String, field: String },

    #[error("invalid definition at {path}: {message}")]
    InvalidDefinition { path: PathBuf, message: String },

    #[error("unknown artifact kind '{0}' (expected `agent` or `tool`)")]
    UnknownKind(String),

    #[error("unknown tier '{0}' (expected `local`, `global` or `remote`)")]
    UnknownTier(String),

    #[error("lockfile format version {found} is newer than supported version {supported}; upgrade forge")]
    UnsupportedLockfileVersion { found: u32, supported: u32 },

    #[error("failed to encode definition '{name}': {message}")]
    Encode { name: String, message: String },
}
