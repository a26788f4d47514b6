//! Data model for the Forge artifact registry.
//!
//! This crate holds everything that is pure data: artifact definitions and
//! their fork lineage, references and version constraints (including the
//! version matcher), per-name manifests, the lockfile schema, and the
//! integrity hash format. It performs no resolution itself.

pub mod definition;
pub mod error;
pub mod integrity;
pub mod kind;
pub mod lockfile;
pub mod manifest;
pub mod reference;
pub mod tier;
pub mod version;

pub use definition::{ArtifactDefinition, Dependencies, ForkOrigin, ForkRecord, parse_version, validate_name};
pub use error::{Error, Result};
pub use kind::ArtifactKind;
pub use lockfile::{LockEntry, LockedDependencies, Lockfile};
pub use manifest::{ForkPointer, Manifest, ManifestSummary, VersionEntry, VersionStatus};
pub use reference::ArtifactReference;
pub use tier::Tier;
pub use version::{VersionConstraint, best_match, compare_versions};
