//! Lockfile schema
//!
//! `forge.lock` pins every artifact in a project's closure to an exact
//! version, the tier it was resolved from, and the integrity hash of its
//! stored definition. It is JSON so diffs stay readable in review.

use crate::error::{Error, Result};
use crate::kind::ArtifactKind;
use crate::tier::Tier;
use chrono::{DateTime, Utc};
use forge_fs::DocumentStore;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Direct dependencies of a locked artifact, pinned to exact versions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependencies {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub agents: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, String>,
}

impl LockedDependencies {
    pub fn entries_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, String> {
        match kind {
            ArtifactKind::Agent => &mut self.agents,
            ArtifactKind::Tool => &mut self.tools,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.tools.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockEntry {
    pub version: String,
    /// Never `remote`: fetched artifacts are pinned against the global copy.
    pub resolved_tier: Tier,
    pub integrity_hash: String,
    #[serde(default, skip_serializing_if = "LockedDependencies::is_empty")]
    pub dependencies: LockedDependencies,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Lockfile {
    pub version: u32,
    pub generated_at: DateTime<Utc>,
    #[serde(default)]
    pub agents: BTreeMap<String, LockEntry>,
    #[serde(default)]
    pub tools: BTreeMap<String, LockEntry>,
}

impl Lockfile {
    /// Format version written by this release.
    pub const VERSION: u32 = 1;

    /// File name inside the project directory.
    pub const FILE_NAME: &'static str = "forge.lock";

    pub fn new(generated_at: DateTime<Utc>) -> Self {
        Self {
            version: Self::VERSION,
            generated_at,
            agents: BTreeMap::new(),
            tools: BTreeMap::new(),
        }
    }

    /// Read a lockfile, returning `None` when it does not exist.
    ///
    /// Lockfiles written by a newer format version are rejected.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let Some(lockfile) = DocumentStore::new().load_optional::<Self>(path)? else {
            return Ok(None);
        };
        lockfile.check_version()?;
        Ok(Some(lockfile))
    }

    pub fn check_version(&self) -> Result<()> {
        if self.version > Self::VERSION {
            return Err(Error::UnsupportedLockfileVersion {
                found: self.version,
                supported: Self::VERSION,
            });
        }
        Ok(())
    }

    pub fn entries(&self, kind: ArtifactKind) -> &BTreeMap<String, LockEntry> {
        match kind {
            ArtifactKind::Agent => &self.agents,
            ArtifactKind::Tool => &self.tools,
        }
    }

    fn entries_mut(&mut self, kind: ArtifactKind) -> &mut BTreeMap<String, LockEntry> {
        match kind {
            ArtifactKind::Agent => &mut self.agents,
            ArtifactKind::Tool => &mut self.tools,
        }
    }

    pub fn get(&self, kind: ArtifactKind, name: &str) -> Option<&LockEntry> {
        self.entries(kind).get(name)
    }

    /// Insert or replace the pin for `name`, returning the previous one.
    pub fn insert(&mut self, kind: ArtifactKind, name: impl Into<String>, entry: LockEntry) -> Option<LockEntry> {
        self.entries_mut(kind).insert(name.into(), entry)
    }

    /// All pins, agents first, each group sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (ArtifactKind, &str, &LockEntry)> {
        ArtifactKind::ALL.into_iter().flat_map(move |kind| {
            self.entries(kind)
                .iter()
                .map(move |(name, entry)| (kind, name.as_str(), entry))
        })
    }

    pub fn len(&self) -> usize {
        self.agents.len() + self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
