//! Lockfile generation and pinned resolution
//!
//! Generation walks the dependency graph of every name in active use and
//! pins each node's version, tier and integrity hash. Pinned resolution
//! reads only what is on disk: a missing version or changed content is an
//! error, never a prompt to fetch or substitute.

use crate::clock::Clock;
use crate::graph::{DependencyGraph, DependencyResolver};
use crate::handle::RegistryHandle;
use crate::resolver::ArtifactSource;
use crate::store::{GlobalStore, LocalStore};
use crate::tiers::{ResolvedArtifact, check_stored_version, validate_local};
use crate::{Error, Result};
use forge_fs::{DocumentStore, FileLock};
use forge_meta::{
    ArtifactKind, ArtifactReference, LockEntry, LockedDependencies, Lockfile, Tier, integrity, parse_version,
};
use std::sync::Arc;

pub struct LockfileManager {
    handle: RegistryHandle,
    local: LocalStore,
    global: GlobalStore,
    clock: Arc<dyn Clock>,
}

impl LockfileManager {
    pub fn new(handle: RegistryHandle, clock: Arc<dyn Clock>) -> Self {
        Self {
            local: LocalStore::new(handle.clone()),
            global: GlobalStore::new(handle.clone()),
            handle,
            clock,
        }
    }

    /// Names in active use: every project definition plus `roots`.
    pub fn active_references(&self, roots: &[(ArtifactKind, ArtifactReference)]) -> Result<Vec<(ArtifactKind, ArtifactReference)>> {
        let mut references = Vec::new();
        for kind in ArtifactKind::ALL {
            for name in self.local.names(kind)? {
                references.push((kind, ArtifactReference::latest(name)));
            }
        }
        references.extend(roots.iter().cloned());
        Ok(references)
    }

    /// Build a lockfile from the dependency graph of all active names and
    /// write it under an exclusive lock.
    pub fn generate<S: ArtifactSource + ?Sized>(
        &self,
        source: &S,
        roots: &[(ArtifactKind, ArtifactReference)],
    ) -> Result<Lockfile> {
        let references = self.active_references(roots)?;
        let graph = DependencyResolver::new(source).resolve_roots(&references)?;
        let lockfile = self.snapshot(&graph)?;

        let path = self.handle.lockfile_path();
        let _guard = FileLock::acquire(&path)?;
        DocumentStore::new().save(&path, &lockfile)?;
        tracing::info!(path = %path.display(), entries = lockfile.len(), "wrote lockfile");
        Ok(lockfile)
    }

    /// Convert a resolved graph into lockfile entries.
    pub fn snapshot(&self, graph: &DependencyGraph) -> Result<Lockfile> {
        let mut lockfile = Lockfile::new(self.clock.now());
        for node in graph.iter() {
            let mut dependencies = LockedDependencies::default();
            for dep in &node.dependencies {
                dependencies
                    .entries_mut(dep.kind)
                    .insert(dep.name.clone(), dep.version.to_string());
            }
            let entry = LockEntry {
                version: node.id.version.to_string(),
                resolved_tier: node.artifact.source_tier.pinned(),
                integrity_hash: node.artifact.integrity_hash.clone(),
                dependencies,
            };
            if let Some(previous) = lockfile.get(node.id.kind, &node.id.name) {
                if previous.version != entry.version {
                    return Err(Error::lockfile(format!(
                        "{} '{}' is required at both {} and {}; align the dependency constraints and run `forge lock`",
                        node.id.kind, node.id.name, previous.version, entry.version
                    )));
                }
            }
            lockfile.insert(node.id.kind, node.id.name.clone(), entry);
        }
        Ok(lockfile)
    }

    /// Read the project lockfile.
    pub fn load(&self) -> Result<Lockfile> {
        let path = self.handle.lockfile_path();
        Lockfile::load(&path)?.ok_or_else(|| {
            Error::lockfile(format!("no lockfile at {}; run `forge lock` to create one", path.display()))
        })
    }

    /// Resolve `name` exactly as pinned, without touching the network.
    pub fn resolve_from_lockfile(&self, kind: ArtifactKind, name: &str, lockfile: &Lockfile) -> Result<ResolvedArtifact> {
        let entry = lockfile.get(kind, name).ok_or_else(|| {
            Error::lockfile(format!(
                "{kind} '{name}' is not in the lockfile; run `forge lock` to regenerate it"
            ))
        })?;
        let version = parse_version(&entry.version)?;

        let (stored, tier) = match entry.resolved_tier {
            Tier::Local => {
                let stored = self.local.read(kind, name)?.ok_or_else(|| {
                    Error::lockfile(format!(
                        "{kind} '{name}' is pinned to the project tier but {} is missing; restore it or run `forge lock`",
                        self.local.path(kind, name).display()
                    ))
                })?;
                let declared = validate_local(&stored, name)?;
                if declared != version {
                    return Err(Error::lockfile(format!(
                        "{kind} '{name}' is pinned at {version} but the project definition declares {declared}; run `forge lock` to re-pin"
                    )));
                }
                (stored, Tier::Local)
            }
            Tier::Global | Tier::Remote => {
                let stored = self.global.read(kind, name, &version)?.ok_or_else(|| Error::CacheMiss {
                    kind,
                    name: name.to_string(),
                    version: version.to_string(),
                })?;
                (stored, Tier::Global)
            }
        };

        let actual = integrity::integrity_hash(&stored.bytes);
        if actual != entry.integrity_hash {
            return Err(Error::Integrity {
                kind,
                name: name.to_string(),
                version: version.to_string(),
                expected: entry.integrity_hash.clone(),
                actual,
            });
        }
        if tier == Tier::Global {
            check_stored_version(&stored, &version)?;
        }

        tracing::debug!(kind = %kind, name, version = %version, tier = %tier, "resolved from lockfile");
        Ok(ResolvedArtifact::from_stored(kind, stored, tier, version))
    }
}

/// An [`ArtifactSource`] that answers only from a lockfile.
///
/// A pin that does not satisfy the requested constraint is an error rather
/// than a silent substitution. Project pins are unconditional overrides.
pub struct PinnedSource<'a> {
    manager: &'a LockfileManager,
    lockfile: &'a Lockfile,
}

impl<'a> PinnedSource<'a> {
    pub fn new(manager: &'a LockfileManager, lockfile: &'a Lockfile) -> Self {
        Self { manager, lockfile }
    }
}

impl ArtifactSource for PinnedSource<'_> {
    fn resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        let resolved = self
            .manager
            .resolve_from_lockfile(kind, &reference.name, self.lockfile)?;
        if resolved.source_tier != Tier::Local && !reference.constraint.satisfies(&resolved.version) {
            return Err(Error::lockfile(format!(
                "lockfile pins {kind} '{}' at {}, which does not satisfy '{}'; run `forge lock` to re-pin",
                reference.name, resolved.version, reference.constraint
            )));
        }
        Ok(resolved)
    }
}
