//! Tier strategies
//!
//! Each tier answers `try_resolve` with a hit, a miss (`Ok(None)`) or an
//! error. The [`SourceResolver`](crate::resolver::SourceResolver) walks
//! them in configured order and stops at the first hit.

use crate::cache::{self, CacheManager};
use crate::clock::Clock;
use crate::remote::RegistryClient;
use crate::store::{GlobalStore, LocalStore, StoredDefinition};
use crate::{Error, Result};
use forge_meta::{
    ArtifactDefinition, ArtifactKind, ArtifactReference, Manifest, Tier, best_match, integrity,
};
use semver::Version;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// The outcome of a successful resolution. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedArtifact {
    pub kind: ArtifactKind,
    pub definition: ArtifactDefinition,
    pub source_tier: Tier,
    pub version: Version,
    pub integrity_hash: String,
}

impl ResolvedArtifact {
    pub fn name(&self) -> &str {
        &self.definition.name
    }

    pub(crate) fn from_stored(kind: ArtifactKind, stored: StoredDefinition, tier: Tier, version: Version) -> Self {
        Self {
            kind,
            integrity_hash: integrity::integrity_hash(&stored.bytes),
            definition: stored.definition,
            source_tier: tier,
            version,
        }
    }
}

pub trait TierStrategy: Send + Sync {
    fn tier(&self) -> Tier;

    fn try_resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<Option<ResolvedArtifact>>;
}

/// Project definitions. Presence is an unconditional override.
pub struct LocalTier {
    store: LocalStore,
}

impl LocalTier {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }
}

impl TierStrategy for LocalTier {
    fn tier(&self) -> Tier {
        Tier::Local
    }

    fn try_resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<Option<ResolvedArtifact>> {
        let Some(stored) = self.store.read(kind, &reference.name)? else {
            return Ok(None);
        };
        let version = validate_local(&stored, &reference.name)?;

        if !reference.constraint.is_latest() && !reference.constraint.satisfies(&version) {
            tracing::debug!(
                kind = %kind,
                name = %reference.name,
                constraint = %reference.constraint,
                version = %version,
                "local definition overrides a constraint it does not satisfy"
            );
        }
        Ok(Some(ResolvedArtifact::from_stored(kind, stored, Tier::Local, version)))
    }
}

/// Check a project definition: required fields, semantic version, and a
/// name matching its file.
pub(crate) fn validate_local(stored: &StoredDefinition, expected_name: &str) -> Result<Version> {
    let location = stored.path.display();
    let version = stored
        .definition
        .validate_versioned()
        .map_err(|e| Error::validation(&location, e))?;
    if stored.definition.name != expected_name {
        return Err(Error::validation(
            &location,
            format!(
                "file is named '{expected_name}' but declares name '{}'",
                stored.definition.name
            ),
        ));
    }
    Ok(version)
}

/// Versions installed under the global directory.
pub struct GlobalTier {
    store: GlobalStore,
}

impl GlobalTier {
    pub fn new(store: GlobalStore) -> Self {
        Self { store }
    }
}

impl TierStrategy for GlobalTier {
    fn tier(&self) -> Tier {
        Tier::Global
    }

    fn try_resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<Option<ResolvedArtifact>> {
        let mut candidates = self.store.versions(kind, &reference.name)?;
        if candidates.is_empty() {
            return Ok(None);
        }
        if reference.constraint.exact_version().is_none() {
            if let Some(manifest) = self.store.load_manifest(kind, &reference.name)? {
                candidates.retain(|v| !manifest.is_deprecated(v));
            }
        }

        let Some(version) = best_match(&candidates, &reference.constraint) else {
            return Ok(None);
        };
        let Some(stored) = self.store.read(kind, &reference.name, &version)? else {
            return Ok(None);
        };
        check_stored_version(&stored, &version)?;
        Ok(Some(ResolvedArtifact::from_stored(kind, stored, Tier::Global, version)))
    }
}

pub(crate) fn check_stored_version(stored: &StoredDefinition, expected: &Version) -> Result<()> {
    let location = stored.path.display();
    let declared = stored
        .definition
        .validate_versioned()
        .map_err(|e| Error::validation(&location, e))?;
    if &declared != expected {
        return Err(Error::validation(
            &location,
            format!("stored under version {expected} but declares {declared}"),
        ));
    }
    Ok(())
}

/// The networked catalog. Hits are persisted into the global tier before
/// being returned.
pub struct RemoteTier {
    store: GlobalStore,
    client: Arc<dyn RegistryClient>,
    cache: Arc<CacheManager>,
    clock: Arc<dyn Clock>,
    manifest_ttl: Duration,
}

impl RemoteTier {
    pub fn new(
        store: GlobalStore,
        client: Arc<dyn RegistryClient>,
        cache: Arc<CacheManager>,
        clock: Arc<dyn Clock>,
        manifest_ttl: Duration,
    ) -> Self {
        Self {
            store,
            client,
            cache,
            clock,
            manifest_ttl,
        }
    }

    /// The global manifest for `name`, refreshed from the catalog once the
    /// cached catalog response is older than the TTL.
    ///
    /// `Ok(None)` when the catalog does not know the name.
    pub fn manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        let key = cache::manifest_key(kind, name);
        let remote = match self.cache.get_as::<Manifest>(&key) {
            Some(remote) => {
                if let Some(stored) = self.store.load_manifest(kind, name)? {
                    if stored.last_checked.is_some() {
                        return Ok(Some(stored));
                    }
                }
                remote
            }
            None => match self.fetch_catalog_manifest(kind, name)? {
                Some(remote) => remote,
                None => return Ok(None),
            },
        };

        let mut manifest = self.store.manifest_or_new(kind, name)?;
        manifest.merge_remote(&remote, self.clock.now());
        self.store.save_manifest(&manifest)?;
        tracing::debug!(kind = %kind, name, latest = ?manifest.latest, "refreshed manifest from catalog");
        Ok(Some(manifest))
    }

    /// The catalog's own manifest for `name`. Leaves the global tier alone.
    pub fn catalog_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        match self.cache.get_as::<Manifest>(&cache::manifest_key(kind, name)) {
            Some(remote) => Ok(Some(remote)),
            None => self.fetch_catalog_manifest(kind, name),
        }
    }

    fn fetch_catalog_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        let Some(remote) = self.client.fetch_manifest(kind, name)? else {
            return Ok(None);
        };
        self.cache.set(
            &cache::manifest_key(kind, name),
            serde_json::to_value(&remote)?,
            Some(self.manifest_ttl),
        )?;
        Ok(Some(remote))
    }

    fn fetch_definition(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<Option<ArtifactDefinition>> {
        let key = cache::artifact_key(kind, name, version);
        if let Some(definition) = self.cache.get_as::<ArtifactDefinition>(&key) {
            return Ok(Some(definition));
        }
        let Some(definition) = self.client.fetch_artifact(kind, name, version)? else {
            return Ok(None);
        };
        self.cache.set(&key, serde_json::to_value(&definition)?, None)?;
        Ok(Some(definition))
    }
}

impl TierStrategy for RemoteTier {
    fn tier(&self) -> Tier {
        Tier::Remote
    }

    fn try_resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<Option<ResolvedArtifact>> {
        let Some(manifest) = self.manifest(kind, &reference.name)? else {
            return Ok(None);
        };
        let exact = reference.constraint.exact_version().is_some();
        let candidates = manifest.candidate_versions(exact);
        let Some(version) = best_match(&candidates, &reference.constraint) else {
            return Ok(None);
        };
        let Some(mut definition) = self.fetch_definition(kind, &reference.name, &version)? else {
            return Ok(None);
        };

        let location = format!("{kind} '{}@{version}' from the remote registry", reference.name);
        definition.validate().map_err(|e| Error::validation(&location, e))?;
        if definition.name != reference.name {
            return Err(Error::validation(
                &location,
                format!("registry returned a definition named '{}'", definition.name),
            ));
        }
        match definition.version.as_deref() {
            None | Some("") => definition.version = Some(version.to_string()),
            Some(_) => {
                let declared = definition.semver().map_err(|e| Error::validation(&location, e))?;
                if declared != version {
                    return Err(Error::validation(&location, format!("definition declares version {declared}")));
                }
            }
        }

        let bytes = self.store.write(kind, &definition, &version)?;
        let mut manifest = self.store.manifest_or_new(kind, &reference.name)?;
        manifest.record_install(&version);
        self.store.save_manifest(&manifest)?;
        tracing::debug!(kind = %kind, name = %reference.name, version = %version, "installed from remote into global tier");

        Ok(Some(ResolvedArtifact {
            kind,
            integrity_hash: integrity::integrity_hash(&bytes),
            definition,
            source_tier: Tier::Remote,
            version,
        }))
    }
}
