//! The programmatic surface
//!
//! [`Forge`] wires the tier strategies, cache, lockfile manager and fork
//! engine over one [`RegistryHandle`]. One value is one resolution session:
//! repeated lookups are answered from the session memo until something is
//! installed, removed or explicitly invalidated.

use crate::auth::TokenResolver;
use crate::cache::{self, CacheManager};
use crate::clock::{Clock, SystemClock};
use crate::fork::{ConflictResolutionStrategy, ForkEngine, MergeOutcome, UpstreamStatus};
use crate::graph::{DependencyGraph, DependencyResolver};
use crate::handle::RegistryHandle;
use crate::lockfile::{LockfileManager, PinnedSource};
use crate::remote::{HttpRegistryClient, RegistryClient};
use crate::resolver::SourceResolver;
use crate::store::{GlobalStore, LocalStore};
use crate::tiers::{GlobalTier, LocalTier, RemoteTier, ResolvedArtifact, TierStrategy};
use crate::{Error, Result};
use forge_meta::{
    ArtifactDefinition, ArtifactKind, ArtifactReference, Lockfile, Manifest, ManifestSummary, Tier, validate_name,
};
use semver::Version;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;

/// One row of [`Forge::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactListing {
    pub kind: ArtifactKind,
    pub name: String,
    pub version: Option<String>,
    pub tier: Tier,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArtifactInfo {
    pub kind: ArtifactKind,
    pub name: String,
    pub version: Version,
    pub tier: Tier,
    pub integrity_hash: String,
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<ManifestSummary>,
}

/// Builder for [`Forge`], for injecting a clock or a registry client.
pub struct ForgeBuilder {
    handle: RegistryHandle,
    clock: Arc<dyn Clock>,
    client: Option<Arc<dyn RegistryClient>>,
    tokens: Option<TokenResolver>,
}

impl ForgeBuilder {
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Use `client` for the remote tier instead of the HTTP client.
    pub fn client(mut self, client: Arc<dyn RegistryClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn tokens(mut self, tokens: TokenResolver) -> Self {
        self.tokens = Some(tokens);
        self
    }

    pub fn build(self) -> Result<Forge> {
        let handle = self.handle;
        let clock = self.clock;
        let local = LocalStore::new(handle.clone());
        let global = GlobalStore::new(handle.clone());
        let cache = Arc::new(CacheManager::new(&handle, clock.clone()));

        let client = match (self.client, handle.remote().enabled) {
            (_, false) => None,
            (Some(client), true) => Some(client),
            (None, true) => {
                let tokens = self.tokens.unwrap_or_else(|| TokenResolver::from_handle(&handle));
                let token = tokens.token(&handle.remote().url);
                let client: Arc<dyn RegistryClient> = Arc::new(HttpRegistryClient::new(handle.remote(), token)?);
                Some(client)
            }
        };

        let remote = client.as_ref().map(|client| {
            Arc::new(RemoteTier::new(
                global.clone(),
                client.clone(),
                cache.clone(),
                clock.clone(),
                handle.cache().manifest_ttl,
            ))
        });

        let mut tiers: Vec<Arc<dyn TierStrategy>> = Vec::new();
        for tier in handle.tier_order() {
            match tier {
                Tier::Local => tiers.push(Arc::new(LocalTier::new(local.clone()))),
                Tier::Global => tiers.push(Arc::new(GlobalTier::new(global.clone()))),
                Tier::Remote => {
                    if let Some(remote) = &remote {
                        tiers.push(remote.clone());
                    }
                }
            }
        }
        let resolver = SourceResolver::new(tiers);
        tracing::debug!(tiers = ?resolver.tier_order(), project = %handle.project_root().display(), "registry session ready");

        Ok(Forge {
            lockfiles: LockfileManager::new(handle.clone(), clock.clone()),
            handle,
            clock,
            cache,
            client,
            remote,
            resolver,
            local,
            global,
        })
    }
}

pub struct Forge {
    handle: RegistryHandle,
    clock: Arc<dyn Clock>,
    cache: Arc<CacheManager>,
    client: Option<Arc<dyn RegistryClient>>,
    remote: Option<Arc<RemoteTier>>,
    resolver: SourceResolver,
    lockfiles: LockfileManager,
    local: LocalStore,
    global: GlobalStore,
}

impl Forge {
    /// Open a session for `project_root` using the layered configuration.
    pub fn open(project_root: impl Into<PathBuf>) -> Result<Self> {
        Self::builder(RegistryHandle::discover(project_root)?).build()
    }

    pub fn builder(handle: RegistryHandle) -> ForgeBuilder {
        ForgeBuilder {
            handle,
            clock: Arc::new(SystemClock),
            client: None,
            tokens: None,
        }
    }

    pub fn handle(&self) -> &RegistryHandle {
        &self.handle
    }

    pub fn resolver(&self) -> &SourceResolver {
        &self.resolver
    }

    pub fn cache(&self) -> &CacheManager {
        &self.cache
    }

    /// Resolve a `name[@constraint]` token.
    pub fn resolve(&self, kind: ArtifactKind, reference: &str) -> Result<ResolvedArtifact> {
        self.resolver.resolve(kind, &ArtifactReference::parse(reference)?)
    }

    pub fn resolve_reference(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        self.resolver.resolve(kind, reference)
    }

    pub fn has_artifact(&self, kind: ArtifactKind, reference: &str) -> Result<bool> {
        match self.resolve(kind, reference) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn artifact_info(&self, kind: ArtifactKind, reference: &str) -> Result<ArtifactInfo> {
        let resolved = self.resolve(kind, reference)?;
        let manifest = self.global.load_manifest(kind, resolved.name())?;
        Ok(ArtifactInfo {
            kind,
            name: resolved.name().to_string(),
            version: resolved.version.clone(),
            tier: resolved.source_tier,
            integrity_hash: resolved.integrity_hash.clone(),
            description: resolved.definition.description.clone(),
            manifest: manifest.as_ref().map(Manifest::summary),
        })
    }

    /// Everything available per tier, or only in `tier`.
    pub fn list(&self, kind: ArtifactKind, tier: Option<Tier>) -> Result<Vec<ArtifactListing>> {
        let wanted = |t: Tier| tier.is_none_or(|only| only == t);
        let mut listings = Vec::new();

        if wanted(Tier::Local) {
            for name in self.local.names(kind)? {
                match self.local.read(kind, &name)? {
                    Some(stored) => listings.push(ArtifactListing {
                        kind,
                        name,
                        version: stored.definition.version,
                        tier: Tier::Local,
                        description: stored.definition.description,
                    }),
                    None => tracing::warn!(kind = %kind, name, "skipping unreadable project definition"),
                }
            }
        }

        if wanted(Tier::Global) {
            for name in self.global.names(kind)? {
                for version in self.global.versions(kind, &name)? {
                    let description = match self.global.read(kind, &name, &version) {
                        Ok(stored) => stored.and_then(|s| s.definition.description),
                        Err(e) => {
                            tracing::warn!(kind = %kind, name, version = %version, error = %e, "skipping malformed stored definition");
                            continue;
                        }
                    };
                    listings.push(ArtifactListing {
                        kind,
                        name: name.clone(),
                        version: Some(version.to_string()),
                        tier: Tier::Global,
                        description,
                    });
                }
            }
        }

        if wanted(Tier::Remote) {
            if let Some(client) = &self.client {
                match client.list(kind) {
                    Ok(items) => listings.extend(items.into_iter().map(|item| ArtifactListing {
                        kind,
                        name: item.name,
                        version: item.version,
                        tier: Tier::Remote,
                        description: item.description,
                    })),
                    Err(e) if e.is_remote_unavailable() => {
                        tracing::warn!(kind = %kind, error = %e, "remote catalog unavailable, listing local tiers only");
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        Ok(listings)
    }

    /// Make sure a version matching `reference` is stored in the global
    /// tier and recorded as installed.
    pub fn install(&self, kind: ArtifactKind, reference: &str) -> Result<ResolvedArtifact> {
        let reference = ArtifactReference::parse(reference)?;
        let resolved = self.resolver.resolve_upstream(kind, &reference)?;
        if resolved.source_tier == Tier::Global {
            let mut manifest = self.global.manifest_or_new(kind, &reference.name)?;
            manifest.record_install(&resolved.version);
            self.global.save_manifest(&manifest)?;
        }
        self.resolver.forget(kind, &reference.name);
        tracing::info!(kind = %kind, name = %reference.name, version = %resolved.version, from = %resolved.source_tier, "installed");
        Ok(resolved)
    }

    /// Remove one stored version from the global tier.
    pub fn uninstall(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<()> {
        validate_name(name).map_err(|e| Error::validation(format!("{kind} '{name}'"), e))?;
        if !self.global.remove(kind, name, version)? {
            return Err(Error::NotFound {
                kind,
                reference: format!("{name}@{version}"),
                searched: "searched global".to_string(),
            });
        }
        if let Some(mut manifest) = self.global.load_manifest(kind, name)? {
            manifest.record_uninstall(version);
            self.global.save_manifest(&manifest)?;
        }
        self.cache.invalidate(Some(&cache::artifact_key(kind, name, version)))?;
        self.resolver.forget(kind, name);
        tracing::info!(kind = %kind, name, version = %version, "uninstalled");
        Ok(())
    }

    /// The global manifest for `name`, refreshed from the remote catalog
    /// when the cached copy is stale.
    pub fn refresh_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        if let Some(remote) = &self.remote {
            match remote.manifest(kind, name) {
                Ok(Some(manifest)) => return Ok(Some(manifest)),
                Ok(None) => {}
                Err(e) if e.is_remote_unavailable() => {
                    tracing::warn!(kind = %kind, name, error = %e, "manifest refresh failed, using stored manifest");
                }
                Err(e) => return Err(e),
            }
        }
        self.global.load_manifest(kind, name)
    }

    pub fn resolve_dependencies(&self, kind: ArtifactKind, root: &ArtifactDefinition) -> Result<DependencyGraph> {
        DependencyResolver::new(&self.resolver).resolve_dependencies(kind, root)
    }

    /// Like [`Forge::resolve_dependencies`], answering only from `lockfile`.
    pub fn resolve_dependencies_pinned(
        &self,
        kind: ArtifactKind,
        root: &ArtifactDefinition,
        lockfile: &Lockfile,
    ) -> Result<DependencyGraph> {
        let source = PinnedSource::new(&self.lockfiles, lockfile);
        DependencyResolver::new(&source).resolve_dependencies(kind, root)
    }

    /// Pin every project definition plus `roots`, with their transitive
    /// dependencies, and write the lockfile.
    pub fn generate_lockfile(&self, roots: &[(ArtifactKind, ArtifactReference)]) -> Result<Lockfile> {
        self.lockfiles.generate(&self.resolver, roots)
    }

    pub fn load_lockfile(&self) -> Result<Lockfile> {
        self.lockfiles.load()
    }

    pub fn resolve_from_lockfile(&self, kind: ArtifactKind, name: &str, lockfile: &Lockfile) -> Result<ResolvedArtifact> {
        self.lockfiles.resolve_from_lockfile(kind, name, lockfile)
    }

    /// Resolve every lockfile entry offline; the first failure is returned.
    pub fn verify_lockfile(&self) -> Result<Vec<ResolvedArtifact>> {
        let lockfile = self.load_lockfile()?;
        lockfile
            .iter()
            .map(|(kind, name, _)| self.lockfiles.resolve_from_lockfile(kind, name, &lockfile))
            .collect()
    }

    pub fn fork(&self, kind: ArtifactKind, source: &str, target: &str) -> Result<ArtifactDefinition> {
        self.fork_engine().fork(kind, &ArtifactReference::parse(source)?, target)
    }

    pub fn check_upstream(&self, kind: ArtifactKind, target: &str) -> Result<UpstreamStatus> {
        self.fork_engine().check_upstream(kind, target)
    }

    pub fn merge_upstream(
        &self,
        kind: ArtifactKind,
        target: &str,
        strategy: &mut dyn ConflictResolutionStrategy,
    ) -> Result<MergeOutcome> {
        self.fork_engine().merge_upstream(kind, target, strategy)
    }

    /// Clear one cache key, or all of it, and the session memo.
    pub fn invalidate_cache(&self, key: Option<&str>) -> Result<usize> {
        self.resolver.clear_memo();
        self.cache.invalidate(key)
    }

    fn fork_engine(&self) -> ForkEngine<'_> {
        let engine = ForkEngine::new(&self.resolver, self.local.clone(), self.global.clone(), self.clock.clone());
        match &self.remote {
            Some(remote) => engine.with_catalog(remote),
            None => engine,
        }
    }
}
