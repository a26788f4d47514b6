//! Shared fixtures for forge-core integration tests

#![allow(dead_code)]

use chrono::{DateTime, Utc};
use forge_core::{Error, Forge, ManualClock, RegistryClient, RegistryHandle, Result};
use forge_core::remote::CatalogItem;
use forge_meta::{ArtifactDefinition, ArtifactKind, Manifest, VersionEntry, VersionStatus, compare_versions};
use forge_test_utils::TestForge;
use semver::Version;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn start_time() -> DateTime<Utc> {
    "2026-04-01T09:00:00Z".parse().unwrap()
}

/// In-memory catalog that counts every call.
#[derive(Default)]
pub struct FakeRegistry {
    manifests: Mutex<HashMap<(ArtifactKind, String), Manifest>>,
    artifacts: Mutex<HashMap<(ArtifactKind, String, Version), ArtifactDefinition>>,
    manifest_calls: AtomicUsize,
    artifact_calls: AtomicUsize,
    list_calls: AtomicUsize,
    offline: AtomicBool,
}

impl FakeRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Publish a definition under its declared version.
    pub fn publish(&self, kind: ArtifactKind, definition: ArtifactDefinition) {
        let version = definition.semver().unwrap();
        let mut manifests = self.manifests.lock().unwrap();
        let manifest = manifests
            .entry((kind, definition.name.clone()))
            .or_insert_with(|| Manifest::new(definition.name.clone(), kind));
        manifest.description = definition.description.clone().unwrap_or_default();
        manifest.versions.push(VersionEntry {
            version: version.to_string(),
            released_at: Some(start_time()),
            status: VersionStatus::Stable,
        });
        let newest = manifest
            .candidate_versions(false)
            .into_iter()
            .filter(|v| v.pre.is_empty())
            .max_by(compare_versions);
        manifest.latest = newest.map(|v| v.to_string());
        self.artifacts
            .lock()
            .unwrap()
            .insert((kind, definition.name.clone(), version), definition);
    }

    pub fn deprecate(&self, kind: ArtifactKind, name: &str, version: &str) {
        let mut manifests = self.manifests.lock().unwrap();
        let manifest = manifests.get_mut(&(kind, name.to_string())).unwrap();
        for entry in &mut manifest.versions {
            if entry.version == version {
                entry.status = VersionStatus::Deprecated;
            }
        }
        if manifest.latest.as_deref() == Some(version) {
            manifest.latest = None;
        }
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn manifest_calls(&self) -> usize {
        self.manifest_calls.load(Ordering::SeqCst)
    }

    pub fn artifact_calls(&self) -> usize {
        self.artifact_calls.load(Ordering::SeqCst)
    }

    /// Every call of any kind.
    pub fn calls(&self) -> usize {
        self.manifest_calls() + self.artifact_calls() + self.list_calls.load(Ordering::SeqCst)
    }

    fn check_online(&self) -> Result<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(Error::Network {
                url: "http://fake.registry".into(),
                attempts: 4,
                message: "connection refused".into(),
            });
        }
        Ok(())
    }
}

impl RegistryClient for FakeRegistry {
    fn fetch_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        self.manifest_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self.manifests.lock().unwrap().get(&(kind, name.to_string())).cloned())
    }

    fn fetch_artifact(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<Option<ArtifactDefinition>> {
        self.artifact_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self
            .artifacts
            .lock()
            .unwrap()
            .get(&(kind, name.to_string(), version.clone()))
            .cloned())
    }

    fn list(&self, kind: ArtifactKind) -> Result<Vec<CatalogItem>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        self.check_online()?;
        Ok(self
            .manifests
            .lock()
            .unwrap()
            .values()
            .filter(|m| m.kind == kind)
            .map(|m| CatalogItem {
                name: m.name.clone(),
                version: m.latest.clone(),
                description: Some(m.description.clone()),
            })
            .collect())
    }
}

pub fn definition(name: &str, version: &str, description: &str) -> ArtifactDefinition {
    ArtifactDefinition::new(name, &Version::parse(version).unwrap(), description)
}

pub fn handle(env: &TestForge) -> RegistryHandle {
    RegistryHandle::for_dirs(env.project_root(), env.global_dir())
}

/// A session backed by `registry`, with its clock.
pub fn session_with_clock(env: &TestForge, registry: &Arc<FakeRegistry>) -> (Forge, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(start_time()));
    let forge = Forge::builder(handle(env))
        .clock(clock.clone())
        .client(registry.clone())
        .build()
        .expect("Should build a session");
    (forge, clock)
}

pub fn session(env: &TestForge, registry: &Arc<FakeRegistry>) -> Forge {
    session_with_clock(env, registry).0
}

/// A session with the remote tier disabled.
pub fn offline_session(env: &TestForge) -> Forge {
    Forge::builder(handle(env).with_remote_enabled(false))
        .clock(Arc::new(ManualClock::new(start_time())))
        .build()
        .expect("Should build an offline session")
}
