//! Two-level cache for remote responses
//!
//! Lookups hit the in-memory map first, then the on-disk store under
//! `<global>/cache/`. Disk hits are promoted into memory. Entries without a
//! TTL (downloaded artifact content) never go stale and are only removed by
//! [`CacheManager::invalidate`].

use crate::clock::Clock;
use crate::handle::RegistryHandle;
use crate::Result;
use chrono::{DateTime, Utc};
use forge_fs::{DocumentStore, checksum, io};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    pub key: String,
    pub content: Value,
    pub cached_at: DateTime<Utc>,
    /// Seconds until stale; `None` never expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u64>,
}

/// Cache key for a manifest fetched from the remote catalog.
pub fn manifest_key(kind: forge_meta::ArtifactKind, name: &str) -> String {
    format!("manifest:{kind}:{name}")
}

/// Cache key for downloaded artifact content.
pub fn artifact_key(kind: forge_meta::ArtifactKind, name: &str, version: &semver::Version) -> String {
    format!("artifact:{kind}:{name}@{version}")
}

#[derive(Debug)]
pub struct CacheManager {
    memory: Mutex<HashMap<String, CacheEntry>>,
    disk_dir: Option<PathBuf>,
    enabled: bool,
    clock: Arc<dyn Clock>,
    documents: DocumentStore,
}

impl CacheManager {
    pub fn new(handle: &RegistryHandle, clock: Arc<dyn Clock>) -> Self {
        let settings = handle.cache();
        Self {
            memory: Mutex::new(HashMap::new()),
            disk_dir: settings.disk.then(|| handle.cache_dir()),
            enabled: settings.enabled,
            clock,
            documents: DocumentStore::new(),
        }
    }

    /// Single source of truth for staleness: fresh while age < ttl.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        match entry.ttl {
            None => true,
            Some(ttl) => {
                let age = self.clock.now().signed_duration_since(entry.cached_at);
                age.num_milliseconds() < (ttl as i64).saturating_mul(1000)
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        if !self.enabled {
            return None;
        }

        {
            let mut memory = self.memory();
            if let Some(entry) = memory.get(key) {
                if self.is_fresh(entry) {
                    tracing::trace!(key, layer = "memory", "cache hit");
                    return Some(entry.clone());
                }
                memory.remove(key);
            }
        }

        let path = self.disk_path(key)?;
        let entry: CacheEntry = match self.documents.load_optional(&path) {
            Ok(Some(entry)) => entry,
            Ok(None) => return None,
            Err(e) => {
                tracing::warn!(key, error = %e, "ignoring unreadable cache entry");
                return None;
            }
        };
        if entry.key != key || !self.is_fresh(&entry) {
            tracing::trace!(key, layer = "disk", "cache entry stale");
            return None;
        }

        tracing::trace!(key, layer = "disk", "cache hit, promoting");
        self.memory().insert(key.to_string(), entry.clone());
        Some(entry)
    }

    /// Deserialize a fresh entry's content, dropping entries that no longer
    /// match the expected shape.
    pub fn get_as<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        let entry = self.get(key)?;
        match serde_json::from_value(entry.content) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key, error = %e, "discarding cache entry with unexpected shape");
                None
            }
        }
    }

    /// Store `content` under `key` in both layers.
    pub fn set(&self, key: &str, content: Value, ttl: Option<Duration>) -> Result<()> {
        if !self.enabled {
            return Ok(());
        }
        let entry = CacheEntry {
            key: key.to_string(),
            content,
            cached_at: self.clock.now(),
            ttl: ttl.map(|t| t.as_secs()),
        };
        if let Some(path) = self.disk_path(key) {
            self.documents.save(&path, &entry)?;
        }
        self.memory().insert(key.to_string(), entry);
        Ok(())
    }

    /// Clear one key, or everything when `key` is `None`, from both layers.
    ///
    /// Returns the number of entries removed from disk.
    pub fn invalidate(&self, key: Option<&str>) -> Result<usize> {
        match key {
            Some(key) => {
                self.memory().remove(key);
                match self.disk_path(key) {
                    Some(path) => Ok(usize::from(io::remove_if_exists(&path)?)),
                    None => Ok(0),
                }
            }
            None => {
                self.memory().clear();
                let Some(dir) = &self.disk_dir else {
                    return Ok(0);
                };
                let entries = match std::fs::read_dir(dir) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
                    Err(e) => return Err(forge_fs::Error::io(dir, e).into()),
                };
                let mut removed = 0;
                for entry in entries {
                    let path = entry?.path();
                    if path.extension().is_some_and(|ext| ext == "json") && io::remove_if_exists(&path)? {
                        removed += 1;
                    }
                }
                tracing::debug!(removed, "cache cleared");
                Ok(removed)
            }
        }
    }

    fn disk_path(&self, key: &str) -> Option<PathBuf> {
        self.disk_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.json", checksum::hex_digest(key.as_bytes()))))
    }

    fn memory(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.memory.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use tempfile::TempDir;

    fn setup() -> (TempDir, Arc<ManualClock>, RegistryHandle) {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new("2026-01-01T00:00:00Z".parse().unwrap()));
        let handle = RegistryHandle::for_dirs(dir.path().join("p"), dir.path().join("g"));
        (dir, clock, handle)
    }

    #[test]
    fn entry_expires_at_ttl() {
        let (_dir, clock, handle) = setup();
        let cache = CacheManager::new(&handle, clock.clone());
        cache.set("k", json!(1), Some(Duration::from_secs(60))).unwrap();

        clock.advance(chrono::Duration::seconds(59));
        assert!(cache.get("k").is_some());
        clock.advance(chrono::Duration::seconds(1));
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn content_without_ttl_never_expires() {
        let (_dir, clock, handle) = setup();
        let cache = CacheManager::new(&handle, clock.clone());
        cache.set("artifact", json!({"a": 1}), None).unwrap();
        clock.advance(chrono::Duration::days(3650));
        assert_eq!(cache.get("artifact").unwrap().content, json!({"a": 1}));
    }

    #[test]
    fn disk_hits_are_promoted_across_instances() {
        let (_dir, clock, handle) = setup();
        CacheManager::new(&handle, clock.clone())
            .set("k", json!("v"), None)
            .unwrap();

        let fresh = CacheManager::new(&handle, clock.clone());
        assert_eq!(fresh.get("k").unwrap().content, json!("v"));
        assert!(fresh.memory().contains_key("k"));
    }

    #[test]
    fn invalidate_single_key_and_all() {
        let (_dir, clock, handle) = setup();
        let cache = CacheManager::new(&handle, clock);
        cache.set("a", json!(1), None).unwrap();
        cache.set("b", json!(2), None).unwrap();

        assert_eq!(cache.invalidate(Some("a")).unwrap(), 1);
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());

        assert_eq!(cache.invalidate(None).unwrap(), 1);
        assert!(cache.get("b").is_none());
    }

    #[test]
    fn disabled_cache_stores_nothing() {
        let (_dir, clock, handle) = setup();
        let mut settings = handle.cache().clone();
        settings.enabled = false;
        let cache = CacheManager::new(&handle.with_cache(settings), clock);
        cache.set("k", json!(1), None).unwrap();
        assert!(cache.get("k").is_none());
    }
}
