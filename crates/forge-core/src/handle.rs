//! Explicit handle on registry locations and settings
//!
//! Components never read ambient paths; they receive a [`RegistryHandle`]
//! built once from the resolved configuration.

use crate::config::{ConfigResolver, ForgeConfig, CONFIG_FILE, DEFAULT_LOCAL_DIR};
use crate::{Error, Result};
use forge_meta::{ArtifactKind, Lockfile, Tier};
use semver::Version;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteSettings {
    pub url: String,
    pub enabled: bool,
    pub timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheSettings {
    pub enabled: bool,
    pub disk: bool,
    /// Freshness window for manifest metadata.
    pub manifest_ttl: Duration,
}

#[derive(Debug, Clone)]
pub struct RegistryHandle {
    project_root: PathBuf,
    local_dir: PathBuf,
    global_dir: PathBuf,
    tier_order: Vec<Tier>,
    remote: RemoteSettings,
    cache: CacheSettings,
    config_token: Option<String>,
}

impl RegistryHandle {
    /// Resolve configuration for `project_root` and build a handle from it.
    pub fn discover(project_root: impl Into<PathBuf>) -> Result<Self> {
        let project_root = project_root.into();
        let config = ConfigResolver::new(&project_root).resolve()?;
        Self::from_config(project_root, &config)
    }

    pub fn from_config(project_root: impl Into<PathBuf>, config: &ForgeConfig) -> Result<Self> {
        let project_root = project_root.into();
        let global_dir = match &config.registry.global_path {
            Some(dir) => dir.clone(),
            None => crate::config::default_global_dir().ok_or_else(|| Error::Config {
                source_name: "registry.global_path".to_string(),
                message: "cannot determine the home directory".to_string(),
            })?,
        };
        if config.registry.tier_order.is_empty() {
            return Err(Error::Config {
                source_name: "registry.tier_order".to_string(),
                message: "at least one tier is required".to_string(),
            });
        }

        Ok(Self {
            local_dir: project_root.join(&config.registry.local_path),
            project_root,
            global_dir,
            tier_order: config.registry.tier_order.clone(),
            remote: RemoteSettings {
                url: config.registry.remote_url.clone(),
                enabled: config.registry.remote_enabled,
                timeout: Duration::from_secs(config.remote.timeout),
                max_retries: config.remote.max_retries,
                initial_backoff: Duration::from_millis(config.remote.initial_backoff_ms),
            },
            cache: CacheSettings {
                enabled: config.cache.enabled,
                disk: config.cache.disk,
                manifest_ttl: Duration::from_secs(config.cache.ttl),
            },
            config_token: config.auth.token.clone(),
        })
    }

    /// A handle over explicit directories with default settings.
    pub fn for_dirs(project_root: impl Into<PathBuf>, global_dir: impl Into<PathBuf>) -> Self {
        let project_root = project_root.into();
        let defaults = ForgeConfig::default();
        Self {
            local_dir: project_root.join(DEFAULT_LOCAL_DIR),
            project_root,
            global_dir: global_dir.into(),
            tier_order: defaults.registry.tier_order,
            remote: RemoteSettings {
                url: defaults.registry.remote_url,
                enabled: defaults.registry.remote_enabled,
                timeout: Duration::from_secs(defaults.remote.timeout),
                max_retries: defaults.remote.max_retries,
                initial_backoff: Duration::from_millis(defaults.remote.initial_backoff_ms),
            },
            cache: CacheSettings {
                enabled: defaults.cache.enabled,
                disk: defaults.cache.disk,
                manifest_ttl: Duration::from_secs(defaults.cache.ttl),
            },
            config_token: None,
        }
    }

    pub fn with_remote(mut self, remote: RemoteSettings) -> Self {
        self.remote = remote;
        self
    }

    pub fn with_remote_url(mut self, url: impl Into<String>) -> Self {
        self.remote.url = url.into();
        self
    }

    pub fn with_remote_enabled(mut self, enabled: bool) -> Self {
        self.remote.enabled = enabled;
        self
    }

    pub fn with_cache(mut self, cache: CacheSettings) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_tier_order(mut self, order: Vec<Tier>) -> Self {
        self.tier_order = order;
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn local_dir(&self) -> &Path {
        &self.local_dir
    }

    pub fn global_dir(&self) -> &Path {
        &self.global_dir
    }

    pub fn tier_order(&self) -> &[Tier] {
        &self.tier_order
    }

    pub fn remote(&self) -> &RemoteSettings {
        &self.remote
    }

    pub fn cache(&self) -> &CacheSettings {
        &self.cache
    }

    /// `auth.token` from the merged configuration, if any.
    pub fn config_token(&self) -> Option<&str> {
        self.config_token.as_deref()
    }

    /// `<project>/.forge/<kind>s/<name>.yaml`
    pub fn local_definition_path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.local_dir.join(kind.dir_name()).join(format!("{name}.yaml"))
    }

    pub fn local_kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.local_dir.join(kind.dir_name())
    }

    /// `<global>/<kind>s/<name>`
    pub fn global_versions_dir(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.global_dir.join(kind.dir_name()).join(name)
    }

    /// `<global>/<kind>s/<name>/<version>/definition.yaml`
    pub fn global_definition_path(&self, kind: ArtifactKind, name: &str, version: &Version) -> PathBuf {
        self.global_versions_dir(kind, name)
            .join(version.to_string())
            .join("definition.yaml")
    }

    pub fn global_kind_dir(&self, kind: ArtifactKind) -> PathBuf {
        self.global_dir.join(kind.dir_name())
    }

    /// `<global>/manifests/<kind>s/<name>.json`
    pub fn manifest_path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        self.global_dir
            .join("manifests")
            .join(kind.dir_name())
            .join(format!("{name}.json"))
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.global_dir.join("cache")
    }

    pub fn lockfile_path(&self) -> PathBuf {
        self.local_dir.join(Lockfile::FILE_NAME)
    }

    /// Per-user config file, written with owner-only permissions.
    pub fn user_config_path(&self) -> PathBuf {
        self.global_dir.join(CONFIG_FILE)
    }
}
