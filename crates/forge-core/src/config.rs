//! Layered configuration
//!
//! The [`ConfigResolver`] merges configuration from several sources, later
//! sources overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. Per-user config (`<global>/config.yaml`)
//! 3. Project config (`<project>/.forge/config.yaml`)
//! 4. `FORGE_*` environment variables
//!
//! Objects are deep-merged, everything else is replaced.

use crate::{Error, Result};
use forge_fs::DocumentStore;
use forge_meta::Tier;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "config.yaml";
pub const DEFAULT_LOCAL_DIR: &str = ".forge";
pub const DEFAULT_GLOBAL_DIR: &str = ".forge";
pub const DEFAULT_REMOTE_URL: &str = "https://registry.fractary.com";

/// Effective configuration after all layers were merged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ForgeConfig {
    pub registry: RegistryConfig,
    pub cache: CacheConfig,
    pub remote: RemoteConfig,
    pub auth: AuthConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Project tier directory, relative to the project root.
    pub local_path: PathBuf,
    /// Global tier directory. `None` means `~/.forge`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub global_path: Option<PathBuf>,
    pub remote_url: String,
    pub remote_enabled: bool,
    pub tier_order: Vec<Tier>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            local_path: PathBuf::from(DEFAULT_LOCAL_DIR),
            global_path: None,
            remote_url: DEFAULT_REMOTE_URL.to_string(),
            remote_enabled: true,
            tier_order: vec![Tier::Local, Tier::Global, Tier::Remote],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Freshness window for manifest metadata, in seconds.
    pub ttl: u64,
    pub disk: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: 3600,
            disk: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Per-request timeout in seconds.
    pub timeout: u64,
    pub max_retries: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            timeout: 30,
            max_retries: 3,
            initial_backoff_ms: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Default global tier directory: `~/.forge`.
pub fn default_global_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(DEFAULT_GLOBAL_DIR))
}

/// Resolves [`ForgeConfig`] for one project root.
pub struct ConfigResolver {
    project_root: PathBuf,

    /// Override for the global directory (used for testing).
    /// When `None`, `FORGE_REGISTRY_GLOBAL_PATH` or `~/.forge` is used.
    global_dir_override: Option<PathBuf>,

    /// Snapshot of the `FORGE_*` environment.
    env: HashMap<String, String>,
}

impl ConfigResolver {
    /// Create a resolver reading the process environment.
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            project_root: project_root.into(),
            global_dir_override: None,
            env: std::env::vars().filter(|(k, _)| k.starts_with("FORGE_")).collect(),
        }
    }

    /// Use a fixed global directory instead of the user's home.
    pub fn with_global_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.global_dir_override = Some(dir.into());
        self
    }

    /// Replace the environment snapshot.
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// The global directory that layer 2 is read from.
    pub fn global_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.global_dir_override {
            return Ok(dir.clone());
        }
        if let Some(dir) = self.env.get("FORGE_REGISTRY_GLOBAL_PATH") {
            return Ok(PathBuf::from(dir));
        }
        default_global_dir().ok_or_else(|| Error::Config {
            source_name: "environment".to_string(),
            message: "cannot determine the home directory; set FORGE_REGISTRY_GLOBAL_PATH".to_string(),
        })
    }

    /// Merge all layers into the effective configuration.
    ///
    /// Missing files are skipped. A file that fails to parse is an error
    /// naming that file.
    pub fn resolve(&self) -> Result<ForgeConfig> {
        let mut merged = serde_json::to_value(ForgeConfig::default())?;
        let global_dir = self.global_dir()?;

        let user_config = global_dir.join(CONFIG_FILE);
        self.merge_file(&mut merged, &user_config, "user")?;

        let local_dir = self
            .env
            .get("FORGE_REGISTRY_LOCAL_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_LOCAL_DIR));
        let project_config = self.project_root.join(local_dir).join(CONFIG_FILE);
        self.merge_file(&mut merged, &project_config, "project")?;

        deep_merge_value(&mut merged, &self.env_layer()?);

        let mut config: ForgeConfig = serde_json::from_value(merged).map_err(|e| Error::Config {
            source_name: "merged configuration".to_string(),
            message: e.to_string(),
        })?;

        if self.global_dir_override.is_some() || config.registry.global_path.is_none() {
            config.registry.global_path = Some(global_dir);
        }
        Ok(config)
    }

    fn merge_file(&self, merged: &mut Value, path: &Path, layer: &str) -> Result<()> {
        if !path.is_file() {
            tracing::debug!(?path, layer, "no config file, skipping");
            return Ok(());
        }
        tracing::debug!(?path, layer, "loading config layer");
        let value: Value = DocumentStore::new().load(path).map_err(|e| Error::Config {
            source_name: path.display().to_string(),
            message: e.to_string(),
        })?;
        match value {
            Value::Null => Ok(()),
            Value::Object(_) => {
                deep_merge_value(merged, &value);
                Ok(())
            }
            _ => Err(Error::Config {
                source_name: path.display().to_string(),
                message: "expected a mapping at the top level".to_string(),
            }),
        }
    }

    fn env_layer(&self) -> Result<Value> {
        let mut layer = serde_json::json!({});
        let mut set = |section: &str, key: &str, value: Value| {
            if let Some(obj) = layer.as_object_mut() {
                let section = obj
                    .entry(section.to_string())
                    .or_insert_with(|| Value::Object(Default::default()));
                if let Some(section) = section.as_object_mut() {
                    section.insert(key.to_string(), value);
                }
            }
        };

        if let Some(v) = self.env.get("FORGE_REGISTRY_LOCAL_PATH") {
            set("registry", "local_path", Value::from(v.as_str()));
        }
        if let Some(v) = self.env.get("FORGE_REGISTRY_GLOBAL_PATH") {
            set("registry", "global_path", Value::from(v.as_str()));
        }
        if let Some(v) = self.env.get("FORGE_REGISTRY_REMOTE_URL") {
            set("registry", "remote_url", Value::from(v.as_str()));
        }
        if let Some(v) = self.env.get("FORGE_REMOTE_ENABLED") {
            set("registry", "remote_enabled", Value::from(parse_flag("FORGE_REMOTE_ENABLED", v)?));
        }
        if let Some(v) = self.env.get("FORGE_CACHE_ENABLED") {
            set("cache", "enabled", Value::from(parse_flag("FORGE_CACHE_ENABLED", v)?));
        }
        if let Some(v) = self.env.get("FORGE_CACHE_TTL") {
            let ttl: u64 = v.trim().parse().map_err(|_| Error::Config {
                source_name: "FORGE_CACHE_TTL".to_string(),
                message: format!("expected a number of seconds, got '{v}'"),
            })?;
            set("cache", "ttl", Value::from(ttl));
        }
        if let Some(v) = self.env.get("FORGE_LOG_LEVEL") {
            set("logging", "level", Value::from(v.as_str()));
        }
        Ok(layer)
    }
}

fn parse_flag(var: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(Error::Config {
            source_name: var.to_string(),
            message: format!("expected true or false, got '{raw}'"),
        }),
    }
}

/// Deep merge `other` into `base`: objects merge key by key, anything else
/// is replaced.
pub(crate) fn deep_merge_value(base: &mut Value, other: &Value) {
    match (base, other) {
        (Value::Object(base_map), Value::Object(other_map)) => {
            for (key, other_val) in other_map {
                if let Some(base_val) = base_map.get_mut(key) {
                    deep_merge_value(base_val, other_val);
                } else {
                    base_map.insert(key.clone(), other_val.clone());
                }
            }
        }
        (base, other) => {
            *base = other.clone();
        }
    }
}
