//! Registry token discovery and the login helper
//!
//! Lookup order, first match wins:
//!
//! 1. `FORGE_REGISTRY_TOKEN`
//! 2. `auth.token` in the merged configuration (the per-user file is
//!    written with owner-only permissions)
//! 3. a platform [`CredentialStore`], best-effort
//!
//! Without a token, requests go out anonymously.

use crate::handle::RegistryHandle;
use crate::Result;
use forge_fs::DocumentStore;
use serde_json::Value;

pub const TOKEN_ENV: &str = "FORGE_REGISTRY_TOKEN";

/// Error type for credential backends; never surfaced to callers.
pub type CredentialError = Box<dyn std::error::Error + Send + Sync>;

/// A platform credential backend (keychain, secret service, ...).
pub trait CredentialStore: Send + Sync {
    fn token(&self, registry_url: &str) -> std::result::Result<Option<String>, CredentialError>;
}

/// Backend used when no platform store is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCredentialStore;

impl CredentialStore for NoCredentialStore {
    fn token(&self, _registry_url: &str) -> std::result::Result<Option<String>, CredentialError> {
        Ok(None)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenSource {
    Environment,
    ConfigFile,
    CredentialStore,
}

pub struct TokenResolver {
    env_token: Option<String>,
    config_token: Option<String>,
    store: Box<dyn CredentialStore>,
}

impl TokenResolver {
    /// Read the environment and the handle's configured token.
    pub fn from_handle(handle: &RegistryHandle) -> Self {
        Self {
            env_token: std::env::var(TOKEN_ENV).ok(),
            config_token: handle.config_token().map(str::to_string),
            store: Box::new(NoCredentialStore),
        }
    }

    pub fn new(env_token: Option<String>, config_token: Option<String>) -> Self {
        Self {
            env_token,
            config_token,
            store: Box::new(NoCredentialStore),
        }
    }

    pub fn with_credential_store(mut self, store: Box<dyn CredentialStore>) -> Self {
        self.store = store;
        self
    }

    pub fn resolve(&self, registry_url: &str) -> Option<(String, TokenSource)> {
        let usable = |t: &Option<String>| t.as_deref().map(str::trim).filter(|t| !t.is_empty()).map(str::to_string);

        if let Some(token) = usable(&self.env_token) {
            return Some((token, TokenSource::Environment));
        }
        if let Some(token) = usable(&self.config_token) {
            return Some((token, TokenSource::ConfigFile));
        }
        match self.store.token(registry_url) {
            Ok(token) => usable(&token).map(|t| (t, TokenSource::CredentialStore)),
            Err(e) => {
                tracing::debug!(error = %e, "credential store unavailable, continuing anonymously");
                None
            }
        }
    }

    pub fn token(&self, registry_url: &str) -> Option<String> {
        self.resolve(registry_url).map(|(token, source)| {
            tracing::debug!(?source, "using registry token");
            token
        })
    }
}

/// Save `token` as `auth.token` in the per-user config, keeping every other
/// setting. The file is written with owner-only permissions.
pub fn store_token(handle: &RegistryHandle, token: &str) -> Result<()> {
    let path = handle.user_config_path();
    let store = DocumentStore::new();
    let mut config: Value = store
        .load_optional(&path)?
        .filter(Value::is_object)
        .unwrap_or_else(|| serde_json::json!({}));

    if let Some(obj) = config.as_object_mut() {
        let auth = obj
            .entry("auth")
            .or_insert_with(|| Value::Object(Default::default()));
        if !auth.is_object() {
            *auth = Value::Object(Default::default());
        }
        if let Some(auth) = auth.as_object_mut() {
            auth.insert("token".to_string(), Value::from(token));
        }
    }
    store.save_private(&path, &config)?;
    tracing::info!(path = %path.display(), "stored registry token");
    Ok(())
}

/// Remove a stored token. Returns whether one was present.
pub fn clear_token(handle: &RegistryHandle) -> Result<bool> {
    let path = handle.user_config_path();
    let store = DocumentStore::new();
    let Some(mut config) = store.load_optional::<Value>(&path)? else {
        return Ok(false);
    };
    let removed = config
        .get_mut("auth")
        .and_then(Value::as_object_mut)
        .and_then(|auth| auth.remove("token"))
        .is_some();
    if removed {
        store.save_private(&path, &config)?;
    }
    Ok(removed)
}
