//! Remote registry client
//!
//! Endpoints, relative to the configured registry URL:
//!
//! | request                    | path                                   |
//! |----------------------------|----------------------------------------|
//! | manifest for a name        | `/api/v1/<kind>s/<name>/manifest`      |
//! | one version's definition   | `/api/v1/<kind>s/<name>/<version>`     |
//! | catalog listing            | `/api/v1/list?type=<kind>`             |
//!
//! `404` is a plain miss and is never retried. `401`/`403` map to
//! authentication/authorization errors. Timeouts, connection failures,
//! `429` and `5xx` are retried with exponential backoff, bounded by
//! `max_retries`, then surface as [`Error::Network`].

use crate::handle::RemoteSettings;
use crate::{Error, Result};
use backoff::Error as BackoffError;
use forge_meta::{ArtifactDefinition, ArtifactKind, Manifest};
use reqwest::StatusCode;
use semver::Version;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One row of the remote catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CatalogPage {
    #[serde(default)]
    items: Vec<CatalogItem>,
}

/// Access to a remote catalog.
///
/// `Ok(None)` means the registry answered that the item does not exist.
pub trait RegistryClient: Send + Sync {
    fn fetch_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>>;

    fn fetch_artifact(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<Option<ArtifactDefinition>>;

    fn list(&self, kind: ArtifactKind) -> Result<Vec<CatalogItem>>;
}

/// Blocking HTTP implementation of [`RegistryClient`].
#[derive(Debug)]
pub struct HttpRegistryClient {
    base_url: String,
    client: reqwest::blocking::Client,
    token: Option<String>,
    max_retries: u32,
    initial_backoff: Duration,
}

impl HttpRegistryClient {
    pub fn new(settings: &RemoteSettings, token: Option<String>) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(settings.timeout)
            .user_agent(concat!("forge/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::Network {
                url: settings.url.clone(),
                attempts: 0,
                message: format!("failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            client,
            token,
            max_retries: settings.max_retries,
            initial_backoff: settings.initial_backoff,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }

    /// GET `path` and decode JSON. `Ok(None)` on 404.
    fn get_json<T: DeserializeOwned>(&self, path: &str, kind: ArtifactKind, artifact: &str) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, path);
        let mut attempts: u32 = 0;

        let policy = backoff::ExponentialBackoffBuilder::new()
            .with_initial_interval(self.initial_backoff)
            .with_max_interval(Duration::from_secs(10))
            .with_max_elapsed_time(None)
            .build();

        let operation = || {
            attempts += 1;
            let outcome = self.attempt(&url, kind, artifact);
            match outcome {
                Err(Attempt::Transient(message)) if attempts > self.max_retries => {
                    Err(BackoffError::permanent(Error::Network {
                        url: url.clone(),
                        attempts,
                        message,
                    }))
                }
                Err(Attempt::Transient(message)) => {
                    tracing::debug!(%url, attempts, %message, "transient registry failure, retrying");
                    Err(BackoffError::transient(Error::Network {
                        url: url.clone(),
                        attempts,
                        message,
                    }))
                }
                Err(Attempt::Fatal(e)) => Err(BackoffError::permanent(e)),
                Ok(response) => Ok(response),
            }
        };

        let response = match backoff::retry(policy, operation) {
            Ok(response) => response,
            Err(BackoffError::Permanent(e)) => return Err(e),
            Err(BackoffError::Transient { err, .. }) => return Err(err),
        };

        let Some(response) = response else {
            return Ok(None);
        };
        response.json::<T>().map(Some).map_err(|e| Error::Network {
            url,
            attempts,
            message: format!("malformed response body: {e}"),
        })
    }

    fn attempt(&self, url: &str, kind: ArtifactKind, artifact: &str) -> std::result::Result<Option<reqwest::blocking::Response>, Attempt> {
        let mut request = self.client.get(url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().map_err(|e| {
            if e.is_timeout() {
                Attempt::Transient(format!("request timed out: {e}"))
            } else if e.is_connect() {
                Attempt::Transient(format!("connection failed: {e}"))
            } else {
                Attempt::Transient(format!("request failed: {e}"))
            }
        })?;

        let status = response.status();
        match status {
            s if s.is_success() => Ok(Some(response)),
            StatusCode::NOT_FOUND => Ok(None),
            StatusCode::UNAUTHORIZED => Err(Attempt::Fatal(Error::Authentication {
                registry: self.base_url.clone(),
                message: if self.token.is_some() {
                    "the token was rejected".to_string()
                } else {
                    format!("{kind} '{artifact}' requires authentication")
                },
            })),
            StatusCode::FORBIDDEN => Err(Attempt::Fatal(Error::Authorization {
                kind,
                artifact: artifact.to_string(),
            })),
            s if s.is_server_error() || s == StatusCode::TOO_MANY_REQUESTS => {
                Err(Attempt::Transient(format!("registry responded {s}")))
            }
            s => Err(Attempt::Fatal(Error::Network {
                url: url.to_string(),
                attempts: 1,
                message: format!("unexpected status {s}"),
            })),
        }
    }
}

enum Attempt {
    Transient(String),
    Fatal(Error),
}

impl RegistryClient for HttpRegistryClient {
    fn fetch_manifest(&self, kind: ArtifactKind, name: &str) -> Result<Option<Manifest>> {
        let path = format!("/api/v1/{}/{}/manifest", kind.dir_name(), name);
        self.get_json(&path, kind, name)
    }

    fn fetch_artifact(&self, kind: ArtifactKind, name: &str, version: &Version) -> Result<Option<ArtifactDefinition>> {
        let path = format!("/api/v1/{}/{}/{}", kind.dir_name(), name, version);
        self.get_json(&path, kind, &format!("{name}@{version}"))
    }

    fn list(&self, kind: ArtifactKind) -> Result<Vec<CatalogItem>> {
        let path = format!("/api/v1/list?type={kind}");
        let page: Option<CatalogPage> = self.get_json(&path, kind, "*")?;
        Ok(page.map(|p| p.items).unwrap_or_default())
    }
}
