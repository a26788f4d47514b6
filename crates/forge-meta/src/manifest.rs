//! Per-name manifests held in the global tier
//!
//! A manifest is discovery metadata: which versions exist, which one is
//! the latest stable release, what is installed locally, and fork lineage.
//! It is never authoritative for artifact content.

use crate::definition::{Dependencies, parse_version};
use crate::kind::ArtifactKind;
use crate::version::compare_versions;
use chrono::{DateTime, Utc};
use semver::Version;
use serde::{Deserialize, Serialize};

/// Release status of one published version.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VersionStatus {
    #[default]
    Stable,
    /// Still resolvable by exact pin, never chosen for a range.
    Deprecated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionEntry {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status: VersionStatus,
}

/// Upstream pointer for a manifest that describes a fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkPointer {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub versions: Vec<VersionEntry>,
    /// Latest stable version as published by the catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latest: Option<String>,
    #[serde(default, skip_serializing_if = "Dependencies::is_empty")]
    pub dependencies: Dependencies,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork_of: Option<ForkPointer>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub forks: Vec<String>,
    #[serde(default)]
    pub installed_versions: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_checked: Option<DateTime<Utc>>,
    #[serde(default)]
    pub update_available: bool,
}

/// Condensed view of a manifest for `artifact_info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSummary {
    pub latest: Option<String>,
    pub versions: Vec<String>,
    pub deprecated: Vec<String>,
    pub installed_versions: Vec<String>,
    pub active_version: Option<String>,
    pub fork_of: Option<ForkPointer>,
    pub forks: Vec<String>,
    pub update_available: bool,
}

impl Manifest {
    pub fn new(name: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            name: name.into(),
            kind,
            description: String::new(),
            versions: Vec::new(),
            latest: None,
            dependencies: Dependencies::default(),
            fork_of: None,
            forks: Vec::new(),
            installed_versions: Vec::new(),
            active_version: None,
            last_checked: None,
            update_available: false,
        }
    }

    /// Published versions that parse as semver.
    ///
    /// Deprecated versions are excluded unless `include_deprecated` is set.
    /// Malformed entries are skipped with a warning.
    pub fn candidate_versions(&self, include_deprecated: bool) -> Vec<Version> {
        self.versions
            .iter()
            .filter(|entry| include_deprecated || entry.status != VersionStatus::Deprecated)
            .filter_map(|entry| match parse_version(&entry.version) {
                Ok(v) => Some(v),
                Err(e) => {
                    tracing::warn!(manifest = %self.name, error = %e, "skipping malformed version entry");
                    None
                }
            })
            .collect()
    }

    pub fn is_deprecated(&self, version: &Version) -> bool {
        self.versions.iter().any(|entry| {
            entry.status == VersionStatus::Deprecated
                && parse_version(&entry.version).is_ok_and(|v| &v == version)
        })
    }

    /// The latest stable version: the published pointer when it is valid and
    /// not deprecated, otherwise the highest stable, non-deprecated entry.
    pub fn latest_stable(&self) -> Option<Version> {
        if let Some(pointer) = self.latest.as_deref().and_then(|l| parse_version(l).ok()) {
            if pointer.pre.is_empty() && !self.is_deprecated(&pointer) {
                return Some(pointer);
            }
        }
        self.candidate_versions(false)
            .into_iter()
            .filter(|v| v.pre.is_empty())
            .max_by(compare_versions)
    }

    /// Record that `version` is now physically present in the global tier.
    pub fn record_install(&mut self, version: &Version) {
        let version = version.to_string();
        if !self.installed_versions.contains(&version) {
            self.installed_versions.push(version.clone());
            self.installed_versions.sort_by(|a, b| cmp_version_strings(a, b));
        }
        if !self.versions.iter().any(|entry| entry.version == version) {
            self.versions.push(VersionEntry {
                version: version.clone(),
                released_at: None,
                status: VersionStatus::Stable,
            });
        }
        self.active_version = self
            .installed_versions
            .iter()
            .max_by(|a, b| cmp_version_strings(a, b))
            .cloned();
        self.refresh_update_flag();
    }

    /// Record that `version` was removed from the global tier.
    ///
    /// Returns whether it had been recorded as installed.
    pub fn record_uninstall(&mut self, version: &Version) -> bool {
        let version = version.to_string();
        let before = self.installed_versions.len();
        self.installed_versions.retain(|v| v != &version);
        let removed = before != self.installed_versions.len();
        if self.active_version.as_deref() == Some(version.as_str()) {
            self.active_version = self
                .installed_versions
                .iter()
                .max_by(|a, b| cmp_version_strings(a, b))
                .cloned();
        }
        self.refresh_update_flag();
        removed
    }

    /// Fold freshly fetched catalog data into this manifest, keeping the
    /// locally tracked install state and fork list.
    pub fn merge_remote(&mut self, remote: &Manifest, checked_at: DateTime<Utc>) {
        self.description = remote.description.clone();
        self.versions = remote.versions.clone();
        for installed in &self.installed_versions {
            if !self.versions.iter().any(|entry| &entry.version == installed) {
                self.versions.push(VersionEntry {
                    version: installed.clone(),
                    released_at: None,
                    status: VersionStatus::Stable,
                });
            }
        }
        self.latest = remote.latest.clone();
        self.dependencies = remote.dependencies.clone();
        self.fork_of = remote.fork_of.clone().or_else(|| self.fork_of.take());
        for fork in &remote.forks {
            self.add_fork(fork);
        }
        self.last_checked = Some(checked_at);
        self.refresh_update_flag();
    }

    /// Register a known fork of this artifact.
    pub fn add_fork(&mut self, name: &str) {
        if !self.forks.iter().any(|f| f == name) {
            self.forks.push(name.to_string());
            self.forks.sort();
        }
    }

    pub fn summary(&self) -> ManifestSummary {
        let mut versions: Vec<Version> = self.candidate_versions(true);
        versions.sort_by(compare_versions);
        ManifestSummary {
            latest: self.latest_stable().map(|v| v.to_string()),
            versions: versions.iter().map(Version::to_string).collect(),
            deprecated: self
                .versions
                .iter()
                .filter(|entry| entry.status == VersionStatus::Deprecated)
                .map(|entry| entry.version.clone())
                .collect(),
            installed_versions: self.installed_versions.clone(),
            active_version: self.active_version.clone(),
            fork_of: self.fork_of.clone(),
            forks: self.forks.clone(),
            update_available: self.update_available,
        }
    }

    fn refresh_update_flag(&mut self) {
        let active = self
            .active_version
            .as_deref()
            .and_then(|v| parse_version(v).ok());
        self.update_available = match (active, self.latest_stable()) {
            (Some(active), Some(latest)) => compare_versions(&latest, &active).is_gt(),
            _ => false,
        };
    }
}

fn cmp_version_strings(a: &str, b: &str) -> std::cmp::Ordering {
    match (parse_version(a), parse_version(b)) {
        (Ok(a), Ok(b)) => compare_versions(&a, &b),
        _ => a.cmp(b),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn entry(version: &str, status: VersionStatus) -> VersionEntry {
        VersionEntry {
            version: version.into(),
            released_at: None,
            status,
        }
    }

    fn sample() -> Manifest {
        let mut m = Manifest::new("code-reviewer", ArtifactKind::Agent);
        m.versions = vec![
            entry("1.0.0", VersionStatus::Stable),
            entry("1.1.0", VersionStatus::Deprecated),
            entry("1.2.0", VersionStatus::Stable),
            entry("2.0.0-rc.1", VersionStatus::Stable),
        ];
        m
    }

    #[test]
    fn latest_stable_ignores_prerelease_and_deprecated() {
        assert_eq!(sample().latest_stable(), Some(Version::new(1, 2, 0)));
    }

    #[test]
    fn deprecated_pointer_is_not_trusted() {
        let mut m = sample();
        m.latest = Some("1.1.0".into());
        assert_eq!(m.latest_stable(), Some(Version::new(1, 2, 0)));
    }

    #[test]
    fn candidate_versions_filters_deprecated() {
        assert_eq!(sample().candidate_versions(false).len(), 3);
        assert_eq!(sample().candidate_versions(true).len(), 4);
    }

    #[test]
    fn install_tracks_active_and_update_flag() {
        let mut m = sample();
        m.record_install(&Version::new(1, 0, 0));
        assert_eq!(m.active_version.as_deref(), Some("1.0.0"));
        assert!(m.update_available);

        m.record_install(&Version::new(1, 2, 0));
        assert_eq!(m.installed_versions, vec!["1.0.0", "1.2.0"]);
        assert_eq!(m.active_version.as_deref(), Some("1.2.0"));
        assert!(!m.update_available);

        assert!(m.record_uninstall(&Version::new(1, 2, 0)));
        assert_eq!(m.active_version.as_deref(), Some("1.0.0"));
    }

    #[test]
    fn merge_remote_keeps_install_state() {
        let mut local = Manifest::new("code-reviewer", ArtifactKind::Agent);
        local.record_install(&Version::new(0, 9, 0));
        local.add_fork("my-reviewer");

        let mut remote = sample();
        remote.forks = vec!["team-reviewer".into()];
        let now: DateTime<Utc> = "2026-03-01T00:00:00Z".parse().unwrap();
        local.merge_remote(&remote, now);

        assert_eq!(local.installed_versions, vec!["0.9.0"]);
        assert!(local.versions.iter().any(|e| e.version == "0.9.0"));
        assert_eq!(local.forks, vec!["my-reviewer", "team-reviewer"]);
        assert_eq!(local.last_checked, Some(now));
        assert!(local.update_available);
    }

    #[test]
    fn serialises_with_documented_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["type"], "agent");
        assert!(json.get("installedVersions").is_some());
        assert!(json.get("updateAvailable").is_some());
        assert_eq!(json["versions"][1]["status"], "deprecated");
    }
}
