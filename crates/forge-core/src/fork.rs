//! Forking and upstream merges
//!
//! A fork is a project-local copy of a registry artifact stamped with a
//! [`ForkRecord`]. Merging compares three versions of every top-level
//! field: the upstream release the fork was based on, the local copy, and
//! the latest upstream release. Fields changed on one side apply cleanly;
//! fields changed on both sides go to a [`ConflictResolutionStrategy`].
//! Nothing is written until every conflict is settled and the strategy
//! confirms.

use crate::clock::Clock;
use crate::resolver::SourceResolver;
use crate::store::{GlobalStore, LocalStore};
use crate::tiers::{RemoteTier, ResolvedArtifact};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use forge_meta::{
    ArtifactDefinition, ArtifactKind, ArtifactReference, ForkOrigin, ForkRecord, VersionConstraint, best_match,
    compare_versions, validate_name,
};
use semver::Version;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Fields that belong to the fork itself and never merge.
const FORK_OWNED_FIELDS: [&str; 2] = ["name", "fork"];

/// One field changed on both sides.
#[derive(Debug, Clone, PartialEq)]
pub struct Conflict {
    pub field: String,
    pub base: Option<Value>,
    pub local: Option<Value>,
    pub upstream: Option<Value>,
}

impl Conflict {
    /// Whether [`Resolution::Combine`] applies: both sides are arrays or
    /// both are objects.
    pub fn is_combinable(&self) -> bool {
        combine(self.local.as_ref(), self.upstream.as_ref()).is_some()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    KeepLocal,
    KeepUpstream,
    /// Concatenate arrays (deduplicated) or shallow-merge objects, local
    /// keys winning.
    Combine,
    /// Use this value verbatim.
    Manual(Value),
    Abort,
}

/// Decides conflicts during [`ForkEngine::merge_upstream`].
pub trait ConflictResolutionStrategy {
    fn resolve(&mut self, conflict: &Conflict) -> Result<Resolution>;

    /// Last chance to back out once every field is settled.
    fn confirm(&mut self, _outcome: &MergeOutcome) -> Result<bool> {
        Ok(true)
    }
}

/// Non-interactive policy applied to every conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergePolicy {
    KeepLocal,
    KeepUpstream,
    Combine,
}

impl std::str::FromStr for MergePolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "keep-local" | "local" => Ok(Self::KeepLocal),
            "keep-upstream" | "upstream" => Ok(Self::KeepUpstream),
            "combine" => Ok(Self::Combine),
            other => Err(Error::Config {
                source_name: "merge policy".to_string(),
                message: format!("unknown policy '{other}' (expected keep-local, keep-upstream or combine)"),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PolicyStrategy {
    policy: MergePolicy,
}

impl PolicyStrategy {
    pub fn new(policy: MergePolicy) -> Self {
        Self { policy }
    }
}

impl ConflictResolutionStrategy for PolicyStrategy {
    fn resolve(&mut self, conflict: &Conflict) -> Result<Resolution> {
        Ok(match self.policy {
            MergePolicy::KeepLocal => Resolution::KeepLocal,
            MergePolicy::KeepUpstream => Resolution::KeepUpstream,
            MergePolicy::Combine if conflict.is_combinable() => Resolution::Combine,
            MergePolicy::Combine => {
                tracing::debug!(field = %conflict.field, "field cannot be combined, keeping local value");
                Resolution::KeepLocal
            }
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpstreamStatus {
    pub name: String,
    pub upstream: String,
    pub current_version: Version,
    pub latest_version: Version,
    pub up_to_date: bool,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub definition: ArtifactDefinition,
    pub from_version: Version,
    pub to_version: Version,
    /// Fields taken from upstream without conflict.
    pub applied: Vec<String>,
    /// Conflicting fields and how each was settled.
    pub resolved: Vec<(String, Resolution)>,
    /// Set when there was nothing newer to merge.
    pub up_to_date: bool,
}

pub struct ForkEngine<'a> {
    resolver: &'a SourceResolver,
    catalog: Option<&'a RemoteTier>,
    local: LocalStore,
    global: GlobalStore,
    clock: Arc<dyn Clock>,
}

impl<'a> ForkEngine<'a> {
    pub fn new(
        resolver: &'a SourceResolver,
        local: LocalStore,
        global: GlobalStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            resolver,
            catalog: None,
            local,
            global,
            clock,
        }
    }

    /// Consult a catalog for upstream releases not yet installed.
    pub fn with_catalog(mut self, catalog: &'a RemoteTier) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Copy `source` into the project tier as `target`.
    pub fn fork(&self, kind: ArtifactKind, source: &ArtifactReference, target: &str) -> Result<ArtifactDefinition> {
        let target_path = self.local.path(kind, target);
        validate_name(target).map_err(|e| Error::validation(target_path.display(), e))?;
        if self.local.exists(kind, target) {
            return Err(Error::validation(
                target_path.display(),
                format!("'{target}' already exists in the project tier; choose another name or remove the file"),
            ));
        }

        let upstream = self.resolver.resolve_upstream(kind, source)?;
        let mut definition = upstream.definition.clone();
        definition.name = target.to_string();
        definition.version = Some(upstream.version.to_string());
        definition.fork = Some(ForkRecord {
            fork_of: ForkOrigin {
                name: source.name.clone(),
                version: upstream.version.to_string(),
                forked_at: self.clock.now(),
                merged_at: None,
            },
            local_name: target.to_string(),
        });
        self.local.write(kind, &definition)?;

        let mut manifest = self.global.manifest_or_new(kind, &source.name)?;
        manifest.record_install(&upstream.version);
        manifest.add_fork(target);
        self.global.save_manifest(&manifest)?;
        self.resolver.forget(kind, target);

        tracing::info!(kind = %kind, source = %source.name, version = %upstream.version, target, "forked artifact");
        Ok(definition)
    }

    /// Compare a fork's base version with the latest upstream release.
    pub fn check_upstream(&self, kind: ArtifactKind, target: &str) -> Result<UpstreamStatus> {
        let (_, record) = self.load_fork(kind, target)?;
        let base = record.base_version()?;
        let latest = self.latest_upstream(kind, &record.fork_of.name)?;
        Ok(UpstreamStatus {
            name: target.to_string(),
            upstream: record.fork_of.name.clone(),
            up_to_date: compare_versions(&latest, &base).is_le(),
            current_version: base,
            latest_version: latest,
        })
    }

    /// Three-way merge the latest upstream release into the fork.
    pub fn merge_upstream(
        &self,
        kind: ArtifactKind,
        target: &str,
        strategy: &mut dyn ConflictResolutionStrategy,
    ) -> Result<MergeOutcome> {
        let (local, record) = self.load_fork(kind, target)?;
        let base_version = record.base_version()?;
        let latest = self.latest_upstream(kind, &record.fork_of.name)?;

        if compare_versions(&latest, &base_version).is_le() {
            return Ok(MergeOutcome {
                definition: local,
                from_version: base_version.clone(),
                to_version: base_version,
                applied: Vec::new(),
                resolved: Vec::new(),
                up_to_date: true,
            });
        }

        let latest = self
            .resolver
            .resolve_upstream(kind, &ArtifactReference::exact(&record.fork_of.name, &latest))?;
        let base = self
            .resolver
            .resolve_upstream(kind, &ArtifactReference::exact(&record.fork_of.name, &base_version))?;

        let base_fields = mergeable_fields(&base.definition)?;
        let local_fields = mergeable_fields(&local)?;
        let upstream_fields = mergeable_fields(&latest.definition)?;

        let keys: BTreeSet<&String> = base_fields
            .keys()
            .chain(local_fields.keys())
            .chain(upstream_fields.keys())
            .collect();

        let mut merged = Map::new();
        let mut applied = Vec::new();
        let mut resolved = Vec::new();
        for key in keys {
            let b = base_fields.get(key);
            let l = local_fields.get(key);
            let u = upstream_fields.get(key);

            let value = if l == u || u == b {
                l.cloned()
            } else if l == b {
                applied.push(key.clone());
                u.cloned()
            } else {
                let conflict = Conflict {
                    field: key.clone(),
                    base: b.cloned(),
                    local: l.cloned(),
                    upstream: u.cloned(),
                };
                let resolution = strategy.resolve(&conflict)?;
                let value = match &resolution {
                    Resolution::KeepLocal => conflict.local.clone(),
                    Resolution::KeepUpstream => conflict.upstream.clone(),
                    Resolution::Combine => Some(combine(l, u).ok_or_else(|| {
                        Error::validation(
                            format!("field `{key}` of '{target}'"),
                            "only arrays or objects can be combined; keep one side or edit manually",
                        )
                    })?),
                    Resolution::Manual(value) => Some(value.clone()),
                    Resolution::Abort => {
                        tracing::info!(target, field = %key, "merge aborted");
                        return Err(Error::MergeAborted {
                            name: target.to_string(),
                        });
                    }
                };
                resolved.push((key.clone(), resolution));
                value
            };
            if let Some(value) = value {
                merged.insert(key.clone(), value);
            }
        }

        let definition = self.assemble(kind, target, merged, &record, &latest, self.clock.now())?;
        let outcome = MergeOutcome {
            definition,
            from_version: base_version,
            to_version: latest.version.clone(),
            applied,
            resolved,
            up_to_date: false,
        };

        if !strategy.confirm(&outcome)? {
            return Err(Error::MergeAborted {
                name: target.to_string(),
            });
        }

        self.local.write(kind, &outcome.definition)?;
        self.resolver.forget(kind, target);
        tracing::info!(
            target,
            from = %outcome.from_version,
            to = %outcome.to_version,
            conflicts = outcome.resolved.len(),
            "merged upstream changes"
        );
        Ok(outcome)
    }

    fn assemble(
        &self,
        kind: ArtifactKind,
        target: &str,
        mut fields: Map<String, Value>,
        record: &ForkRecord,
        latest: &ResolvedArtifact,
        merged_at: DateTime<Utc>,
    ) -> Result<ArtifactDefinition> {
        let location = self.local.path(kind, target);
        fields.insert("name".to_string(), Value::from(target));
        let mut definition: ArtifactDefinition = serde_json::from_value(Value::Object(fields))
            .map_err(|e| Error::validation(location.display(), format!("merged definition is malformed: {e}")))?;
        definition.fork = Some(ForkRecord {
            fork_of: ForkOrigin {
                name: record.fork_of.name.clone(),
                version: latest.version.to_string(),
                forked_at: record.fork_of.forked_at,
                merged_at: Some(merged_at),
            },
            local_name: target.to_string(),
        });
        definition
            .validate_versioned()
            .map_err(|e| Error::validation(location.display(), e))?;
        Ok(definition)
    }

    fn load_fork(&self, kind: ArtifactKind, target: &str) -> Result<(ArtifactDefinition, ForkRecord)> {
        let stored = self.local.read(kind, target)?.ok_or_else(|| Error::NotFound {
            kind,
            reference: target.to_string(),
            searched: "searched local".to_string(),
        })?;
        let record = stored.definition.fork.clone().ok_or_else(|| {
            Error::validation(
                stored.path.display(),
                format!("'{target}' is not a fork; run `forge fork {kind} <source> {target}` to create one"),
            )
        })?;
        Ok((stored.definition, record))
    }

    /// The newest stable upstream version, installed or still in the
    /// catalog. Only reads manifests, so nothing is downloaded or installed.
    fn latest_upstream(&self, kind: ArtifactKind, name: &str) -> Result<Version> {
        let latest = VersionConstraint::latest();
        let mut candidates = self.global.versions(kind, name)?;
        if let Some(manifest) = self.global.load_manifest(kind, name)? {
            candidates.retain(|v| !manifest.is_deprecated(v));
        }
        let installed = best_match(&candidates, &latest);

        let published = match self.catalog {
            Some(remote) => match remote.catalog_manifest(kind, name) {
                Ok(Some(manifest)) => manifest.latest_stable(),
                Ok(None) => None,
                Err(e) if e.is_remote_unavailable() => {
                    tracing::warn!(kind = %kind, name, error = %e, "catalog unavailable, using installed versions");
                    None
                }
                Err(e) => return Err(e),
            },
            None => None,
        };

        match (installed, published) {
            (Some(a), Some(b)) => Ok(if compare_versions(&b, &a).is_gt() { b } else { a }),
            (a, b) => a.or(b).ok_or_else(|| Error::NotFound {
                kind,
                reference: name.to_string(),
                searched: if self.catalog.is_some() {
                    "searched global, remote".to_string()
                } else {
                    "searched global".to_string()
                },
            }),
        }
    }
}

/// Top-level fields of a definition that take part in a merge.
fn mergeable_fields(definition: &ArtifactDefinition) -> Result<Map<String, Value>> {
    let mut fields = match serde_json::to_value(definition)? {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    for owned in FORK_OWNED_FIELDS {
        fields.remove(owned);
    }
    Ok(fields)
}

/// Combine two sides of a conflict, or `None` if their shapes differ.
pub fn combine(local: Option<&Value>, upstream: Option<&Value>) -> Option<Value> {
    match (local?, upstream?) {
        (Value::Array(l), Value::Array(u)) => {
            let mut out = l.clone();
            for item in u {
                if !out.contains(item) {
                    out.push(item.clone());
                }
            }
            Some(Value::Array(out))
        }
        (Value::Object(l), Value::Object(u)) => {
            let mut out = u.clone();
            for (k, v) in l {
                out.insert(k.clone(), v.clone());
            }
            Some(Value::Object(out))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn combine_arrays_dedupes_in_order() {
        let out = combine(Some(&json!(["a", "b"])), Some(&json!(["b", "c"]))).unwrap();
        assert_eq!(out, json!(["a", "b", "c"]));
    }

    #[test]
    fn combine_objects_prefers_local() {
        let out = combine(Some(&json!({"x": 1, "y": 2})), Some(&json!({"y": 9, "z": 3}))).unwrap();
        assert_eq!(out, json!({"x": 1, "y": 2, "z": 3}));
    }

    #[test]
    fn scalars_do_not_combine() {
        assert_eq!(combine(Some(&json!("a")), Some(&json!("b"))), None);
        assert_eq!(combine(None, Some(&json!([1]))), None);
    }

    #[test]
    fn policy_combine_falls_back_for_scalars() {
        let conflict = Conflict {
            field: "prompt".into(),
            base: Some(json!("a")),
            local: Some(json!("b")),
            upstream: Some(json!("c")),
        };
        let mut strategy = PolicyStrategy::new(MergePolicy::Combine);
        assert_eq!(strategy.resolve(&conflict).unwrap(), Resolution::KeepLocal);
    }

    #[rstest]
    #[case("keep-local", MergePolicy::KeepLocal)]
    #[case("local", MergePolicy::KeepLocal)]
    #[case("keep-upstream", MergePolicy::KeepUpstream)]
    #[case("upstream", MergePolicy::KeepUpstream)]
    #[case("combine", MergePolicy::Combine)]
    fn policy_parses_cli_names(#[case] input: &str, #[case] expected: MergePolicy) {
        assert_eq!(input.parse::<MergePolicy>().unwrap(), expected);
    }

    #[test]
    fn unknown_policy_is_config_error() {
        let err = "theirs".parse::<MergePolicy>().unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn fork_owned_fields_are_excluded() {
        let def = ArtifactDefinition::new("x", &Version::new(1, 0, 0), "X");
        let fields = mergeable_fields(&def).unwrap();
        assert!(!fields.contains_key("name"));
        assert!(fields.contains_key("version"));
        assert!(fields.contains_key("description"));
    }
}
