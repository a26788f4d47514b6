//! Source resolution across tiers
//!
//! The [`SourceResolver`] walks its tier strategies in configured order and
//! stops at the first hit. Remote failures are soft: they only surface when
//! no other tier can satisfy the reference.

use crate::tiers::{ResolvedArtifact, TierStrategy};
use crate::{Error, Result};
use forge_meta::{ArtifactKind, ArtifactReference, Tier};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Anything that can turn a reference into a resolved artifact.
///
/// Implemented by the live [`SourceResolver`] and by the lockfile-pinned
/// source used for reproducible resolution.
pub trait ArtifactSource: Send + Sync {
    fn resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact>;
}

type MemoKey = (ArtifactKind, String);

pub struct SourceResolver {
    tiers: Vec<Arc<dyn TierStrategy>>,
    /// Results of this session, so repeated lookups agree on content and tier.
    memo: Mutex<HashMap<MemoKey, ResolvedArtifact>>,
}

impl SourceResolver {
    pub fn new(tiers: Vec<Arc<dyn TierStrategy>>) -> Self {
        Self {
            tiers,
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Tiers consulted, in order.
    pub fn tier_order(&self) -> Vec<Tier> {
        self.tiers.iter().map(|t| t.tier()).collect()
    }

    /// Resolve through every configured tier.
    pub fn resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        let key = (kind, reference.to_string());
        if let Some(hit) = self.memo().get(&key) {
            return Ok(hit.clone());
        }
        let resolved = self.walk(kind, reference, |_| true)?;
        self.memo().insert(key, resolved.clone());
        Ok(resolved)
    }

    /// Resolve while skipping the project tier.
    ///
    /// Used where the registry's copy is wanted even if a local override
    /// exists: installs and upstream checks for forks. Not memoized.
    pub fn resolve_upstream(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        self.walk(kind, reference, |tier| tier != Tier::Local)
    }

    /// Resolve independent references concurrently.
    ///
    /// Results come back in input order.
    pub fn resolve_all(&self, kind: ArtifactKind, references: &[ArtifactReference]) -> Vec<Result<ResolvedArtifact>> {
        std::thread::scope(|scope| {
            let handles: Vec<_> = references
                .iter()
                .map(|reference| scope.spawn(move || self.resolve(kind, reference)))
                .collect();
            handles
                .into_iter()
                .zip(references)
                .map(|(handle, reference)| {
                    handle.join().unwrap_or_else(|_| {
                        Err(Error::validation(
                            format!("{kind} '{reference}'"),
                            "resolution thread panicked",
                        ))
                    })
                })
                .collect()
        })
    }

    /// Forget this session's results.
    pub fn clear_memo(&self) {
        self.memo().clear();
    }

    /// Forget memoized results for one name.
    pub fn forget(&self, kind: ArtifactKind, name: &str) {
        self.memo().retain(|(k, reference), _| {
            *k != kind || ArtifactReference::parse(reference).map_or(true, |r| r.name != name)
        });
    }

    fn walk(
        &self,
        kind: ArtifactKind,
        reference: &ArtifactReference,
        include: impl Fn(Tier) -> bool,
    ) -> Result<ResolvedArtifact> {
        let mut searched = Vec::new();
        let mut unavailable: Option<Error> = None;

        for strategy in self.tiers.iter().filter(|t| include(t.tier())) {
            let tier = strategy.tier();
            searched.push(tier.as_str());
            match strategy.try_resolve(kind, reference) {
                Ok(Some(resolved)) => {
                    tracing::info!(
                        tier = %tier,
                        kind = %kind,
                        name = %reference.name,
                        constraint = %reference.constraint,
                        version = %resolved.version,
                        outcome = "hit",
                        "resolved artifact"
                    );
                    return Ok(resolved);
                }
                Ok(None) => {
                    tracing::debug!(
                        tier = %tier,
                        kind = %kind,
                        name = %reference.name,
                        constraint = %reference.constraint,
                        outcome = "miss",
                        "tier has no match"
                    );
                }
                Err(e) if e.is_remote_unavailable() => {
                    tracing::warn!(
                        tier = %tier,
                        kind = %kind,
                        name = %reference.name,
                        constraint = %reference.constraint,
                        outcome = "unavailable",
                        error = %e,
                        "tier unavailable, continuing"
                    );
                    unavailable = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        match unavailable {
            Some(e) => Err(e),
            None => Err(Error::NotFound {
                kind,
                reference: reference.to_string(),
                searched: if searched.is_empty() {
                    "no tiers enabled".to_string()
                } else {
                    format!("searched {}", searched.join(", "))
                },
            }),
        }
    }

    fn memo(&self) -> MutexGuard<'_, HashMap<MemoKey, ResolvedArtifact>> {
        self.memo.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ArtifactSource for SourceResolver {
    fn resolve(&self, kind: ArtifactKind, reference: &ArtifactReference) -> Result<ResolvedArtifact> {
        SourceResolver::resolve(self, kind, reference)
    }
}
