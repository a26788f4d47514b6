//! Version constraint parsing and best-match selection.
//!
//! Supported constraint syntax:
//!
//! - **latest**: empty string, `*`, `x`, or `latest`
//! - **exact**: `1.2.3`, `=1.2.3`, `==1.2.3`
//! - **partial**: `1`, `1.2`, `1.2.x` (any version with that prefix)
//! - **caret**: `^1.2.3` (compatible minor/patch; `^0.2.3` pins the minor)
//! - **tilde**: `~1.2.3` (compatible patch)
//! - **comparison**: `>=1.0.0`, `>1.0`, `<2`, `<=1.4`, `!=1.3.0`
//! - **range**: conjunction of the above separated by commas or spaces,
//!   e.g. `>=1.0.0 <2.0.0` or `>=1.0,<1.5`
//!
//! Ordering follows semantic-version precedence. Pre-release versions only
//! satisfy a constraint that itself names a pre-release on the same
//! `major.minor.patch`.
//!
//! # Examples
//!
//! ```
//! use forge_meta::version::{VersionConstraint, best_match};
//! use semver::Version;
//!
//! let constraint = VersionConstraint::parse("^1.2").unwrap();
//! let candidates: Vec<Version> = ["1.1.0", "1.2.0", "1.9.4", "2.0.0"]
//!     .iter()
//!     .map(|v| Version::parse(v).unwrap())
//!     .collect();
//!
//! assert_eq!(best_match(&candidates, &constraint), Some(Version::new(1, 9, 4)));
//! ```

use crate::error::{Error, Result};
use semver::Version;
use std::cmp::Ordering;

/// A single version comparison operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CompareOp {
    /// `>=`
    Gte,
    /// `>`
    Gt,
    /// `<=`
    Lte,
    /// `<`
    Lt,
    /// `=`
    Eq,
    /// `!=`
    Ne,
}

/// A single version specifier: an operator paired with a version.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Specifier {
    op: CompareOp,
    version: Version,
}

impl Specifier {
    fn new(op: CompareOp, version: Version) -> Self {
        Self { op, version }
    }

    fn matches(&self, candidate: &Version) -> bool {
        let ord = precedence(candidate, &self.version);
        match self.op {
            CompareOp::Gte => ord != Ordering::Less,
            CompareOp::Gt => ord == Ordering::Greater,
            CompareOp::Lte => ord != Ordering::Greater,
            CompareOp::Lt => ord == Ordering::Less,
            CompareOp::Eq => ord == Ordering::Equal,
            CompareOp::Ne => ord != Ordering::Equal,
        }
    }
}

/// Semantic-version precedence: major, minor, patch, then pre-release.
/// Build metadata is ignored.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch)
        .cmp(&(b.major, b.minor, b.patch))
        .then_with(|| a.pre.cmp(&b.pre))
}

/// Total order used for selection.
///
/// Precedence first; versions of equal precedence (differing only in build
/// metadata) are ordered by their full version string so the choice is
/// deterministic.
pub fn compare_versions(a: &Version, b: &Version) -> Ordering {
    precedence(a, b).then_with(|| a.to_string().cmp(&b.to_string()))
}

/// A parsed version constraint that can be checked against concrete versions.
///
/// An empty specifier list means "latest".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionConstraint {
    specifiers: Vec<Specifier>,
    /// The original constraint string for display.
    raw: String,
}

impl VersionConstraint {
    /// The constraint matching the newest stable version.
    pub fn latest() -> Self {
        Self {
            specifiers: Vec::new(),
            raw: "latest".to_string(),
        }
    }

    /// A constraint matching exactly one version.
    pub fn exact(version: &Version) -> Self {
        Self {
            specifiers: vec![Specifier::new(CompareOp::Eq, version.clone())],
            raw: version.to_string(),
        }
    }

    /// Parse a version constraint string.
    pub fn parse(constraint: &str) -> Result<Self> {
        let trimmed = constraint.trim();
        if matches!(trimmed, "" | "*" | "x" | "X" | "latest") {
            return Ok(Self::latest());
        }

        let mut specifiers = Vec::new();
        for token in tokenize(trimmed)? {
            specifiers.extend(parse_token(&token)?);
        }

        if specifiers.is_empty() {
            return Err(Error::InvalidConstraint {
                constraint: trimmed.to_string(),
                reason: "empty constraint".to_string(),
            });
        }

        Ok(Self {
            specifiers,
            raw: trimmed.to_string(),
        })
    }

    /// Whether this is the "latest" constraint.
    pub fn is_latest(&self) -> bool {
        self.specifiers.is_empty()
    }

    /// The pinned version if this constraint matches exactly one version.
    pub fn exact_version(&self) -> Option<&Version> {
        match self.specifiers.as_slice() {
            [Specifier {
                op: CompareOp::Eq,
                version,
            }] => Some(version),
            _ => None,
        }
    }

    /// Check if a version satisfies this constraint.
    pub fn satisfies(&self, version: &Version) -> bool {
        if self.is_latest() {
            return version.pre.is_empty();
        }
        if !version.pre.is_empty() && !self.names_prerelease_of(version) {
            return false;
        }
        self.specifiers.iter().all(|spec| spec.matches(version))
    }

    /// Check if a version string satisfies this constraint.
    ///
    /// Returns `false` if the version string cannot be parsed.
    pub fn satisfies_str(&self, version: &str) -> bool {
        Version::parse(version.trim()).is_ok_and(|v| self.satisfies(&v))
    }

    /// Return the original constraint string.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    fn names_prerelease_of(&self, version: &Version) -> bool {
        self.specifiers.iter().any(|spec| {
            !spec.version.pre.is_empty()
                && (spec.version.major, spec.version.minor, spec.version.patch)
                    == (version.major, version.minor, version.patch)
        })
    }
}

impl Default for VersionConstraint {
    fn default() -> Self {
        Self::latest()
    }
}

impl std::fmt::Display for VersionConstraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.raw)
    }
}

impl std::str::FromStr for VersionConstraint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Select the best candidate for a constraint.
///
/// Returns the greatest candidate (by [`compare_versions`]) that satisfies
/// the constraint, or `None`. For "latest", pre-releases are only chosen
/// when no stable candidate exists at all.
pub fn best_match(candidates: &[Version], constraint: &VersionConstraint) -> Option<Version> {
    let best = candidates
        .iter()
        .filter(|v| constraint.satisfies(v))
        .max_by(|a, b| compare_versions(a, b));

    match best {
        Some(v) => Some(v.clone()),
        None if constraint.is_latest() => candidates.iter().max_by(|a, b| compare_versions(a, b)).cloned(),
        None => None,
    }
}

const OPERATORS: [&str; 9] = [">=", "<=", "!=", "==", "=", ">", "<", "^", "~"];

/// Split a constraint into operator-prefixed tokens.
///
/// Commas and whitespace both separate tokens; an operator standing alone
/// (`>= 1.0`) is glued to the version that follows it.
fn tokenize(constraint: &str) -> Result<Vec<String>> {
    let mut tokens = Vec::new();
    let mut pending_op: Option<&str> = None;

    for piece in constraint
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|p| !p.is_empty())
    {
        if OPERATORS.contains(&piece) {
            if pending_op.is_some() {
                return Err(Error::InvalidConstraint {
                    constraint: constraint.to_string(),
                    reason: format!("unexpected operator '{piece}'"),
                });
            }
            pending_op = Some(piece);
        } else if let Some(op) = pending_op.take() {
            tokens.push(format!("{op}{piece}"));
        } else {
            tokens.push(piece.to_string());
        }
    }

    if let Some(op) = pending_op {
        return Err(Error::InvalidConstraint {
            constraint: constraint.to_string(),
            reason: format!("operator '{op}' has no version"),
        });
    }

    Ok(tokens)
}

/// A possibly incomplete version such as `1`, `1.2` or `1.2.x`.
#[derive(Debug, Clone)]
struct Partial {
    major: u64,
    minor: Option<u64>,
    patch: Option<u64>,
    /// Set when all three components (and maybe a pre-release) were given.
    full: Option<Version>,
}

impl Partial {
    /// Smallest version the partial covers.
    fn lower(&self) -> Version {
        match &self.full {
            Some(v) => v.clone(),
            None => Version::new(self.major, self.minor.unwrap_or(0), self.patch.unwrap_or(0)),
        }
    }

    /// First version past the partial's wildcard. Only meaningful for
    /// incomplete versions.
    fn next(&self, token: &str) -> Result<Version> {
        Ok(match self.minor {
            None => Version::new(bump(token, self.major)?, 0, 0),
            Some(minor) => Version::new(self.major, bump(token, minor)?, 0),
        })
    }
}

/// `n + 1`, or an error naming `token` when `n` is already `u64::MAX`.
fn bump(token: &str, n: u64) -> Result<u64> {
    n.checked_add(1).ok_or_else(|| Error::InvalidConstraint {
        constraint: token.to_string(),
        reason: format!("{n} has no upper bound"),
    })
}

fn parse_token(token: &str) -> Result<Vec<Specifier>> {
    use CompareOp::*;

    if let Some(rest) = token.strip_prefix('^') {
        return caret(token, &parse_partial(token, rest)?);
    }
    if let Some(rest) = token.strip_prefix('~') {
        return tilde(token, &parse_partial(token, rest)?);
    }

    let (op, rest) = if let Some(rest) = token.strip_prefix(">=") {
        (Gte, rest)
    } else if let Some(rest) = token.strip_prefix("<=") {
        (Lte, rest)
    } else if let Some(rest) = token.strip_prefix("!=") {
        (Ne, rest)
    } else if let Some(rest) = token.strip_prefix("==") {
        (Eq, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (Eq, rest)
    } else if let Some(rest) = token.strip_prefix('>') {
        (Gt, rest)
    } else if let Some(rest) = token.strip_prefix('<') {
        (Lt, rest)
    } else {
        // Bare version implies =
        (Eq, token)
    };

    let partial = parse_partial(token, rest)?;
    let specifiers = match (op, &partial.full) {
        (Gte, _) | (Lt, _) => vec![Specifier::new(op, partial.lower())],
        (Gt, Some(v)) | (Lte, Some(v)) | (Eq, Some(v)) | (Ne, Some(v)) => {
            vec![Specifier::new(op, v.clone())]
        }
        (Gt, None) => vec![Specifier::new(Gte, partial.next(token)?)],
        (Lte, None) => vec![Specifier::new(Lt, partial.next(token)?)],
        (Eq, None) => vec![
            Specifier::new(Gte, partial.lower()),
            Specifier::new(Lt, partial.next(token)?),
        ],
        (Ne, None) => {
            return Err(Error::InvalidConstraint {
                constraint: token.to_string(),
                reason: "'!=' requires a full version".to_string(),
            });
        }
    };
    Ok(specifiers)
}

fn caret(token: &str, p: &Partial) -> Result<Vec<Specifier>> {
    let upper = match (p.major, p.minor, p.patch) {
        (major, None, _) => Version::new(bump(token, major)?, 0, 0),
        (0, Some(minor), None) => Version::new(0, bump(token, minor)?, 0),
        (0, Some(0), Some(patch)) => Version::new(0, 0, bump(token, patch)?),
        (0, Some(minor), Some(_)) => Version::new(0, bump(token, minor)?, 0),
        (major, Some(_), _) => Version::new(bump(token, major)?, 0, 0),
    };
    Ok(vec![
        Specifier::new(CompareOp::Gte, p.lower()),
        Specifier::new(CompareOp::Lt, upper),
    ])
}

fn tilde(token: &str, p: &Partial) -> Result<Vec<Specifier>> {
    let upper = match p.minor {
        None => Version::new(bump(token, p.major)?, 0, 0),
        Some(minor) => Version::new(p.major, bump(token, minor)?, 0),
    };
    Ok(vec![
        Specifier::new(CompareOp::Gte, p.lower()),
        Specifier::new(CompareOp::Lt, upper),
    ])
}

fn parse_partial(token: &str, input: &str) -> Result<Partial> {
    let invalid = |reason: String| Error::InvalidConstraint {
        constraint: token.to_string(),
        reason,
    };

    let s = input.trim();
    let s = s.strip_prefix('v').unwrap_or(s);
    if s.is_empty() {
        return Err(invalid("missing version".to_string()));
    }

    if let Ok(v) = Version::parse(s) {
        return Ok(Partial {
            major: v.major,
            minor: Some(v.minor),
            patch: Some(v.patch),
            full: Some(v),
        });
    }

    if s.contains('-') || s.contains('+') {
        return Err(invalid(format!("invalid version: {s}")));
    }

    let parts: Vec<&str> = s.split('.').collect();
    if parts.len() > 3 {
        return Err(invalid(format!("invalid version: {s}")));
    }

    let mut numbers: Vec<Option<u64>> = Vec::with_capacity(3);
    let mut wildcard_seen = false;
    for part in &parts {
        if matches!(*part, "x" | "X" | "*") {
            wildcard_seen = true;
            numbers.push(None);
            continue;
        }
        if wildcard_seen {
            return Err(invalid(format!("number after wildcard in {s}")));
        }
        let n = part
            .parse::<u64>()
            .map_err(|_| invalid(format!("invalid version component '{part}'")))?;
        numbers.push(Some(n));
    }

    let major = numbers
        .first()
        .copied()
        .flatten()
        .ok_or_else(|| invalid("major version cannot be a wildcard".to_string()))?;
    let minor = numbers.get(1).copied().flatten();
    let patch = numbers.get(2).copied().flatten();

    Ok(Partial {
        major,
        minor,
        patch: if minor.is_some() { patch } else { None },
        full: None,
    })
}
