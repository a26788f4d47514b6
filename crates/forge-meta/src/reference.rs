//! Artifact references: a name plus a version constraint

use crate::definition::validate_name;
use crate::error::{Error, Result};
use crate::version::VersionConstraint;
use semver::Version;

/// A request for an artifact, parsed from a single token.
///
/// - `reviewer` -> latest
/// - `reviewer@1.2.0` -> exactly 1.2.0
/// - `reviewer@^1.2` -> caret range
/// - `@acme/reviewer@~1.4` -> scoped name with tilde range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactReference {
    pub name: String,
    pub constraint: VersionConstraint,
}

impl ArtifactReference {
    pub fn new(name: impl Into<String>, constraint: VersionConstraint) -> Self {
        Self {
            name: name.into(),
            constraint,
        }
    }

    /// Reference to the newest stable version of `name`.
    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, VersionConstraint::latest())
    }

    /// Reference pinned to exactly `version`.
    pub fn exact(name: impl Into<String>, version: &Version) -> Self {
        Self::new(name, VersionConstraint::exact(version))
    }

    /// Parse `name[@constraint]`.
    ///
    /// The version part is split on the last `@` that is not the leading
    /// scope marker.
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::InvalidReference {
                input: input.to_string(),
                reason: "empty reference".to_string(),
            });
        }

        let (name, constraint) = match input.rfind('@') {
            Some(idx) if idx > 0 => (&input[..idx], &input[idx + 1..]),
            _ => (input, ""),
        };

        validate_name(name).map_err(|e| Error::InvalidReference {
            input: input.to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self::new(name, VersionConstraint::parse(constraint)?))
    }
}

impl std::fmt::Display for ArtifactReference {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.constraint.is_latest() {
            f.write_str(&self.name)
        } else {
            write!(f, "{}@{}", self.name, self.constraint)
        }
    }
}

impl std::str::FromStr for ArtifactReference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
