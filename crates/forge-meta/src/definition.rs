//! Artifact definition documents
//!
//! A definition is the content document for one agent or tool. Only the
//! envelope fields are modelled; everything else is an opaque payload the
//! registry carries without interpreting.
//!
//! ```yaml
//! name: code-reviewer
//! version: 1.2.0
//! description: Reviews pull requests
//! dependencies:
//!   agents: [summarizer@^1.0]
//!   tools: [git-diff, linter@~2.3]
//! prompt: ...            # opaque payload
//! ```

use crate::error::{Error, Result};
use crate::kind::ArtifactKind;
use crate::reference::ArtifactReference;
use chrono::{DateTime, Utc};
use regex::Regex;
use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::LazyLock;

static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(@[a-z0-9][a-z0-9._-]*/)?[a-z0-9][a-z0-9._-]*$").expect("valid name pattern")
});

/// Validate an artifact name: lowercase alphanumerics, `.`, `_`, `-`,
/// optionally prefixed by an `@scope/`.
pub fn validate_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "name is empty".to_string(),
        });
    }
    if !NAME_PATTERN.is_match(name) {
        return Err(Error::InvalidName {
            name: name.to_string(),
            reason: "expected lowercase letters, digits, '.', '_' or '-', optionally prefixed by '@scope/'"
                .to_string(),
        });
    }
    Ok(())
}

/// Declared dependencies, grouped by kind.
///
/// Each entry is a reference token (`name` or `name@constraint`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub agents: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<String>,
}

impl Dependencies {
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty() && self.tools.is_empty()
    }

    pub fn tokens(&self, kind: ArtifactKind) -> &[String] {
        match kind {
            ArtifactKind::Agent => &self.agents,
            ArtifactKind::Tool => &self.tools,
        }
    }

    /// Parse every declared dependency, agents first, in declaration order.
    pub fn references(&self) -> Result<Vec<(ArtifactKind, ArtifactReference)>> {
        let mut refs = Vec::with_capacity(self.agents.len() + self.tools.len());
        for kind in ArtifactKind::ALL {
            for token in self.tokens(kind) {
                refs.push((kind, ArtifactReference::parse(token)?));
            }
        }
        Ok(refs)
    }
}

/// Where a fork came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkOrigin {
    /// Upstream artifact name.
    pub name: String,
    /// Upstream version the fork is currently based on.
    pub version: String,
    pub forked_at: DateTime<Utc>,
    /// Set once an upstream merge has been committed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_at: Option<DateTime<Utc>>,
}

/// Provenance stamped into a project-local fork.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForkRecord {
    pub fork_of: ForkOrigin,
    pub local_name: String,
}

impl ForkRecord {
    /// The upstream version the fork is based on.
    pub fn base_version(&self) -> Result<Version> {
        parse_version(&self.fork_of.version)
    }
}

/// An artifact definition document.
///
/// Required fields are validated explicitly (rather than by serde) so that
/// a missing field produces a message naming it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Dependencies::is_empty")]
    pub dependencies: Dependencies,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fork: Option<ForkRecord>,
    /// Opaque content carried verbatim.
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl ArtifactDefinition {
    /// Create a definition with the required envelope fields set.
    pub fn new(name: impl Into<String>, version: &Version, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: Some(version.to_string()),
            description: Some(description.into()),
            dependencies: Dependencies::default(),
            fork: None,
            payload: Map::new(),
        }
    }

    /// Check `name` and `description`.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(self.missing("name"));
        }
        validate_name(&self.name)?;
        if self.description.as_deref().is_none_or(str::is_empty) {
            return Err(self.missing("description"));
        }
        self.dependencies.references()?;
        Ok(())
    }

    /// Check all required fields, including a valid semantic `version`.
    ///
    /// Required for every definition stored outside the remote tier.
    pub fn validate_versioned(&self) -> Result<Version> {
        self.validate()?;
        self.semver()
    }

    /// The parsed `version` field.
    pub fn semver(&self) -> Result<Version> {
        match self.version.as_deref() {
            None | Some("") => Err(self.missing("version")),
            Some(raw) => parse_version(raw),
        }
    }

    /// Encode as the YAML stored on disk.
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| Error::Encode {
            name: self.name.clone(),
            message: e.to_string(),
        })
    }

    /// Decode from YAML text.
    pub fn from_yaml(path: &std::path::Path, content: &str) -> Result<Self> {
        serde_yaml::from_str(content).map_err(|e| Error::InvalidDefinition {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    fn missing(&self, field: &str) -> Error {
        Error::MissingField {
            artifact: if self.name.is_empty() {
                "<unnamed>".to_string()
            } else {
                self.name.clone()
            },
            field: field.to_string(),
        }
    }
}

/// Parse a semantic version, trimming whitespace.
pub fn parse_version(raw: &str) -> Result<Version> {
    Version::parse(raw.trim()).map_err(|source| Error::InvalidVersion {
        version: raw.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::Path;

    const SAMPLE: &str = r#"
name: code-reviewer
version: 1.2.0
description: Reviews pull requests
dependencies:
  agents: [summarizer@^1.0]
  tools: [git-diff, linter@~2.3]
prompt: Review carefully
temperature: 0.2
"#;

    #[test]
    fn parses_envelope_and_keeps_payload() {
        let def = ArtifactDefinition::from_yaml(Path::new("x.yaml"), SAMPLE).unwrap();
        assert_eq!(def.name, "code-reviewer");
        assert_eq!(def.semver().unwrap(), Version::new(1, 2, 0));
        assert_eq!(def.dependencies.tools, vec!["git-diff", "linter@~2.3"]);
        assert_eq!(def.payload["prompt"], "Review carefully");
        assert!(def.fork.is_none());
    }

    #[test]
    fn references_are_grouped_by_kind() {
        let def = ArtifactDefinition::from_yaml(Path::new("x.yaml"), SAMPLE).unwrap();
        let refs = def.dependencies.references().unwrap();
        let rendered: Vec<String> = refs.iter().map(|(k, r)| format!("{k}:{r}")).collect();
        assert_eq!(rendered, vec!["agent:summarizer@^1.0", "tool:git-diff", "tool:linter@~2.3"]);
    }

    #[test]
    fn missing_version_is_named() {
        let def = ArtifactDefinition::from_yaml(
            Path::new("x.yaml"),
            "name: helper\ndescription: Helps\n",
        )
        .unwrap();
        assert!(def.validate().is_ok());
        let err = def.validate_versioned().unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "version"));
        assert!(err.to_string().contains("helper"));
    }

    #[test]
    fn missing_description_is_named() {
        let def = ArtifactDefinition::from_yaml(Path::new("x.yaml"), "name: helper\nversion: 1.0.0\n")
            .unwrap();
        let err = def.validate().unwrap_err();
        assert!(matches!(err, Error::MissingField { ref field, .. } if field == "description"));
    }

    #[test]
    fn invalid_semver_rejected() {
        let def = ArtifactDefinition::from_yaml(
            Path::new("x.yaml"),
            "name: helper\nversion: one\ndescription: Helps\n",
        )
        .unwrap();
        assert!(matches!(def.validate_versioned(), Err(Error::InvalidVersion { .. })));
    }

    #[test]
    fn fork_record_uses_camel_case_keys() {
        let mut def = ArtifactDefinition::new("my-reviewer", &Version::new(1, 0, 0), "Fork");
        def.fork = Some(ForkRecord {
            fork_of: ForkOrigin {
                name: "code-reviewer".into(),
                version: "1.0.0".into(),
                forked_at: "2026-01-02T03:04:05Z".parse().unwrap(),
                merged_at: None,
            },
            local_name: "my-reviewer".into(),
        });

        let yaml = def.to_yaml().unwrap();
        assert!(yaml.contains("forkOf:"));
        assert!(yaml.contains("localName: my-reviewer"));
        assert!(yaml.contains("forkedAt:"));
        assert!(!yaml.contains("mergedAt"));

        let back = ArtifactDefinition::from_yaml(Path::new("x.yaml"), &yaml).unwrap();
        assert_eq!(back, def);
    }

    #[test]
    fn name_validation() {
        assert!(validate_name("code-reviewer").is_ok());
        assert!(validate_name("@acme/code_reviewer.v2").is_ok());
        assert!(validate_name("Code Reviewer").is_err());
        assert!(validate_name("-leading").is_err());
        assert!(validate_name("").is_err());
    }
}
