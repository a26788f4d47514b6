//! Artifact kinds

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// The two families of artifacts the registry resolves.
///
/// Every lookup is scoped by kind; the same name may exist once per kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Agent,
    Tool,
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Agent, ArtifactKind::Tool];

    /// Directory name used for this kind in every tier (`agents`, `tools`).
    pub fn dir_name(self) -> &'static str {
        match self {
            Self::Agent => "agents",
            Self::Tool => "tools",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Agent => "agent",
            Self::Tool => "tool",
        }
    }
}

impl std::fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArtifactKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "agent" | "agents" => Ok(Self::Agent),
            "tool" | "tools" => Ok(Self::Tool),
            other => Err(Error::UnknownKind(other.to_string())),
        }
    }
}
