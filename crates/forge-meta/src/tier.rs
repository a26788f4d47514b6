//! Resolution tiers

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Where a resolved artifact came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    /// The project directory (`.forge/`), authoritative override.
    Local,
    /// The per-user install directory.
    Global,
    /// The networked catalog.
    Remote,
}

impl Tier {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Global => "global",
            Self::Remote => "remote",
        }
    }

    /// Tier recorded in a lockfile for an artifact resolved from `self`.
    ///
    /// Remote results are persisted into the global tier before being
    /// returned, so that is where a pinned resolution will find them.
    pub fn pinned(self) -> Self {
        match self {
            Self::Remote => Self::Global,
            other => other,
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tier {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "local" => Ok(Self::Local),
            "global" => Ok(Self::Global),
            "remote" => Ok(Self::Remote),
            other => Err(Error::UnknownTier(other.to_string())),
        }
    }
}
