//! Format-agnostic document loading and saving

use crate::{Error, Result, io};
use serde::{Serialize, de::DeserializeOwned};
use std::path::Path;

/// On-disk encodings understood by [`DocumentStore`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// Detect the format from a file extension.
    ///
    /// - `.yaml`, `.yml` -> YAML
    /// - `.json`, `.lock` -> JSON
    /// - `.toml` -> TOML
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" | "lock" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    fn label(self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
            Self::Toml => "TOML",
        }
    }

    /// Encode a value in this format.
    pub fn encode<T: Serialize>(self, path: &Path, value: &T) -> Result<String> {
        let encoded = match self {
            Self::Yaml => serde_yaml::to_string(value).map_err(|e| e.to_string()),
            Self::Json => serde_json::to_string_pretty(value)
                .map(|mut s| {
                    s.push('\n');
                    s
                })
                .map_err(|e| e.to_string()),
            Self::Toml => toml::to_string_pretty(value).map_err(|e| e.to_string()),
        };
        encoded.map_err(|message| Error::Serialize {
            path: path.to_path_buf(),
            format: self.label().into(),
            message,
        })
    }

    /// Decode a value from text in this format.
    pub fn decode<T: DeserializeOwned>(self, path: &Path, content: &str) -> Result<T> {
        let decoded = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
        };
        decoded.map_err(|message| Error::Parse {
            path: path.to_path_buf(),
            format: self.label().into(),
            message,
        })
    }
}

/// Format-agnostic document store.
///
/// Detects the encoding from the file extension and always writes through
/// [`io::write_atomic`], so readers never observe a half-written document.
#[derive(Debug, Default, Clone, Copy)]
pub struct DocumentStore;

impl DocumentStore {
    pub fn new() -> Self {
        Self
    }

    /// Load and decode a document.
    pub fn load<T: DeserializeOwned>(&self, path: &Path) -> Result<T> {
        let format = DocumentFormat::from_path(path)?;
        let content = io::read_text(path)?;
        format.decode(path, &content)
    }

    /// Load a document, returning `None` when the file does not exist.
    pub fn load_optional<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.load(path) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Encode and atomically save a document.
    ///
    /// Returns the exact bytes written so callers can hash them.
    pub fn save<T: Serialize>(&self, path: &Path, value: &T) -> Result<Vec<u8>> {
        let content = DocumentFormat::from_path(path)?.encode(path, value)?;
        io::write_atomic(path, content.as_bytes())?;
        Ok(content.into_bytes())
    }

    /// Encode and save a document readable by its owner only.
    pub fn save_private<T: Serialize>(&self, path: &Path, value: &T) -> Result<()> {
        let content = DocumentFormat::from_path(path)?.encode(path, value)?;
        io::write_private(path, content.as_bytes())
    }
}
