//! Format-aware loading of YAML and JSON documents.

use crate::{Error, Result};
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

/// Supported document formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// Detect the format from a file extension.
    ///
    /// - `.json` -> JSON
    /// - `.yaml`, `.yml` -> YAML
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_lowercase();
        match extension.as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            _ => Err(Error::UnsupportedFormat { extension }),
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Yaml => "YAML",
            Self::Json => "JSON",
        }
    }
}

/// Load a document, picking the parser from the file extension.
pub fn load<T: DeserializeOwned>(path: &Path) -> Result<T> {
    match Format::from_path(path)? {
        Format::Yaml => load_yaml(path),
        Format::Json => load_json(path),
    }
}

/// Load a YAML document.
///
/// An empty file deserializes as YAML `null`.
pub fn load_yaml<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read(path)?;
    serde_yaml::from_str(&content).map_err(|e| parse_error(path, Format::Yaml, e))
}

/// Load a JSON document.
pub fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = read(path)?;
    serde_json::from_str(&content).map_err(|e| parse_error(path, Format::Json, e))
}

fn read(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| Error::io(path, e))
}

fn parse_error(path: &Path, format: Format, err: impl std::fmt::Display) -> Error {
    Error::Parse {
        path: path.to_path_buf(),
        format: format.label().into(),
        message: err.to_string(),
    }
}
