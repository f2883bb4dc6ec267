//! Snapshot sources.
//!
//! The analysis core never fetches anything itself. Whatever talks to the
//! exchange (HTTP client, recorder, test fixture) implements
//! [`ChainSource`] and hands back the raw payload.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use thiserror::Error;

/// Snapshot source errors.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("IO error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON decode failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),
}

/// Provider of raw option-chain payloads.
pub trait ChainSource {
    /// Short human-readable name for logs.
    fn name(&self) -> String;

    /// Fetch one raw snapshot.
    fn fetch(&self) -> Result<Value, SourceError>;
}

/// Reads a snapshot saved as JSON on disk.
#[derive(Debug, Clone)]
pub struct JsonFileSource {
    path: PathBuf,
}

impl JsonFileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ChainSource for JsonFileSource {
    fn name(&self) -> String {
        self.path.display().to_string()
    }

    fn fetch(&self) -> Result<Value, SourceError> {
        let text = fs::read_to_string(&self.path).map_err(|source| SourceError::Io {
            path: self.name(),
            source,
        })?;
        parse_payload(&text)
    }
}

/// Serves a payload already held in memory.
#[derive(Debug, Clone)]
pub struct StaticSource {
    label: String,
    payload: Value,
}

impl StaticSource {
    pub fn new(label: &str, payload: Value) -> Self {
        Self {
            label: label.to_string(),
            payload,
        }
    }
}

impl ChainSource for StaticSource {
    fn name(&self) -> String {
        self.label.clone()
    }

    fn fetch(&self) -> Result<Value, SourceError> {
        Ok(self.payload.clone())
    }
}

/// Decode a payload, rejecting anything that is not a JSON object.
///
/// Exchanges answer blocked requests with HTML, which fails here
/// rather than producing an empty chain further down.
pub fn parse_payload(text: &str) -> Result<Value, SourceError> {
    let value: Value = serde_json::from_str(text)?;
    if !value.is_object() {
        return Err(SourceError::InvalidPayload(
            "response is not a JSON object".to_string(),
        ));
    }
    Ok(value)
}
