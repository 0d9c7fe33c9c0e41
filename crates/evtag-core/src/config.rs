//! # Tagger Configuration
//!
//! Where the paired model graph and its mapping file live, and which word
//! stands in for out-of-vocabulary tokens.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Result, TaggerError};
use crate::vocab::DEFAULT_UNKNOWN_WORD;

/// Configuration for the tagger.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TaggerConfig {
    /// Directory holding the model graph
    pub model_dir: PathBuf,
    /// File name of the model graph inside `model_dir`
    pub model_file_name: String,
    /// Path of the JSON mapping file
    pub mappings: PathBuf,
    /// Sentinel word used for unknown tokens
    #[serde(default = "default_unknown_word")]
    pub unknown_word: String,
}

fn default_unknown_word() -> String {
    DEFAULT_UNKNOWN_WORD.to_string()
}

impl TaggerConfig {
    /// Create a configuration with the default unknown-word sentinel.
    pub fn new(
        model_dir: impl Into<PathBuf>,
        model_file_name: impl Into<String>,
        mappings: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model_dir: model_dir.into(),
            model_file_name: model_file_name.into(),
            mappings: mappings.into(),
            unknown_word: default_unknown_word(),
        }
    }

    /// Set the unknown-word sentinel.
    pub fn with_unknown_word(mut self, unknown_word: impl Into<String>) -> Self {
        self.unknown_word = unknown_word.into();
        self
    }

    /// Full path of the model graph.
    pub fn model_path(&self) -> PathBuf {
        self.model_dir.join(&self.model_file_name)
    }

    /// Read a configuration from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `TaggerError::Config` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)
            .map_err(|e| TaggerError::Config(format!("failed to read {}: {e}", path.display())))?;
        Self::from_json_str(&json)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| TaggerError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder() {
        let config = TaggerConfig::new("models/tf", "tagger.pb", "models/tf/mappings.json")
            .with_unknown_word("<unk>");

        assert_eq!(config.model_path(), PathBuf::from("models/tf/tagger.pb"));
        assert_eq!(config.unknown_word, "<unk>");
    }

    #[test]
    fn test_from_json_defaults_unknown_word() {
        let config = TaggerConfig::from_json_str(
            r#"{"model_dir": "m", "model_file_name": "g.pb", "mappings": "m/map.json"}"#,
        )
        .unwrap();

        assert_eq!(config.unknown_word, DEFAULT_UNKNOWN_WORD);
        assert_eq!(config, TaggerConfig::new("m", "g.pb", "m/map.json"));
    }

    #[test]
    fn test_from_json_missing_field() {
        let err = TaggerConfig::from_json_str(r#"{"model_dir": "m"}"#).unwrap_err();
        assert!(matches!(err, TaggerError::Config(msg) if msg.contains("model_file_name")));
    }

    #[test]
    fn test_from_missing_file() {
        let err = TaggerConfig::from_json_file("/nonexistent/evtag.json").unwrap_err();
        assert!(matches!(err, TaggerError::Config(_)));
    }
}
