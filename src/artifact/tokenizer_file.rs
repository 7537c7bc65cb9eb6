use std::collections::HashMap;
use std::error::Error;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::types::ArtifactError;

fn default_lowercase() -> bool {
    true
}

fn default_filters() -> String {
    // Punctuation stripped by the offline fitting step before splitting.
    "!\"#$%&()*+,-./:;<=>?@[\\]^_`{|}~\t\n".to_string()
}

fn default_split() -> char {
    ' '
}

/// On-disk form of the fitted tokenizer.
///
/// The vocabulary and the text-cleaning policy are both decided by the
/// offline fitting step; inference only replays them. Index 0 is reserved
/// for padding and never appears in the vocabulary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenizerArtifact {
    /// Mapping from word to integer index (1-based)
    pub word_index: HashMap<String, u32>,
    /// Token unknown words are mapped to; when absent, unknown words are
    /// dropped instead
    #[serde(default)]
    pub oov_token: Option<String>,
    /// Optional vocabulary cap; indices at or above it count as unknown
    #[serde(default)]
    pub num_words: Option<u32>,
    /// Whether text is lowercased before splitting
    #[serde(default = "default_lowercase")]
    pub lowercase: bool,
    /// Characters replaced by the split character before splitting
    #[serde(default = "default_filters")]
    pub filters: String,
    /// Word separator
    #[serde(default = "default_split")]
    pub split: char,
}

impl TokenizerArtifact {
    /// Reads and validates a tokenizer artifact from a JSON file.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn Error + Send + Sync>> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(ArtifactError::Io)?;
        let artifact: Self = serde_json::from_str(&content).map_err(|e| {
            ArtifactError::InvalidFormat(format!("Invalid tokenizer JSON: {}", e))
        })?;
        artifact.validate()?;

        info!(
            "Read tokenizer artifact {}: {} words",
            path.display(),
            artifact.word_index.len()
        );
        Ok(artifact)
    }

    fn validate(&self) -> Result<(), ArtifactError> {
        if self.word_index.values().any(|&index| index == 0) {
            return Err(ArtifactError::InvalidFormat(
                "Word index 0 is reserved for padding".to_string(),
            ));
        }

        if let Some(token) = &self.oov_token {
            if !self.word_index.contains_key(token) {
                return Err(ArtifactError::InvalidFormat(format!(
                    "Out-of-vocabulary token '{}' is missing from the word index",
                    token
                )));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_json(dir: &Path, json: &serde_json::Value) -> std::path::PathBuf {
        let path = dir.join("tokenizer.json");
        std::fs::write(&path, serde_json::to_string_pretty(json).unwrap()).unwrap();
        path
    }

    #[test]
    fn minimal_artifact_gets_default_policy() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &serde_json::json!({ "word_index": { "mary": 1, "kitchen": 2 } }),
        );

        let artifact = TokenizerArtifact::open(&path).unwrap();
        assert!(artifact.lowercase);
        assert_eq!(artifact.split, ' ');
        assert!(artifact.filters.contains('?'));
        assert!(artifact.oov_token.is_none());
        assert!(artifact.num_words.is_none());
    }

    #[test]
    fn reserved_padding_index_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &serde_json::json!({ "word_index": { "mary": 0 } }),
        );
        assert!(TokenizerArtifact::open(&path).is_err());
    }

    #[test]
    fn unknown_oov_token_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_json(
            dir.path(),
            &serde_json::json!({
                "word_index": { "mary": 1 },
                "oov_token": "<oov>"
            }),
        );
        assert!(TokenizerArtifact::open(&path).is_err());
    }

    #[test]
    fn malformed_json_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tokenizer.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(TokenizerArtifact::open(&path).is_err());
    }

    #[test]
    fn missing_file_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        assert!(TokenizerArtifact::open(dir.path().join("absent.json")).is_err());
    }
}
