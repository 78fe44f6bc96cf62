//! Artifact Record - content-addressable storage for run outputs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Destination category an artifact is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactCategory {
    /// Rendered images (confusion matrices)
    Plots,
    /// Serialized fitted models
    Model,
}

impl ArtifactCategory {
    /// Directory name used by on-disk trackers
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Plots => "plots",
            Self::Model => "model",
        }
    }
}

impl fmt::Display for ArtifactCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Content-addressable hash of `bytes` in `sha256:<hex>` form.
#[must_use]
pub fn cas_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("sha256:{:x}", hasher.finalize())
}

/// Artifact Record represents a stored artifact from a run.
///
/// Artifacts are stored using content-addressable storage (CAS),
/// where the `cas_hash` uniquely identifies the artifact content.
///
/// ## CAS Hash Format
///
/// The `cas_hash` follows the format: `algorithm:hex_digest`, e.g.
/// `sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ArtifactRecord {
    run_id: String,
    key: String,
    category: ArtifactCategory,
    cas_hash: String,
    size_bytes: u64,
    created_at: DateTime<Utc>,
}

impl ArtifactRecord {
    /// Create a new artifact record.
    ///
    /// # Arguments
    ///
    /// * `run_id` - ID of the parent run
    /// * `key` - Artifact file name (e.g., "confusion_matrix_RandomForest.svg")
    /// * `category` - Destination category
    /// * `cas_hash` - Content-addressable hash (e.g., "sha256:abc123")
    /// * `size_bytes` - Size of the artifact in bytes
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        key: impl Into<String>,
        category: ArtifactCategory,
        cas_hash: impl Into<String>,
        size_bytes: u64,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            category,
            cas_hash: cas_hash.into(),
            size_bytes,
            created_at: Utc::now(),
        }
    }

    /// Record for `bytes`, hashing them.
    #[must_use]
    pub fn from_bytes(
        run_id: impl Into<String>,
        key: impl Into<String>,
        category: ArtifactCategory,
        bytes: &[u8],
    ) -> Self {
        Self::new(run_id, key, category, cas_hash(bytes), bytes.len() as u64)
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the artifact key/name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the destination category.
    #[must_use]
    pub const fn category(&self) -> ArtifactCategory {
        self.category
    }

    /// Get the content-addressable hash.
    #[must_use]
    pub fn cas_hash(&self) -> &str {
        &self.cas_hash
    }

    /// Get the artifact size in bytes.
    #[must_use]
    pub const fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Get the creation timestamp.
    #[must_use]
    pub const fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_record_new() {
        let artifact = ArtifactRecord::new(
            "run-1",
            "model_rf.json",
            ArtifactCategory::Model,
            "sha256:abc123",
            1000,
        );
        assert_eq!(artifact.run_id(), "run-1");
        assert_eq!(artifact.key(), "model_rf.json");
        assert_eq!(artifact.category(), ArtifactCategory::Model);
        assert_eq!(artifact.cas_hash(), "sha256:abc123");
        assert_eq!(artifact.size_bytes(), 1000);
    }

    #[test]
    fn test_cas_hash_of_empty_input() {
        assert_eq!(
            cas_hash(b""),
            "sha256:e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }

    #[test]
    fn test_from_bytes() {
        let artifact = ArtifactRecord::from_bytes("run-1", "a.svg", ArtifactCategory::Plots, b"<svg/>");
        assert_eq!(artifact.size_bytes(), 6);
        assert!(artifact.cas_hash().starts_with("sha256:"));
        assert_eq!(artifact.cas_hash().len(), "sha256:".len() + 64);
    }

    #[test]
    fn test_category_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ArtifactCategory::Plots).unwrap(),
            "\"plots\""
        );
        assert_eq!(ArtifactCategory::Model.to_string(), "model");
    }
}
