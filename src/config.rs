//! Pipeline configuration
//!
//! Loaded from a JSON file; every field is optional and falls back to the
//! standard setup (three literal model configurations, seed 42, 20% test).
//!
//! ```json
//! {
//!   "experiment_name": "health-lifestyle-risk",
//!   "tracking_dir": "./mlruns",
//!   "test_fraction": 0.2,
//!   "seed": 42,
//!   "models": [
//!     {"name": "LogisticRegression", "kind": "logistic_regression",
//!      "params": {"C": 1.0, "solver": "liblinear", "max_iter": 100, "seed": 42}}
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::model::ModelConfig;
use crate::split::{FeatureSplitter, DEFAULT_SEED, DEFAULT_TEST_FRACTION};
use crate::{Error, Result};

/// Experiment the runs are grouped under by default
pub const DEFAULT_EXPERIMENT_NAME: &str = "health-lifestyle-risk";

/// Tracking directory used when none is configured
pub const DEFAULT_TRACKING_DIR: &str = "./mlruns";

/// End-to-end pipeline settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Logical experiment name
    pub experiment_name: String,
    /// Root directory of the local tracker
    pub tracking_dir: PathBuf,
    /// Held-out fraction in `(0, 1)`
    pub test_fraction: f64,
    /// Split seed
    pub seed: u64,
    /// Models to train, in execution order
    pub models: Vec<ModelConfig>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            experiment_name: DEFAULT_EXPERIMENT_NAME.to_string(),
            tracking_dir: PathBuf::from(DEFAULT_TRACKING_DIR),
            test_fraction: DEFAULT_TEST_FRACTION,
            seed: DEFAULT_SEED,
            models: ModelConfig::defaults(),
        }
    }
}

impl PipelineConfig {
    /// Read and validate a JSON config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] if the file cannot be read, [`Error::Config`]
    /// if it does not parse or fails [`PipelineConfig::validate`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)
            .map_err(|e| Error::Config(format!("{}: {e}", path.display())))?;
        config.validate()?;
        Ok(config)
    }

    /// Check the settings and build every model once.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for an out-of-range `test_fraction`, an
    /// empty model list, a duplicate model name, or params an adapter rejects.
    pub fn validate(&self) -> Result<()> {
        if self.experiment_name.trim().is_empty() {
            return Err(Error::Config("experiment_name must not be empty".to_string()));
        }
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(Error::Config(format!(
                "test_fraction must be in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.models.is_empty() {
            return Err(Error::Config("at least one model must be configured".to_string()));
        }

        let mut seen = HashSet::new();
        for model in &self.models {
            if !seen.insert(model.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate model name '{}'",
                    model.name
                )));
            }
            model.build()?;
        }
        Ok(())
    }

    /// Splitter for these settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Split`] for an invalid `test_fraction`.
    pub fn splitter(&self) -> Result<FeatureSplitter> {
        FeatureSplitter::new(self.test_fraction, self.seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ModelKind;

    #[test]
    fn test_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.experiment_name, "health-lifestyle-risk");
        assert_eq!(config.seed, 42);
        assert_eq!(config.models.len(), 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_falls_back() {
        let config: PipelineConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(config.seed, 7);
        assert_eq!(config.test_fraction, 0.2);
        assert_eq!(config.models[0].kind, ModelKind::RandomForest);
    }

    #[test]
    fn test_unknown_field_rejected() {
        assert!(serde_json::from_str::<PipelineConfig>(r#"{"sed": 7}"#).is_err());
    }

    #[test]
    fn test_validation() {
        let mut config = PipelineConfig {
            test_fraction: 1.0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        config.test_fraction = 0.2;
        config.models.push(ModelConfig::random_forest());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("duplicate model name 'RandomForest'"));

        config.models.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(
            &path,
            r#"{"experiment_name": "trial", "models": [
                {"name": "lr", "kind": "logistic_regression", "params": {"C": 0.5}}
            ]}"#,
        )
        .unwrap();

        let config = PipelineConfig::from_file(&path).unwrap();
        assert_eq!(config.experiment_name, "trial");
        assert_eq!(config.models.len(), 1);
        assert_eq!(config.tracking_dir, PathBuf::from("./mlruns"));
    }

    #[test]
    fn test_from_file_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pipeline.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            PipelineConfig::from_file(&path),
            Err(Error::Config(_))
        ));
    }
}
