//! Error types for lifestyle-risk
//!
//! Toyota Way: Clear error messages with actionable guidance (Respect for People)

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline stage a training failure occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// `ModelAdapter::fit`
    Fit,
    /// `ModelAdapter::predict`
    Predict,
    /// `ModelAdapter::predict_proba`
    PredictProba,
    /// Scoring the test-set predictions
    Evaluate,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Fit => "fit",
            Self::Predict => "predict",
            Self::PredictProba => "predict_proba",
            Self::Evaluate => "evaluate",
        };
        f.write_str(name)
    }
}

/// lifestyle-risk error types
#[derive(Error, Debug)]
pub enum Error {
    /// Missing/null/degenerate input data, or a single-class derived label
    #[error("Data error: {0}")]
    Data(String),

    /// Stratified split cannot be produced for the requested sizes
    #[error("Split error: {0}")]
    Split(String),

    /// A model's fit/predict call, or scoring its predictions, failed
    #[error("Training error in model '{model}' during {stage}: {message}")]
    Training {
        /// Model name from its configuration
        model: String,
        /// Stage that failed
        stage: Stage,
        /// Underlying failure
        message: String,
    },

    /// Rendering or upload of a run artifact failed
    #[error("Artifact error for model '{model}': {message}")]
    Artifact {
        /// Model name from its configuration
        model: String,
        /// Underlying failure
        message: String,
    },

    /// Model adapter misuse (shape mismatch, not fitted, non-binary target)
    #[error("Model error: {0}")]
    Model(String),

    /// Experiment tracker rejected an operation
    #[error("Tracking error: {0}")]
    Tracking(String),

    /// Invalid pipeline or model configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Dataset storage error (CSV/Parquet/Arrow)
    #[error("Storage error: {0}")]
    StorageError(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a model-level failure with the model name and stage it happened in.
    #[must_use]
    pub fn training(model: impl Into<String>, stage: Stage, source: &Self) -> Self {
        Self::Training {
            model: model.into(),
            stage,
            message: source.to_string(),
        }
    }

    /// Prefix a tracker failure with the model whose run it hit.
    #[must_use]
    pub fn tracking(model: &str, source: Self) -> Self {
        let message = match source {
            Self::Tracking(message) => message,
            other => other.to_string(),
        };
        Self::Tracking(format!("run for model '{model}': {message}"))
    }

    /// Wrap a rendering/upload failure with the model name.
    #[must_use]
    pub fn artifact(model: impl Into<String>, source: &Self) -> Self {
        Self::Artifact {
            model: model.into(),
            message: source.to_string(),
        }
    }
}
