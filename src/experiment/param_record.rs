//! Param Record - one logged hyperparameter

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single hyperparameter logged against a run.
///
/// Values keep their JSON type so `200` and `"liblinear"` round-trip as
/// written in the model configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ParamRecord {
    run_id: String,
    key: String,
    value: Value,
}

impl ParamRecord {
    /// Create a new param record.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, value: Value) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            value,
        }
    }

    /// Get the run ID.
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Get the parameter name.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Get the parameter value.
    #[must_use]
    pub const fn value(&self) -> &Value {
        &self.value
    }
}
