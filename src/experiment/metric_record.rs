//! Scalar evaluation metrics (accuracy, f1, roc_auc) logged to a run

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One logged metric value; serialized as one line of `metrics.jsonl`.
///
/// `step` counts repeated logs of the same key within a run, so a key
/// logged once sits at step 0.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MetricRecord {
    run_id: String,
    key: String,
    step: u64,
    value: f64,
    timestamp: DateTime<Utc>,
}

impl MetricRecord {
    /// Metric `key` at occurrence `step`, stamped now.
    #[must_use]
    pub fn new(run_id: impl Into<String>, key: impl Into<String>, step: u64, value: f64) -> Self {
        Self {
            run_id: run_id.into(),
            key: key.into(),
            step,
            value,
            timestamp: Utc::now(),
        }
    }

    /// Owning run
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Metric name
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Occurrence index of the key within the run
    #[must_use]
    pub const fn step(&self) -> u64 {
        self.step
    }

    /// Logged value
    #[must_use]
    pub const fn value(&self) -> f64 {
        self.value
    }

    /// When the value was logged
    #[must_use]
    pub const fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }
}
