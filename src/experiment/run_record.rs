//! One tracked training run per model configuration

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a tracked run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Registered, not started
    Pending,
    /// Open; params, metrics and artifacts may be logged
    Running,
    /// Every stage logged
    Success,
    /// Closed early by an error or a dropped handle
    Failed,
}

impl RunStatus {
    /// Whether the run has reached a final status
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

/// A run named after the model it trains.
///
/// `run_id` is assigned by the tracker; `run_name` is the model name from
/// its [`ModelConfig`](crate::model::ModelConfig).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunRecord {
    run_id: String,
    experiment_id: String,
    run_name: String,
    status: RunStatus,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl RunRecord {
    /// Pending run under `experiment_id`.
    #[must_use]
    pub fn new(
        run_id: impl Into<String>,
        experiment_id: impl Into<String>,
        run_name: impl Into<String>,
    ) -> Self {
        Self {
            run_id: run_id.into(),
            experiment_id: experiment_id.into(),
            run_name: run_name.into(),
            status: RunStatus::Pending,
            started_at: None,
            ended_at: None,
        }
    }

    /// Tracker-assigned id (`0001-randomforest`)
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Parent experiment id
    #[must_use]
    pub fn experiment_id(&self) -> &str {
        &self.experiment_id
    }

    /// Model name
    #[must_use]
    pub fn run_name(&self) -> &str {
        &self.run_name
    }

    /// Current status
    #[must_use]
    pub const fn status(&self) -> RunStatus {
        self.status
    }

    /// Set by [`RunRecord::start`]
    #[must_use]
    pub const fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    /// Set by [`RunRecord::complete`]
    #[must_use]
    pub const fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Mark the run open.
    pub fn start(&mut self) {
        self.status = RunStatus::Running;
        self.started_at = Some(Utc::now());
    }

    /// Close the run with a terminal status.
    pub fn complete(&mut self, status: RunStatus) {
        self.status = status;
        self.ended_at = Some(Utc::now());
    }
}
