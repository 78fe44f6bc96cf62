//! Experiment tracker contract and scoped run handle

use std::path::Path;

use super::{ArtifactCategory, ArtifactRecord, RunRecord, RunStatus};
use crate::model::Params;
use crate::Result;

/// Records params, metrics and artifacts for named runs.
///
/// At most one run is open at a time; `begin_run` while another run is
/// open is a [`crate::Error::Tracking`] error, as is logging with no open run.
pub trait ExperimentTracker {
    /// Logical experiment name the runs are grouped under
    fn experiment_name(&self) -> &str;

    /// ID of the open run, if any
    fn active_run(&self) -> Option<&str>;

    /// Open a run and return its ID.
    ///
    /// # Errors
    ///
    /// Fails if a run is already open or the backend rejects the write.
    fn begin_run(&mut self, run_name: &str) -> Result<String>;

    /// Log hyperparameters against the open run, in map order.
    ///
    /// # Errors
    ///
    /// Fails if no run is open or the backend rejects the write.
    fn log_params(&mut self, params: &Params) -> Result<()>;

    /// Log one metric value against the open run.
    ///
    /// # Errors
    ///
    /// Fails if no run is open or the backend rejects the write.
    fn log_metric(&mut self, key: &str, value: f64) -> Result<()>;

    /// Upload the file at `path` under `category`.
    ///
    /// # Errors
    ///
    /// Fails if no run is open, the file cannot be read, or the backend
    /// rejects the write.
    fn log_artifact(&mut self, path: &Path, category: ArtifactCategory) -> Result<ArtifactRecord>;

    /// Close the open run with a final status.
    ///
    /// # Errors
    ///
    /// Fails if no run is open or the backend rejects the write.
    fn end_run(&mut self, status: RunStatus) -> Result<RunRecord>;

    /// Open a run whose handle closes it on every exit path.
    ///
    /// # Errors
    ///
    /// See [`ExperimentTracker::begin_run`].
    fn start_run(&mut self, run_name: &str) -> Result<RunHandle<'_, Self>>
    where
        Self: Sized,
    {
        let run_id = self.begin_run(run_name)?;
        Ok(RunHandle {
            tracker: self,
            run_id,
            closed: false,
        })
    }
}

/// Scoped ownership of a tracker's open run.
///
/// Call [`RunHandle::finish`] to close with an explicit status. A handle
/// dropped without `finish` (early return, `?`, panic unwinding) closes the
/// run as [`RunStatus::Failed`].
#[derive(Debug)]
pub struct RunHandle<'a, T: ExperimentTracker + ?Sized> {
    tracker: &'a mut T,
    run_id: String,
    closed: bool,
}

impl<T: ExperimentTracker + ?Sized> RunHandle<'_, T> {
    /// ID of the run this handle owns
    #[must_use]
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// See [`ExperimentTracker::log_params`].
    ///
    /// # Errors
    ///
    /// Propagates the tracker's error.
    pub fn log_params(&mut self, params: &Params) -> Result<()> {
        self.tracker.log_params(params)
    }

    /// See [`ExperimentTracker::log_metric`].
    ///
    /// # Errors
    ///
    /// Propagates the tracker's error.
    pub fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.tracker.log_metric(key, value)
    }

    /// See [`ExperimentTracker::log_artifact`].
    ///
    /// # Errors
    ///
    /// Propagates the tracker's error.
    pub fn log_artifact(&mut self, path: &Path, category: ArtifactCategory) -> Result<ArtifactRecord> {
        self.tracker.log_artifact(path, category)
    }

    /// Close the run with `status`.
    ///
    /// # Errors
    ///
    /// Propagates the tracker's error; the handle is consumed either way.
    pub fn finish(mut self, status: RunStatus) -> Result<RunRecord> {
        self.closed = true;
        self.tracker.end_run(status)
    }
}

impl<T: ExperimentTracker + ?Sized> Drop for RunHandle<'_, T> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        match self.tracker.end_run(RunStatus::Failed) {
            Ok(_) => tracing::debug!(run_id = %self.run_id, "run closed as failed on drop"),
            Err(e) => tracing::warn!(run_id = %self.run_id, error = %e, "failed to close run on drop"),
        }
    }
}
