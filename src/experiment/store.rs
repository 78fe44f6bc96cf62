//! Experiment Store - in-memory storage for experiment tracking data
//!
//! Backs [`super::MemoryTracker`]; also usable directly when assembling
//! tracking data by hand.

use std::collections::HashMap;

use super::{ArtifactCategory, ArtifactRecord, ExperimentRecord, MetricRecord, ParamRecord, RunRecord};

/// In-memory store for experiment tracking data.
///
/// ## Design
///
/// Experiments and runs live in hash maps for O(1) lookups by ID. Params,
/// metrics and artifacts are append-only vectors filtered per run, so
/// insertion order is the logging order.
#[derive(Debug, Default)]
pub struct ExperimentStore {
    experiments: HashMap<String, ExperimentRecord>,
    runs: HashMap<String, RunRecord>,
    params: Vec<ParamRecord>,
    metrics: Vec<MetricRecord>,
    artifacts: Vec<ArtifactRecord>,
}

impl ExperimentStore {
    /// Create a new empty experiment store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Check if the store holds no records at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.experiments.is_empty()
            && self.runs.is_empty()
            && self.params.is_empty()
            && self.metrics.is_empty()
            && self.artifacts.is_empty()
    }

    /// Get the number of experiments in the store.
    #[must_use]
    pub fn experiment_count(&self) -> usize {
        self.experiments.len()
    }

    /// Get the number of runs in the store.
    #[must_use]
    pub fn run_count(&self) -> usize {
        self.runs.len()
    }

    /// Get the number of metrics in the store.
    #[must_use]
    pub fn metric_count(&self) -> usize {
        self.metrics.len()
    }

    /// Get the number of artifacts in the store.
    #[must_use]
    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Add an experiment to the store.
    pub fn add_experiment(&mut self, experiment: ExperimentRecord) {
        self.experiments
            .insert(experiment.experiment_id().to_string(), experiment);
    }

    /// Get an experiment by ID.
    #[must_use]
    pub fn get_experiment(&self, experiment_id: &str) -> Option<&ExperimentRecord> {
        self.experiments.get(experiment_id)
    }

    /// Add or replace a run.
    pub fn add_run(&mut self, run: RunRecord) {
        self.runs.insert(run.run_id().to_string(), run);
    }

    /// Get a run by ID.
    #[must_use]
    pub fn get_run(&self, run_id: &str) -> Option<&RunRecord> {
        self.runs.get(run_id)
    }

    /// Mutable access to a run, for status transitions.
    pub fn get_run_mut(&mut self, run_id: &str) -> Option<&mut RunRecord> {
        self.runs.get_mut(run_id)
    }

    /// Get all runs for an experiment, ordered by start time then ID.
    #[must_use]
    pub fn get_runs_for_experiment(&self, experiment_id: &str) -> Vec<&RunRecord> {
        let mut runs: Vec<&RunRecord> = self
            .runs
            .values()
            .filter(|run| run.experiment_id() == experiment_id)
            .collect();
        runs.sort_by(|a, b| {
            a.started_at()
                .cmp(&b.started_at())
                .then_with(|| a.run_id().cmp(b.run_id()))
        });
        runs
    }

    /// Add a param to the store.
    pub fn add_param(&mut self, param: ParamRecord) {
        self.params.push(param);
    }

    /// Params logged for a run, in logging order.
    #[must_use]
    pub fn get_params_for_run(&self, run_id: &str) -> Vec<&ParamRecord> {
        self.params.iter().filter(|p| p.run_id() == run_id).collect()
    }

    /// Add a metric to the store.
    pub fn add_metric(&mut self, metric: MetricRecord) {
        self.metrics.push(metric);
    }

    /// Get metrics for a specific run and key, ordered by step.
    ///
    /// ## Example
    ///
    /// ```rust
    /// use lifestyle_risk::experiment::{ExperimentStore, MetricRecord};
    ///
    /// let mut store = ExperimentStore::new();
    /// store.add_metric(MetricRecord::new("run-001", "accuracy", 1, 0.81));
    /// store.add_metric(MetricRecord::new("run-001", "accuracy", 0, 0.78));
    ///
    /// let accuracy = store.get_metrics_for_run("run-001", "accuracy");
    /// assert_eq!(accuracy.len(), 2);
    /// assert_eq!(accuracy[0].step(), 0);
    /// ```
    #[must_use]
    pub fn get_metrics_for_run(&self, run_id: &str, key: &str) -> Vec<MetricRecord> {
        let mut metrics: Vec<MetricRecord> = self
            .metrics
            .iter()
            .filter(|m| m.run_id() == run_id && m.key() == key)
            .cloned()
            .collect();

        metrics.sort_by_key(MetricRecord::step);

        metrics
    }

    /// Latest value of every metric key logged for a run, in first-logged order.
    #[must_use]
    pub fn latest_metrics(&self, run_id: &str) -> Vec<(String, f64)> {
        let mut latest: Vec<(String, u64, f64)> = Vec::new();
        for m in self.metrics.iter().filter(|m| m.run_id() == run_id) {
            match latest.iter_mut().find(|(k, _, _)| k == m.key()) {
                Some(entry) if m.step() >= entry.1 => {
                    entry.1 = m.step();
                    entry.2 = m.value();
                }
                Some(_) => {}
                None => latest.push((m.key().to_string(), m.step(), m.value())),
            }
        }
        latest.into_iter().map(|(k, _, v)| (k, v)).collect()
    }

    /// Add an artifact to the store.
    pub fn add_artifact(&mut self, artifact: ArtifactRecord) {
        self.artifacts.push(artifact);
    }

    /// Artifacts logged for a run, optionally restricted to one category.
    #[must_use]
    pub fn get_artifacts_for_run(
        &self,
        run_id: &str,
        category: Option<ArtifactCategory>,
    ) -> Vec<&ArtifactRecord> {
        self.artifacts
            .iter()
            .filter(|a| a.run_id() == run_id && category.map_or(true, |c| a.category() == c))
            .collect()
    }
}
