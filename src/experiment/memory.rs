//! In-process tracker backed by [`ExperimentStore`]

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use super::{
    slug, ArtifactCategory, ArtifactRecord, ExperimentRecord, ExperimentStore, ExperimentTracker,
    MetricRecord, ParamRecord, RunRecord, RunStatus,
};
use crate::model::Params;
use crate::{Error, Result};

/// Tracker that keeps every record, and the uploaded artifact bytes, in memory.
#[derive(Debug)]
pub struct MemoryTracker {
    experiment: ExperimentRecord,
    store: ExperimentStore,
    blobs: HashMap<String, Vec<u8>>,
    active: Option<String>,
    next_seq: usize,
}

impl MemoryTracker {
    /// Create a tracker for the named experiment.
    #[must_use]
    pub fn new(experiment_name: &str) -> Self {
        let experiment = ExperimentRecord::named(experiment_name);
        let mut store = ExperimentStore::new();
        store.add_experiment(experiment.clone());
        Self {
            experiment,
            store,
            blobs: HashMap::new(),
            active: None,
            next_seq: 1,
        }
    }

    /// Experiment the runs are filed under
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// Everything logged so far
    #[must_use]
    pub const fn store(&self) -> &ExperimentStore {
        &self.store
    }

    /// All runs of this experiment, in start order
    #[must_use]
    pub fn runs(&self) -> Vec<&RunRecord> {
        self.store
            .get_runs_for_experiment(self.experiment.experiment_id())
    }

    /// Bytes of an uploaded artifact by CAS hash
    #[must_use]
    pub fn artifact_bytes(&self, cas_hash: &str) -> Option<&[u8]> {
        self.blobs.get(cas_hash).map(Vec::as_slice)
    }

    fn require_active(&self) -> Result<String> {
        self.active
            .clone()
            .ok_or_else(|| Error::Tracking("no active run".to_string()))
    }
}

impl ExperimentTracker for MemoryTracker {
    fn experiment_name(&self) -> &str {
        self.experiment.name()
    }

    fn active_run(&self) -> Option<&str> {
        self.active.as_deref()
    }

    fn begin_run(&mut self, run_name: &str) -> Result<String> {
        if let Some(open) = &self.active {
            return Err(Error::Tracking(format!(
                "cannot start run '{run_name}': run '{open}' is still open"
            )));
        }
        let run_id = format!("{:04}-{}", self.next_seq, slug(run_name));
        self.next_seq += 1;

        let mut run = RunRecord::new(&run_id, self.experiment.experiment_id(), run_name);
        run.start();
        self.store.add_run(run);
        self.active = Some(run_id.clone());
        Ok(run_id)
    }

    fn log_params(&mut self, params: &Params) -> Result<()> {
        let run_id = self.require_active()?;
        for (key, value) in params {
            self.store
                .add_param(ParamRecord::new(&run_id, key, value.clone()));
        }
        Ok(())
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let run_id = self.require_active()?;
        let step = self.store.get_metrics_for_run(&run_id, key).len() as u64;
        self.store
            .add_metric(MetricRecord::new(run_id, key, step, value));
        Ok(())
    }

    fn log_artifact(&mut self, path: &Path, category: ArtifactCategory) -> Result<ArtifactRecord> {
        let run_id = self.require_active()?;
        let bytes = fs::read(path)?;
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Tracking(format!("artifact path has no file name: {}", path.display())))?;

        let record = ArtifactRecord::from_bytes(run_id, key, category, &bytes);
        self.blobs.insert(record.cas_hash().to_string(), bytes);
        self.store.add_artifact(record.clone());
        Ok(record)
    }

    fn end_run(&mut self, status: RunStatus) -> Result<RunRecord> {
        let run_id = self
            .active
            .take()
            .ok_or_else(|| Error::Tracking("no active run to end".to_string()))?;
        let run = self
            .store
            .get_run_mut(&run_id)
            .ok_or_else(|| Error::Tracking(format!("unknown run '{run_id}'")))?;
        run.complete(status);
        Ok(run.clone())
    }
}
