//! Local-directory tracker
//!
//! ## Layout
//!
//! ```text
//! <tracking_dir>/<experiment-id>/
//!   experiment.json
//!   runs/<run_id>/
//!     run.json
//!     params.json
//!     metrics.jsonl
//!     artifacts.jsonl
//!     artifacts/<category>/<file>
//! ```
//!
//! Run IDs are `<seq>-<run name slug>`, with `seq` continuing after the runs
//! already on disk.

use std::collections::HashMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;

use super::{
    slug, ArtifactCategory, ArtifactRecord, ExperimentRecord, ExperimentTracker, MetricRecord,
    RunRecord, RunStatus,
};
use crate::model::Params;
use crate::{Error, Result};

struct ActiveRun {
    record: RunRecord,
    dir: PathBuf,
    params: Params,
    steps: HashMap<String, u64>,
}

/// Tracker persisting runs under a local directory
pub struct LocalTracker {
    root: PathBuf,
    experiment: ExperimentRecord,
    active: Option<ActiveRun>,
}

impl std::fmt::Debug for LocalTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalTracker")
            .field("root", &self.root)
            .field("experiment", &self.experiment.name())
            .field("active", &self.active.as_ref().map(|r| r.record.run_id()))
            .finish()
    }
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value)?;
    fs::write(path, bytes)?;
    Ok(())
}

fn append_line<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let mut line = serde_json::to_vec(value)?;
    line.push(b'\n');
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(&line)?;
    Ok(())
}

impl LocalTracker {
    /// Open (or create) the experiment directory under `tracking_dir`.
    ///
    /// An existing `experiment.json` is reused so repeated invocations file
    /// their runs under the same experiment.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::Json`] if the directory or experiment
    /// file cannot be created or read.
    pub fn new(tracking_dir: impl AsRef<Path>, experiment_name: &str) -> Result<Self> {
        Self::with_config(tracking_dir, experiment_name, None)
    }

    /// Like [`LocalTracker::new`], recording `config` on a newly created
    /// experiment.
    ///
    /// # Errors
    ///
    /// See [`LocalTracker::new`].
    pub fn with_config(
        tracking_dir: impl AsRef<Path>,
        experiment_name: &str,
        config: Option<Value>,
    ) -> Result<Self> {
        let root = tracking_dir.as_ref().join(slug(experiment_name));
        fs::create_dir_all(root.join("runs"))?;

        let experiment_file = root.join("experiment.json");
        let experiment = if experiment_file.exists() {
            serde_json::from_slice(&fs::read(&experiment_file)?)?
        } else {
            let mut builder = ExperimentRecord::builder(slug(experiment_name), experiment_name);
            if let Some(config) = config {
                builder = builder.config(config);
            }
            let record = builder.build();
            write_json(&experiment_file, &record)?;
            record
        };

        tracing::debug!(root = %root.display(), "local tracker opened");
        Ok(Self {
            root,
            experiment,
            active: None,
        })
    }

    /// Experiment directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Experiment the runs are filed under
    #[must_use]
    pub const fn experiment(&self) -> &ExperimentRecord {
        &self.experiment
    }

    /// Directory of a run
    #[must_use]
    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join("runs").join(run_id)
    }

    /// Read back every run recorded on disk, ordered by run ID.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::Json`] on unreadable run files.
    pub fn runs(&self) -> Result<Vec<RunRecord>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(self.root.join("runs"))? {
            let run_file = entry?.path().join("run.json");
            if run_file.exists() {
                runs.push(serde_json::from_slice::<RunRecord>(&fs::read(run_file)?)?);
            }
        }
        runs.sort_by(|a, b| a.run_id().cmp(b.run_id()));
        Ok(runs)
    }

    /// Read back the metrics of a run in logging order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`] / [`Error::Json`] on an unreadable metrics file.
    pub fn metrics(&self, run_id: &str) -> Result<Vec<MetricRecord>> {
        let path = self.run_dir(run_id).join("metrics.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(path)?
            .lines()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str(l).map_err(Error::from))
            .collect()
    }

    fn next_seq(&self) -> Result<usize> {
        let mut count = 0;
        for entry in fs::read_dir(self.root.join("runs"))? {
            if entry?.file_type()?.is_dir() {
                count += 1;
            }
        }
        Ok(count + 1)
    }

    fn active_mut(&mut self) -> Result<&mut ActiveRun> {
        self.active
            .as_mut()
            .ok_or_else(|| Error::Tracking("no active run".to_string()))
    }
}

impl ExperimentTracker for LocalTracker {
    fn experiment_name(&self) -> &str {
        self.experiment.name()
    }

    fn active_run(&self) -> Option<&str> {
        self.active.as_ref().map(|r| r.record.run_id())
    }

    fn begin_run(&mut self, run_name: &str) -> Result<String> {
        if let Some(open) = &self.active {
            return Err(Error::Tracking(format!(
                "cannot start run '{run_name}': run '{}' is still open",
                open.record.run_id()
            )));
        }

        let mut seq = self.next_seq()?;
        let (run_id, dir) = loop {
            let run_id = format!("{seq:04}-{}", slug(run_name));
            let dir = self.run_dir(&run_id);
            if !dir.exists() {
                break (run_id, dir);
            }
            seq += 1;
        };
        fs::create_dir_all(&dir)?;

        let mut record = RunRecord::new(&run_id, self.experiment.experiment_id(), run_name);
        record.start();
        write_json(&dir.join("run.json"), &record)?;

        tracing::info!(run_id = %run_id, run_name, "run started");
        self.active = Some(ActiveRun {
            record,
            dir,
            params: Params::new(),
            steps: HashMap::new(),
        });
        Ok(run_id)
    }

    fn log_params(&mut self, params: &Params) -> Result<()> {
        let run = self.active_mut()?;
        for (key, value) in params {
            run.params.insert(key.clone(), value.clone());
        }
        write_json(&run.dir.join("params.json"), &run.params)
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        let run = self.active_mut()?;
        let step = run.steps.entry(key.to_string()).or_insert(0);
        let metric = MetricRecord::new(run.record.run_id(), key, *step, value);
        *step += 1;
        append_line(&run.dir.join("metrics.jsonl"), &metric)
    }

    fn log_artifact(&mut self, path: &Path, category: ArtifactCategory) -> Result<ArtifactRecord> {
        let run = self.active_mut()?;
        let key = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Tracking(format!("artifact path has no file name: {}", path.display())))?;
        let bytes = fs::read(path)?;

        let dest_dir = run.dir.join("artifacts").join(category.as_str());
        fs::create_dir_all(&dest_dir)?;
        fs::write(dest_dir.join(&key), &bytes)?;

        let record = ArtifactRecord::from_bytes(run.record.run_id(), key, category, &bytes);
        append_line(&run.dir.join("artifacts.jsonl"), &record)?;
        tracing::debug!(run_id = %record.run_id(), key = %record.key(), %category, "artifact stored");
        Ok(record)
    }

    fn end_run(&mut self, status: RunStatus) -> Result<RunRecord> {
        let mut run = self
            .active
            .take()
            .ok_or_else(|| Error::Tracking("no active run to end".to_string()))?;
        run.record.complete(status);
        write_json(&run.dir.join("run.json"), &run.record)?;
        tracing::info!(run_id = %run.record.run_id(), ?status, "run ended");
        Ok(run.record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_layout_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(dir.path(), "health-lifestyle-risk").unwrap();

        let run_id = tracker.begin_run("RandomForest").unwrap();
        let mut params = Params::new();
        params.insert("max_depth".to_string(), json!(6));
        tracker.log_params(&params).unwrap();
        tracker.log_metric("accuracy", 0.75).unwrap();

        let src = dir.path().join("model_RandomForest.json");
        fs::write(&src, b"{}").unwrap();
        tracker.log_artifact(&src, ArtifactCategory::Model).unwrap();
        tracker.end_run(RunStatus::Success).unwrap();

        let run_dir = dir.path().join("health-lifestyle-risk/runs").join(&run_id);
        assert!(run_dir.join("run.json").exists());
        assert!(run_dir.join("params.json").exists());
        assert!(run_dir.join("metrics.jsonl").exists());
        assert!(run_dir.join("artifacts/model/model_RandomForest.json").exists());

        let runs = tracker.runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].status(), RunStatus::Success);
        assert_eq!(tracker.metrics(&run_id).unwrap()[0].value(), 0.75);
    }

    #[test]
    fn test_run_ids_continue_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        {
            let mut tracker = LocalTracker::new(dir.path(), "exp").unwrap();
            tracker.begin_run("rf").unwrap();
            tracker.end_run(RunStatus::Success).unwrap();
        }
        let mut tracker = LocalTracker::new(dir.path(), "exp").unwrap();
        assert_eq!(tracker.begin_run("rf").unwrap(), "0002-rf");
    }

    #[test]
    fn test_experiment_config_recorded_once() {
        let dir = tempfile::tempdir().unwrap();
        let first =
            LocalTracker::with_config(dir.path(), "exp", Some(json!({"seed": 42}))).unwrap();
        let second = LocalTracker::new(dir.path(), "exp").unwrap();
        assert_eq!(first.experiment(), second.experiment());
        assert_eq!(second.experiment().config(), Some(&json!({"seed": 42})));
    }

    #[test]
    fn test_overlapping_runs_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(dir.path(), "exp").unwrap();
        tracker.begin_run("a").unwrap();
        assert!(matches!(tracker.begin_run("b"), Err(Error::Tracking(_))));
    }

    #[test]
    fn test_params_merge() {
        let dir = tempfile::tempdir().unwrap();
        let mut tracker = LocalTracker::new(dir.path(), "exp").unwrap();
        let run_id = tracker.begin_run("lr").unwrap();

        let mut first = Params::new();
        first.insert("C".to_string(), json!(1.0));
        let mut second = Params::new();
        second.insert("solver".to_string(), json!("liblinear"));
        tracker.log_params(&first).unwrap();
        tracker.log_params(&second).unwrap();

        let saved: Value =
            serde_json::from_slice(&fs::read(tracker.run_dir(&run_id).join("params.json")).unwrap())
                .unwrap();
        assert_eq!(saved, json!({"C": 1.0, "solver": "liblinear"}));
    }
}
