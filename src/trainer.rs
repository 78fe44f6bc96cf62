//! Model trainer: one tracked run per model configuration
//!
//! For each [`ModelConfig`] the trainer opens a run named after the model,
//! logs params, fits on the shared training split, predicts the held-out
//! split, logs `accuracy` / `f1` (and `roc_auc` when the config supports
//! probabilities), then uploads the confusion-matrix plot and the serialized
//! model. The run is closed on every exit path.

use serde::Serialize;

use crate::artifact::ArtifactScratch;
use crate::error::Stage;
use crate::experiment::{ArtifactCategory, ArtifactRecord, ExperimentTracker, RunStatus};
use crate::metrics::{self, ConfusionMatrix};
use crate::model::{ModelConfig, Params};
use crate::split::TrainTestSplit;
use crate::{Error, Result};

/// Held-out metrics of one run
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RunMetrics {
    /// Fraction of correct test predictions
    pub accuracy: f64,
    /// Positive-class F1
    pub f1: f64,
    /// ROC-AUC; `None` when the model has no probability estimates
    pub roc_auc: Option<f64>,
}

/// Outcome of one completed run
#[derive(Debug, Clone, Serialize)]
pub struct TrainingRun {
    /// Model name (also the run name)
    pub model: String,
    /// Tracker run ID
    pub run_id: String,
    /// Logged hyperparameters
    pub params: Params,
    /// Held-out metrics
    pub metrics: RunMetrics,
    /// Test-set confusion matrix
    pub confusion_matrix: ConfusionMatrix,
    /// Uploaded artifacts (plot, then model)
    pub artifacts: Vec<ArtifactRecord>,
    /// Final run status
    pub status: RunStatus,
}

/// Trains model configurations against a finalized split.
pub struct ModelTrainer<'a, T: ExperimentTracker> {
    split: &'a TrainTestSplit,
    tracker: &'a mut T,
}

impl<'a, T: ExperimentTracker> ModelTrainer<'a, T> {
    /// Create a trainer over a read-only split and an exclusively borrowed tracker
    pub fn new(split: &'a TrainTestSplit, tracker: &'a mut T) -> Self {
        Self { split, tracker }
    }

    /// Train, evaluate and log one configuration.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if the adapter cannot be built from the params
    /// - [`Error::Training`] if `fit`, `predict` or `predict_proba` fails,
    ///   or ROC-AUC is undefined for the test labels ([`Stage::Evaluate`])
    /// - [`Error::Artifact`] if rendering or uploading an artifact fails
    /// - [`Error::Tracking`] if the tracker rejects a run, param or metric
    ///
    /// Every error names the model.
    ///
    /// In every case the tracker run has been closed as failed.
    pub fn run(&mut self, config: &ModelConfig) -> Result<TrainingRun> {
        let split = self.split;
        let name = config.name.as_str();

        let mut run = self
            .tracker
            .start_run(name)
            .map_err(|e| Error::tracking(name, e))?;
        let run_id = run.run_id().to_string();
        tracing::info!(model = %name, run_id = %run_id, "training run started");

        run.log_params(&config.params)
            .map_err(|e| Error::tracking(name, e))?;

        let mut model = config.build().map_err(|e| match e {
            Error::Config(message) => Error::Config(format!("model '{name}': {message}")),
            other => other,
        })?;
        model
            .fit(&split.x_train, &split.y_train)
            .map_err(|e| Error::training(name, Stage::Fit, &e))?;
        tracing::debug!(model = %name, rows = split.x_train.nrows(), "model fitted");

        let y_pred = model
            .predict(&split.x_test)
            .map_err(|e| Error::training(name, Stage::Predict, &e))?;

        let roc_auc = if config.supports_probability {
            let proba = model
                .predict_proba(&split.x_test)
                .map_err(|e| Error::training(name, Stage::PredictProba, &e))?;
            let auc = metrics::roc_auc(&split.y_test, &proba)
                .map_err(|e| Error::training(name, Stage::Evaluate, &e))?;
            Some(auc)
        } else {
            None
        };

        let scratch = ArtifactScratch::new().map_err(|e| Error::artifact(name, &e))?;
        let (confusion_matrix, plot) = scratch
            .render_confusion_matrix(&split.y_test, &y_pred, name)
            .map_err(|e| Error::artifact(name, &e))?;

        let run_metrics = RunMetrics {
            accuracy: confusion_matrix.accuracy(),
            f1: confusion_matrix.f1(),
            roc_auc,
        };
        let mut metric_log = vec![("accuracy", run_metrics.accuracy), ("f1", run_metrics.f1)];
        if let Some(auc) = run_metrics.roc_auc {
            metric_log.push(("roc_auc", auc));
        }
        for (key, value) in metric_log {
            run.log_metric(key, value)
                .map_err(|e| Error::tracking(name, e))?;
        }
        tracing::info!(
            model = %name,
            accuracy = run_metrics.accuracy,
            f1 = run_metrics.f1,
            roc_auc = ?run_metrics.roc_auc,
            "model evaluated"
        );

        let mut artifacts = Vec::with_capacity(2);
        artifacts.push(
            run.log_artifact(plot.path(), ArtifactCategory::Plots)
                .map_err(|e| Error::artifact(name, &e))?,
        );
        drop(plot);

        let state = model.to_json().map_err(|e| Error::artifact(name, &e))?;
        let model_file = scratch
            .write_model(name, &state)
            .map_err(|e| Error::artifact(name, &e))?;
        artifacts.push(
            run.log_artifact(model_file.path(), ArtifactCategory::Model)
                .map_err(|e| Error::artifact(name, &e))?,
        );
        drop(model_file);

        let record = run
            .finish(RunStatus::Success)
            .map_err(|e| Error::tracking(name, e))?;
        tracing::info!(model = %name, run_id = %run_id, "training run finished");

        Ok(TrainingRun {
            model: config.name.clone(),
            run_id,
            params: config.params.clone(),
            metrics: run_metrics,
            confusion_matrix,
            artifacts,
            status: record.status(),
        })
    }

    /// Run every configuration in order, stopping at the first failure.
    ///
    /// # Errors
    ///
    /// The first error from [`ModelTrainer::run`]; later configurations are
    /// not attempted.
    pub fn run_all(&mut self, configs: &[ModelConfig]) -> Result<Vec<TrainingRun>> {
        let mut runs = Vec::with_capacity(configs.len());
        for config in configs {
            match self.run(config) {
                Ok(run) => runs.push(run),
                Err(e) => {
                    tracing::error!(model = %config.name, error = %e, "training run failed");
                    return Err(e);
                }
            }
        }
        Ok(runs)
    }
}
