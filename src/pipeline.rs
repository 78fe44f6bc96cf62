//! End-to-end pipeline
//!
//! dataset → records → derived labels → stratified split → one tracked run
//! per configured model. Derivation always runs on the full dataset before
//! the split.

use std::fmt;

use serde::Serialize;

use crate::config::PipelineConfig;
use crate::experiment::{ExperimentTracker, LocalTracker};
use crate::risk::{RiskLevel, RiskScoreDeriver};
use crate::storage::{feature_matrix, Dataset, RawRecord};
use crate::trainer::{ModelTrainer, TrainingRun};
use crate::Result;

/// Summary of one pipeline invocation
#[derive(Debug, Clone, Serialize)]
pub struct PipelineReport {
    /// Records in the dataset
    pub n_records: usize,
    /// Records with at least one value outside the plausible range
    pub out_of_range_records: usize,
    /// Records labelled at-risk
    pub positives: usize,
    /// Records labelled not-at-risk
    pub negatives: usize,
    /// Median rescaled score (the label threshold)
    pub median_score: f64,
    /// Dataset distribution over risk levels, lowest first
    pub level_counts: Vec<(RiskLevel, usize)>,
    /// Training rows
    pub train_size: usize,
    /// Held-out rows
    pub test_size: usize,
    /// Completed runs, in execution order
    pub runs: Vec<TrainingRun>,
}

impl fmt::Display for PipelineReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "records: {} ({} at risk, {} not at risk, median score {:.4})",
            self.n_records, self.positives, self.negatives, self.median_score
        )?;
        if self.out_of_range_records > 0 {
            writeln!(f, "out-of-range records: {}", self.out_of_range_records)?;
        }
        let levels: Vec<String> = self
            .level_counts
            .iter()
            .map(|(level, count)| format!("{level}={count}"))
            .collect();
        writeln!(f, "risk levels: {}", levels.join(", "))?;
        writeln!(f, "split: {} train / {} test", self.train_size, self.test_size)?;
        writeln!(f, "{:<24} {:>9} {:>9} {:>9}", "model", "accuracy", "f1", "roc_auc")?;
        for run in &self.runs {
            let auc = run
                .metrics
                .roc_auc
                .map_or_else(|| "-".to_string(), |a| format!("{a:.4}"));
            writeln!(
                f,
                "{:<24} {:>9.4} {:>9.4} {:>9}",
                run.model, run.metrics.accuracy, run.metrics.f1, auc
            )?;
        }
        Ok(())
    }
}

/// Label derivation, split and training under one configuration
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    deriver: RiskScoreDeriver,
}

impl Pipeline {
    /// Create a pipeline with the standard weight table.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Config`] if the configuration is invalid.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            deriver: RiskScoreDeriver::default(),
        })
    }

    /// Replace the risk-score deriver
    #[must_use]
    pub fn with_deriver(mut self, deriver: RiskScoreDeriver) -> Self {
        self.deriver = deriver;
        self
    }

    /// Active configuration
    #[must_use]
    pub const fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Open the local tracker named by the configuration, recording the
    /// configuration on a newly created experiment.
    ///
    /// # Errors
    ///
    /// See [`LocalTracker::with_config`].
    pub fn open_local_tracker(&self) -> Result<LocalTracker> {
        LocalTracker::with_config(
            &self.config.tracking_dir,
            &self.config.experiment_name,
            Some(serde_json::to_value(&self.config)?),
        )
    }

    /// Run on a loaded dataset.
    ///
    /// # Errors
    ///
    /// Stops at the first [`crate::Error`]: invalid records, degenerate
    /// derivation, impossible split, or a failed model run.
    pub fn run<T: ExperimentTracker>(
        &self,
        dataset: &Dataset,
        tracker: &mut T,
    ) -> Result<PipelineReport> {
        let records = dataset.records()?;
        self.run_records(&records, tracker)
    }

    /// Run on already materialized records.
    ///
    /// # Errors
    ///
    /// See [`Pipeline::run`].
    pub fn run_records<T: ExperimentTracker>(
        &self,
        records: &[RawRecord],
        tracker: &mut T,
    ) -> Result<PipelineReport> {
        let out_of_range_records = records
            .iter()
            .filter(|r| !r.out_of_range_fields().is_empty())
            .count();
        if out_of_range_records > 0 {
            tracing::warn!(
                records = out_of_range_records,
                "records with values outside the plausible range"
            );
        }

        let derivation = self.deriver.derive(records)?;
        tracing::info!(
            records = records.len(),
            positives = derivation.positives(),
            median = derivation.median,
            "risk labels derived"
        );

        let x = feature_matrix(records);
        let y = derivation.label_vector();
        let split = self.config.splitter()?.split(&x, &y)?;
        tracing::info!(
            train = split.y_train.len(),
            test = split.y_test.len(),
            seed = self.config.seed,
            "stratified split ready"
        );

        let runs = ModelTrainer::new(&split, tracker).run_all(&self.config.models)?;

        Ok(PipelineReport {
            n_records: records.len(),
            out_of_range_records,
            positives: derivation.positives(),
            negatives: derivation.negatives(),
            median_score: derivation.median,
            level_counts: derivation.level_counts(),
            train_size: split.y_train.len(),
            test_size: split.y_test.len(),
            runs,
        })
    }
}
