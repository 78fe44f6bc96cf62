//! End-to-end pipeline tests
//!
//! Synthetic cohorts run through derivation, split, training and tracking.

use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use ndarray::{Array1, Array2};
use serde_json::json;

use lifestyle_risk::config::PipelineConfig;
use lifestyle_risk::error::Stage;
use lifestyle_risk::experiment::{
    ArtifactCategory, ArtifactRecord, ExperimentTracker, LocalTracker, MemoryTracker, RunRecord,
    RunStatus,
};
use lifestyle_risk::model::{ModelConfig, ModelKind, Params};
use lifestyle_risk::pipeline::Pipeline;
use lifestyle_risk::split::TrainTestSplit;
use lifestyle_risk::storage::{Dataset, RawRecord};
use lifestyle_risk::trainer::ModelTrainer;
use lifestyle_risk::{Error, Result};

#[allow(clippy::cast_precision_loss)]
fn cohort(n: usize) -> Vec<RawRecord> {
    (0..n)
        .map(|i| RawRecord {
            age: 20.0 + (i * 37 % 60) as f64,
            bmi: 18.0 + (i * 13 % 20) as f64,
            cholesterol: 150.0 + (i * 29 % 150) as f64,
            systolic_bp: 100.0 + (i * 17 % 60) as f64,
            daily_steps: 2000.0 + (i * 1543 % 12000) as f64,
            sleep_hours: 4.0 + (i * 7 % 50) as f64 / 10.0,
            smoker: i % 3 == 0,
            alcohol: i % 4 == 1,
            family_history: i % 5 == 2,
        })
        .collect()
}

fn params(value: serde_json::Value) -> Params {
    match value {
        serde_json::Value::Object(map) => map,
        _ => Params::new(),
    }
}

/// Smaller ensembles with the same families, in the standard order
fn quick_models() -> Vec<ModelConfig> {
    vec![
        ModelConfig::new(
            "RandomForest",
            ModelKind::RandomForest,
            params(json!({"n_estimators": 25, "max_depth": 6, "max_features": 4, "seed": 42})),
        ),
        ModelConfig::logistic_regression(),
        ModelConfig::new(
            "GradientBoostedTrees",
            ModelKind::GradientBoostedTrees,
            params(json!({
                "n_estimators": 40, "max_depth": 3, "learning_rate": 0.1,
                "subsample": 0.9, "feature_subsample": 0.9, "seed": 42, "loss": "logloss"
            })),
        ),
    ]
}

fn quick_config() -> PipelineConfig {
    PipelineConfig {
        models: quick_models(),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_default_models_end_to_end() {
    let records = cohort(80);
    let mut tracker = MemoryTracker::new("health-lifestyle-risk");
    let report = Pipeline::new(PipelineConfig::default())
        .unwrap()
        .run_records(&records, &mut tracker)
        .unwrap();

    assert_eq!(report.n_records, 80);
    assert_eq!(report.positives + report.negatives, 80);
    assert_eq!(report.test_size, 16);
    assert_eq!(report.train_size, 64);

    let names: Vec<_> = report.runs.iter().map(|r| r.model.as_str()).collect();
    assert_eq!(
        names,
        vec!["RandomForest", "LogisticRegression", "GradientBoostedTrees"]
    );
    for run in &report.runs {
        assert_eq!(run.status, RunStatus::Success);
        assert_eq!(run.confusion_matrix.total(), report.test_size);
        assert!((0.0..=1.0).contains(&run.metrics.accuracy));
        assert!((0.0..=1.0).contains(&run.metrics.f1));
        assert!(run.metrics.roc_auc.is_some_and(|a| (0.0..=1.0).contains(&a)));

        let store = tracker.store();
        assert_eq!(
            store
                .get_artifacts_for_run(&run.run_id, Some(ArtifactCategory::Plots))
                .len(),
            1
        );
        assert_eq!(
            store
                .get_artifacts_for_run(&run.run_id, Some(ArtifactCategory::Model))
                .len(),
            1
        );
    }

    let runs = tracker.runs();
    assert_eq!(runs.len(), 3);
    assert!(runs.iter().all(|r| r.status() == RunStatus::Success));
    assert!(tracker.active_run().is_none());
}

#[test]
fn test_repeat_runs_are_identical() {
    let records = cohort(70);
    let pipeline = Pipeline::new(quick_config()).unwrap();

    let mut first_tracker = MemoryTracker::new("exp");
    let mut second_tracker = MemoryTracker::new("exp");
    let first = pipeline.run_records(&records, &mut first_tracker).unwrap();
    let second = pipeline.run_records(&records, &mut second_tracker).unwrap();

    assert_eq!(first.train_size, second.train_size);
    assert_eq!(first.median_score, second.median_score);

    let lr = |report: &lifestyle_risk::pipeline::PipelineReport| {
        report
            .runs
            .iter()
            .find(|r| r.model == "LogisticRegression")
            .map(|r| (r.metrics, r.confusion_matrix))
            .unwrap()
    };
    assert_eq!(lr(&first), lr(&second));

    for (a, b) in first.runs.iter().zip(&second.runs) {
        assert_eq!(a.metrics, b.metrics, "{} differs between runs", a.model);
        assert_eq!(a.artifacts[1].cas_hash(), b.artifacts[1].cas_hash());
    }
}

#[test]
fn test_stratified_split_keeps_class_balance() {
    let records = cohort(90);
    let mut tracker = MemoryTracker::new("exp");
    let report = Pipeline::new(quick_config())
        .unwrap()
        .run_records(&records, &mut tracker)
        .unwrap();

    let cm = report.runs[0].confusion_matrix;
    let test_pos = cm.true_positive + cm.false_negative;
    let expected = report.positives as f64 * report.test_size as f64 / report.n_records as f64;
    assert!((test_pos as f64 - expected).abs() <= 1.0);
}

/// Delegates to [`MemoryTracker`] but rejects uploads for one model.
struct RejectingTracker {
    inner: MemoryTracker,
    reject_model: &'static str,
    current: Option<String>,
}

impl ExperimentTracker for RejectingTracker {
    fn experiment_name(&self) -> &str {
        self.inner.experiment_name()
    }

    fn active_run(&self) -> Option<&str> {
        self.inner.active_run()
    }

    fn begin_run(&mut self, run_name: &str) -> Result<String> {
        self.current = Some(run_name.to_string());
        self.inner.begin_run(run_name)
    }

    fn log_params(&mut self, params: &Params) -> Result<()> {
        self.inner.log_params(params)
    }

    fn log_metric(&mut self, key: &str, value: f64) -> Result<()> {
        self.inner.log_metric(key, value)
    }

    fn log_artifact(&mut self, path: &Path, category: ArtifactCategory) -> Result<ArtifactRecord> {
        if self.current.as_deref() == Some(self.reject_model) {
            return Err(Error::Tracking("upload rejected".to_string()));
        }
        self.inner.log_artifact(path, category)
    }

    fn end_run(&mut self, status: RunStatus) -> Result<RunRecord> {
        self.current = None;
        self.inner.end_run(status)
    }
}

#[test]
fn test_artifact_failure_closes_run_and_stops_pipeline() {
    let records = cohort(60);
    let mut tracker = RejectingTracker {
        inner: MemoryTracker::new("exp"),
        reject_model: "LogisticRegression",
        current: None,
    };

    let err = Pipeline::new(quick_config())
        .unwrap()
        .run_records(&records, &mut tracker)
        .unwrap_err();
    match &err {
        Error::Artifact { model, message } => {
            assert_eq!(model, "LogisticRegression");
            assert!(message.contains("upload rejected"));
        }
        other => panic!("expected artifact error, got {other:?}"),
    }

    let runs = tracker.inner.runs();
    assert_eq!(runs.len(), 2, "GradientBoostedTrees must not start");
    assert_eq!(runs[0].status(), RunStatus::Success);
    assert_eq!(runs[1].status(), RunStatus::Failed);
    assert!(tracker.active_run().is_none());

    // partially logged run: params and metrics present, no artifacts
    let failed = runs[1].run_id().to_string();
    let store = tracker.inner.store();
    assert_eq!(store.get_params_for_run(&failed).len(), 4);
    assert_eq!(store.latest_metrics(&failed).len(), 3);
    assert!(store.get_artifacts_for_run(&failed, None).is_empty());
}

#[test]
fn test_fit_failure_reports_stage_and_closes_run() {
    let mut x_train = Array2::from_shape_fn((10, 3), |(i, j)| (i + j) as f64);
    x_train[[4, 1]] = f64::NAN;
    let split = TrainTestSplit {
        x_train,
        x_test: Array2::zeros((4, 3)),
        y_train: (0..10).map(|i| f64::from(i % 2)).collect(),
        y_test: Array1::from(vec![0.0, 1.0, 0.0, 1.0]),
        train_indices: (0..10).collect(),
        test_indices: (10..14).collect(),
    };

    let mut tracker = MemoryTracker::new("exp");
    let err = ModelTrainer::new(&split, &mut tracker)
        .run(&ModelConfig::logistic_regression())
        .unwrap_err();

    assert!(matches!(
        &err,
        Error::Training { model, stage: Stage::Fit, .. } if model == "LogisticRegression"
    ));
    assert!(tracker.active_run().is_none());
    assert_eq!(tracker.runs()[0].status(), RunStatus::Failed);
    assert_eq!(tracker.store().metric_count(), 0);
}

#[test]
fn test_model_without_probability_skips_roc_auc() {
    let config = PipelineConfig {
        models: vec![ModelConfig::logistic_regression().with_probability(false)],
        ..PipelineConfig::default()
    };
    let mut tracker = MemoryTracker::new("exp");
    let report = Pipeline::new(config)
        .unwrap()
        .run_records(&cohort(50), &mut tracker)
        .unwrap();

    assert_eq!(report.runs.len(), 1);
    assert!(report.runs[0].metrics.roc_auc.is_none());
    assert_eq!(tracker.store().latest_metrics(&report.runs[0].run_id).len(), 2);
}

#[test]
fn test_csv_to_local_tracker() {
    let dir = tempfile::tempdir().unwrap();
    let csv_path = dir.path().join("health_lifestyle.csv");
    let mut csv = String::from(
        "age,bmi,cholesterol,systolic_bp,daily_steps,sleep_hours,smoker,alcohol,family_history\n",
    );
    for r in cohort(60) {
        writeln!(
            csv,
            "{},{},{},{},{},{},{},{},{}",
            r.age,
            r.bmi,
            r.cholesterol,
            r.systolic_bp,
            r.daily_steps,
            r.sleep_hours,
            u8::from(r.smoker),
            u8::from(r.alcohol),
            u8::from(r.family_history)
        )
        .unwrap();
    }
    fs::write(&csv_path, csv).unwrap();

    let config = PipelineConfig {
        tracking_dir: dir.path().join("mlruns"),
        ..quick_config()
    };
    let mut tracker = LocalTracker::new(&config.tracking_dir, &config.experiment_name).unwrap();
    let dataset = Dataset::load(&csv_path).unwrap();
    let report = Pipeline::new(config).unwrap().run(&dataset, &mut tracker).unwrap();

    assert_eq!(report.n_records, 60);
    for run in &report.runs {
        let run_dir = tracker.run_dir(&run.run_id);
        assert!(run_dir
            .join(format!("artifacts/plots/confusion_matrix_{}.svg", run.model))
            .exists());
        assert!(run_dir
            .join(format!("artifacts/model/model_{}.json", run.model))
            .exists());
        let keys: Vec<_> = tracker
            .metrics(&run.run_id)
            .unwrap()
            .iter()
            .map(|m| m.key().to_string())
            .collect();
        assert_eq!(keys, vec!["accuracy", "f1", "roc_auc"]);
    }
    assert_eq!(tracker.runs().unwrap().len(), 3);
}

#[test]
fn test_tracker_opened_only_for_valid_config() {
    let dir = tempfile::tempdir().unwrap();
    let tracking_dir = dir.path().join("mlruns");

    let invalid = PipelineConfig {
        tracking_dir: tracking_dir.clone(),
        models: vec![
            ModelConfig::logistic_regression(),
            ModelConfig::logistic_regression(),
        ],
        ..PipelineConfig::default()
    };
    assert!(matches!(Pipeline::new(invalid), Err(Error::Config(_))));
    assert!(!tracking_dir.exists());

    let pipeline = Pipeline::new(PipelineConfig {
        tracking_dir: tracking_dir.clone(),
        ..quick_config()
    })
    .unwrap();
    let tracker = pipeline.open_local_tracker().unwrap();

    let stored: serde_json::Value = serde_json::from_slice(
        &fs::read(tracker.root().join("experiment.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(stored["config"]["models"].as_array().map(Vec::len), Some(3));
    assert!(tracker.root().starts_with(&tracking_dir));
}
