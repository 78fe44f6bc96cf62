//! Experiment tracking
//!
//! Records and trackers for logging one run per trained model.
//!
//! ## Schema Overview
//!
//! ```text
//! ExperimentRecord (1) ──< RunRecord (N)
//!                              │
//!                              ├──< ParamRecord (N)    [insertion order]
//!                              ├──< MetricRecord (N)
//!                              └──< ArtifactRecord (N) [CAS, plots | model]
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use lifestyle_risk::experiment::{ExperimentTracker, MemoryTracker, RunStatus};
//!
//! let mut tracker = MemoryTracker::new("health-lifestyle-risk");
//!
//! let mut run = tracker.start_run("RandomForest").unwrap();
//! run.log_metric("accuracy", 0.91).unwrap();
//! run.finish(RunStatus::Success).unwrap();
//!
//! assert!(tracker.active_run().is_none());
//! ```

mod artifact_record;
mod experiment_record;
mod local;
mod memory;
mod metric_record;
mod param_record;
mod run_record;
mod store;
mod tracker;

pub use artifact_record::{cas_hash, ArtifactCategory, ArtifactRecord};
pub use experiment_record::{slug, ExperimentRecord, ExperimentRecordBuilder};
pub use local::LocalTracker;
pub use memory::MemoryTracker;
pub use metric_record::MetricRecord;
pub use param_record::ParamRecord;
pub use run_record::{RunRecord, RunStatus};
pub use store::ExperimentStore;
pub use tracker::{ExperimentTracker, RunHandle};
