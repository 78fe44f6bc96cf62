//! # lifestyle-risk: derived risk labels and uniform multi-model training
//!
//! **Version**: 0.1.0
//!
//! Turns a health-lifestyle table into a synthetic `disease_risk_real` label,
//! splits it deterministically, and trains every configured classifier
//! through the same fit → predict → score → artifact → track contract.
//!
//! ## Pipeline
//!
//! ```text
//! Dataset ──records()──▶ RiskScoreDeriver ──labels──▶ FeatureSplitter
//!                                                          │ (train, test)
//!                                                          ▼
//!            ExperimentTracker ◀── ModelTrainer ◀── [ModelConfig; N]
//!                   ▲                   │
//!                   └──── plots/model ◀─┘ ArtifactScratch
//! ```
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use lifestyle_risk::config::PipelineConfig;
//! use lifestyle_risk::experiment::LocalTracker;
//! use lifestyle_risk::pipeline::Pipeline;
//! use lifestyle_risk::storage::Dataset;
//!
//! let config = PipelineConfig::default();
//! let mut tracker = LocalTracker::new(&config.tracking_dir, &config.experiment_name)?;
//! let dataset = Dataset::load("data/health_lifestyle.csv")?;
//!
//! let report = Pipeline::new(config)?.run(&dataset, &mut tracker)?;
//! println!("{report}");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

pub mod artifact;
pub mod config;
pub mod error;
pub mod experiment;
pub mod metrics;
pub mod model;
pub mod pipeline;
pub mod risk;
pub mod split;
pub mod storage;
pub mod trainer;

pub use error::{Error, Result};
