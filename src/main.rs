use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use lifestyle_risk::config::PipelineConfig;
use lifestyle_risk::pipeline::Pipeline;
use lifestyle_risk::storage::Dataset;

#[derive(Parser)]
#[command(name = "lifestyle-risk")]
#[command(about = "Derive lifestyle risk labels, train classifiers and track the runs")]
#[command(version)]
struct Cli {
    /// Input dataset (.csv or .parquet)
    #[arg(long)]
    data: PathBuf,

    /// Pipeline configuration (JSON); defaults to the standard three models
    #[arg(long)]
    config: Option<PathBuf>,

    /// Override the tracking directory
    #[arg(long)]
    tracking_dir: Option<PathBuf>,

    /// Override the experiment name
    #[arg(long)]
    experiment: Option<String>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,

    /// Enable verbose (debug-level) logging
    #[arg(long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let mut config = match &cli.config {
        Some(path) => PipelineConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(dir) = cli.tracking_dir {
        config.tracking_dir = dir;
    }
    if let Some(name) = cli.experiment {
        config.experiment_name = name;
    }

    let pipeline = Pipeline::new(config).context("invalid pipeline configuration")?;

    let dataset = Dataset::load(&cli.data)
        .with_context(|| format!("failed to load dataset {}", cli.data.display()))?;
    info!(rows = dataset.num_rows(), path = %cli.data.display(), "dataset loaded");

    let mut tracker = pipeline
        .open_local_tracker()
        .context("failed to open tracking directory")?;

    let report = pipeline
        .run(&dataset, &mut tracker)
        .context("pipeline failed")?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print!("{report}");
    }
    info!(runs = report.runs.len(), root = %tracker.root().display(), "done");
    Ok(())
}
