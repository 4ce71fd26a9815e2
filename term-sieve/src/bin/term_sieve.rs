//! Runs one validation job.
//!
//! The job configuration is read from `--config`, or from `<job-name>.json`
//! in the working directory when no path is given. Contracts come from the
//! configured S3 bucket when one is set (requires the `s3` feature), otherwise
//! from `--contract-root`.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use term_sieve::contracts::contract_store_for;
use term_sieve::logging::setup::{init_logging, LoggingConfig};
use term_sieve::prelude::*;
use tracing::error;

/// Splits a dataset into schema-cast valid records and annotated rejects
#[derive(Parser, Debug)]
#[command(name = "term-sieve")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Job identifier
    #[arg(long)]
    job_name: String,

    /// Path to the job configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding `<database>/<table>.json` catalog entries
    #[arg(long, default_value = "./catalog")]
    catalog_root: PathBuf,

    /// Directory contract keys are resolved against
    #[arg(long, default_value = ".")]
    contract_root: PathBuf,

    /// S3 bucket holding the contracts, overriding the configured one
    #[arg(long)]
    bucket: Option<String>,

    /// Emit logs and the run summary as JSON
    #[arg(long)]
    json_logs: bool,
}

async fn run(cli: Cli) -> Result<String> {
    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from(format!("{}.json", cli.job_name)));
    let mut config = PipelineConfig::from_file(&config_path)?;
    if config.job_name != cli.job_name {
        tracing::warn!(
            configured = %config.job_name,
            requested = %cli.job_name,
            "Job name differs from configuration, using the requested one"
        );
        config.job_name = cli.job_name;
    }
    if let Some(bucket) = cli.bucket {
        config = config.with_bucket(bucket);
    }
    let contracts = contract_store_for(config.bucket.as_deref(), cli.contract_root)?;

    let pipeline = QualityPipeline::builder(config.clone())
        .catalog(Arc::new(JsonCatalog::new(cli.catalog_root)))
        .contracts(contracts)
        .source(Arc::new(CsvSource::new(config.input_path.clone())))
        .sink(Arc::new(ParquetSink::new()))
        .log_config(LogConfig::production())
        .build()?;

    let summary = pipeline.run().await?;
    if cli.json_logs {
        summary.to_json()
    } else {
        Ok(summary.to_string())
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let logging = if cli.json_logs {
        LoggingConfig::production()
    } else {
        LoggingConfig::default()
    };
    if let Err(e) = init_logging(logging) {
        eprintln!("Failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = %e, "Job failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
