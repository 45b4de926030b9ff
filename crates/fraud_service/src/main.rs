//! Fraud scoring CLI
//!
//! Reads one transaction (a JSON feature object) or a batch
//! (`{"transactions": [...]}`) from a file or stdin and prints the fraud
//! probabilities as JSON on stdout.

use anyhow::{Context, Result};
use clap::Parser;
use fraud_service::{handle, InferenceService, ScoreRequest, ServiceConfig};
use std::fs;
use std::io::{self, Read};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(name = "fraud-score")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Score transactions against a trained fraud model bundle", long_about = None)]
struct Args {
    /// TOML service configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Artifact bundle directory (overrides config and environment)
    #[arg(short, long)]
    artifact_dir: Option<PathBuf>,

    /// JSON request file; stdin when absent
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Also emit 0/1 labels
    #[arg(long)]
    labels: bool,

    /// Decision threshold for labels (defaults to the configured one)
    #[arg(long)]
    threshold: Option<f64>,

    /// Reject transactions carrying features outside the schema
    #[arg(long)]
    strict_schema: bool,

    /// Pretty-print the response
    #[arg(long)]
    pretty: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn load_config(args: &Args) -> Result<ServiceConfig> {
    let mut config = match &args.config {
        Some(path) => ServiceConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => ServiceConfig::default(),
    };
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(dir) = &args.artifact_dir {
        config.artifact_dir = dir.clone();
    }
    if let Some(threshold) = args.threshold {
        config.threshold = threshold;
    }
    config.strict_schema |= args.strict_schema;
    config.validate().context("Invalid service configuration")?;
    Ok(config)
}

fn read_request(input: Option<&PathBuf>) -> Result<ScoreRequest> {
    let raw = match input {
        Some(path) => fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("Failed to read stdin")?;
            buffer
        }
    };
    serde_json::from_str(&raw).context("Request is neither a feature object nor a batch")
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // stdout carries the response
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    let config = load_config(&args)?;
    let request = read_request(args.input.as_ref())?;

    let service = InferenceService::initialize(config).context("Failed to load model bundle")?;
    let threshold = args.labels.then(|| service.config().threshold);
    let response = handle(&service, &request, threshold).context("Scoring failed")?;

    let output = if args.pretty {
        serde_json::to_string_pretty(&response)?
    } else {
        serde_json::to_string(&response)?
    };
    println!("{output}");

    let stats = service.shutdown();
    info!("Scored {} records", stats.records_scored);
    Ok(())
}
