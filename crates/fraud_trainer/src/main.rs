//! Fraud model trainer CLI
//!
//! Trains one model variant on a labeled CSV and writes the artifact bundle.

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use fraud_core::ModelKind;
use fraud_trainer::{
    run_training, DiagnosticsRenderer, JsonRenderer, JsonlSink, MetricsSink, NoopRenderer,
    TracingSink, TrainingConfig,
};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ModelArg {
    FraudNet,
    BoostedTrees,
}

impl From<ModelArg> for ModelKind {
    fn from(arg: ModelArg) -> Self {
        match arg {
            ModelArg::FraudNet => ModelKind::FraudNet,
            ModelArg::BoostedTrees => ModelKind::BoostedTrees,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "fraud-train")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Train a fraud probability model and write its artifact bundle", long_about = None)]
struct Args {
    /// TOML configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Input CSV dataset (header row, one label column)
    #[arg(short, long)]
    data: Option<PathBuf>,

    /// Output directory for the artifact bundle
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Model variant
    #[arg(long, value_enum)]
    model: Option<ModelArg>,

    /// Name of the label column
    #[arg(long)]
    label_column: Option<String>,

    /// Training epochs (upper bound on boosting rounds)
    #[arg(long)]
    epochs: Option<usize>,

    /// Seed for splitting, initialisation and shuffling
    #[arg(long)]
    seed: Option<u64>,

    /// Fraction of records held out for testing
    #[arg(long)]
    test_fraction: Option<f64>,

    /// Undersample the majority class before splitting
    #[arg(long)]
    balance: bool,

    /// Split without preserving class ratios
    #[arg(long)]
    no_stratify: bool,

    /// Reject records carrying features outside the schema
    #[arg(long)]
    strict_schema: bool,

    /// Directory for per-run metric logs
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Directory for diagnostic plot data
    #[arg(long)]
    diagnostics_dir: Option<PathBuf>,

    /// Log epoch metrics to the console only
    #[arg(long)]
    no_run_log: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn into_config(self) -> Result<TrainingConfig> {
        let mut config = match &self.config {
            Some(path) => TrainingConfig::from_toml_file(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => TrainingConfig::default(),
        };

        if let Some(data) = self.data {
            config.data_path = data;
        }
        if let Some(output) = self.output {
            config.output_dir = output;
        }
        if let Some(model) = self.model {
            config.model = model.into();
        }
        if let Some(label_column) = self.label_column {
            config.label_column = label_column;
        }
        if let Some(epochs) = self.epochs {
            config.epochs = epochs;
        }
        if let Some(seed) = self.seed {
            config.seed = seed;
        }
        if let Some(test_fraction) = self.test_fraction {
            config.test_fraction = test_fraction;
        }
        if let Some(log_dir) = self.log_dir {
            config.log_dir = log_dir;
        }
        if let Some(dir) = self.diagnostics_dir {
            config.diagnostics_dir = Some(dir);
        }
        config.balance |= self.balance;
        config.stratify &= !self.no_stratify;
        config.strict_schema |= self.strict_schema;

        config.validate().context("Invalid training configuration")?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    info!("Fraud model trainer v{}", env!("CARGO_PKG_VERSION"));

    let no_run_log = args.no_run_log;
    let config = args.into_config()?;

    let mut sink: Box<dyn MetricsSink> = if no_run_log {
        Box::new(TracingSink)
    } else {
        Box::new(JsonlSink::create(&config.log_dir).context("Failed to start run log")?)
    };
    let mut diagnostics: Box<dyn DiagnosticsRenderer> = match &config.diagnostics_dir {
        Some(dir) => Box::new(JsonRenderer::new(dir).context("Failed to prepare diagnostics dir")?),
        None => Box::new(NoopRenderer),
    };

    let summary = run_training(&config, sink.as_mut(), diagnostics.as_mut())
        .context("Training failed")?;

    info!("✓ Training completed successfully");
    info!("  Model: {}", summary.model_kind);
    info!("  Bundle: {}", config.output_dir.display());
    info!("  Bundle hash: {}", summary.manifest.bundle_hash);
    info!(
        "  Train: {} records ({} fraud), test: {} records ({} fraud)",
        summary.train_counts.total(),
        summary.train_counts.fraud,
        summary.test_counts.total(),
        summary.test_counts.fraud
    );
    match summary.final_test_auc() {
        Some(auc) => info!("  Test AUC: {auc:.4}"),
        None => info!("  Test AUC: n/a (single-class test split)"),
    }
    if let Some(matrix) = summary.confusion_matrix {
        info!("  Confusion matrix [[TN, FP], [FN, TP]]: {:?}", matrix.as_grid());
    }

    Ok(())
}
