//! Fraud model training: CSV dataset to verified artifact bundle
//!
//! Drives the shared core through one reproducible run and reports epoch
//! metrics and diagnostics through pluggable collaborators.

pub mod config;
pub mod dataset;
pub mod diagnostics;
pub mod errors;
pub mod pipeline;
pub mod sinks;
pub mod trainer;

pub use config::TrainingConfig;
pub use dataset::{ClassDistribution, Dataset, DATASET_SOURCE, LABEL_COLUMN};
pub use diagnostics::{DiagnosticsRenderer, JsonRenderer, NoopRenderer};
pub use errors::TrainerError;
pub use pipeline::{run_training, TrainingSummary};
pub use sinks::{EpochScalars, JsonlSink, MetricsSink, TracingSink};
pub use trainer::{Trainer, TrainerOptions, TrainerState, TrainingOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
