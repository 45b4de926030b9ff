//! Error types for the fraud scoring core

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by splitting, preprocessing, modelling and artifact handling.
///
/// None of these are recoverable at the point they are raised: the enclosing
/// training run or inference call aborts.
#[derive(Error, Debug)]
pub enum FraudError {
    /// Bad split parameters or unusable input records
    #[error("Invalid split: {0}")]
    InvalidSplit(String),

    /// Feature set of a record does not match the schema
    #[error("Schema mismatch: missing features {missing:?}, unexpected features {unexpected:?}")]
    SchemaMismatch {
        missing: Vec<String>,
        unexpected: Vec<String>,
    },

    /// Weight shape and input shape disagree
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Persisted bundle is missing, corrupt or incompatible
    #[error("Artifact load failed: {0}")]
    ArtifactLoad(String),

    /// Decision threshold outside [0, 1]
    #[error("Invalid threshold {0}: must lie in [0, 1]")]
    InvalidThreshold(f64),

    /// Raw dataset absent
    #[error(
        "Dataset not found at {}. Download the Credit Card Fraud dataset ({source_hint}) \
         and place the CSV file at that location",
        path.display()
    )]
    DataSourceUnavailable { path: PathBuf, source_hint: String },

    /// Dataset present but malformed
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// Configuration field out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Binary encoding error
    #[error("Encoding error: {0}")]
    Encoding(#[from] bincode::Error),
}

impl FraudError {
    /// Build a schema mismatch that only reports missing features.
    pub fn missing_features(missing: Vec<String>) -> Self {
        FraudError::SchemaMismatch {
            missing,
            unexpected: Vec::new(),
        }
    }
}

/// Result type for fraud core operations
pub type Result<T> = std::result::Result<T, FraudError>;
