//! Fraud probability core: the pieces shared by training and serving
//!
//! Training and inference go through the same schema projection, the same
//! frozen scaler and the same model encoding, so a transaction scored online
//! sees exactly the transformation the model was trained behind.
//!
//! Modules:
//! - `record` / `schema`: raw transactions and the ordered feature schema
//! - `splitter`: deterministic, optionally stratified train/test partition
//! - `preprocessor`: leak-free standardisation fitted on the training split
//! - `model` / `gbdt`: the two classifier variants behind `FraudModel`
//! - `metrics`: AUC, log loss, confusion matrix, per-epoch history
//! - `artifact`: the persisted bundle and its integrity checks
//! - `serde_canon` / `deterministic`: canonical JSON hashing and seeded shuffling

pub mod artifact;
pub mod deterministic;
pub mod errors;
pub mod gbdt;
pub mod metrics;
pub mod model;
pub mod preprocessor;
pub mod record;
pub mod schema;
pub mod serde_canon;
pub mod splitter;

pub use artifact::{ArtifactBundle, Manifest};
pub use errors::{FraudError, Result};
pub use metrics::{roc_auc, ConfusionMatrix, MetricsHistory, MetricsSnapshot, Split};
pub use model::{
    AnyModel, BoostedTrees, BoostingConfig, FitReport, FraudModel, FraudNet, LabeledMatrix,
    ModelKind, NetworkConfig,
};
pub use preprocessor::{Preprocessor, ScalerState};
pub use record::{FeatureMap, Record, FRAUD, LEGIT};
pub use schema::{FeatureSchema, SchemaMode};
pub use splitter::{split, DatasetSplit, SplitOptions};

/// Crate version string recorded in run logs
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
