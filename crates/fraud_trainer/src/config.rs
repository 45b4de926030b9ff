//! Training configuration: TOML file with CLI overrides applied on top

use crate::dataset::LABEL_COLUMN;
use crate::errors::TrainerError;
use fraud_core::{BoostingConfig, FraudError, ModelKind, NetworkConfig, SchemaMode, SplitOptions};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Everything a training run needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TrainingConfig {
    pub model: ModelKind,
    pub data_path: PathBuf,
    pub label_column: String,

    pub test_fraction: f64,
    pub seed: u64,
    pub stratify: bool,
    pub balance: bool,

    /// Epochs for the network; upper bound on boosting rounds for the trees
    pub epochs: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    pub dropout: f64,
    pub diagnostic_epoch: usize,

    pub patience: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    /// Shrinkage applied to each boosted tree
    pub tree_learning_rate: f64,

    pub strict_schema: bool,
    pub output_dir: PathBuf,
    pub log_dir: PathBuf,
    /// Plot data destination; diagnostics are discarded when unset
    pub diagnostics_dir: Option<PathBuf>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        let network = NetworkConfig::default();
        let boosting = BoostingConfig::default();
        let split = SplitOptions::default();
        Self {
            model: ModelKind::FraudNet,
            data_path: PathBuf::from("data/creditcard.csv"),
            label_column: LABEL_COLUMN.to_string(),
            test_fraction: split.test_fraction,
            seed: split.seed,
            stratify: split.stratify,
            balance: split.balance,
            epochs: network.epochs,
            batch_size: network.batch_size,
            learning_rate: network.learning_rate,
            dropout: network.dropout,
            diagnostic_epoch: 8,
            patience: boosting.patience,
            max_depth: boosting.max_depth,
            min_samples_leaf: boosting.min_samples_leaf,
            tree_learning_rate: boosting.learning_rate,
            strict_schema: false,
            output_dir: PathBuf::from("artifacts/latest"),
            log_dir: PathBuf::from("runs"),
            diagnostics_dir: None,
        }
    }
}

impl TrainingConfig {
    /// Load configuration from a TOML file; absent keys take their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self, TrainerError> {
        let content = fs::read_to_string(path).map_err(|e| {
            TrainerError::Config(format!("failed to read config file {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, TrainerError> {
        toml::from_str(content)
            .map_err(|e| TrainerError::Config(format!("failed to parse config: {e}")))
    }

    pub fn split_options(&self) -> SplitOptions {
        SplitOptions {
            test_fraction: self.test_fraction,
            seed: self.seed,
            stratify: self.stratify,
            balance: self.balance,
        }
    }

    pub fn network_config(&self) -> NetworkConfig {
        NetworkConfig {
            dropout: self.dropout,
            learning_rate: self.learning_rate,
            epochs: self.epochs,
            batch_size: self.batch_size,
            seed: self.seed,
            ..NetworkConfig::default()
        }
    }

    pub fn boosting_config(&self) -> BoostingConfig {
        BoostingConfig {
            max_epochs: self.epochs,
            patience: self.patience,
            learning_rate: self.tree_learning_rate,
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            ..BoostingConfig::default()
        }
    }

    pub fn schema_mode(&self) -> SchemaMode {
        SchemaMode::from_strict(self.strict_schema)
    }

    /// Check every field range; the first violation is reported.
    pub fn validate(&self) -> Result<(), FraudError> {
        if !(self.test_fraction > 0.0 && self.test_fraction < 1.0) {
            return Err(FraudError::InvalidConfig(format!(
                "test_fraction must lie in (0, 1), got {}",
                self.test_fraction
            )));
        }
        if self.label_column.trim().is_empty() {
            return Err(FraudError::InvalidConfig("label_column must not be blank".into()));
        }
        if self.output_dir.as_os_str().is_empty() {
            return Err(FraudError::InvalidConfig("output_dir must be set".into()));
        }
        match self.model {
            ModelKind::FraudNet => self.network_config().validate(),
            ModelKind::BoostedTrees => self.boosting_config().validate(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = TrainingConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.label_column, "Class");
        assert_eq!(config.diagnostic_epoch, 8);
        assert_eq!(config.epochs, 10);
    }

    #[test]
    fn test_toml_overrides_defaults() {
        let config = TrainingConfig::from_toml_str(
            r#"
            model = "boosted_trees"
            seed = 7
            test_fraction = 0.25
            diagnostics_dir = "plots"
            "#,
        )
        .unwrap();
        assert_eq!(config.model, ModelKind::BoostedTrees);
        assert_eq!(config.seed, 7);
        assert_eq!(config.split_options().test_fraction, 0.25);
        assert_eq!(config.diagnostics_dir, Some(PathBuf::from("plots")));
        assert_eq!(config.batch_size, TrainingConfig::default().batch_size);
    }

    #[test]
    fn test_unknown_key_rejected() {
        assert!(TrainingConfig::from_toml_str("epochz = 3").is_err());
    }

    #[test]
    fn test_validation_rejects_out_of_range() {
        let cases = [
            TrainingConfig {
                test_fraction: 1.0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                dropout: 1.0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                batch_size: 0,
                ..TrainingConfig::default()
            },
            TrainingConfig {
                model: ModelKind::BoostedTrees,
                patience: 0,
                ..TrainingConfig::default()
            },
        ];
        for config in cases {
            assert!(
                matches!(config.validate(), Err(FraudError::InvalidConfig(_))),
                "{config:?}"
            );
        }
    }
}
