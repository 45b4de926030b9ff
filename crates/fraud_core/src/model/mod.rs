//! Trainable binary classifiers behind one capability set
//!
//! Two interchangeable variants implement [`FraudModel`]:
//! - [`FraudNet`]: a small feed-forward network trained by mini-batch
//!   gradient descent for a fixed number of epochs
//! - [`BoostedTrees`]: a gradient-boosted tree ensemble with its own
//!   multi-epoch fit loop and early stopping
//!
//! [`AnyModel`] is the tagged union used where the variant is only known at
//! runtime (configuration, artifact loading).

pub mod network;

pub use crate::gbdt::{BoostedTrees, BoostingConfig};
pub use network::{EpochPass, FraudNet, NetworkConfig};

use crate::errors::{FraudError, Result};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

/// Model variant identifier, persisted in the artifact manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    FraudNet,
    BoostedTrees,
}

impl std::fmt::Display for ModelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelKind::FraudNet => f.write_str("fraud_net"),
            ModelKind::BoostedTrees => f.write_str("boosted_trees"),
        }
    }
}

/// Feature matrix with `0.0 / 1.0` targets, one per row
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMatrix {
    pub features: Array2<f64>,
    pub labels: Vec<f64>,
}

impl LabeledMatrix {
    pub fn new(features: Array2<f64>, labels: Vec<f64>) -> Result<Self> {
        if features.nrows() != labels.len() {
            return Err(FraudError::DimensionMismatch {
                expected: features.nrows(),
                actual: labels.len(),
            });
        }
        Ok(Self { features, labels })
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn feature_count(&self) -> usize {
        self.features.ncols()
    }
}

/// Metrics of one internal fit epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FitEpoch {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_auc: Option<f64>,
    pub eval_loss: Option<f64>,
    pub eval_auc: Option<f64>,
}

/// Outcome of a `fit` call
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FitReport {
    pub history: Vec<FitEpoch>,
    /// Epoch whose parameters were kept, when the variant selects one
    pub best_epoch: Option<usize>,
    pub stopped_early: bool,
}

impl FitReport {
    pub fn epochs_run(&self) -> usize {
        self.history.len()
    }
}

/// Capability set shared by all classifier variants
pub trait FraudModel {
    fn kind(&self) -> ModelKind;

    /// Number of input columns the parameters were shaped for
    fn feature_count(&self) -> usize;

    /// Train on `train`; `eval` is scored after every epoch when given.
    fn fit(&mut self, train: &LabeledMatrix, eval: Option<&LabeledMatrix>) -> Result<FitReport>;

    /// One probability in `[0, 1]` per row, in row order
    fn predict_proba(&self, features: &Array2<f64>) -> Result<Vec<f64>>;

    /// Exact binary encoding of the parameters
    fn to_bytes(&self) -> Result<Vec<u8>>;

    fn from_bytes(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized;

    fn save(&self, path: &Path) -> Result<()> {
        let bytes = self.to_bytes()?;
        let mut writer = BufWriter::new(File::create(path)?);
        writer.write_all(&bytes)?;
        writer.flush()?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self>
    where
        Self: Sized,
    {
        let mut bytes = Vec::new();
        BufReader::new(File::open(path)?).read_to_end(&mut bytes)?;
        Self::from_bytes(&bytes)
    }
}

/// Reject a matrix whose width differs from the model input dimension.
pub(crate) fn check_width(expected: usize, features: &Array2<f64>) -> Result<()> {
    if features.ncols() != expected {
        return Err(FraudError::DimensionMismatch {
            expected,
            actual: features.ncols(),
        });
    }
    Ok(())
}

/// Either classifier variant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnyModel {
    FraudNet(FraudNet),
    BoostedTrees(BoostedTrees),
}

impl AnyModel {
    fn inner(&self) -> &dyn FraudModel {
        match self {
            AnyModel::FraudNet(m) => m,
            AnyModel::BoostedTrees(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn FraudModel {
        match self {
            AnyModel::FraudNet(m) => m,
            AnyModel::BoostedTrees(m) => m,
        }
    }
}

impl From<FraudNet> for AnyModel {
    fn from(model: FraudNet) -> Self {
        AnyModel::FraudNet(model)
    }
}

impl From<BoostedTrees> for AnyModel {
    fn from(model: BoostedTrees) -> Self {
        AnyModel::BoostedTrees(model)
    }
}

impl FraudModel for AnyModel {
    fn kind(&self) -> ModelKind {
        self.inner().kind()
    }

    fn feature_count(&self) -> usize {
        self.inner().feature_count()
    }

    fn fit(&mut self, train: &LabeledMatrix, eval: Option<&LabeledMatrix>) -> Result<FitReport> {
        self.inner_mut().fit(train, eval)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        self.inner().predict_proba(features)
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: AnyModel = bincode::deserialize(bytes)?;
        match &model {
            AnyModel::FraudNet(m) => m.validate()?,
            AnyModel::BoostedTrees(m) => m.validate()?,
        }
        Ok(model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_labeled_matrix_checks_rows() {
        assert!(LabeledMatrix::new(array![[1.0], [2.0]], vec![0.0]).is_err());
        let m = LabeledMatrix::new(array![[1.0, 2.0]], vec![1.0]).unwrap();
        assert_eq!(m.feature_count(), 2);
        assert_eq!(m.len(), 1);
    }

    #[test]
    fn test_model_kind_display_matches_serde() {
        for kind in [ModelKind::FraudNet, ModelKind::BoostedTrees] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{kind}\""));
        }
    }
}
