//! Logistic boosting ensemble with early stopping

use super::cart::{CartBuilder, TreeConfig};
use super::tree::Tree;
use crate::errors::{FraudError, Result};
use crate::metrics::{log_loss, roc_auc};
use crate::model::network::sigmoid;
use crate::model::{check_width, FitEpoch, FitReport, FraudModel, LabeledMatrix, ModelKind};
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Boosting schedule and tree growth limits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostingConfig {
    /// Upper bound on trees; one tree is added per epoch
    pub max_epochs: usize,
    /// Epochs without validation improvement before stopping
    pub patience: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub lambda: f64,
}

impl Default for BoostingConfig {
    fn default() -> Self {
        Self {
            max_epochs: 50,
            patience: 10,
            learning_rate: 0.1,
            max_depth: 4,
            min_samples_leaf: 20,
            lambda: 1.0,
        }
    }
}

impl BoostingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_epochs == 0 {
            return Err(FraudError::InvalidConfig("max_epochs must be positive".into()));
        }
        if self.patience == 0 {
            return Err(FraudError::InvalidConfig("patience must be positive".into()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate <= 1.0) {
            return Err(FraudError::InvalidConfig(format!(
                "learning_rate must lie in (0, 1], got {}",
                self.learning_rate
            )));
        }
        if self.max_depth == 0 {
            return Err(FraudError::InvalidConfig("max_depth must be positive".into()));
        }
        if self.min_samples_leaf == 0 {
            return Err(FraudError::InvalidConfig(
                "min_samples_leaf must be positive".into(),
            ));
        }
        if !(self.lambda.is_finite() && self.lambda >= 0.0) {
            return Err(FraudError::InvalidConfig(format!(
                "lambda must be a non-negative number, got {}",
                self.lambda
            )));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_leaf: self.min_samples_leaf,
            lambda: self.lambda,
        }
    }
}

/// Gradient-boosted trees on the logistic loss
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoostedTrees {
    config: BoostingConfig,
    feature_count: usize,
    /// Log-odds of the training base rate
    bias: f64,
    trees: Vec<Tree>,
}

impl BoostedTrees {
    pub fn new(feature_count: usize, config: BoostingConfig) -> Result<Self> {
        config.validate()?;
        if feature_count == 0 {
            return Err(FraudError::InvalidConfig(
                "model needs at least one input feature".into(),
            ));
        }
        Ok(Self {
            config,
            feature_count,
            bias: 0.0,
            trees: Vec::new(),
        })
    }

    pub fn config(&self) -> &BoostingConfig {
        &self.config
    }

    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Check decoded parameters before the ensemble is used for scoring.
    pub(crate) fn validate(&self) -> Result<()> {
        self.config.validate()?;
        if self.feature_count == 0 {
            return Err(FraudError::ArtifactLoad("ensemble has no input features".into()));
        }
        if !self.bias.is_finite() {
            return Err(FraudError::ArtifactLoad("ensemble bias is not finite".into()));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.feature_count).map_err(|e| {
                FraudError::ArtifactLoad(format!("tree {i} failed validation: {e}"))
            })?;
        }
        Ok(())
    }

    fn raw_scores(&self, features: ArrayView2<'_, f64>) -> Vec<f64> {
        features
            .rows()
            .into_iter()
            .map(|row| self.bias + self.trees.iter().map(|t| t.evaluate(row)).sum::<f64>())
            .collect()
    }

    fn check_labels(data: &LabeledMatrix) -> Result<()> {
        if data.features.nrows() != data.labels.len() {
            return Err(FraudError::DimensionMismatch {
                expected: data.features.nrows(),
                actual: data.labels.len(),
            });
        }
        Ok(())
    }
}

fn base_log_odds(labels: &[f64]) -> f64 {
    const EPS: f64 = 1e-6;
    let rate = labels.iter().sum::<f64>() / labels.len().max(1) as f64;
    let rate = rate.clamp(EPS, 1.0 - EPS);
    (rate / (1.0 - rate)).ln()
}

fn to_probabilities(raw: &[f64]) -> Vec<f64> {
    raw.iter().map(|&z| sigmoid(z)).collect()
}

impl FraudModel for BoostedTrees {
    fn kind(&self) -> ModelKind {
        ModelKind::BoostedTrees
    }

    fn feature_count(&self) -> usize {
        self.feature_count
    }

    /// Adds one tree per epoch. Validation AUC is taken on `eval` when given,
    /// otherwise on `train`; when it is undefined the validation loss is used
    /// instead. After `patience` epochs without improvement the ensemble is
    /// cut back to the best epoch.
    fn fit(&mut self, train: &LabeledMatrix, eval: Option<&LabeledMatrix>) -> Result<FitReport> {
        check_width(self.feature_count, &train.features)?;
        Self::check_labels(train)?;
        if train.is_empty() {
            return Err(FraudError::InvalidDataset("training matrix is empty".into()));
        }
        if let Some(eval) = eval {
            check_width(self.feature_count, &eval.features)?;
            Self::check_labels(eval)?;
        }

        let tree_config = self.config.tree_config();
        self.bias = base_log_odds(&train.labels);
        self.trees.clear();

        let mut train_raw = vec![self.bias; train.len()];
        let mut eval_raw = eval.map(|e| vec![self.bias; e.len()]);

        let mut report = FitReport::default();
        let mut best: Option<(usize, f64)> = None;
        let mut since_best = 0usize;

        for epoch in 0..self.config.max_epochs {
            let train_prob = to_probabilities(&train_raw);
            let gradients: Vec<f64> = train_prob
                .iter()
                .zip(&train.labels)
                .map(|(&p, &y)| p - y)
                .collect();
            let hessians: Vec<f64> = train_prob.iter().map(|&p| (p * (1.0 - p)).max(1e-16)).collect();

            let tree = CartBuilder::new(train.features.view(), &gradients, &hessians, &tree_config)
                .build(self.config.learning_rate);

            for (raw, row) in train_raw.iter_mut().zip(train.features.rows()) {
                *raw += tree.evaluate(row);
            }
            if let (Some(raw), Some(eval)) = (eval_raw.as_mut(), eval) {
                for (r, row) in raw.iter_mut().zip(eval.features.rows()) {
                    *r += tree.evaluate(row);
                }
            }
            self.trees.push(tree);

            let train_prob = to_probabilities(&train_raw);
            let train_loss = log_loss(&train.labels, &train_prob);
            let train_auc = roc_auc(&train.labels, &train_prob);
            let (eval_loss, eval_auc) = match (eval_raw.as_ref(), eval) {
                (Some(raw), Some(eval)) => {
                    let prob = to_probabilities(raw);
                    (log_loss(&eval.labels, &prob), roc_auc(&eval.labels, &prob))
                }
                _ => (train_loss, train_auc),
            };

            report.history.push(FitEpoch {
                epoch,
                train_loss,
                train_auc,
                eval_loss: Some(eval_loss),
                eval_auc,
            });
            debug!(epoch, train_loss, eval_loss, ?eval_auc, "boosting epoch");

            let score = eval_auc.unwrap_or(-eval_loss);
            match best {
                Some((_, best_score)) if score <= best_score => {
                    since_best += 1;
                    if since_best >= self.config.patience {
                        report.stopped_early = true;
                        break;
                    }
                }
                _ => {
                    best = Some((epoch, score));
                    since_best = 0;
                }
            }
        }

        if let Some((best_epoch, _)) = best {
            self.trees.truncate(best_epoch + 1);
            report.best_epoch = Some(best_epoch);
        }
        info!(
            epochs = report.epochs_run(),
            trees = self.trees.len(),
            stopped_early = report.stopped_early,
            "boosting fit complete"
        );
        Ok(report)
    }

    fn predict_proba(&self, features: &Array2<f64>) -> Result<Vec<f64>> {
        check_width(self.feature_count, features)?;
        Ok(to_probabilities(&self.raw_scores(features.view())))
    }

    fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let model: BoostedTrees = bincode::deserialize(bytes)?;
        model.validate()?;
        Ok(model)
    }
}
