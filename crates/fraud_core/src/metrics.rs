//! Metric tracking: per-epoch loss summaries, ROC AUC, confusion matrices
//!
//! AUC uses the rank-based (Mann–Whitney) estimator with averaged ranks for
//! tied scores. It is undefined when only one class is present, which is
//! reported as `None` rather than a made-up value.

use crate::errors::{FraudError, Result};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};

/// Which partition a metric belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Split {
    Train,
    Test,
}

impl Split {
    pub fn as_str(&self) -> &'static str {
        match self {
            Split::Train => "train",
            Split::Test => "test",
        }
    }
}

/// Running mean of per-batch losses within one epoch
#[derive(Debug, Clone, Default)]
pub struct LossAccumulator {
    sum: f64,
    batches: usize,
}

impl LossAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, batch_loss: f64) {
        self.sum += batch_loss;
        self.batches += 1;
    }

    pub fn batches(&self) -> usize {
        self.batches
    }

    /// Mean batch loss, `0.0` before the first batch
    pub fn mean(&self) -> f64 {
        if self.batches == 0 {
            0.0
        } else {
            self.sum / self.batches as f64
        }
    }
}

/// One epoch's summary
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub epoch: usize,
    pub train_loss: f64,
    pub train_auc: Option<f64>,
    pub test_loss: f64,
    pub test_auc: Option<f64>,
}

impl MetricsSnapshot {
    /// `(loss, auc)` of one split
    pub fn scalars(&self, split: Split) -> (f64, Option<f64>) {
        match split {
            Split::Train => (self.train_loss, self.train_auc),
            Split::Test => (self.test_loss, self.test_auc),
        }
    }
}

/// Append-only, epoch-ordered snapshot sequence
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsHistory {
    snapshots: Vec<MetricsSnapshot>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a snapshot; epochs must be strictly increasing.
    pub fn push(&mut self, snapshot: MetricsSnapshot) -> Result<()> {
        if let Some(last) = self.snapshots.last() {
            if snapshot.epoch <= last.epoch {
                return Err(FraudError::InvalidConfig(format!(
                    "metrics for epoch {} recorded after epoch {}",
                    snapshot.epoch, last.epoch
                )));
            }
        }
        self.snapshots.push(snapshot);
        Ok(())
    }

    pub fn snapshots(&self) -> &[MetricsSnapshot] {
        &self.snapshots
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn last(&self) -> Option<&MetricsSnapshot> {
        self.snapshots.last()
    }

    /// Epoch with the highest test AUC (first one wins on ties)
    pub fn best_by_test_auc(&self) -> Option<&MetricsSnapshot> {
        self.snapshots
            .iter()
            .filter(|s| s.test_auc.is_some())
            .fold(None, |best: Option<&MetricsSnapshot>, s| match best {
                Some(b) if b.test_auc >= s.test_auc => Some(b),
                _ => Some(s),
            })
    }

    /// Per-epoch `(train_loss, test_loss)` pairs for the loss curve
    pub fn loss_curve(&self) -> (Vec<f64>, Vec<f64>) {
        self.snapshots
            .iter()
            .map(|s| (s.train_loss, s.test_loss))
            .unzip()
    }
}

/// Area under the ROC curve.
///
/// `labels` are `0.0`/`1.0`. Returns `None` when the lengths differ, the
/// input is empty, or only one class is present.
pub fn roc_auc(labels: &[f64], scores: &[f64]) -> Option<f64> {
    if labels.len() != scores.len() || labels.is_empty() {
        return None;
    }

    let positives = labels.iter().filter(|&&l| l > 0.5).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    // average ranks over runs of tied scores (ranks are 1-based)
    let mut positive_rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && scores[order[end]] == scores[order[start]] {
            end += 1;
        }
        let avg_rank = (start + 1 + end) as f64 / 2.0;
        for &idx in &order[start..end] {
            if labels[idx] > 0.5 {
                positive_rank_sum += avg_rank;
            }
        }
        start = end;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Some((positive_rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

/// Mean binary cross-entropy of probabilities against `0.0`/`1.0` labels
pub fn log_loss(labels: &[f64], probabilities: &[f64]) -> f64 {
    const EPS: f64 = 1e-12;
    if labels.is_empty() {
        return 0.0;
    }
    let total: f64 = labels
        .iter()
        .zip(probabilities)
        .map(|(&y, &p)| {
            let p = p.clamp(EPS, 1.0 - EPS);
            -(y * p.ln() + (1.0 - y) * (1.0 - p).ln())
        })
        .sum();
    total / labels.len() as f64
}

/// Binary confusion matrix at a fixed decision threshold
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_negative: usize,
    pub false_positive: usize,
    pub false_negative: usize,
    pub true_positive: usize,
}

impl ConfusionMatrix {
    /// Predicted positive iff `p >= threshold`
    pub fn from_probabilities(labels: &[f64], probabilities: &[f64], threshold: f64) -> Self {
        let mut cm = Self::default();
        for (&y, &p) in labels.iter().zip(probabilities) {
            match (y > 0.5, p >= threshold) {
                (false, false) => cm.true_negative += 1,
                (false, true) => cm.false_positive += 1,
                (true, false) => cm.false_negative += 1,
                (true, true) => cm.true_positive += 1,
            }
        }
        cm
    }

    pub fn total(&self) -> usize {
        self.true_negative + self.false_positive + self.false_negative + self.true_positive
    }

    /// Rows are actual class, columns predicted class
    pub fn as_grid(&self) -> [[usize; 2]; 2] {
        [
            [self.true_negative, self.false_positive],
            [self.false_negative, self.true_positive],
        ]
    }

    pub fn accuracy(&self) -> Option<f64> {
        let total = self.total();
        (total > 0).then(|| (self.true_negative + self.true_positive) as f64 / total as f64)
    }
}

/// Pearson correlation between all pairs of columns.
///
/// Pairs involving a constant column have no defined correlation and are
/// reported as `0.0` (the diagonal stays `1.0`).
pub fn correlation_matrix(columns: &Array2<f64>) -> Array2<f64> {
    let k = columns.ncols();
    let mut corr = Array2::<f64>::eye(k);
    if columns.nrows() == 0 {
        return corr;
    }

    let n = columns.nrows() as f64;
    let means: Vec<f64> = columns
        .axis_iter(Axis(1))
        .map(|c| c.sum() / n)
        .collect();
    let centered = columns - &ndarray::Array1::from(means);
    let norms: Vec<f64> = centered
        .axis_iter(Axis(1))
        .map(|c| c.dot(&c).sqrt())
        .collect();

    for i in 0..k {
        for j in (i + 1)..k {
            let denom = norms[i] * norms[j];
            let r = if denom > 0.0 {
                centered.column(i).dot(&centered.column(j)) / denom
            } else {
                0.0
            };
            corr[[i, j]] = r;
            corr[[j, i]] = r;
        }
    }
    corr
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_auc_perfect_and_inverted() {
        let labels = [0.0, 0.0, 1.0, 1.0];
        assert_eq!(roc_auc(&labels, &[0.1, 0.2, 0.8, 0.9]), Some(1.0));
        assert_eq!(roc_auc(&labels, &[0.9, 0.8, 0.2, 0.1]), Some(0.0));
    }

    #[test]
    fn test_auc_ties_count_half() {
        let labels = [0.0, 1.0];
        assert_eq!(roc_auc(&labels, &[0.5, 0.5]), Some(0.5));
    }

    #[test]
    fn test_auc_matches_pairwise_definition() {
        let labels = [0.0, 1.0, 0.0, 1.0, 0.0];
        let scores = [0.3, 0.4, 0.45, 0.8, 0.1];
        // 0.4 beats 0.3 and 0.1 but loses to 0.45; 0.8 beats all three
        assert!((roc_auc(&labels, &scores).unwrap() - 5.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn test_auc_single_class_is_undefined() {
        assert_eq!(roc_auc(&[1.0, 1.0], &[0.2, 0.4]), None);
        assert_eq!(roc_auc(&[], &[]), None);
    }

    #[test]
    fn test_confusion_matrix_counts() {
        let labels = [0.0, 0.0, 1.0, 1.0, 1.0];
        let probs = [0.1, 0.7, 0.5, 0.49, 0.9];
        let cm = ConfusionMatrix::from_probabilities(&labels, &probs, 0.5);
        assert_eq!(cm.as_grid(), [[1, 1], [1, 2]]);
        assert_eq!(cm.total(), labels.len());
        assert_eq!(cm.accuracy(), Some(0.6));
    }

    #[test]
    fn test_loss_accumulator_mean() {
        let mut acc = LossAccumulator::new();
        assert_eq!(acc.mean(), 0.0);
        acc.add(1.0);
        acc.add(3.0);
        assert_eq!(acc.mean(), 2.0);
        assert_eq!(acc.batches(), 2);
    }

    #[test]
    fn test_history_is_epoch_ordered() {
        let snap = |epoch, auc| MetricsSnapshot {
            epoch,
            train_loss: 0.5,
            train_auc: None,
            test_loss: 0.6,
            test_auc: auc,
        };
        let mut history = MetricsHistory::new();
        history.push(snap(0, Some(0.7))).unwrap();
        history.push(snap(1, Some(0.9))).unwrap();
        history.push(snap(2, Some(0.9))).unwrap();
        assert!(history.push(snap(2, None)).is_err());
        assert_eq!(history.best_by_test_auc().map(|s| s.epoch), Some(1));
        assert_eq!(history.loss_curve().0.len(), 3);
    }

    #[test]
    fn test_log_loss_is_finite_at_extremes() {
        let loss = log_loss(&[1.0, 0.0], &[0.0, 1.0]);
        assert!(loss.is_finite());
        assert!(log_loss(&[1.0], &[1.0]) < 1e-9);
    }

    #[test]
    fn test_correlation_matrix() {
        let data = array![[1.0, 2.0, 5.0], [2.0, 4.0, 5.0], [3.0, 6.0, 5.0]];
        let corr = correlation_matrix(&data);
        assert!((corr[[0, 1]] - 1.0).abs() < 1e-12);
        assert_eq!(corr[[0, 2]], 0.0);
        assert_eq!(corr[[2, 2]], 1.0);
    }
}
