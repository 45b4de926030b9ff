//! Stratified, reproducible train/test partitioning
//!
//! Positive and negative records are shuffled and cut independently at the
//! requested test fraction, then recombined, so both partitions keep the
//! source label ratio within rounding. Optional balancing undersamples the
//! majority class to the minority count before the cut.

use crate::deterministic::LcgRng;
use crate::errors::{FraudError, Result};
use crate::record::{Record, FRAUD, LEGIT};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Split parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitOptions {
    /// Share of records assigned to the test partition, in (0, 1)
    pub test_fraction: f64,
    /// Seed for shuffling and undersampling
    pub seed: u64,
    /// Cut each class separately
    pub stratify: bool,
    /// Undersample the majority class before cutting
    pub balance: bool,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            stratify: true,
            balance: false,
        }
    }
}

/// Number of records per class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassCounts {
    pub legit: usize,
    pub fraud: usize,
}

impl ClassCounts {
    pub fn total(&self) -> usize {
        self.legit + self.fraud
    }

    fn of(records: &[Record]) -> Self {
        let (legit, fraud) = crate::record::class_counts(records);
        Self { legit, fraud }
    }
}

/// Disjoint, exhaustive train/test partitions of the (possibly balanced) pool
#[derive(Debug, Clone)]
pub struct DatasetSplit {
    pub train: Vec<Record>,
    pub test: Vec<Record>,
    /// Class counts of the pool the partitions were cut from
    pub pool: ClassCounts,
}

impl DatasetSplit {
    pub fn train_counts(&self) -> ClassCounts {
        ClassCounts::of(&self.train)
    }

    pub fn test_counts(&self) -> ClassCounts {
        ClassCounts::of(&self.test)
    }
}

/// Partition labeled records into train and test sets.
pub fn split(records: &[Record], options: &SplitOptions) -> Result<DatasetSplit> {
    if records.is_empty() {
        return Err(FraudError::InvalidSplit("no records to split".to_string()));
    }
    let fraction = options.test_fraction;
    if !(fraction > 0.0 && fraction < 1.0) {
        return Err(FraudError::InvalidSplit(format!(
            "test_fraction must lie in (0, 1), got {fraction}"
        )));
    }

    let (mut legit_idx, mut fraud_idx) = partition_by_label(records)?;
    let mut rng = LcgRng::new(options.seed);

    if options.balance {
        balance_classes(&mut legit_idx, &mut fraud_idx, &mut rng);
    }

    let pool = ClassCounts {
        legit: legit_idx.len(),
        fraud: fraud_idx.len(),
    };

    let (mut train_idx, mut test_idx) = if options.stratify {
        let (legit_train, legit_test) = cut(&mut legit_idx, fraction, &mut rng);
        let (fraud_train, fraud_test) = cut(&mut fraud_idx, fraction, &mut rng);
        (
            [legit_train, fraud_train].concat(),
            [legit_test, fraud_test].concat(),
        )
    } else {
        let mut all: Vec<usize> = [legit_idx, fraud_idx].concat();
        all.sort_unstable();
        cut(&mut all, fraction, &mut rng)
    };

    if train_idx.is_empty() || test_idx.is_empty() {
        return Err(FraudError::InvalidSplit(format!(
            "test_fraction {fraction} leaves an empty partition for {} records",
            pool.total()
        )));
    }

    // interleave classes so batches are not grouped by label
    rng.shuffle(&mut train_idx);
    rng.shuffle(&mut test_idx);

    let split = DatasetSplit {
        train: train_idx.iter().map(|&i| records[i].clone()).collect(),
        test: test_idx.iter().map(|&i| records[i].clone()).collect(),
        pool,
    };

    info!(
        pool_legit = pool.legit,
        pool_fraud = pool.fraud,
        train = split.train.len(),
        test = split.test.len(),
        "dataset split"
    );
    Ok(split)
}

/// Undersample the majority class to the minority count, keeping input order.
pub fn undersample(records: &[Record], seed: u64) -> Result<Vec<Record>> {
    let (mut legit_idx, mut fraud_idx) = partition_by_label(records)?;
    balance_classes(&mut legit_idx, &mut fraud_idx, &mut LcgRng::new(seed));
    let mut selected = [legit_idx, fraud_idx].concat();
    selected.sort_unstable();
    Ok(selected.into_iter().map(|i| records[i].clone()).collect())
}

fn partition_by_label(records: &[Record]) -> Result<(Vec<usize>, Vec<usize>)> {
    let mut legit = Vec::new();
    let mut fraud = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        match record.label {
            Some(LEGIT) => legit.push(idx),
            Some(FRAUD) => fraud.push(idx),
            Some(other) => {
                return Err(FraudError::InvalidSplit(format!(
                    "record {idx} has label {other}, expected 0 or 1"
                )))
            }
            None => {
                return Err(FraudError::InvalidSplit(format!(
                    "record {idx} has no label"
                )))
            }
        }
    }
    Ok((legit, fraud))
}

fn balance_classes(legit: &mut Vec<usize>, fraud: &mut Vec<usize>, rng: &mut LcgRng) {
    let (majority, minority_len) = if legit.len() >= fraud.len() {
        (legit, fraud.len())
    } else {
        let len = legit.len();
        (fraud, len)
    };

    rng.shuffle(majority);
    majority.truncate(minority_len);
    majority.sort_unstable();
    debug!(per_class = minority_len, "undersampled majority class");
}

/// Shuffle `indices` and cut `round(len * fraction)` of them off as test.
fn cut(indices: &mut [usize], fraction: f64, rng: &mut LcgRng) -> (Vec<usize>, Vec<usize>) {
    rng.shuffle(indices);
    let n_test = ((indices.len() as f64) * fraction).round() as usize;
    let (test, train) = indices.split_at(n_test.min(indices.len()));
    (train.to_vec(), test.to_vec())
}
