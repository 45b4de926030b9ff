//! Transaction records as name → value feature maps

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Raw features of one transaction, keyed by feature name.
pub type FeatureMap = HashMap<String, f64>;

/// Label of a fraudulent transaction
pub const FRAUD: u8 = 1;

/// Label of a legitimate transaction
pub const LEGIT: u8 = 0;

/// One labeled or unlabeled transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub features: FeatureMap,
    /// `Some(0 | 1)` for training records, `None` for records presented for scoring
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<u8>,
}

impl Record {
    /// Create a labeled record
    pub fn labeled(features: FeatureMap, label: u8) -> Self {
        Self {
            features,
            label: Some(label),
        }
    }

    /// Create a record without label
    pub fn unlabeled(features: FeatureMap) -> Self {
        Self {
            features,
            label: None,
        }
    }

    pub fn is_fraud(&self) -> bool {
        self.label == Some(FRAUD)
    }
}

/// Count `(legit, fraud)` labels; unlabeled records are not counted.
pub fn class_counts(records: &[Record]) -> (usize, usize) {
    records.iter().fold((0, 0), |(legit, fraud), r| match r.label {
        Some(FRAUD) => (legit, fraud + 1),
        Some(_) => (legit + 1, fraud),
        None => (legit, fraud),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_counts() {
        let records = vec![
            Record::labeled(FeatureMap::new(), FRAUD),
            Record::labeled(FeatureMap::new(), LEGIT),
            Record::labeled(FeatureMap::new(), LEGIT),
            Record::unlabeled(FeatureMap::new()),
        ];
        assert_eq!(class_counts(&records), (2, 1));
        assert!(records[0].is_fraud());
        assert!(!records[3].is_fraud());
    }

    #[test]
    fn test_unlabeled_serializes_without_label() {
        let mut features = FeatureMap::new();
        features.insert("Amount".to_string(), 12.5);
        let json = serde_json::to_string(&Record::unlabeled(features)).unwrap();
        assert!(!json.contains("label"));
    }
}
