#![allow(dead_code)]

use fraud_core::{FeatureMap, FeatureSchema, Record, FRAUD, LEGIT};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const FEATURES: [&str; 4] = ["Time", "V14", "V17", "Amount"];

pub fn schema() -> FeatureSchema {
    FeatureSchema::new(FEATURES.iter().map(|s| s.to_string()).collect()).unwrap()
}

/// Synthetic transactions where fraud shifts V14 and V17 negative.
pub fn transactions(n: usize, fraud_every: usize, seed: u64) -> Vec<Record> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|i| {
            let fraud = i % fraud_every == 0;
            let shift = if fraud { -3.0 } else { 0.0 };
            let mut features = FeatureMap::new();
            features.insert("Time".into(), i as f64);
            features.insert("V14".into(), shift + rng.gen_range(-1.0..1.0));
            features.insert("V17".into(), shift * 0.5 + rng.gen_range(-1.0..1.0));
            features.insert("Amount".into(), rng.gen_range(0.0..500.0));
            Record::labeled(features, if fraud { FRAUD } else { LEGIT })
        })
        .collect()
}
