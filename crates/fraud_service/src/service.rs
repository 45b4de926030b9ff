//! Inference service: one loaded bundle, many concurrent callers
//!
//! The bundle is loaded and verified inside [`InferenceService::initialize`];
//! a service value therefore never exists in a half-loaded state. All scoring
//! methods take `&self`, and share the service through `Arc`.

use crate::config::ServiceConfig;
use fraud_core::{
    AnyModel, ArtifactBundle, FeatureMap, FeatureSchema, FraudError, FraudModel, Manifest,
    Preprocessor, Result,
};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tracing::{debug, info, instrument};

/// Counters reported at shutdown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ServiceStats {
    pub requests: u64,
    pub records_scored: u64,
}

pub struct InferenceService {
    model: AnyModel,
    preprocessor: Preprocessor,
    manifest: Manifest,
    config: ServiceConfig,
    started: Instant,
    requests: AtomicU64,
    records_scored: AtomicU64,
}

impl InferenceService {
    /// Load the bundle named by `config`. Fails fast; never retried.
    #[instrument(skip_all, fields(artifact_dir = %config.artifact_dir.display()))]
    pub fn initialize(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let (bundle, manifest) = ArtifactBundle::load(&config.artifact_dir, config.schema_mode())?;
        info!(
            kind = %manifest.model_kind,
            features = manifest.feature_count,
            bundle_hash = %manifest.bundle_hash,
            strict_schema = config.strict_schema,
            "inference service ready"
        );
        Ok(Self {
            model: bundle.model,
            preprocessor: bundle.preprocessor,
            manifest,
            config,
            started: Instant::now(),
            requests: AtomicU64::new(0),
            records_scored: AtomicU64::new(0),
        })
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    pub fn schema(&self) -> &FeatureSchema {
        self.preprocessor.schema()
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn stats(&self) -> ServiceStats {
        ServiceStats {
            requests: self.requests.load(Ordering::Relaxed),
            records_scored: self.records_scored.load(Ordering::Relaxed),
        }
    }

    /// One fraud probability per transaction, in input order.
    ///
    /// The batch is validated as a whole: one bad transaction fails the call
    /// and nothing is returned for the others.
    pub fn predict(&self, batch: &[FeatureMap]) -> Result<Vec<f64>> {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if batch.is_empty() {
            return Ok(Vec::new());
        }
        let features = self.preprocessor.transform(batch)?;
        let probabilities = self.model.predict_proba(&features)?;
        self.records_scored
            .fetch_add(probabilities.len() as u64, Ordering::Relaxed);
        debug!(records = probabilities.len(), "batch scored");
        Ok(probabilities)
    }

    pub fn predict_one(&self, transaction: &FeatureMap) -> Result<f64> {
        let probabilities = self.predict(std::slice::from_ref(transaction))?;
        probabilities
            .first()
            .copied()
            .ok_or(FraudError::DimensionMismatch {
                expected: 1,
                actual: 0,
            })
    }

    /// `1` for each transaction whose probability is at least `threshold`.
    pub fn predict_labels(&self, batch: &[FeatureMap], threshold: f64) -> Result<Vec<u8>> {
        check_threshold(threshold)?;
        let probabilities = self.predict(batch)?;
        labels_from_probabilities(&probabilities, threshold)
    }

    /// Labels at the configured threshold
    pub fn classify(&self, batch: &[FeatureMap]) -> Result<Vec<u8>> {
        self.predict_labels(batch, self.config.threshold)
    }

    /// Tear the service down and report what it served.
    pub fn shutdown(self) -> ServiceStats {
        let stats = self.stats();
        info!(
            requests = stats.requests,
            records_scored = stats.records_scored,
            uptime_ms = self.started.elapsed().as_millis() as u64,
            "inference service stopped"
        );
        stats
    }
}

fn check_threshold(threshold: f64) -> Result<()> {
    if (0.0..=1.0).contains(&threshold) {
        Ok(())
    } else {
        Err(FraudError::InvalidThreshold(threshold))
    }
}

/// Apply `p >= threshold`. NaN and out-of-range thresholds are rejected.
pub fn labels_from_probabilities(probabilities: &[f64], threshold: f64) -> Result<Vec<u8>> {
    check_threshold(threshold)?;
    Ok(probabilities
        .iter()
        .map(|&p| u8::from(p >= threshold))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_service_is_shareable() {
        assert_send_sync::<InferenceService>();
    }

    #[test]
    fn test_labels_at_boundary() {
        let labels = labels_from_probabilities(&[0.1, 0.5, 0.9], 0.5).unwrap();
        assert_eq!(labels, vec![0, 1, 1]);
        assert_eq!(
            labels_from_probabilities(&[0.0, 1.0], 0.0).unwrap(),
            vec![1, 1]
        );
        assert_eq!(
            labels_from_probabilities(&[0.0, 1.0], 1.0).unwrap(),
            vec![0, 1]
        );
    }

    #[test]
    fn test_invalid_thresholds() {
        for t in [-0.1, 1.01, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                labels_from_probabilities(&[0.5], t),
                Err(FraudError::InvalidThreshold(_))
            ));
        }
    }
}
