//! Leak-free feature standardisation
//!
//! `ScalerState` holds one `(mean, scale)` pair per schema feature, estimated
//! from the training split only. Once fitted it is frozen: `transform` is a
//! pure function of the state and its input, so the test split and every later
//! inference request see exactly the training-time scaling.
//!
//! Zero-variance policy: a feature whose standard deviation over the training
//! split is zero (or not finite) gets a scale of `1.0`. Such a feature is then
//! only centred, never divided by zero.

use crate::errors::{FraudError, Result};
use crate::record::{FeatureMap, Record};
use crate::schema::{FeatureSchema, SchemaMode};
use ndarray::{Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Frozen per-feature location and scale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

impl ScalerState {
    /// Estimate mean and population standard deviation per column.
    pub fn fit_matrix(train: &Array2<f64>) -> Result<Self> {
        if train.nrows() == 0 {
            return Err(FraudError::InvalidDataset(
                "cannot fit scaler on an empty training split".to_string(),
            ));
        }

        let n = train.nrows() as f64;
        let mut means = Vec::with_capacity(train.ncols());
        let mut scales = Vec::with_capacity(train.ncols());

        for column in train.axis_iter(Axis(1)) {
            let mean = column.sum() / n;
            let variance = column.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
            let std = variance.sqrt();

            means.push(mean);
            scales.push(if std > 0.0 && std.is_finite() { std } else { 1.0 });
        }

        debug!(features = means.len(), rows = train.nrows(), "fitted scaler");
        Ok(Self { means, scales })
    }

    /// Fit on labeled training records projected onto `schema`.
    pub fn fit(schema: &FeatureSchema, train: &[Record]) -> Result<Self> {
        let rows: Vec<FeatureMap> = train.iter().map(|r| r.features.clone()).collect();
        let raw = schema.project_all(&rows, SchemaMode::Strict)?;
        Self::fit_matrix(&raw)
    }

    pub fn feature_count(&self) -> usize {
        self.means.len()
    }

    /// Standardise an already-projected matrix.
    pub fn transform_matrix(&self, raw: &Array2<f64>) -> Result<Array2<f64>> {
        if self.means.len() != self.scales.len() {
            return Err(FraudError::DimensionMismatch {
                expected: self.means.len(),
                actual: self.scales.len(),
            });
        }
        if raw.ncols() != self.means.len() {
            return Err(FraudError::DimensionMismatch {
                expected: self.means.len(),
                actual: raw.ncols(),
            });
        }

        let mut scaled = raw.clone();
        for (col, mut column) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, scale) = (self.means[col], self.scales[col]);
            column.mapv_inplace(|v| (v - mean) / scale);
        }
        Ok(scaled)
    }
}

/// Schema, frozen scaler state and schema policy bound together
#[derive(Debug, Clone)]
pub struct Preprocessor {
    schema: FeatureSchema,
    state: ScalerState,
    mode: SchemaMode,
}

impl Preprocessor {
    /// Bind a fitted state to its schema; lengths must agree.
    pub fn new(schema: FeatureSchema, state: ScalerState, mode: SchemaMode) -> Result<Self> {
        if state.feature_count() != schema.len() || state.scales.len() != schema.len() {
            return Err(FraudError::DimensionMismatch {
                expected: schema.len(),
                actual: state.feature_count(),
            });
        }
        Ok(Self {
            schema,
            state,
            mode,
        })
    }

    /// Fit the scaler on the training split and bind it to `schema`.
    pub fn fit(schema: FeatureSchema, train: &[Record], mode: SchemaMode) -> Result<Self> {
        let state = ScalerState::fit(&schema, train)?;
        Self::new(schema, state, mode)
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn state(&self) -> &ScalerState {
        &self.state
    }

    pub fn mode(&self) -> SchemaMode {
        self.mode
    }

    /// Validate, re-order and standardise a batch of feature maps.
    pub fn transform(&self, batch: &[FeatureMap]) -> Result<Array2<f64>> {
        let raw = self.schema.project_all(batch, self.mode)?;
        self.state.transform_matrix(&raw)
    }

    /// Transform labeled records, returning the matrix and `0.0 / 1.0` targets.
    pub fn transform_labeled(&self, records: &[Record]) -> Result<(Array2<f64>, Vec<f64>)> {
        let mut targets = Vec::with_capacity(records.len());
        for record in records {
            let label = record.label.ok_or_else(|| {
                FraudError::InvalidDataset("training record without label".to_string())
            })?;
            targets.push(f64::from(label));
        }
        let rows: Vec<FeatureMap> = records.iter().map(|r| r.features.clone()).collect();
        Ok((self.transform(&rows)?, targets))
    }
}
