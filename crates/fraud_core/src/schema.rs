//! Feature schema: the ordered feature names fixed at training time
//!
//! The schema is the single source of truth for column order. Records are
//! re-projected onto it by name; the order in which a caller supplied keys is
//! never trusted.

use crate::errors::{FraudError, Result};
use crate::record::FeatureMap;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::warn;

/// How a projection treats features the schema does not know.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchemaMode {
    /// Unexpected features are dropped and logged
    #[default]
    Lenient,
    /// Unexpected features fail the projection
    Strict,
}

impl SchemaMode {
    pub fn from_strict(strict_schema: bool) -> Self {
        if strict_schema {
            SchemaMode::Strict
        } else {
            SchemaMode::Lenient
        }
    }
}

/// Immutable ordered list of unique feature names
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "Vec<String>", into = "Vec<String>")]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Create a schema; names must be non-empty and unique.
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(FraudError::InvalidConfig(
                "feature schema must contain at least one feature".to_string(),
            ));
        }

        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if name.trim().is_empty() {
                return Err(FraudError::InvalidConfig(
                    "feature names must not be blank".to_string(),
                ));
            }
            if !seen.insert(name.as_str()) {
                return Err(FraudError::InvalidConfig(format!(
                    "duplicate feature name in schema: {name}"
                )));
            }
        }

        Ok(Self { names })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Position of a feature in schema order
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Project a single record onto schema order.
    pub fn project(&self, features: &FeatureMap, mode: SchemaMode) -> Result<Vec<f64>> {
        let matrix = self.project_all(std::slice::from_ref(features), mode)?;
        Ok(matrix.row(0).to_vec())
    }

    /// Project a batch of records onto schema order.
    ///
    /// The call is atomic: if any record is missing a feature (or carries an
    /// unexpected one in strict mode) no rows are returned at all.
    pub fn project_all(&self, batch: &[FeatureMap], mode: SchemaMode) -> Result<Array2<f64>> {
        let known: HashSet<&str> = self.names.iter().map(String::as_str).collect();
        let mut rows = Array2::zeros((batch.len(), self.names.len()));
        let mut missing: Vec<String> = Vec::new();
        let mut unexpected: Vec<String> = Vec::new();

        for (row_idx, features) in batch.iter().enumerate() {
            for (col, name) in self.names.iter().enumerate() {
                match features.get(name) {
                    Some(&value) => rows[[row_idx, col]] = value,
                    None => missing.push(name.clone()),
                }
            }
            unexpected.extend(
                features
                    .keys()
                    .filter(|key| !known.contains(key.as_str()))
                    .cloned(),
            );
        }

        missing.sort();
        missing.dedup();
        unexpected.sort();
        unexpected.dedup();

        if !missing.is_empty() || (mode == SchemaMode::Strict && !unexpected.is_empty()) {
            if mode == SchemaMode::Lenient {
                unexpected.clear();
            }
            return Err(FraudError::SchemaMismatch {
                missing,
                unexpected,
            });
        }

        if !unexpected.is_empty() {
            warn!(
                dropped = ?unexpected,
                records = batch.len(),
                "ignoring features not present in schema"
            );
        }

        Ok(rows)
    }
}

impl TryFrom<Vec<String>> for FeatureSchema {
    type Error = FraudError;

    fn try_from(names: Vec<String>) -> Result<Self> {
        FeatureSchema::new(names)
    }
}

impl From<FeatureSchema> for Vec<String> {
    fn from(schema: FeatureSchema) -> Self {
        schema.names
    }
}
