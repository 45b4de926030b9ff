//! CSV dataset loading
//!
//! Reads a headered CSV with one column per feature plus one label column
//! (default `Class`). Every non-label column becomes a schema feature, in
//! header order. Labels must be `0` or `1`.

use fraud_core::{FeatureMap, FeatureSchema, FraudError, Record, Result, FRAUD, LEGIT};
use ndarray::Array2;
use serde::Serialize;
use std::path::Path;
use tracing::{debug, info};

/// Default name of the label column
pub const LABEL_COLUMN: &str = "Class";

/// Where the expected dataset can be obtained
pub const DATASET_SOURCE: &str = "mlg-ulb/creditcardfraud";

/// Labeled transactions plus the schema derived from the header
#[derive(Clone, Debug)]
pub struct Dataset {
    pub schema: FeatureSchema,
    pub records: Vec<Record>,
    pub label_column: String,
}

/// Per-class record counts, as handed to the diagnostics renderer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ClassDistribution {
    pub legit: usize,
    pub fraud: usize,
}

impl ClassDistribution {
    pub fn fraud_ratio(&self) -> f64 {
        let total = self.legit + self.fraud;
        if total == 0 {
            return 0.0;
        }
        self.fraud as f64 / total as f64
    }
}

impl Dataset {
    /// Load a dataset from CSV.
    ///
    /// A missing file is reported as `DataSourceUnavailable` with the dataset
    /// source; malformed content as `InvalidDataset` naming the line.
    pub fn from_csv<P: AsRef<Path>>(path: P, label_column: &str) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(FraudError::DataSourceUnavailable {
                path: path.to_path_buf(),
                source_hint: DATASET_SOURCE.to_string(),
            });
        }

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|e| invalid(format!("cannot open {}: {e}", path.display())))?;

        let headers = reader
            .headers()
            .map_err(|e| invalid(format!("cannot read header: {e}")))?
            .clone();
        let label_idx = headers
            .iter()
            .position(|h| h == label_column)
            .ok_or_else(|| invalid(format!("label column '{label_column}' not found in header")))?;
        let names: Vec<String> = headers
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != label_idx)
            .map(|(_, h)| h.to_string())
            .collect();
        let schema = FeatureSchema::new(names.clone())?;

        let mut records = Vec::new();
        for (row_idx, row) in reader.records().enumerate() {
            // header is line 1
            let line = row_idx + 2;
            let row = row.map_err(|e| invalid(format!("line {line}: {e}")))?;
            if row.len() != headers.len() {
                return Err(invalid(format!(
                    "line {line}: expected {} columns, got {}",
                    headers.len(),
                    row.len()
                )));
            }

            let mut features = FeatureMap::with_capacity(names.len());
            let mut label = None;
            for (col, field) in row.iter().enumerate() {
                let value: f64 = field.parse().map_err(|_| {
                    invalid(format!(
                        "line {line}, column '{}': invalid number '{field}'",
                        &headers[col]
                    ))
                })?;
                if col == label_idx {
                    label = Some(parse_label(value, line)?);
                } else {
                    if !value.is_finite() {
                        return Err(invalid(format!(
                            "line {line}, column '{}': value is not finite",
                            &headers[col]
                        )));
                    }
                    features.insert(headers[col].to_string(), value);
                }
            }
            let label = label.ok_or_else(|| invalid(format!("line {line}: missing label")))?;
            records.push(Record::labeled(features, label));
        }

        if records.is_empty() {
            return Err(invalid("dataset is empty".to_string()));
        }

        let dataset = Self {
            schema,
            records,
            label_column: label_column.to_string(),
        };
        let dist = dataset.class_distribution();
        info!(
            path = %path.display(),
            records = dataset.len(),
            features = dataset.schema.len(),
            fraud = dist.fraud,
            legit = dist.legit,
            "dataset loaded"
        );
        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn class_distribution(&self) -> ClassDistribution {
        let (legit, fraud) = fraud_core::record::class_counts(&self.records);
        ClassDistribution { legit, fraud }
    }

    /// Column names of [`Dataset::numeric_matrix`]: schema order, label last
    pub fn numeric_columns(&self) -> Vec<String> {
        let mut columns = self.schema.names().to_vec();
        columns.push(self.label_column.clone());
        columns
    }

    /// All numeric columns including the label, for correlation analysis
    pub fn numeric_matrix(&self) -> Result<Array2<f64>> {
        let width = self.schema.len() + 1;
        let mut values = Vec::with_capacity(self.len() * width);
        for record in &self.records {
            for name in self.schema.names() {
                let value = record
                    .features
                    .get(name)
                    .copied()
                    .ok_or_else(|| FraudError::missing_features(vec![name.clone()]))?;
                values.push(value);
            }
            values.push(f64::from(record.label.unwrap_or(LEGIT)));
        }
        debug!(rows = self.len(), columns = width, "numeric matrix built");
        Array2::from_shape_vec((self.len(), width), values)
            .map_err(|e| invalid(format!("matrix shape: {e}")))
    }
}

fn parse_label(value: f64, line: usize) -> Result<u8> {
    if value == f64::from(LEGIT) {
        Ok(LEGIT)
    } else if value == f64::from(FRAUD) {
        Ok(FRAUD)
    } else {
        Err(invalid(format!("line {line}: label must be 0 or 1, got {value}")))
    }
}

fn invalid(message: String) -> FraudError {
    FraudError::InvalidDataset(message)
}
