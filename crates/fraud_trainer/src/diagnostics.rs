//! Diagnostics collaborator: plot data produced by a training run
//!
//! Rendering is someone else's job. [`JsonRenderer`] writes the data as JSON
//! files that an external plotting tool picks up; [`NoopRenderer`] drops it.

use crate::dataset::ClassDistribution;
use crate::errors::TrainerError;
use fraud_core::serde_canon::to_canonical_json;
use fraud_core::ConfusionMatrix;
use ndarray::Array2;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub trait DiagnosticsRenderer {
    fn class_distribution(&mut self, counts: &ClassDistribution) -> Result<(), TrainerError>;

    /// Pearson correlation over `columns` (features and label), square and symmetric
    fn feature_correlation(
        &mut self,
        columns: &[String],
        correlation: &Array2<f64>,
    ) -> Result<(), TrainerError>;

    fn confusion_matrix(
        &mut self,
        epoch: usize,
        matrix: &ConfusionMatrix,
    ) -> Result<(), TrainerError>;

    /// Mean loss per epoch, index = epoch
    fn loss_curve(&mut self, train: &[f64], test: &[f64]) -> Result<(), TrainerError>;
}

#[derive(Debug, Default)]
pub struct NoopRenderer;

impl DiagnosticsRenderer for NoopRenderer {
    fn class_distribution(&mut self, _: &ClassDistribution) -> Result<(), TrainerError> {
        Ok(())
    }

    fn feature_correlation(&mut self, _: &[String], _: &Array2<f64>) -> Result<(), TrainerError> {
        Ok(())
    }

    fn confusion_matrix(&mut self, _: usize, _: &ConfusionMatrix) -> Result<(), TrainerError> {
        Ok(())
    }

    fn loss_curve(&mut self, _: &[f64], _: &[f64]) -> Result<(), TrainerError> {
        Ok(())
    }
}

pub const CLASS_DISTRIBUTION_FILE: &str = "class_distribution.json";
pub const FEATURE_CORRELATION_FILE: &str = "feature_correlation.json";
pub const CONFUSION_MATRIX_FILE: &str = "confusion_matrix.json";
pub const LOSS_CURVE_FILE: &str = "loss_curve.json";

/// Writes each diagnostic as a JSON document under one directory
#[derive(Debug, Clone)]
pub struct JsonRenderer {
    dir: PathBuf,
}

#[derive(Serialize)]
struct CorrelationDoc<'a> {
    columns: &'a [String],
    matrix: Vec<Vec<f64>>,
}

#[derive(Serialize)]
struct ConfusionDoc {
    epoch: usize,
    threshold: f64,
    /// rows are actual `[legit, fraud]`, columns predicted
    grid: [[usize; 2]; 2],
    accuracy: Option<f64>,
}

#[derive(Serialize)]
struct LossCurveDoc<'a> {
    train: &'a [f64],
    test: &'a [f64],
}

impl JsonRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self, TrainerError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn write<T: Serialize>(&self, name: &str, doc: &T) -> Result<(), TrainerError> {
        let bytes = to_canonical_json(doc).map_err(|e| TrainerError::RunLog(e.to_string()))?;
        let path = self.dir.join(name);
        fs::write(&path, bytes)?;
        debug!(path = %path.display(), "diagnostic written");
        Ok(())
    }
}

impl DiagnosticsRenderer for JsonRenderer {
    fn class_distribution(&mut self, counts: &ClassDistribution) -> Result<(), TrainerError> {
        self.write(CLASS_DISTRIBUTION_FILE, counts)
    }

    fn feature_correlation(
        &mut self,
        columns: &[String],
        correlation: &Array2<f64>,
    ) -> Result<(), TrainerError> {
        let matrix = correlation.rows().into_iter().map(|r| r.to_vec()).collect();
        self.write(FEATURE_CORRELATION_FILE, &CorrelationDoc { columns, matrix })
    }

    fn confusion_matrix(
        &mut self,
        epoch: usize,
        matrix: &ConfusionMatrix,
    ) -> Result<(), TrainerError> {
        let doc = ConfusionDoc {
            epoch,
            threshold: crate::trainer::DIAGNOSTIC_THRESHOLD,
            grid: matrix.as_grid(),
            accuracy: matrix.accuracy(),
        };
        self.write(CONFUSION_MATRIX_FILE, &doc)
    }

    fn loss_curve(&mut self, train: &[f64], test: &[f64]) -> Result<(), TrainerError> {
        self.write(LOSS_CURVE_FILE, &LossCurveDoc { train, test })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use ndarray::array;
    use tempfile::TempDir;

    #[test]
    fn test_json_renderer_writes_documents() -> Result<()> {
        let dir = TempDir::new()?;
        let mut renderer = JsonRenderer::new(dir.path().join("plots"))?;

        renderer.class_distribution(&ClassDistribution { legit: 9, fraud: 1 })?;
        renderer.feature_correlation(
            &["a".to_string(), "Class".to_string()],
            &array![[1.0, 0.5], [0.5, 1.0]],
        )?;
        renderer.loss_curve(&[0.7, 0.4], &[0.8, 0.5])?;

        let dist: serde_json::Value =
            serde_json::from_slice(&fs::read(renderer.dir().join(CLASS_DISTRIBUTION_FILE))?)?;
        assert_eq!(dist["fraud"], 1);

        let corr: serde_json::Value =
            serde_json::from_slice(&fs::read(renderer.dir().join(FEATURE_CORRELATION_FILE))?)?;
        assert_eq!(corr["matrix"][0][1], 0.5);
        assert_eq!(corr["columns"][1], "Class");

        let curve: serde_json::Value =
            serde_json::from_slice(&fs::read(renderer.dir().join(LOSS_CURVE_FILE))?)?;
        assert_eq!(curve["test"].as_array().map(Vec::len), Some(2));
        Ok(())
    }
}
