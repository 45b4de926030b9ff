//! Per-epoch metric destinations
//!
//! The trainer hands every `(split, epoch)` pair to a [`MetricsSink`]; what
//! happens to it afterwards is the sink's business.

use crate::errors::TrainerError;
use chrono::Utc;
use fraud_core::Split;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Loss and AUC of one split at one epoch
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EpochScalars {
    pub loss: f64,
    /// Absent when the split holds a single class
    pub auc: Option<f64>,
}

pub trait MetricsSink {
    fn record(&mut self, split: Split, epoch: usize, scalars: EpochScalars)
        -> Result<(), TrainerError>;
}

/// Emits each record as a structured `tracing` event
#[derive(Debug, Default)]
pub struct TracingSink;

impl MetricsSink for TracingSink {
    fn record(
        &mut self,
        split: Split,
        epoch: usize,
        scalars: EpochScalars,
    ) -> Result<(), TrainerError> {
        info!(
            split = split.as_str(),
            epoch,
            loss = scalars.loss,
            auc = ?scalars.auc,
            "epoch metrics"
        );
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonlLine<'a> {
    split: &'a str,
    epoch: usize,
    loss: f64,
    auc: Option<f64>,
}

/// Appends one JSON object per line to `run_<timestamp>/{train,test}.jsonl`
pub struct JsonlSink {
    run_dir: PathBuf,
    train: BufWriter<File>,
    test: BufWriter<File>,
}

impl JsonlSink {
    /// Create a fresh run directory under `log_dir`.
    pub fn create(log_dir: &Path) -> Result<Self, TrainerError> {
        let stamp = Utc::now().format("%Y%m%d_%H%M%S%.3f");
        let run_dir = log_dir.join(format!("run_{stamp}"));
        fs::create_dir_all(&run_dir).map_err(|e| {
            TrainerError::RunLog(format!("cannot create {}: {e}", run_dir.display()))
        })?;
        let open = |name: &str| -> Result<BufWriter<File>, TrainerError> {
            let path = run_dir.join(name);
            File::create(&path).map(BufWriter::new).map_err(|e| {
                TrainerError::RunLog(format!("cannot create {}: {e}", path.display()))
            })
        };
        let train = open("train.jsonl")?;
        let test = open("test.jsonl")?;
        info!(path = %run_dir.display(), "run log started");
        Ok(Self {
            run_dir,
            train,
            test,
        })
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }
}

impl MetricsSink for JsonlSink {
    fn record(
        &mut self,
        split: Split,
        epoch: usize,
        scalars: EpochScalars,
    ) -> Result<(), TrainerError> {
        let line = JsonlLine {
            split: split.as_str(),
            epoch,
            loss: scalars.loss,
            auc: scalars.auc,
        };
        let writer = match split {
            Split::Train => &mut self.train,
            Split::Test => &mut self.test,
        };
        serde_json::to_writer(&mut *writer, &line)
            .map_err(|e| TrainerError::RunLog(e.to_string()))?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        for writer in [&mut self.train, &mut self.test] {
            if let Err(err) = writer.flush() {
                warn!(error = %err, "failed to flush run log");
            }
        }
    }
}
