//! Epoch loop for the network variant
//!
//! Each epoch walks `TrainStep → EvalStep → MetricLog`; after the last one
//! the trainer is `Finished` and hands the loss curve to the diagnostics
//! renderer. The parameters left in the model are those of the final epoch.

use crate::diagnostics::DiagnosticsRenderer;
use crate::errors::TrainerError;
use crate::sinks::{EpochScalars, MetricsSink};
use fraud_core::model::EpochPass;
use fraud_core::{
    ConfusionMatrix, FraudModel, FraudNet, LabeledMatrix, MetricsHistory, MetricsSnapshot, Split,
};
use rand::rngs::StdRng;
use tracing::{info, instrument, warn};

/// Decision threshold of the one-time diagnostic confusion matrix
pub const DIAGNOSTIC_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrainerState {
    Initialized,
    TrainStep { epoch: usize },
    EvalStep { epoch: usize },
    MetricLog { epoch: usize },
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrainerOptions {
    pub epochs: usize,
    /// 0-based epoch whose test predictions feed the confusion matrix
    pub diagnostic_epoch: usize,
}

/// Results of a completed run
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub history: MetricsHistory,
    pub confusion_matrix: Option<ConfusionMatrix>,
}

pub struct Trainer<'a> {
    model: FraudNet,
    options: TrainerOptions,
    rng: StdRng,
    state: TrainerState,
    history: MetricsHistory,
    confusion_matrix: Option<ConfusionMatrix>,
    sink: &'a mut dyn MetricsSink,
    diagnostics: &'a mut dyn DiagnosticsRenderer,
}

impl<'a> Trainer<'a> {
    pub fn new(
        model: FraudNet,
        options: TrainerOptions,
        sink: &'a mut dyn MetricsSink,
        diagnostics: &'a mut dyn DiagnosticsRenderer,
    ) -> Self {
        if options.epochs <= options.diagnostic_epoch {
            warn!(
                epochs = options.epochs,
                diagnostic_epoch = options.diagnostic_epoch,
                "diagnostic epoch is never reached; no confusion matrix will be produced"
            );
        }
        let rng = model.training_rng();
        Self {
            model,
            options,
            rng,
            state: TrainerState::Initialized,
            history: MetricsHistory::new(),
            confusion_matrix: None,
            sink,
            diagnostics,
        }
    }

    pub fn state(&self) -> TrainerState {
        self.state
    }

    pub fn history(&self) -> &MetricsHistory {
        &self.history
    }

    pub fn model(&self) -> &FraudNet {
        &self.model
    }

    /// Next epoch to run, or `None` once finished
    fn next_epoch(&self) -> Option<usize> {
        match self.state {
            TrainerState::Finished => None,
            _ => Some(self.history.len()).filter(|&e| e < self.options.epochs),
        }
    }

    /// Run one full epoch. Returns `false` when there was nothing left to run.
    pub fn step_epoch(
        &mut self,
        train: &LabeledMatrix,
        test: &LabeledMatrix,
    ) -> Result<bool, TrainerError> {
        let Some(epoch) = self.next_epoch() else {
            self.finish()?;
            return Ok(false);
        };

        self.state = TrainerState::TrainStep { epoch };
        let train_pass = self.model.train_epoch(train, &mut self.rng)?;

        self.state = TrainerState::EvalStep { epoch };
        let test_pass = self.model.evaluate(test)?;

        self.state = TrainerState::MetricLog { epoch };
        self.log_metrics(epoch, &train_pass, &test_pass)?;

        if epoch + 1 == self.options.epochs {
            self.finish()?;
        }
        Ok(true)
    }

    /// Run every remaining epoch.
    #[instrument(skip_all, fields(epochs = self.options.epochs))]
    pub fn run(
        &mut self,
        train: &LabeledMatrix,
        test: &LabeledMatrix,
    ) -> Result<TrainingOutcome, TrainerError> {
        if train.feature_count() != self.model.feature_count() {
            return Err(fraud_core::FraudError::DimensionMismatch {
                expected: self.model.feature_count(),
                actual: train.feature_count(),
            }
            .into());
        }
        while self.step_epoch(train, test)? {}
        Ok(TrainingOutcome {
            history: self.history.clone(),
            confusion_matrix: self.confusion_matrix,
        })
    }

    pub fn into_model(self) -> FraudNet {
        self.model
    }

    fn log_metrics(
        &mut self,
        epoch: usize,
        train_pass: &EpochPass,
        test_pass: &EpochPass,
    ) -> Result<(), TrainerError> {
        let train_auc = train_pass.auc();
        let test_auc = test_pass.auc();
        if train_auc.is_none() {
            warn!(epoch, "train split holds a single class; AUC skipped");
        }
        if test_auc.is_none() {
            warn!(epoch, "test split holds a single class; AUC skipped");
        }

        let snapshot = MetricsSnapshot {
            epoch,
            train_loss: train_pass.losses.mean(),
            train_auc,
            test_loss: test_pass.losses.mean(),
            test_auc,
        };
        self.history.push(snapshot)?;

        for split in [Split::Train, Split::Test] {
            let (loss, auc) = snapshot.scalars(split);
            self.sink.record(split, epoch, EpochScalars { loss, auc })?;
        }
        info!(
            epoch,
            train_loss = snapshot.train_loss,
            test_loss = snapshot.test_loss,
            ?train_auc,
            ?test_auc,
            "epoch complete"
        );

        if epoch == self.options.diagnostic_epoch {
            let matrix = ConfusionMatrix::from_probabilities(
                &test_pass.labels,
                &test_pass.probabilities,
                DIAGNOSTIC_THRESHOLD,
            );
            self.diagnostics.confusion_matrix(epoch, &matrix)?;
            self.confusion_matrix = Some(matrix);
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), TrainerError> {
        if self.state == TrainerState::Finished {
            return Ok(());
        }
        self.state = TrainerState::Finished;
        let (train, test) = self.history.loss_curve();
        self.diagnostics.loss_curve(&train, &test)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::NoopRenderer;
    use crate::sinks::TracingSink;
    use fraud_core::NetworkConfig;
    use ndarray::Array2;

    fn matrices() -> (LabeledMatrix, LabeledMatrix) {
        let build = |n: usize, offset: f64| {
            let mut rows = Vec::new();
            let mut labels = Vec::new();
            for i in 0..n {
                let x = (i as f64 + offset) / n as f64 - 0.5;
                rows.extend_from_slice(&[x, x * x]);
                labels.push(if i % 3 == 0 { 1.0 } else { 0.0 });
            }
            LabeledMatrix::new(Array2::from_shape_vec((n, 2), rows).unwrap(), labels).unwrap()
        };
        (build(60, 0.0), build(15, 0.5))
    }

    fn network(epochs: usize) -> FraudNet {
        let config = NetworkConfig {
            epochs,
            batch_size: 16,
            ..NetworkConfig::default()
        };
        FraudNet::new(2, config).unwrap()
    }

    #[test]
    fn test_state_machine_walks_epochs() {
        let (train, test) = matrices();
        let mut sink = TracingSink;
        let mut diagnostics = NoopRenderer;
        let options = TrainerOptions {
            epochs: 2,
            diagnostic_epoch: 1,
        };
        let mut trainer = Trainer::new(network(2), options, &mut sink, &mut diagnostics);
        assert_eq!(trainer.state(), TrainerState::Initialized);

        assert!(trainer.step_epoch(&train, &test).unwrap());
        assert_eq!(trainer.state(), TrainerState::MetricLog { epoch: 0 });

        assert!(trainer.step_epoch(&train, &test).unwrap());
        assert_eq!(trainer.state(), TrainerState::Finished);
        assert!(!trainer.step_epoch(&train, &test).unwrap());
        assert_eq!(trainer.history().len(), 2);
    }

    #[test]
    fn test_confusion_matrix_only_at_diagnostic_epoch() {
        let (train, test) = matrices();
        let mut sink = TracingSink;
        let mut diagnostics = NoopRenderer;

        let options = TrainerOptions {
            epochs: 3,
            diagnostic_epoch: 1,
        };
        let outcome = Trainer::new(network(3), options, &mut sink, &mut diagnostics)
            .run(&train, &test)
            .unwrap();
        let matrix = outcome.confusion_matrix.unwrap();
        assert_eq!(matrix.total(), test.len());
        assert_eq!(outcome.history.len(), 3);

        let options = TrainerOptions {
            epochs: 2,
            diagnostic_epoch: 8,
        };
        let outcome = Trainer::new(network(2), options, &mut sink, &mut diagnostics)
            .run(&train, &test)
            .unwrap();
        assert!(outcome.confusion_matrix.is_none());
    }
}
