//! End-to-end training run: CSV in, artifact bundle out
//!
//! load → class distribution and correlation diagnostics → split → fit the
//! scaler on the training split → transform both splits → train the chosen
//! variant → save the bundle. Nothing is written to `output_dir` unless
//! every earlier step succeeded.

use crate::config::TrainingConfig;
use crate::dataset::Dataset;
use crate::diagnostics::DiagnosticsRenderer;
use crate::errors::TrainerError;
use crate::sinks::{EpochScalars, MetricsSink};
use crate::trainer::{Trainer, TrainerOptions, DIAGNOSTIC_THRESHOLD};
use fraud_core::metrics::correlation_matrix;
use fraud_core::splitter::ClassCounts;
use fraud_core::{
    split, AnyModel, ArtifactBundle, BoostedTrees, ConfusionMatrix, FitReport, FraudModel,
    FraudNet, LabeledMatrix, Manifest, MetricsHistory, MetricsSnapshot, ModelKind, Preprocessor,
    Split,
};
use tracing::{info, instrument};

/// What a finished run produced
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub model_kind: ModelKind,
    pub manifest: Manifest,
    pub history: MetricsHistory,
    pub confusion_matrix: Option<ConfusionMatrix>,
    pub train_counts: ClassCounts,
    pub test_counts: ClassCounts,
    /// Boosting only: epoch whose ensemble was kept
    pub best_epoch: Option<usize>,
}

impl TrainingSummary {
    /// Test AUC of the persisted parameters
    pub fn final_test_auc(&self) -> Option<f64> {
        match self.best_epoch {
            Some(best) => self
                .history
                .snapshots()
                .iter()
                .find(|s| s.epoch == best)
                .and_then(|s| s.test_auc),
            None => self.history.last().and_then(|s| s.test_auc),
        }
    }
}

#[instrument(skip_all, fields(model = %config.model, data = %config.data_path.display()))]
pub fn run_training(
    config: &TrainingConfig,
    sink: &mut dyn MetricsSink,
    diagnostics: &mut dyn DiagnosticsRenderer,
) -> Result<TrainingSummary, TrainerError> {
    config.validate()?;

    let dataset = Dataset::from_csv(&config.data_path, &config.label_column)?;
    diagnostics.class_distribution(&dataset.class_distribution())?;
    let correlation = correlation_matrix(&dataset.numeric_matrix()?);
    diagnostics.feature_correlation(&dataset.numeric_columns(), &correlation)?;

    let parts = split(&dataset.records, &config.split_options())?;
    let (train_counts, test_counts) = (parts.train_counts(), parts.test_counts());
    info!(
        train = train_counts.total(),
        train_fraud = train_counts.fraud,
        test = test_counts.total(),
        test_fraud = test_counts.fraud,
        "dataset split"
    );

    let preprocessor =
        Preprocessor::fit(dataset.schema.clone(), &parts.train, config.schema_mode())?;
    let (x_train, y_train) = preprocessor.transform_labeled(&parts.train)?;
    let (x_test, y_test) = preprocessor.transform_labeled(&parts.test)?;
    let train = LabeledMatrix::new(x_train, y_train)?;
    let test = LabeledMatrix::new(x_test, y_test)?;
    let feature_count = preprocessor.schema().len();

    let (model, history, confusion_matrix, best_epoch): (AnyModel, _, _, _) = match config.model {
        ModelKind::FraudNet => {
            let network = FraudNet::new(feature_count, config.network_config())?;
            let options = TrainerOptions {
                epochs: config.epochs,
                diagnostic_epoch: config.diagnostic_epoch,
            };
            let mut trainer = Trainer::new(network, options, sink, diagnostics);
            let outcome = trainer.run(&train, &test)?;
            (
                trainer.into_model().into(),
                outcome.history,
                outcome.confusion_matrix,
                None,
            )
        }
        ModelKind::BoostedTrees => {
            let mut trees = BoostedTrees::new(feature_count, config.boosting_config())?;
            let report = trees.fit(&train, Some(&test))?;
            let history = log_fit_report(&report, sink)?;

            let probabilities = trees.predict_proba(&test.features)?;
            let matrix = ConfusionMatrix::from_probabilities(
                &test.labels,
                &probabilities,
                DIAGNOSTIC_THRESHOLD,
            );
            let best = report.best_epoch.unwrap_or(0);
            diagnostics.confusion_matrix(best, &matrix)?;
            let (train_curve, test_curve) = history.loss_curve();
            diagnostics.loss_curve(&train_curve, &test_curve)?;
            (trees.into(), history, Some(matrix), report.best_epoch)
        }
    };

    let bundle = ArtifactBundle::new(model, preprocessor)?;
    let manifest = bundle.save(&config.output_dir)?;

    let summary = TrainingSummary {
        model_kind: config.model,
        manifest,
        history,
        confusion_matrix,
        train_counts,
        test_counts,
        best_epoch,
    };
    info!(
        output = %config.output_dir.display(),
        epochs = summary.history.len(),
        test_auc = ?summary.final_test_auc(),
        "training run complete"
    );
    Ok(summary)
}

/// Forward the boosting fit history to the sink as per-epoch metrics.
fn log_fit_report(
    report: &FitReport,
    sink: &mut dyn MetricsSink,
) -> Result<MetricsHistory, TrainerError> {
    let mut history = MetricsHistory::new();
    for fit in &report.history {
        let snapshot = MetricsSnapshot {
            epoch: fit.epoch,
            train_loss: fit.train_loss,
            train_auc: fit.train_auc,
            test_loss: fit.eval_loss.unwrap_or(f64::NAN),
            test_auc: fit.eval_auc,
        };
        history.push(snapshot)?;
        for split in [Split::Train, Split::Test] {
            let (loss, auc) = snapshot.scalars(split);
            sink.record(split, fit.epoch, EpochScalars { loss, auc })?;
        }
    }
    Ok(history)
}
