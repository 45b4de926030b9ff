use fraud_core::FraudError;
use thiserror::Error;

/// Errors returned by the training pipeline.
#[derive(Debug, Error)]
pub enum TrainerError {
    #[error("dataset error: {0}")]
    Dataset(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run log error: {0}")]
    RunLog(String),

    #[error(transparent)]
    Core(#[from] FraudError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TrainerError {
    /// The underlying core error, when there is one
    pub fn core(&self) -> Option<&FraudError> {
        match self {
            TrainerError::Core(err) => Some(err),
            _ => None,
        }
    }
}
