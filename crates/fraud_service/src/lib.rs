//! Fraud scoring service
//!
//! Loads a verified artifact bundle once and scores transactions against the
//! exact schema and scaling the model was trained with.

pub mod config;
pub mod request;
pub mod service;

pub use config::ServiceConfig;
pub use request::{handle, ScoreRequest, ScoreResponse};
pub use service::{labels_from_probabilities, InferenceService, ServiceStats};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
