//! JSON request and response shapes of the scoring CLI

use crate::service::{labels_from_probabilities, InferenceService};
use fraud_core::{FeatureMap, Result};
use serde::{Deserialize, Serialize};

/// `{"transactions": [...]}` for a batch, a bare feature object for one
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ScoreRequest {
    Batch { transactions: Vec<FeatureMap> },
    Single(FeatureMap),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ScoreResponse {
    Single {
        fraud_probability: f64,
        #[serde(skip_serializing_if = "Option::is_none")]
        fraud_label: Option<u8>,
    },
    Batch {
        fraud_probabilities: Vec<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        fraud_labels: Option<Vec<u8>>,
    },
}

/// Score a request; `threshold` adds labels when given.
pub fn handle(
    service: &InferenceService,
    request: &ScoreRequest,
    threshold: Option<f64>,
) -> Result<ScoreResponse> {
    match request {
        ScoreRequest::Single(transaction) => {
            let fraud_probability = service.predict_one(transaction)?;
            let fraud_label = threshold
                .map(|t| labels_from_probabilities(&[fraud_probability], t))
                .transpose()?
                .and_then(|labels| labels.first().copied());
            Ok(ScoreResponse::Single {
                fraud_probability,
                fraud_label,
            })
        }
        ScoreRequest::Batch { transactions } => {
            let fraud_probabilities = service.predict(transactions)?;
            let fraud_labels = threshold
                .map(|t| labels_from_probabilities(&fraud_probabilities, t))
                .transpose()?;
            Ok(ScoreResponse::Batch {
                fraud_probabilities,
                fraud_labels,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_shapes() {
        let single: ScoreRequest = serde_json::from_str(r#"{"V1": 1.0, "Amount": 2.5}"#).unwrap();
        assert!(matches!(single, ScoreRequest::Single(ref m) if m.len() == 2));

        let batch: ScoreRequest =
            serde_json::from_str(r#"{"transactions": [{"V1": 1.0}, {"V1": 2.0}]}"#).unwrap();
        assert!(matches!(batch, ScoreRequest::Batch { ref transactions } if transactions.len() == 2));

        assert!(serde_json::from_str::<ScoreRequest>(r#"{"V1": "high"}"#).is_err());
    }

    #[test]
    fn test_response_shapes() {
        let single = ScoreResponse::Single {
            fraud_probability: 0.25,
            fraud_label: None,
        };
        assert_eq!(
            serde_json::to_string(&single).unwrap(),
            r#"{"fraud_probability":0.25}"#
        );

        let batch = ScoreResponse::Batch {
            fraud_probabilities: vec![0.1, 0.9],
            fraud_labels: Some(vec![0, 1]),
        };
        assert_eq!(
            serde_json::to_string(&batch).unwrap(),
            r#"{"fraud_probabilities":[0.1,0.9],"fraud_labels":[0,1]}"#
        );
    }
}
