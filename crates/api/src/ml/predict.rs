use serde::Serialize;

use super::model::Model;
use crate::error::{EngineError, Result};

pub const DECISION_THRESHOLD: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Classification {
    #[serde(rename = "Device Healthy")]
    Healthy,
    #[serde(rename = "Issue Detected")]
    IssueDetected,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    pub probability: f32,
    pub classification: Classification,
    pub confidence: f32,
}

impl Prediction {
    pub fn from_probability(probability: f32) -> Self {
        let classification = if probability > DECISION_THRESHOLD {
            Classification::IssueDetected
        } else {
            Classification::Healthy
        };
        Self {
            probability,
            classification,
            confidence: confidence(probability),
        }
    }
}

/// Distance from the decision boundary, rescaled to `[0, 1]`.
pub fn confidence(probability: f32) -> f32 {
    ((probability - DECISION_THRESHOLD).abs() * 2.0).clamp(0.0, 1.0)
}

pub fn predict(features: &[f32], model: Option<&Model>) -> Result<Prediction> {
    let model = model.ok_or(EngineError::NoModelAvailable)?;
    if features.len() != model.input_size() {
        return Err(EngineError::ShapeMismatch {
            expected: model.input_size(),
            actual: features.len(),
        });
    }
    if let Some(i) = features.iter().position(|v| !v.is_finite()) {
        return Err(EngineError::InvalidFeatures(format!(
            "feature {i} is {}",
            features[i]
        )));
    }

    let probability = model.forward_one(features);
    if !probability.is_finite() {
        return Err(EngineError::InvalidFeatures(
            "model output overflowed for these features".to_string(),
        ));
    }
    Ok(Prediction::from_probability(probability))
}
