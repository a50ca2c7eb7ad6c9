//! Response bodies for the HTTP boundary

use crate::error::FieldError;
use serde::{Deserialize, Serialize};

/// Successful `/predict` response
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    /// Estimated time until inclusion, in milliseconds
    pub predicted_confirmation_time_ms: f64,
}

impl PredictionResponse {
    pub fn new(predicted_confirmation_time_ms: f64) -> Self {
        Self {
            predicted_confirmation_time_ms,
        }
    }
}

/// 422 body: one entry per offending field
#[derive(Debug, Clone, Serialize)]
pub struct ValidationErrorBody {
    pub detail: Vec<FieldError>,
}

/// 5xx body: which pipeline stage failed and why
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageErrorBody {
    pub detail: StageErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageErrorDetail {
    pub stage: String,
    pub message: String,
}

/// `GET /` liveness body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub message: String,
}
