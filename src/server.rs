//! HTTP boundary: routes, error mapping and middleware

use crate::error::{PredictionError, ValidationError};
use crate::feature_encoder::tx_type_in_range;
use crate::metrics::ServiceMetrics;
use crate::service::PredictionService;
use crate::types::features::TransactionFeatures;
use crate::types::prediction::{
    HealthResponse, PredictionResponse, StageErrorBody, StageErrorDetail, ValidationErrorBody,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::{debug, error};
use uuid::Uuid;

/// Liveness message returned by `GET /`
pub const HEALTH_MESSAGE: &str = "confirmation-time service is running";

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PredictionService>,
    pub metrics: Arc<ServiceMetrics>,
}

impl AppState {
    pub fn new(service: Arc<PredictionService>, metrics: Arc<ServiceMetrics>) -> Self {
        Self { service, metrics }
    }
}

/// Build the router. Only a ready service can be passed in, so every route
/// is served with both artifacts loaded.
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", get(health))
        .route("/predict", post(predict))
        .with_state(state)
        .layer(TimeoutLayer::new(request_timeout))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        message: HEALTH_MESSAGE.to_string(),
    })
}

async fn predict(State(state): State<AppState>, body: Bytes) -> Response {
    let request_id = Uuid::new_v4();
    let start_time = Instant::now();

    match run_prediction(&state, &body) {
        Ok(predicted_ms) => {
            let latency = start_time.elapsed();
            state.metrics.record_prediction(latency, predicted_ms);
            debug!(
                request_id = %request_id,
                predicted_ms = predicted_ms,
                latency_us = latency.as_micros(),
                "Prediction served"
            );
            Json(PredictionResponse::new(predicted_ms)).into_response()
        }
        Err(e) => {
            state.metrics.record_failure(e.stage(), start_time.elapsed());
            match &e {
                PredictionError::Validation(_) => {
                    debug!(request_id = %request_id, error = %e, "Request rejected")
                }
                _ => error!(
                    request_id = %request_id,
                    stage = e.stage(),
                    error = %e,
                    "Prediction failed"
                ),
            }
            error_response(e)
        }
    }
}

fn run_prediction(state: &AppState, body: &[u8]) -> Result<f64, PredictionError> {
    let value: Value = serde_json::from_slice(body).map_err(ValidationError::invalid_json)?;
    let features = TransactionFeatures::from_json(&value)?;

    if !tx_type_in_range(features.tx_type) {
        state.metrics.record_out_of_range_tx_type();
    }

    state.service.predict_confirmation_time_ms(&features)
}

/// Map a pipeline error onto its HTTP status and body.
pub fn error_response(err: PredictionError) -> Response {
    match err {
        PredictionError::Validation(v) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(ValidationErrorBody { detail: v.errors }),
        )
            .into_response(),
        other => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(StageErrorBody {
                detail: StageErrorDetail {
                    stage: other.stage().to_string(),
                    message: other.to_string(),
                },
            }),
        )
            .into_response(),
    }
}
