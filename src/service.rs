//! Confirmation-time prediction service
//!
//! Composes encode -> predict -> invert into a single request operation and
//! owns the trained artifacts for the lifetime of the process.
//!
//! A `PredictionService` value only exists once both artifacts have loaded,
//! so holding one means the service is ready. There is no reload path;
//! new artifacts require a restart.

use crate::config::ArtifactsConfig;
use crate::error::{Result, StartupError};
use crate::feature_encoder::{tx_type_in_range, FeatureEncoder, FeatureVector};
use crate::models::inference::{InferenceEngine, Regressor};
use crate::models::loader::{self, ModelLoader};
use crate::models::scaler::{OutputScaler, TargetScaler};
use crate::types::features::TransactionFeatures;
use serde_json::Value;
use tracing::{debug, info, warn};

/// End-to-end confirmation-time predictor.
///
/// Stateless per request; share it behind an `Arc`.
#[derive(Debug)]
pub struct PredictionService {
    encoder: FeatureEncoder,
    engine: InferenceEngine,
    scaler: OutputScaler,
}

impl PredictionService {
    /// Load both artifacts and build a ready service.
    ///
    /// Fails if either file is missing or unusable, or if the scaler was not
    /// fit on a single target column.
    pub fn load(config: &ArtifactsConfig) -> std::result::Result<Self, StartupError> {
        // The scaler needs no runtime, so a bad scaler fails before ONNX init
        let scaler = loader::load_scaler(&config.scaler_path)?;
        let model =
            ModelLoader::with_threads(config.onnx_threads)?.load_model(&config.model_path)?;

        let service = Self::from_parts(Box::new(model), Box::new(scaler))?;
        info!(
            model = %service.model_name(),
            model_path = %config.model_path.display(),
            scaler_path = %config.scaler_path.display(),
            "Prediction service ready"
        );
        Ok(service)
    }

    /// Build a service from already-constructed artifacts.
    pub fn from_parts(
        model: Box<dyn Regressor>,
        scaler: Box<dyn TargetScaler>,
    ) -> std::result::Result<Self, StartupError> {
        let scaler = OutputScaler::new(scaler)
            .map_err(|e| StartupError::InvalidScaler(e.to_string()))?;

        Ok(Self {
            encoder: FeatureEncoder::new(),
            engine: InferenceEngine::new(model),
            scaler,
        })
    }

    /// Name of the loaded model
    pub fn model_name(&self) -> &str {
        self.engine.model_name()
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    /// Encode a record without running the model.
    pub fn encode(&self, features: &TransactionFeatures) -> FeatureVector {
        self.encoder.encode(features)
    }

    /// Predict confirmation time in milliseconds for a validated record.
    ///
    /// Not retried: the pipeline is deterministic, so a failure here would
    /// fail again.
    pub fn predict_confirmation_time_ms(&self, features: &TransactionFeatures) -> Result<f64> {
        if !tx_type_in_range(features.tx_type) {
            warn!(
                tx_type = features.tx_type,
                "tx_type outside the trained categories, one-hot slice left empty"
            );
        }

        let vector = self.encoder.encode(features);
        let raw = self.engine.predict(&vector)?;
        let predicted_ms = self.scaler.invert(raw)?;

        debug!(
            raw = raw,
            predicted_ms = predicted_ms,
            "Confirmation time predicted"
        );
        Ok(predicted_ms)
    }

    /// Validate a raw JSON body, then predict.
    ///
    /// Validation failures are returned before anything is encoded.
    pub fn predict_json(&self, body: &Value) -> Result<f64> {
        let features = TransactionFeatures::from_json(body)?;
        self.predict_confirmation_time_ms(&features)
    }
}
