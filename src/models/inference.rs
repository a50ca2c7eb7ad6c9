//! Regression inference over encoded feature vectors

use crate::error::{PredictionError, Result};
use crate::feature_encoder::{FeatureVector, FEATURE_COUNT};
use ndarray::{aview2, Array1, ArrayView2};
use ort::session::{Session, SessionOutputs};
use ort::value::Tensor;
use std::sync::Mutex;
use tracing::debug;

/// A trained regressor, seen only through its batch-predict capability.
pub trait Regressor: Send + Sync {
    /// Identifier used in logs
    fn name(&self) -> &str;

    /// Predict one scaled-space value per input row.
    fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Result<Array1<f64>>;
}

/// ONNX regressor exported from scikit-learn.
///
/// `Session::run` needs exclusive access, so calls are serialized through a
/// mutex; concurrent requests queue on it.
#[derive(Debug)]
pub struct OnnxRegressor {
    name: String,
    session: Mutex<Session>,
    input_name: String,
    output_name: String,
    /// Model was exported with a float64 input (`DoubleTensorType`)
    double_input: bool,
}

impl OnnxRegressor {
    pub fn new(
        name: String,
        session: Session,
        input_name: String,
        output_name: String,
        double_input: bool,
    ) -> Self {
        Self {
            name,
            session: Mutex::new(session),
            input_name,
            output_name,
            double_input,
        }
    }

    fn run(&self, rows: ArrayView2<'_, f64>) -> Result<Vec<f64>> {
        let shape = vec![rows.nrows() as i64, rows.ncols() as i64];
        let mut session = self
            .session
            .lock()
            .map_err(|e| self.inference_error(format!("session lock poisoned: {}", e)))?;

        let outputs = if self.double_input {
            let data: Vec<f64> = rows.iter().copied().collect();
            let input = Tensor::from_array((shape, data)).map_err(|e| self.inference_error(e))?;
            session.run(ort::inputs![&self.input_name => input])
        } else {
            let data: Vec<f32> = rows.iter().map(|&v| v as f32).collect();
            let input = Tensor::from_array((shape, data)).map_err(|e| self.inference_error(e))?;
            session.run(ort::inputs![&self.input_name => input])
        }
        .map_err(|e| self.inference_error(e))?;

        self.extract_outputs(&outputs)
    }

    /// Pull the prediction column out of the session outputs, accepting
    /// either float32 or float64 tensors.
    fn extract_outputs(&self, outputs: &SessionOutputs) -> Result<Vec<f64>> {
        let output = outputs.get(self.output_name.as_str()).ok_or_else(|| {
            self.inference_error(format!("output '{}' missing", self.output_name))
        })?;

        if let Ok((_, data)) = output.try_extract_tensor::<f32>() {
            return Ok(data.iter().map(|&v| v as f64).collect());
        }
        let (_, data) = output
            .try_extract_tensor::<f64>()
            .map_err(|e| self.inference_error(e))?;
        Ok(data.to_vec())
    }

    fn inference_error(&self, e: impl std::fmt::Display) -> PredictionError {
        PredictionError::ModelInference(format!("{}: {}", self.name, e))
    }
}

impl Regressor for OnnxRegressor {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict_batch(&self, rows: ArrayView2<'_, f64>) -> Result<Array1<f64>> {
        Ok(Array1::from(self.run(rows)?))
    }
}

/// Single-sample inference over a shared regressor.
pub struct InferenceEngine {
    model: Box<dyn Regressor>,
}

impl std::fmt::Debug for InferenceEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InferenceEngine")
            .field("model", &self.model_name())
            .finish()
    }
}

impl InferenceEngine {
    pub fn new(model: Box<dyn Regressor>) -> Self {
        Self { model }
    }

    /// Name of the wrapped model
    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Run the model on one encoded vector and return its scaled-space output.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        let rows = aview2(std::slice::from_ref(features));
        debug_assert_eq!(rows.dim(), (1, FEATURE_COUNT));

        let outputs = self.model.predict_batch(rows)?;
        let raw = outputs.iter().next().copied().ok_or_else(|| {
            PredictionError::ModelInference(format!("{} returned no output", self.model.name()))
        })?;

        if !raw.is_finite() {
            return Err(PredictionError::ModelInference(format!(
                "{} returned non-finite output {}",
                self.model.name(),
                raw
            )));
        }

        debug!(model = %self.model.name(), raw = raw, "Model inference complete");
        Ok(raw)
    }

    /// Run inference on a batch of encoded vectors
    pub fn predict_batch(&self, features_batch: &[FeatureVector]) -> Result<Vec<f64>> {
        if features_batch.is_empty() {
            return Ok(Vec::new());
        }
        let outputs = self.model.predict_batch(aview2(features_batch))?;
        if outputs.len() != features_batch.len() {
            return Err(PredictionError::ModelInference(format!(
                "{} returned {} outputs for {} rows",
                self.model.name(),
                outputs.len(),
                features_batch.len()
            )));
        }
        Ok(outputs.to_vec())
    }
}
