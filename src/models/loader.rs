//! Startup artifact loader: ONNX regressor and target scaler

use crate::error::{ArtifactKind, StartupError};
use crate::models::inference::OnnxRegressor;
use crate::models::scaler::{ScalerArtifact, TargetScaler};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::tensor::TensorElementType;
use std::path::Path;
use tracing::{info, warn};

/// Loader for the trained artifacts
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self, StartupError> {
        ort::init()
            .with_name("tx-confirmation-eta")
            .commit()
            .map_err(|e| StartupError::Runtime(e.to_string()))?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the regressor from an ONNX file exported by the training job
    pub fn load_model<P: AsRef<Path>>(&self, path: P) -> Result<OnnxRegressor, StartupError> {
        let path = path.as_ref();
        require_file(ArtifactKind::Model, path)?;

        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "model".to_string());

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let corrupt = |reason: String| StartupError::CorruptArtifact {
            kind: ArtifactKind::Model,
            path: path.to_path_buf(),
            reason,
        };

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.with_intra_threads(self.onnx_threads))
            .and_then(|b| b.commit_from_file(path))
            .map_err(|e| corrupt(e.to_string()))?;

        let input = session
            .inputs
            .first()
            .ok_or_else(|| corrupt("model declares no inputs".to_string()))?;
        let input_name = input.name.clone();
        let double_input = matches!(
            input.input_type.tensor_type(),
            Some(TensorElementType::Float64)
        );

        // skl2onnx regressors expose a single "variable" output
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("variable") || o.name.contains("output"))
            .or_else(|| session.outputs.first())
            .map(|o| o.name.clone())
            .ok_or_else(|| corrupt("model declares no outputs".to_string()))?;

        if session.outputs.len() > 1 {
            warn!(
                model = %name,
                outputs = session.outputs.len(),
                selected = %output_name,
                "Model has several outputs, using one"
            );
        }

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            double_input = double_input,
            "Model loaded successfully"
        );

        Ok(OnnxRegressor::new(
            name,
            session,
            input_name,
            output_name,
            double_input,
        ))
    }
}

/// Load and validate a scaler artifact. Independent of the ONNX runtime.
pub fn load_scaler<P: AsRef<Path>>(path: P) -> Result<ScalerArtifact, StartupError> {
    let path = path.as_ref();
    require_file(ArtifactKind::Scaler, path)?;

    let corrupt = |reason: String| StartupError::CorruptArtifact {
        kind: ArtifactKind::Scaler,
        path: path.to_path_buf(),
        reason,
    };

    let raw = std::fs::read_to_string(path).map_err(|e| corrupt(e.to_string()))?;
    let scaler: ScalerArtifact = serde_json::from_str(&raw).map_err(|e| corrupt(e.to_string()))?;
    scaler.validate().map_err(corrupt)?;

    info!(
        path = %path.display(),
        n_features = scaler.n_features(),
        "Target scaler loaded"
    );

    Ok(scaler)
}

fn require_file(kind: ArtifactKind, path: &Path) -> Result<(), StartupError> {
    if path.is_file() {
        Ok(())
    } else {
        Err(StartupError::MissingArtifact {
            kind,
            path: path.to_path_buf(),
        })
    }
}
