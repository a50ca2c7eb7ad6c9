//! Error taxonomy for the prediction pipeline.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which startup artifact an error refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Model,
    Scaler,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactKind::Model => write!(f, "model"),
            ArtifactKind::Scaler => write!(f, "scaler"),
        }
    }
}

/// A single field-level validation problem.
///
/// Shaped like FastAPI's `detail` entries so existing clients can keep
/// parsing the error body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    /// Location of the offending value, e.g. `["body", "gas_price"]`
    pub loc: Vec<String>,
    /// Human readable message
    pub msg: String,
    /// Machine readable error kind (`missing`, `float_type`, `int_type`, ...)
    #[serde(rename = "type")]
    pub kind: String,
}

impl FieldError {
    pub fn new(field: &str, msg: impl Into<String>, kind: &str) -> Self {
        Self {
            loc: vec!["body".to_string(), field.to_string()],
            msg: msg.into(),
            kind: kind.to_string(),
        }
    }

    pub fn missing(field: &str) -> Self {
        Self::new(field, "Field required", "missing")
    }

    /// The offending field name, if the location points at one.
    pub fn field(&self) -> Option<&str> {
        self.loc.get(1).map(String::as_str)
    }
}

/// Request body failed schema or type checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub errors: Vec<FieldError>,
}

impl ValidationError {
    pub fn new(errors: Vec<FieldError>) -> Self {
        Self { errors }
    }

    /// Body was not valid JSON at all.
    pub fn invalid_json(reason: impl fmt::Display) -> Self {
        Self {
            errors: vec![FieldError {
                loc: vec!["body".to_string()],
                msg: format!("JSON decode error: {}", reason),
                kind: "json_invalid".to_string(),
            }],
        }
    }

    /// Whether any error refers to the given field.
    pub fn has_field(&self, field: &str) -> bool {
        self.errors.iter().any(|e| e.field() == Some(field))
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.loc.join("."), e.msg))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

/// Errors surfaced by a request flowing through the pipeline.
#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error("model inference failed: {0}")]
    ModelInference(String),

    #[error("scaler error: {0}")]
    Scaler(String),
}

impl PredictionError {
    /// Pipeline stage the error originated from.
    pub fn stage(&self) -> &'static str {
        match self {
            PredictionError::Validation(_) => "validation",
            PredictionError::ModelInference(_) => "model_inference",
            PredictionError::Scaler(_) => "scaler",
        }
    }
}

/// Fatal errors while bringing the service up. The process must not serve
/// traffic after any of these.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("{kind} artifact not found at {}", path.display())]
    MissingArtifact { kind: ArtifactKind, path: PathBuf },

    #[error("{kind} artifact at {} is unusable: {reason}", path.display())]
    CorruptArtifact {
        kind: ArtifactKind,
        path: PathBuf,
        reason: String,
    },

    #[error("scaler rejected: {0}")]
    InvalidScaler(String),

    #[error("inference runtime initialisation failed: {0}")]
    Runtime(String),
}

pub type Result<T> = std::result::Result<T, PredictionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_display_lists_fields() {
        let err = ValidationError::new(vec![
            FieldError::missing("gas_price"),
            FieldError::new("gas", "Input should be a valid integer", "int_type"),
        ]);

        let text = err.to_string();
        assert!(text.contains("body.gas_price: Field required"));
        assert!(text.contains("body.gas"));
        assert!(err.has_field("gas"));
        assert!(!err.has_field("nonce"));
    }

    #[test]
    fn test_field_error_serializes_fastapi_shape() {
        let json = serde_json::to_value(FieldError::missing("tx_type")).unwrap();
        assert_eq!(json["loc"], serde_json::json!(["body", "tx_type"]));
        assert_eq!(json["type"], "missing");
        assert_eq!(json["msg"], "Field required");
    }

    #[test]
    fn test_startup_error_mentions_path() {
        let err = StartupError::MissingArtifact {
            kind: ArtifactKind::Scaler,
            path: PathBuf::from("models/scaler_y.json"),
        };
        assert_eq!(
            err.to_string(),
            "scaler artifact not found at models/scaler_y.json"
        );
    }

    #[test]
    fn test_stage_names() {
        assert_eq!(PredictionError::ModelInference("x".into()).stage(), "model_inference");
        assert_eq!(PredictionError::Scaler("x".into()).stage(), "scaler");
    }
}
