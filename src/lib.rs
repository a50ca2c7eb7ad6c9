//! Transaction confirmation-time estimation service
//!
//! Encodes a pending transaction's fee and size parameters into a fixed
//! feature vector, runs a trained ONNX regressor on it and maps the result
//! back to milliseconds until inclusion.

pub mod config;
pub mod error;
pub mod feature_encoder;
pub mod metrics;
pub mod models;
pub mod server;
pub mod service;
pub mod types;

pub use config::AppConfig;
pub use error::{PredictionError, StartupError, ValidationError};
pub use feature_encoder::{FeatureEncoder, FeatureVector, FEATURE_COLUMNS};
pub use service::PredictionService;
pub use types::{PredictionResponse, TransactionFeatures};
