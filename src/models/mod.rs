//! Trained artifacts and the components that wrap them

pub mod inference;
pub mod loader;
pub mod scaler;

pub use inference::{InferenceEngine, OnnxRegressor, Regressor};
pub use loader::ModelLoader;
pub use scaler::{OutputScaler, ScalerArtifact, TargetScaler};
