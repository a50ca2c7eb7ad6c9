//! Type definitions for the confirmation-time service

pub mod features;
pub mod prediction;

pub use features::TransactionFeatures;
pub use prediction::PredictionResponse;
