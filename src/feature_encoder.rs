//! Feature encoding for confirmation-time model inference.
//!
//! Turns a [`TransactionFeatures`] record into the fixed-order numeric
//! vector the regressor was trained on.

use crate::types::features::TransactionFeatures;

/// Number of `tx_type` categories expanded into the one-hot slice.
pub const TX_TYPE_CATEGORIES: usize = 5;

/// Length of an encoded feature vector.
pub const FEATURE_COUNT: usize = 7 + TX_TYPE_CATEGORIES;

/// Encoded model input
pub type FeatureVector = [f64; FEATURE_COUNT];

/// One column of the model input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeatureColumn {
    GasPrice,
    Gas,
    GasTipCap,
    GasFeeCap,
    Value,
    Nonce,
    DataSize,
    /// Indicator for `tx_type == n`
    TxType(u8),
}

/// Column order of the training data.
///
/// Gas limit sits between gas price and the EIP-1559 caps, and the tip cap
/// precedes the fee cap. Both differ from the request schema order. Changing
/// this list requires retraining.
pub const FEATURE_COLUMNS: [FeatureColumn; FEATURE_COUNT] = [
    FeatureColumn::GasPrice,
    FeatureColumn::Gas,
    FeatureColumn::GasTipCap,
    FeatureColumn::GasFeeCap,
    FeatureColumn::Value,
    FeatureColumn::Nonce,
    FeatureColumn::DataSize,
    FeatureColumn::TxType(0),
    FeatureColumn::TxType(1),
    FeatureColumn::TxType(2),
    FeatureColumn::TxType(3),
    FeatureColumn::TxType(4),
];

const TX_TYPE_NAMES: [&str; TX_TYPE_CATEGORIES] =
    ["tx_type_0", "tx_type_1", "tx_type_2", "tx_type_3", "tx_type_4"];

impl FeatureColumn {
    /// Column name as it appears in the training frame.
    pub fn name(self) -> &'static str {
        match self {
            FeatureColumn::GasPrice => "gas_price",
            FeatureColumn::Gas => "gas",
            FeatureColumn::GasTipCap => "gas_tip_cap",
            FeatureColumn::GasFeeCap => "gas_fee_cap",
            FeatureColumn::Value => "value",
            FeatureColumn::Nonce => "nonce",
            FeatureColumn::DataSize => "data_size",
            FeatureColumn::TxType(n) => TX_TYPE_NAMES
                .get(n as usize)
                .copied()
                .unwrap_or("tx_type_unknown"),
        }
    }

    /// Read this column's value out of a record.
    pub fn extract(self, tx: &TransactionFeatures) -> f64 {
        match self {
            FeatureColumn::GasPrice => tx.gas_price,
            FeatureColumn::Gas => tx.gas as f64,
            FeatureColumn::GasTipCap => tx.gas_tip_cap,
            FeatureColumn::GasFeeCap => tx.gas_fee_cap,
            FeatureColumn::Value => tx.value,
            FeatureColumn::Nonce => tx.nonce as f64,
            FeatureColumn::DataSize => tx.data_size as f64,
            FeatureColumn::TxType(n) => {
                if tx.tx_type == i64::from(n) {
                    1.0
                } else {
                    0.0
                }
            }
        }
    }
}

/// Whether `tx_type` falls inside the one-hot domain.
pub fn tx_type_in_range(tx_type: i64) -> bool {
    (0..TX_TYPE_CATEGORIES as i64).contains(&tx_type)
}

/// Encoder that transforms transaction records into model input vectors.
///
/// No normalization happens here; the regressor was trained on raw values.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    /// Encode a record in [`FEATURE_COLUMNS`] order.
    ///
    /// An out-of-range `tx_type` yields an all-zero one-hot slice rather
    /// than an error. Callers that care check [`tx_type_in_range`].
    pub fn encode(&self, tx: &TransactionFeatures) -> FeatureVector {
        FEATURE_COLUMNS.map(|column| column.extract(tx))
    }

    /// Get the number of features produced.
    pub fn feature_count(&self) -> usize {
        FEATURE_COUNT
    }

    /// Get feature names in model column order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        FEATURE_COLUMNS.iter().map(|c| c.name()).collect()
    }
}
