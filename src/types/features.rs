//! Transaction feature record accepted by the prediction endpoint

use crate::error::{FieldError, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fee and payload parameters of a pending transaction.
///
/// Field declaration order is the request schema order, not the model's
/// column order (see `feature_encoder::FEATURE_COLUMNS`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionFeatures {
    /// Legacy gas price
    pub gas_price: f64,
    /// EIP-1559 max fee per gas
    pub gas_fee_cap: f64,
    /// EIP-1559 max priority fee per gas
    pub gas_tip_cap: f64,
    /// Gas limit
    pub gas: i64,
    /// Transferred value
    pub value: f64,
    /// Envelope type, expected in 0..=4
    pub tx_type: i64,
    /// Sender nonce
    #[serde(default)]
    pub nonce: i64,
    /// Calldata size in bytes
    #[serde(default)]
    pub data_size: i64,
}

impl TransactionFeatures {
    /// Create a record with the required fields; `nonce` and `data_size` default to 0.
    pub fn new(
        gas_price: f64,
        gas_fee_cap: f64,
        gas_tip_cap: f64,
        gas: i64,
        value: f64,
        tx_type: i64,
    ) -> Self {
        Self {
            gas_price,
            gas_fee_cap,
            gas_tip_cap,
            gas,
            value,
            tx_type,
            nonce: 0,
            data_size: 0,
        }
    }

    pub fn with_nonce(mut self, nonce: i64) -> Self {
        self.nonce = nonce;
        self
    }

    pub fn with_data_size(mut self, data_size: i64) -> Self {
        self.data_size = data_size;
        self
    }

    /// Validate a raw JSON request body and build the record.
    ///
    /// Collects every field problem instead of stopping at the first one.
    /// Coercion is lax: number fields accept JSON numbers, numeric strings
    /// and booleans; integer fields accept integers, whole-valued floats,
    /// integer strings and booleans. Unknown keys are ignored.
    pub fn from_json(body: &Value) -> Result<Self, ValidationError> {
        let Some(object) = body.as_object() else {
            return Err(ValidationError::new(vec![FieldError {
                loc: vec!["body".to_string()],
                msg: "Input should be a valid dictionary".to_string(),
                kind: "dict_type".to_string(),
            }]));
        };

        let mut errors = Vec::new();

        let gas_price = required(object, "gas_price", float_field, &mut errors);
        let gas_fee_cap = required(object, "gas_fee_cap", float_field, &mut errors);
        let gas_tip_cap = required(object, "gas_tip_cap", float_field, &mut errors);
        let gas = required(object, "gas", int_field, &mut errors);
        let value = required(object, "value", float_field, &mut errors);
        let tx_type = required(object, "tx_type", int_field, &mut errors);
        let nonce = optional(object, "nonce", int_field, &mut errors);
        let data_size = optional(object, "data_size", int_field, &mut errors);

        match (gas_price, gas_fee_cap, gas_tip_cap, gas, value, tx_type, nonce, data_size) {
            (
                Some(gas_price),
                Some(gas_fee_cap),
                Some(gas_tip_cap),
                Some(gas),
                Some(value),
                Some(tx_type),
                Some(nonce),
                Some(data_size),
            ) if errors.is_empty() => Ok(Self {
                gas_price,
                gas_fee_cap,
                gas_tip_cap,
                gas,
                value,
                tx_type,
                nonce,
                data_size,
            }),
            _ => Err(ValidationError::new(errors)),
        }
    }
}

type FieldParser<T> = fn(&str, &Value) -> Result<T, FieldError>;

fn required<T>(
    object: &Map<String, Value>,
    name: &str,
    parse: FieldParser<T>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match object.get(name) {
        Some(value) => collect(parse(name, value), errors),
        None => {
            errors.push(FieldError::missing(name));
            None
        }
    }
}

fn optional<T: Default>(
    object: &Map<String, Value>,
    name: &str,
    parse: FieldParser<T>,
    errors: &mut Vec<FieldError>,
) -> Option<T> {
    match object.get(name) {
        Some(value) => collect(parse(name, value), errors),
        None => Some(T::default()),
    }
}

fn collect<T>(result: Result<T, FieldError>, errors: &mut Vec<FieldError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            errors.push(e);
            None
        }
    }
}

fn float_field(name: &str, value: &Value) -> Result<f64, FieldError> {
    match value {
        Value::Number(n) => n
            .as_f64()
            .ok_or_else(|| FieldError::new(name, "Input should be a valid number", "float_type")),
        Value::Bool(b) => Ok(if *b { 1.0 } else { 0.0 }),
        Value::String(s) => s.trim().parse::<f64>().map_err(|_| {
            FieldError::new(
                name,
                "Input should be a valid number, unable to parse string as a number",
                "float_parsing",
            )
        }),
        _ => Err(FieldError::new(
            name,
            "Input should be a valid number",
            "float_type",
        )),
    }
}

fn int_field(name: &str, value: &Value) -> Result<i64, FieldError> {
    match value {
        Value::Number(n) => {
            if let Some(v) = n.as_i64() {
                return Ok(v);
            }
            match n.as_f64() {
                Some(v) if v.fract() == 0.0 && v >= i64::MIN as f64 && v < i64::MAX as f64 => {
                    Ok(v as i64)
                }
                _ => Err(FieldError::new(
                    name,
                    "Input should be a valid integer, got a number with a fractional part",
                    "int_from_float",
                )),
            }
        }
        Value::Bool(b) => Ok(i64::from(*b)),
        Value::String(s) => s.trim().parse::<i64>().map_err(|_| {
            FieldError::new(
                name,
                "Input should be a valid integer, unable to parse string as an integer",
                "int_parsing",
            )
        }),
        _ => Err(FieldError::new(
            name,
            "Input should be a valid integer",
            "int_type",
        )),
    }
}
