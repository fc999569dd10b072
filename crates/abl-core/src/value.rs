//! Helpers for the JSON values flowing through assignments.
//!
//! Every assigned parameter, operator argument and hashing unit is a
//! [`serde_json::Value`]. The helpers here pin down how those values are
//! rendered into hash input and coerced into numbers, so that the same
//! inputs hash identically on every platform.

use serde_json::{Map, Value};

use crate::errors::{AblError, ErrorInfo};
use crate::serde::to_canonical_json_string;

/// Input data handed to experiments and namespaces (e.g. `{"userid": 42}`).
pub type Inputs = Map<String, Value>;

/// Renders a scalar the way it is fed into the salted hash.
///
/// Strings are used verbatim, integers in decimal, integral floats without a
/// fractional part, `true` as `"1"` and both `false` and `null` as the empty
/// string. Arrays and objects fall back to canonical compact JSON.
pub fn hash_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Bool(true) => "1".to_string(),
        Value::Bool(false) => String::new(),
        Value::String(s) => s.clone(),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                number.as_f64().map(format_float).unwrap_or_default()
            }
        }
        Value::Array(_) | Value::Object(_) => to_canonical_json_string(value),
    }
}

fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}

/// Splits a unit into the ordered parts that are joined for hashing.
///
/// Arrays contribute their elements, objects their values in key order and
/// scalars themselves.
pub fn unit_parts(unit: &Value) -> Vec<Value> {
    match unit {
        Value::Array(items) => items.clone(),
        Value::Object(map) => map.values().cloned().collect(),
        other => vec![other.clone()],
    }
}

/// Coerces a JSON number into `f64`, rejecting every other shape.
pub fn as_number(value: &Value, name: &str) -> Result<f64, AblError> {
    value.as_f64().ok_or_else(|| {
        AblError::Operator(
            ErrorInfo::new("non-numeric-range", format!("'{name}' must be a number"))
                .with_context("argument", name)
                .with_context("value", hash_string(value)),
        )
    })
}

/// Coerces a JSON number with no fractional part into `i64`.
pub fn as_integer(value: &Value, name: &str) -> Result<i64, AblError> {
    if let Some(int) = value.as_i64() {
        return Ok(int);
    }
    match value.as_f64() {
        Some(float) if float.fract() == 0.0 && float.abs() < i64::MAX as f64 => Ok(float as i64),
        _ => Err(AblError::Operator(
            ErrorInfo::new(
                "non-numeric-range",
                format!("'{name}' must be an integer"),
            )
            .with_context("argument", name)
            .with_context("value", hash_string(value)),
        )),
    }
}
