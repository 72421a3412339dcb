//! Number encoding and decimal parsing.

use serde_json::{Number, Value};

use crate::error::ValueError;
use crate::path::Node;
use crate::types::{EntryValue, PreciseDecimal};

use super::token::json_type;

/// Encodes a decimal or integer primitive.
pub fn encode(node: &Node<'_>) -> Result<Vec<EntryValue>, ValueError> {
    match node.value {
        Value::Number(n) => Ok(vec![EntryValue::Number(parse_number(n)?)]),
        Value::String(s) if s.trim().is_empty() => Ok(Vec::new()),
        Value::String(s) => Ok(vec![EntryValue::Number(parse_decimal(s)?)]),
        other => Err(ValueError::new(format!(
            "cannot encode {} as number",
            json_type(other)
        ))),
    }
}

/// Parses a JSON number, keeping every digit it was written with.
pub fn parse_number(n: &Number) -> Result<PreciseDecimal, ValueError> {
    PreciseDecimal::from_number(n)
}

/// Parses decimal text. Exponent forms (`1.5e3`) are accepted.
pub fn parse_decimal(s: &str) -> Result<PreciseDecimal, ValueError> {
    PreciseDecimal::parse(s)
}
