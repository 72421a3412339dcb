//! Arbitrary-precision decimal values.
//!
//! FHIR decimals carry their precision in their lexical form (`1.50` is not
//! `1.5`), and they are not bounded to any machine width. [`PreciseDecimal`]
//! keeps the exact digits of the source, checked against the JSON number
//! grammar, with exponent forms rewritten in plain notation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Number;

use crate::error::ValueError;

/// Largest exponent magnitude expanded into plain notation.
pub const MAX_EXPONENT: u64 = 4096;

/// A decimal kept digit for digit, in plain (non-exponential) notation.
///
/// Equality and ordering are lexical: `1.50` and `1.5` are different values.
/// Use [`PreciseDecimal::to_decimal`] for arithmetic.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PreciseDecimal(String);

impl PreciseDecimal {
    /// Parses decimal text. Exponent forms (`1.5e3`) are accepted and
    /// rendered plain (`1500`).
    pub fn parse(s: &str) -> Result<Self, ValueError> {
        let s = s.trim();
        let number: Number = serde_json::from_str(s)
            .map_err(|e| ValueError::new(format!("invalid decimal '{}': {}", s, e)))?;
        Self::from_number(&number)
    }

    /// Takes the lexical form of a JSON number, which `arbitrary_precision`
    /// keeps intact.
    pub fn from_number(number: &Number) -> Result<Self, ValueError> {
        expand_exponent(&number.to_string()).map(PreciseDecimal)
    }

    /// Returns the plain decimal text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the number of digits after the decimal point.
    pub fn scale(&self) -> usize {
        self.0.split_once('.').map_or(0, |(_, fraction)| fraction.len())
    }

    /// Converts to a fixed-precision decimal.
    ///
    /// Returns `None` when the value does not fit 96 bits. Fractions longer
    /// than 28 digits are rounded.
    pub fn to_decimal(&self) -> Option<rust_decimal::Decimal> {
        rust_decimal::Decimal::from_str(&self.0).ok()
    }
}

fn expand_exponent(text: &str) -> Result<String, ValueError> {
    let Some((mantissa, exponent)) = text.split_once(['e', 'E']) else {
        return Ok(text.to_string());
    };

    let exponent: i64 = exponent
        .parse()
        .map_err(|_| ValueError::new(format!("invalid decimal exponent in '{}'", text)))?;
    if exponent.unsigned_abs() > MAX_EXPONENT {
        return Err(ValueError::new(format!(
            "decimal exponent out of range in '{}'",
            text
        )));
    }

    let (sign, mantissa) = match mantissa.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", mantissa),
    };
    let (int, frac) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    let digits = format!("{}{}", int, frac);
    let point = int.len() as i64 + exponent;

    let (whole, fraction) = if point <= 0 {
        (
            String::new(),
            format!("{}{}", "0".repeat(point.unsigned_abs() as usize), digits),
        )
    } else if point as usize >= digits.len() {
        (
            format!("{}{}", digits, "0".repeat(point as usize - digits.len())),
            String::new(),
        )
    } else {
        let (w, f) = digits.split_at(point as usize);
        (w.to_string(), f.to_string())
    };

    let whole = match whole.trim_start_matches('0') {
        "" => "0",
        trimmed => trimmed,
    };
    Ok(if fraction.is_empty() {
        format!("{}{}", sign, whole)
    } else {
        format!("{}{}.{}", sign, whole, fraction)
    })
}

impl FromStr for PreciseDecimal {
    type Err = ValueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for PreciseDecimal {
    type Error = ValueError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<PreciseDecimal> for String {
    fn from(value: PreciseDecimal) -> Self {
        value.0
    }
}

impl From<i64> for PreciseDecimal {
    fn from(value: i64) -> Self {
        PreciseDecimal(value.to_string())
    }
}

impl fmt::Display for PreciseDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
