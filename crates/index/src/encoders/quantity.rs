//! Quantity encoding.

use serde_json::{Map, Value};

use crate::error::ValueError;
use crate::path::{ChoiceType, Node};
use crate::types::EntryValue;

use super::number::parse_number;
use super::token::json_type;

/// System URI for `Money.currency` codes.
pub const CURRENCY_SYSTEM: &str = "urn:iso:std:iso:4217";

/// Encodes a `Quantity` (or `Age`, `Duration`, `Money`).
///
/// The code falls back to the display unit when no coded unit is given.
/// A quantity without a value yields nothing.
pub fn encode(node: &Node<'_>) -> Result<Vec<EntryValue>, ValueError> {
    let Value::Object(obj) = node.value else {
        return Err(ValueError::new(format!(
            "cannot encode {} as quantity",
            json_type(node.value)
        )));
    };

    if node.choice_type() == Some(ChoiceType::Range) || obj.contains_key("low") {
        return Err(ValueError::new("Range values are not quantities"));
    }

    let Some(raw) = obj.get("value") else {
        return Ok(Vec::new());
    };
    let Value::Number(number) = raw else {
        return Err(ValueError::new(format!(
            "quantity value is a {}",
            json_type(raw)
        )));
    };
    let value = parse_number(number)?;

    let is_money = node.choice_type() == Some(ChoiceType::Money) || obj.contains_key("currency");
    if is_money {
        return Ok(vec![EntryValue::Quantity {
            value,
            system: Some(CURRENCY_SYSTEM.to_string()),
            code: text(obj, "currency"),
            unit: None,
            comparator: None,
        }]);
    }

    let unit = text(obj, "unit");
    Ok(vec![EntryValue::Quantity {
        value,
        system: text(obj, "system"),
        code: text(obj, "code").or_else(|| unit.clone()),
        unit,
        comparator: text(obj, "comparator"),
    }])
}

fn text(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PreciseDecimal;
    use serde_json::json;

    fn encode_str(raw: &str) -> Result<Vec<EntryValue>, ValueError> {
        let value: Value = serde_json::from_str(raw).unwrap();
        encode(&Node {
            value: &value,
            choice: None,
        })
    }

    #[test]
    fn test_unit_fallback_and_scale() {
        let values = encode_str(r#"{"value": 5.0, "unit": "mg", "code": null}"#).unwrap();
        assert_eq!(values.len(), 1);
        let EntryValue::Quantity {
            value, code, unit, ..
        } = &values[0]
        else {
            panic!("expected quantity");
        };
        assert_eq!(value.to_string(), "5.0");
        assert_eq!(code.as_deref(), Some("mg"));
        assert_eq!(unit.as_deref(), Some("mg"));
    }

    #[test]
    fn test_ucum_quantity_with_comparator() {
        let values = encode_str(
            r#"{"value": 120, "comparator": "<", "unit": "mmHg", "system": "http://unitsofmeasure.org", "code": "mm[Hg]"}"#,
        )
        .unwrap();
        assert_eq!(
            values[0],
            EntryValue::Quantity {
                value: PreciseDecimal::from(120),
                system: Some("http://unitsofmeasure.org".into()),
                code: Some("mm[Hg]".into()),
                unit: Some("mmHg".into()),
                comparator: Some("<".into()),
            }
        );
    }

    #[test]
    fn test_money() {
        let values = encode_str(r#"{"value": 10.25, "currency": "USD"}"#).unwrap();
        assert_eq!(
            values[0],
            EntryValue::Quantity {
                value: "10.25".parse().unwrap(),
                system: Some(CURRENCY_SYSTEM.into()),
                code: Some("USD".into()),
                unit: None,
                comparator: None,
            }
        );
    }

    #[test]
    fn test_value_beyond_fixed_precision() {
        let values = encode_str(
            r#"{"value": 0.12345678901234567890123456789012, "unit": "mg"}"#,
        )
        .unwrap();
        assert_eq!(
            values[0].primary().as_deref(),
            Some("0.12345678901234567890123456789012")
        );

        let values = encode_str(r#"{"value": 123456789012345678901234567890, "code": "g"}"#).unwrap();
        assert_eq!(
            values[0].primary().as_deref(),
            Some("123456789012345678901234567890")
        );
    }

    #[test]
    fn test_missing_value_absent() {
        assert!(encode_str(r#"{"unit": "mg"}"#).unwrap().is_empty());
    }

    #[test]
    fn test_non_numeric_value() {
        assert!(encode_str(r#"{"value": "five"}"#).is_err());
        assert!(encode_str(r#"{"low": {"value": 1}}"#).is_err());
    }
}
