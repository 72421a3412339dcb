//! String encoding.

use serde_json::Value;

use crate::error::ValueError;
use crate::path::Node;
use crate::types::EntryValue;

use super::token::json_type;

// HumanName and Address parts, in reading order
const FRAGMENT_KEYS: &[&str] = &[
    "prefix",
    "given",
    "family",
    "suffix",
    "line",
    "city",
    "district",
    "state",
    "postalCode",
    "country",
];

/// Encodes text as a single string value.
///
/// Plain strings are used as is. A `HumanName` or `Address` uses its `text`
/// when present, otherwise its parts in reading order. Fragments are
/// trimmed and joined by single spaces.
pub fn encode(node: &Node<'_>) -> Result<Vec<EntryValue>, ValueError> {
    let fragments = match node.value {
        Value::String(s) => vec![s.as_str()],
        Value::Object(obj) => {
            if let Some(text) = obj.get("text").and_then(Value::as_str)
                && !text.trim().is_empty()
            {
                vec![text]
            } else {
                let mut parts = Vec::new();
                for key in FRAGMENT_KEYS {
                    match obj.get(*key) {
                        Some(Value::String(s)) => parts.push(s.as_str()),
                        Some(Value::Array(items)) => {
                            parts.extend(items.iter().filter_map(Value::as_str))
                        }
                        _ => {}
                    }
                }
                if parts.is_empty()
                    && let Some(display) = obj.get("display").and_then(Value::as_str)
                {
                    parts.push(display);
                }
                parts
            }
        }
        other => {
            return Err(ValueError::new(format!(
                "cannot encode {} as string",
                json_type(other)
            )));
        }
    };

    Ok(join_fragments(&fragments)
        .map(|s| vec![EntryValue::String(s)])
        .unwrap_or_default())
}

/// Joins text fragments by single spaces, collapsing inner whitespace.
/// Returns `None` when nothing but whitespace remains.
pub fn join_fragments(fragments: &[&str]) -> Option<String> {
    let joined = fragments
        .iter()
        .flat_map(|f| f.split_whitespace())
        .collect::<Vec<_>>()
        .join(" ");
    (!joined.is_empty()).then_some(joined)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn encode_json(value: &Value) -> Vec<EntryValue> {
        encode(&Node {
            value,
            choice: None,
        })
        .unwrap()
    }

    #[test]
    fn test_plain_string_trimmed() {
        assert_eq!(
            encode_json(&json!("  General   Hospital ")),
            vec![EntryValue::String("General Hospital".into())]
        );
        assert!(encode_json(&json!("   ")).is_empty());
    }

    #[test]
    fn test_human_name_parts() {
        let value = json!({"family": "Smith", "given": ["John", "Q"], "prefix": ["Dr."]});
        assert_eq!(
            encode_json(&value),
            vec![EntryValue::String("Dr. John Q Smith".into())]
        );
    }

    #[test]
    fn test_text_preferred() {
        let value = json!({"text": "John Smith", "family": "Smith"});
        assert_eq!(
            encode_json(&value),
            vec![EntryValue::String("John Smith".into())]
        );
    }

    #[test]
    fn test_address() {
        let value = json!({
            "line": ["1 Main St", "Apt 2"],
            "city": "Springfield",
            "state": "IL",
            "postalCode": "62701"
        });
        assert_eq!(
            encode_json(&value),
            vec![EntryValue::String("1 Main St Apt 2 Springfield IL 62701".into())]
        );
    }

    #[test]
    fn test_number_rejected() {
        let value = json!(1);
        assert!(
            encode(&Node {
                value: &value,
                choice: None
            })
            .is_err()
        );
    }
}
