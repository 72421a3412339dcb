//! Token encoding.

use serde_json::{Map, Value};

use crate::error::ValueError;
use crate::path::{ChoiceType, Node};
use crate::types::EntryValue;

/// Encodes a coded node as tokens.
///
/// A `CodeableConcept` yields one token per coding; the concept's `text` is
/// carried as display when a coding has none. A concept with text only
/// yields nothing.
pub fn encode(node: &Node<'_>) -> Result<Vec<EntryValue>, ValueError> {
    match node.value {
        Value::String(s) => Ok(non_blank(s)
            .map(|code| vec![EntryValue::token(code, None, None)])
            .unwrap_or_default()),
        Value::Bool(b) => Ok(vec![EntryValue::token(b.to_string(), None, None)]),
        Value::Number(n) => Ok(vec![EntryValue::token(n.to_string(), None, None)]),
        Value::Object(obj) => encode_object(obj, node.choice_type()),
        other => Err(ValueError::new(format!(
            "cannot encode {} as token",
            json_type(other)
        ))),
    }
}

fn encode_object(
    obj: &Map<String, Value>,
    choice: Option<ChoiceType>,
) -> Result<Vec<EntryValue>, ValueError> {
    let looks_like = match choice {
        Some(ChoiceType::CodeableConcept) => ChoiceType::CodeableConcept,
        Some(ChoiceType::Coding) => ChoiceType::Coding,
        Some(ChoiceType::Identifier) => ChoiceType::Identifier,
        _ if obj.contains_key("coding") || (obj.contains_key("text") && !obj.contains_key("code")) => {
            ChoiceType::CodeableConcept
        }
        _ if obj.contains_key("code") => ChoiceType::Coding,
        _ if obj.contains_key("value") => ChoiceType::Identifier,
        // Reference.identifier
        _ if obj.contains_key("identifier") => {
            return match obj.get("identifier") {
                Some(Value::Object(identifier)) => encode_object(identifier, None),
                _ => Ok(Vec::new()),
            };
        }
        _ => {
            return Err(ValueError::new(
                "object has no coding, code or value to encode as token",
            ));
        }
    };

    let tokens = match looks_like {
        ChoiceType::CodeableConcept => {
            let text = str_field(obj, "text");
            obj.get("coding")
                .and_then(Value::as_array)
                .map(|codings| {
                    codings
                        .iter()
                        .filter_map(Value::as_object)
                        .filter_map(|coding| coding_token(coding, text))
                        .collect()
                })
                .unwrap_or_default()
        }
        ChoiceType::Coding => coding_token(obj, None).into_iter().collect(),
        _ => identifier_token(obj).into_iter().collect(),
    };

    Ok(tokens)
}

fn coding_token(coding: &Map<String, Value>, fallback_text: Option<&str>) -> Option<EntryValue> {
    let code = str_field(coding, "code")?;
    let display = str_field(coding, "display").or(fallback_text);
    Some(EntryValue::token(
        code,
        str_field(coding, "system").map(String::from),
        display.map(String::from),
    ))
}

// Identifier and ContactPoint both carry `value` with an optional `system`
fn identifier_token(obj: &Map<String, Value>) -> Option<EntryValue> {
    let value = str_field(obj, "value")?;
    let text = obj
        .get("type")
        .and_then(|t| t.get("text"))
        .and_then(Value::as_str)
        .and_then(non_blank);
    Some(EntryValue::token(
        value,
        str_field(obj, "system").map(String::from),
        text.map(String::from),
    ))
}

fn str_field<'a>(obj: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(Value::as_str).and_then(non_blank)
}

fn non_blank(s: &str) -> Option<&str> {
    let trimmed = s.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub(crate) fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
