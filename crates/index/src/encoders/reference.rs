//! Reference encoding.

use serde_json::Value;

use crate::error::ValueError;
use crate::path::Node;
use crate::types::EntryValue;

use super::token::json_type;

/// Encodes a `Reference` object or a canonical/uri string as an absolute
/// reference. References with only an identifier or display yield nothing.
pub fn encode(node: &Node<'_>, base_url: &str) -> Result<Vec<EntryValue>, ValueError> {
    let raw = match node.value {
        Value::String(s) => Some(s.as_str()),
        Value::Object(obj) => obj.get("reference").and_then(Value::as_str),
        other => {
            return Err(ValueError::new(format!(
                "cannot encode {} as reference",
                json_type(other)
            )));
        }
    };

    Ok(raw
        .map(str::trim)
        .filter(|r| !r.is_empty())
        .map(|r| vec![EntryValue::reference(absolutize(base_url, r))])
        .unwrap_or_default())
}

/// Makes `reference` absolute against `base_url`.
///
/// `http(s)://` and `urn:` references are already absolute; `#` fragments
/// point into the containing document and are kept as written.
pub fn absolutize(base_url: &str, reference: &str) -> String {
    if is_absolute(reference) || reference.starts_with('#') || base_url.is_empty() {
        return reference.to_string();
    }

    let relative = reference.trim_start_matches('/');
    if base_url.ends_with('/') {
        format!("{}{}", base_url, relative)
    } else {
        format!("{}/{}", base_url, relative)
    }
}

/// Returns true for references that need no base URL.
pub fn is_absolute(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("urn:")
}
