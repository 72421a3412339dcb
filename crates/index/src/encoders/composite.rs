//! Composite encoding.
//!
//! A composite value joins one encoded part per component with `$`:
//!
//! | Component kind | Part |
//! |----------------|------|
//! | token | `system|code` (empty system when absent) |
//! | quantity | `value|system|code` |
//! | date | UTC value (period start, else end) |
//! | reference | absolute reference |
//! | string, number | the value |
//!
//! When a component repeats, every combination is emitted, in document
//! order, up to a caller-supplied cap.

use crate::error::ValueError;
use crate::path::Node;
use crate::schema::Component;
use crate::types::{EntryKind, EntryValue};

use super::EncodeContext;

/// Separator between composite parts.
pub const PART_SEPARATOR: &str = "$";

/// Encodes the composite rooted at `root`. If any component has no value,
/// nothing is emitted.
pub fn encode(
    root: &Node<'_>,
    components: &[Component],
    ctx: &EncodeContext<'_>,
    max_tuples: usize,
) -> Result<Vec<EntryValue>, ValueError> {
    if components.len() < 2 {
        return Err(ValueError::new("a composite needs at least two components"));
    }

    let mut columns: Vec<Vec<String>> = Vec::with_capacity(components.len());
    for component in components {
        if component.kind == EntryKind::Composite {
            return Err(ValueError::new("composite components cannot be composite"));
        }

        let mut parts = Vec::new();
        for node in component.path.select(root.value) {
            for value in super::encode(component.kind, &node, ctx)? {
                parts.extend(part(&value));
            }
        }
        if parts.is_empty() {
            return Ok(Vec::new());
        }
        columns.push(parts);
    }

    let mut tuples: Vec<Vec<&str>> = vec![Vec::new()];
    for column in &columns {
        let mut next = Vec::with_capacity(tuples.len() * column.len());
        'outer: for prefix in &tuples {
            for part in column {
                if next.len() == max_tuples {
                    break 'outer;
                }
                let mut tuple = prefix.clone();
                tuple.push(part.as_str());
                next.push(tuple);
            }
        }
        tuples = next;
    }

    Ok(tuples
        .into_iter()
        .map(|tuple| EntryValue::Composite(tuple.join(PART_SEPARATOR)))
        .collect())
}

/// Renders one encoded component value as a composite part.
pub fn part(value: &EntryValue) -> Option<String> {
    match value {
        EntryValue::Token { code, system, .. } => {
            Some(format!("{}|{}", system.as_deref().unwrap_or(""), code))
        }
        EntryValue::Quantity {
            value,
            system,
            code,
            ..
        } => Some(format!(
            "{}|{}|{}",
            value,
            system.as_deref().unwrap_or(""),
            code.as_deref().unwrap_or("")
        )),
        EntryValue::Period { start, end, .. } => start.clone().or_else(|| end.clone()),
        other => other.primary(),
    }
}
