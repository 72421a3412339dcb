//! Assertion helpers for projections.

use std::collections::BTreeMap;

use helios_index::types::{Entry, EntryValue};
use helios_index::Projection;

/// Asserts that exactly one entry named `name` exists and returns it.
pub fn assert_single<'a>(projection: &'a Projection, name: &str) -> &'a Entry {
    let entries: Vec<&Entry> = projection
        .entries
        .iter()
        .filter(|e| e.parameter_name == name)
        .collect();
    assert_eq!(
        entries.len(),
        1,
        "Expected one '{}' entry, got {}: {:?}",
        name,
        entries.len(),
        entries
    );
    entries[0]
}

/// Asserts that no entry named `name` exists.
pub fn assert_absent(projection: &Projection, name: &str) {
    let count = projection.entries_named(name).count();
    assert_eq!(count, 0, "Expected no '{}' entries, got {}", name, count);
}

/// Asserts that no entry carries the given chain prefix.
pub fn assert_no_prefix(projection: &Projection, prefix: &str) {
    let dotted = format!("{}.", prefix);
    let found: Vec<&str> = projection
        .entries
        .iter()
        .map(|e| e.parameter_name.as_str())
        .filter(|n| n.starts_with(&dotted))
        .collect();
    assert!(found.is_empty(), "Unexpected '{}' entries: {:?}", dotted, found);
}

/// Asserts that a reference entry points at `expected`.
pub fn assert_reference(entry: &Entry, expected: &str) {
    assert_eq!(
        entry.value,
        EntryValue::reference(expected),
        "Reference mismatch for '{}'",
        entry.parameter_name
    );
}

/// Counts entries per name, for comparing projections as multisets.
pub fn multiset(entries: &[Entry]) -> BTreeMap<Entry, usize> {
    let mut counts = BTreeMap::new();
    for entry in entries {
        *counts.entry(entry.clone()).or_insert(0) += 1;
    }
    counts
}
