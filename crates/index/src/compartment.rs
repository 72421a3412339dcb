//! Compartment inference.
//!
//! A reference whose target looks like a compartment-defining type also
//! places the document in that compartment: `subject` = `Patient/123` gives
//! an implicit `patient` = `Patient/123`. The check is a case-sensitive
//! substring match on the reference and never resolves it.

use serde::{Deserialize, Serialize};

use crate::types::{Entry, EntryValue};

/// One marker: a type-name substring and the parameter it implies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompartmentMarker {
    /// Substring looked for in the absolute reference (e.g. `Patient`).
    pub marker: String,
    /// Implied parameter name (e.g. `patient`).
    pub parameter: String,
}

impl CompartmentMarker {
    /// Creates a marker.
    pub fn new(marker: impl Into<String>, parameter: impl Into<String>) -> Self {
        Self {
            marker: marker.into(),
            parameter: parameter.into(),
        }
    }
}

/// Returns the default markers. Each marker is checked on its own, so a
/// reference may match several.
pub fn default_markers() -> Vec<CompartmentMarker> {
    [
        ("Patient", "patient"),
        ("Practitioner", "practitioner"),
        ("Encounter", "encounter"),
        ("Location", "location"),
        ("RelatedPerson", "relatedperson"),
        ("Device", "device"),
    ]
    .into_iter()
    .map(|(marker, parameter)| CompartmentMarker::new(marker, parameter))
    .collect()
}

/// Derives implicit compartment entries from reference entries.
#[derive(Debug, Clone)]
pub struct CompartmentResolver {
    markers: Vec<CompartmentMarker>,
}

impl Default for CompartmentResolver {
    fn default() -> Self {
        Self::new(default_markers())
    }
}

impl CompartmentResolver {
    /// Creates a resolver with the given markers.
    pub fn new(markers: Vec<CompartmentMarker>) -> Self {
        Self { markers }
    }

    /// Returns the configured markers.
    pub fn markers(&self) -> &[CompartmentMarker] {
        &self.markers
    }

    /// Returns the implicit entries for one reference entry.
    ///
    /// Non-reference entries yield nothing. No entry is emitted under the
    /// entry's own parameter name, so `patient` = `Patient/1` does not
    /// produce a second `patient`.
    pub fn infer(&self, entry: &Entry) -> Vec<Entry> {
        let EntryValue::Reference { reference } = &entry.value else {
            return Vec::new();
        };

        let mut inferred: Vec<Entry> = Vec::new();
        for marker in &self.markers {
            if !reference.contains(marker.marker.as_str())
                || marker.parameter == entry.parameter_name
                || inferred.iter().any(|e| e.parameter_name == marker.parameter)
            {
                continue;
            }
            inferred.push(Entry {
                parameter_name: marker.parameter.clone(),
                value: entry.value.clone(),
                source_document_id: entry.source_document_id.clone(),
                chain_depth: entry.chain_depth,
            });
        }
        inferred
    }

    /// Appends inferred entries for every reference in `entries`, skipping
    /// entries already present.
    pub fn augment(&self, entries: &mut Vec<Entry>) {
        let mut extra: Vec<Entry> = Vec::new();
        for entry in entries.iter() {
            for inferred in self.infer(entry) {
                if !entries.contains(&inferred) && !extra.contains(&inferred) {
                    extra.push(inferred);
                }
            }
        }
        entries.extend(extra);
    }
}
