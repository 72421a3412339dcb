//! Document fixtures.

use std::sync::Arc;

use serde_json::{Value, json};

use helios_index::types::DocumentEnvelope;
use helios_index::{IndexerConfig, InMemoryLookup, Indexer, Projector, SchemaTable};

/// Base URL used throughout the tests.
pub const BASE_URL: &str = "https://ex.org/fhir/";

/// A patient fixture.
#[derive(Debug, Clone)]
pub struct PatientFixture {
    /// Patient ID.
    pub id: String,
    /// Family name.
    pub family: String,
    /// Given names.
    pub given: Vec<String>,
    /// Birth date.
    pub birth_date: Option<String>,
    /// Managing organization reference.
    pub organization_ref: Option<String>,
}

impl PatientFixture {
    /// Creates a patient with an id and family name.
    pub fn new(id: impl Into<String>, family: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            family: family.into(),
            given: Vec::new(),
            birth_date: None,
            organization_ref: None,
        }
    }

    /// Sets given names.
    pub fn with_given(mut self, given: &[&str]) -> Self {
        self.given = given.iter().map(|g| g.to_string()).collect();
        self
    }

    /// Sets the birth date.
    pub fn with_birth_date(mut self, date: impl Into<String>) -> Self {
        self.birth_date = Some(date.into());
        self
    }

    /// Sets the managing organization.
    pub fn with_organization(mut self, reference: impl Into<String>) -> Self {
        self.organization_ref = Some(reference.into());
        self
    }

    /// Builds the JSON document.
    pub fn build(&self) -> Value {
        let mut patient = json!({
            "resourceType": "Patient",
            "id": self.id,
            "name": [{"family": self.family, "given": self.given}],
        });
        if let Some(birth_date) = &self.birth_date {
            patient["birthDate"] = json!(birth_date);
        }
        if let Some(reference) = &self.organization_ref {
            patient["managingOrganization"] = json!({"reference": reference});
        }
        patient
    }

    /// Builds the envelope.
    pub fn envelope(&self) -> DocumentEnvelope {
        DocumentEnvelope::from_json(&self.build())
    }
}

/// An observation about `subject` with a quantity value given as raw JSON
/// text, so the literal keeps its scale.
pub fn observation_with_quantity(id: &str, subject: &str, value: &str, unit: &str) -> DocumentEnvelope {
    DocumentEnvelope::new(format!(
        r#"{{
            "resourceType": "Observation",
            "id": "{id}",
            "status": "final",
            "code": {{"coding": [{{"system": "http://loinc.org", "code": "2345-7"}}]}},
            "subject": {{"reference": "{subject}"}},
            "valueQuantity": {{"value": {value}, "unit": "{unit}"}}
        }}"#
    ))
}

/// An observation with an effective period.
pub fn observation_with_period(id: &str, start: &str, end: &str) -> DocumentEnvelope {
    DocumentEnvelope::from_json(&json!({
        "resourceType": "Observation",
        "id": id,
        "status": "final",
        "effectivePeriod": {"start": start, "end": end}
    }))
}

/// An observation with blood-pressure style components.
pub fn blood_pressure(id: &str) -> DocumentEnvelope {
    DocumentEnvelope::new(format!(
        r#"{{
            "resourceType": "Observation",
            "id": "{id}",
            "status": "final",
            "code": {{"coding": [{{"system": "http://loinc.org", "code": "85354-9"}}]}},
            "subject": {{"reference": "Patient/123"}},
            "effectiveDateTime": "2024-03-01T08:30:00+01:00",
            "component": [
                {{
                    "code": {{"coding": [{{"system": "http://loinc.org", "code": "8480-6"}}]}},
                    "valueQuantity": {{"value": 120, "unit": "mmHg", "system": "http://unitsofmeasure.org", "code": "mm[Hg]"}}
                }},
                {{
                    "code": {{"coding": [{{"system": "http://loinc.org", "code": "8462-4"}}]}},
                    "valueQuantity": {{"value": 80, "unit": "mmHg", "system": "http://unitsofmeasure.org", "code": "mm[Hg]"}}
                }}
            ]
        }}"#
    ))
}

/// An encounter with participants and a location.
pub fn encounter(id: &str) -> Value {
    json!({
        "resourceType": "Encounter",
        "id": id,
        "status": "finished",
        "subject": {"reference": "Patient/123"},
        "participant": [{"individual": {"reference": "Practitioner/dr-1"}}],
        "location": [{"location": {"reference": "Location/ward-3"}}],
        "period": {"start": "2024-01-01", "end": "2024-01-03"}
    })
}

/// An organization.
pub fn organization(id: &str, name: &str) -> Value {
    json!({"resourceType": "Organization", "id": id, "name": name})
}

/// A projector over the built-in schema.
pub fn builtin_projector() -> Projector {
    Projector::new(Arc::new(SchemaTable::builtin().expect("builtin schema")))
}

/// A lookup holding `documents`.
pub fn lookup_with(documents: &[Value]) -> Arc<InMemoryLookup> {
    let lookup = InMemoryLookup::new();
    for document in documents {
        lookup.insert_json(document).expect("fixture has type and id");
    }
    Arc::new(lookup)
}

/// An indexer over the built-in schema chaining through `documents`.
pub fn chaining_indexer(documents: &[Value], max_chain_depth: usize) -> Indexer {
    let config = IndexerConfig {
        max_chain_depth,
        ..IndexerConfig::with_base_url(BASE_URL)
    };
    Indexer::new(Arc::new(SchemaTable::builtin().expect("builtin schema")), config)
        .expect("valid config")
        .with_lookup(lookup_with(documents))
}
