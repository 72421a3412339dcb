//! Projection behavior over the built-in schema.

mod common;

use chrono::DateTime;
use serde_json::json;

use common::*;
use helios_index::types::{DocumentEnvelope, EntryKind, EntryValue, PERIOD_TAG};
use helios_index::{ChainContext, ProjectionError};

#[test]
fn test_subject_reference_yields_patient_compartment() {
    let projection = builtin_projector()
        .project(
            &observation_with_quantity("obs-1", "Patient/123", "5.0", "mg"),
            BASE_URL,
            None,
        )
        .unwrap();

    let subject = assert_single(&projection, "subject");
    assert_eq!(subject.kind(), EntryKind::Reference);
    assert_reference(subject, "https://ex.org/fhir/Patient/123");

    let patient = assert_single(&projection, "patient");
    assert_reference(patient, "https://ex.org/fhir/Patient/123");
}

#[test]
fn test_quantity_unit_falls_back_to_code() {
    let projection = builtin_projector()
        .project(
            &observation_with_quantity("obs-1", "Patient/123", "5.0", "mg"),
            BASE_URL,
            None,
        )
        .unwrap();

    let quantity = assert_single(&projection, "value-quantity");
    let record = quantity.to_record();
    assert_eq!(record.kind, EntryKind::Quantity);
    assert_eq!(record.value.as_deref(), Some("5.0"));
    assert_eq!(record.unit.as_deref(), Some("mg"));
    assert_eq!(record.code.as_deref(), Some("mg"));
    assert!(record.system.is_none());
}

#[test]
fn test_period_is_one_entry() {
    let projection = builtin_projector()
        .project(
            &observation_with_period("obs-2", "2020-01-01T00:00Z", "2020-01-02T00:00Z"),
            BASE_URL,
            None,
        )
        .unwrap();

    let date = assert_single(&projection, "date");
    let record = date.to_record();
    assert_eq!(record.tag.as_deref(), Some(PERIOD_TAG));
    assert_eq!(record.range_start.as_deref(), Some("2020-01-01T00:00:00.000Z"));
    assert_eq!(record.range_end.as_deref(), Some("2020-01-02T00:00:00.000Z"));
    assert!(record.value.is_none());
    assert!(!record.is_composite);
}

#[test]
fn test_partial_period_end_covers_whole_day() {
    let projection = builtin_projector()
        .project(&DocumentEnvelope::from_json(&encounter("enc-1")), BASE_URL, None)
        .unwrap();

    match &assert_single(&projection, "date").value {
        EntryValue::Period { start, end, .. } => {
            assert_eq!(start.as_deref(), Some("2024-01-01T00:00:00.000Z"));
            assert_eq!(end.as_deref(), Some("2024-01-03T23:59:59.999Z"));
        }
        other => panic!("expected a period, got {:?}", other),
    }
}

#[test]
fn test_date_round_trip() {
    let projection = builtin_projector()
        .project(&blood_pressure("bp-1"), BASE_URL, None)
        .unwrap();

    match &assert_single(&projection, "date").value {
        EntryValue::Instant { utc, local } => {
            assert_eq!(utc, "2024-03-01T07:30:00.000Z");
            assert_eq!(local, "2024-03-01T08:30:00.000+01:00");
            let from_utc = DateTime::parse_from_rfc3339(utc).unwrap();
            let from_local = DateTime::parse_from_rfc3339(local).unwrap();
            assert_eq!(from_utc, from_local);
        }
        other => panic!("expected an instant, got {:?}", other),
    }
}

#[test]
fn test_determinism() {
    let projector = builtin_projector();
    let document = blood_pressure("bp-1");
    let first = projector.project(&document, BASE_URL, None).unwrap();
    let second = projector.project(&document, BASE_URL, None).unwrap();
    assert_eq!(multiset(&first.entries), multiset(&second.entries));
    assert_eq!(first.entries, second.entries);
}

#[test]
fn test_sparsity() {
    let projection = builtin_projector()
        .project(
            &PatientFixture::new("p1", "Smith").envelope(),
            BASE_URL,
            None,
        )
        .unwrap();

    for absent in ["birthdate", "organization", "gender", "telecom", "address", "_lastUpdated"] {
        assert_absent(&projection, absent);
    }
    assert_single(&projection, "family");
}

#[test]
fn test_component_composites_keep_document_order() {
    let projector = builtin_projector();
    let projection = projector.project(&blood_pressure("bp-1"), BASE_URL, None).unwrap();

    let composites: Vec<String> = projection
        .entries_named("component-code-value-quantity")
        .map(|e| e.primary_value().unwrap())
        .collect();
    assert_eq!(
        composites,
        vec![
            "http://loinc.org|8480-6$120|http://unitsofmeasure.org|mm[Hg]".to_string(),
            "http://loinc.org|8462-4$80|http://unitsofmeasure.org|mm[Hg]".to_string(),
        ]
    );
    assert!(
        projection
            .entries_named("component-code-value-quantity")
            .all(|e| e.is_composite())
    );

    // identical strings on a second run
    let again = projector.project(&blood_pressure("bp-1"), BASE_URL, None).unwrap();
    let repeated: Vec<String> = again
        .entries_named("component-code-value-quantity")
        .map(|e| e.primary_value().unwrap())
        .collect();
    assert_eq!(composites, repeated);
}

#[test]
fn test_composite_needs_every_component() {
    // no value[x], so code-value-quantity has nothing to pair with
    let projection = builtin_projector()
        .project(&observation_with_period("obs-3", "2020-01-01", "2020-01-02"), BASE_URL, None)
        .unwrap();
    assert_absent(&projection, "code-value-quantity");
}

#[test]
fn test_encounter_compartments() {
    let projection = builtin_projector()
        .project(&DocumentEnvelope::from_json(&encounter("enc-1")), BASE_URL, None)
        .unwrap();

    assert_reference(assert_single(&projection, "patient"), "https://ex.org/fhir/Patient/123");
    assert_reference(
        assert_single(&projection, "practitioner"),
        "https://ex.org/fhir/Practitioner/dr-1",
    );
    assert_reference(
        assert_single(&projection, "location"),
        "https://ex.org/fhir/Location/ward-3",
    );
}

#[test]
fn test_absolute_references_are_kept() {
    let projection = builtin_projector()
        .project(
            &DocumentEnvelope::from_json(&json!({
                "resourceType": "Observation",
                "id": "obs-4",
                "subject": {"reference": "http://other.org/fhir/Patient/9"}
            })),
            BASE_URL,
            None,
        )
        .unwrap();
    assert_reference(assert_single(&projection, "subject"), "http://other.org/fhir/Patient/9");
}

#[test]
fn test_universal_entries_and_envelope_tags() {
    let envelope = PatientFixture::new("p1", "Smith")
        .envelope()
        .with_tag(helios_index::types::Tag::new(Some("http://ex.org/source".into()), "import"))
        .with_last_modified("2024-05-01T12:00:00Z");

    let projection = builtin_projector().project(&envelope, BASE_URL, None).unwrap();
    match &assert_single(&projection, "_id").value {
        EntryValue::Token { code, .. } => assert_eq!(code, "p1"),
        other => panic!("expected a token, got {:?}", other),
    }
    assert_single(&projection, "_tag");
    assert_single(&projection, "_lastUpdated");
}

#[test]
fn test_chain_context_prefixes_every_name() {
    let ctx = ChainContext::new(BASE_URL, "subject");
    let projection = builtin_projector()
        .project(
            &PatientFixture::new("123", "Smith")
                .with_given(&["Ann"])
                .with_birth_date("1980-02-03")
                .envelope(),
            BASE_URL,
            Some(&ctx),
        )
        .unwrap();

    assert!(!projection.entries.is_empty());
    assert!(
        projection
            .entries
            .iter()
            .all(|e| e.parameter_name.starts_with("subject.") && e.chain_depth == 1)
    );
    assert_single(&projection, "subject.birthdate");
    // chaining is not triggered from inside a chained projection
    assert_no_prefix(&projection, "subject.organization");
}

#[test]
fn test_unsupported_type_is_fatal() {
    let err = builtin_projector()
        .project(
            &DocumentEnvelope::from_json(&json!({"resourceType": "Widget", "id": "w1"})),
            BASE_URL,
            None,
        )
        .unwrap_err();
    assert!(matches!(err, ProjectionError::UnsupportedType { .. }));
}

#[test]
fn test_parse_failure_is_fatal() {
    let err = builtin_projector()
        .project(&DocumentEnvelope::new(&b"\xff\xfe"[..]), BASE_URL, None)
        .unwrap_err();
    assert!(matches!(err, ProjectionError::Parse { .. }));
}

#[test]
fn test_quantity_scale_is_preserved() {
    let projection = builtin_projector()
        .project(
            &observation_with_quantity("obs-5", "Patient/1", "1.500", "g"),
            BASE_URL,
            None,
        )
        .unwrap();
    match &assert_single(&projection, "value-quantity").value {
        EntryValue::Quantity { value, .. } => {
            assert_eq!(value.to_string(), "1.500");
            assert_eq!(value.scale(), 3);
            assert_eq!(value.to_decimal(), "1.5".parse().ok());
        }
        other => panic!("expected a quantity, got {:?}", other),
    }
}

#[test]
fn test_decimals_wider_than_fixed_precision_are_exact() {
    let document = DocumentEnvelope::new(
        r#"{
            "resourceType": "Observation",
            "id": "obs-wide",
            "status": "final",
            "valueQuantity": {"value": 0.12345678901234567890123456789012, "unit": "mg"},
            "component": [
                {"valueQuantity": {"value": 123456789012345678901234567890, "unit": "g"}}
            ]
        }"#,
    );
    let projection = builtin_projector().project(&document, BASE_URL, None).unwrap();

    assert!(projection.skipped.is_empty(), "{:?}", projection.skipped);
    assert_eq!(
        assert_single(&projection, "value-quantity").primary_value().as_deref(),
        Some("0.12345678901234567890123456789012")
    );
    assert_eq!(
        assert_single(&projection, "component-value-quantity")
            .primary_value()
            .as_deref(),
        Some("123456789012345678901234567890")
    );
}
