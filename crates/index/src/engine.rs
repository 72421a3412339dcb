//! Projection engine.
//!
//! [`Projector::project`] turns one document into its entries:
//!
//! 1. parse the envelope body and look up the declared type's schema
//! 2. emit the universal entries (`_id`, `_language`, `_lastUpdated`,
//!    `_tag`, `_profile`, `_security`)
//! 3. run the matching encoder over every node each declared path reaches
//! 4. add implicit compartment entries for references
//! 5. under a chain context, prefix every name and stamp the chain depth
//!
//! Parse failures and unsupported types are fatal. A value that cannot be
//! encoded is skipped, logged and reported in [`Projection::skipped`].
//! The projector never resolves references itself; it records chainable
//! targets for the [`ChainCoordinator`](crate::chain::ChainCoordinator).

use std::collections::HashSet;
use std::sync::Arc;

use chrono::FixedOffset;
use serde_json::Value;
use tracing::{debug, warn};

use crate::compartment::CompartmentResolver;
use crate::config::IndexerConfig;
use crate::encoders::{self, EncodeContext, composite, date};
use crate::error::{ChainError, EncodingError, IndexResult, ProjectionError};
use crate::parser::{DocumentParser, JsonDocumentParser, ParsedDocument};
use crate::path::Node;
use crate::schema::{ParamDef, SchemaTable};
use crate::types::{ChainContext, DocumentEnvelope, Entry, EntryKind, EntryValue, Tag};

/// A chainable reference found during projection.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChainTarget {
    /// Unprefixed parameter name (e.g. `subject`).
    pub param: String,
    /// Absolute reference.
    pub reference: String,
}

/// Result of projecting one document.
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    /// Declared type of the document.
    pub resource_type: String,
    /// Logical id of the document.
    pub document_id: Option<String>,
    /// Produced entries, one per occurrence: two equal values read from
    /// different elements of the document yield two entries. A node matched
    /// by more than one path of a parameter counts once.
    pub entries: Vec<Entry>,
    /// Values that could not be encoded.
    pub skipped: Vec<EncodingError>,
    /// Chainable references, in discovery order.
    pub chain_targets: Vec<ChainTarget>,
    /// Chain steps that failed. Filled in by the chain coordinator.
    pub chain_failures: Vec<ChainError>,
}

impl Projection {
    /// Returns entries with the given parameter name.
    pub fn entries_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Entry> + 'a {
        self.entries.iter().filter(move |e| e.parameter_name == name)
    }

    /// Consumes the projection, returning its entries.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

/// Projects documents into entries using a schema table.
#[derive(Clone)]
pub struct Projector {
    schema: Arc<SchemaTable>,
    parser: Arc<dyn DocumentParser>,
    compartments: CompartmentResolver,
    default_offset: FixedOffset,
    max_composite_tuples: usize,
}

impl std::fmt::Debug for Projector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Projector")
            .field("resource_types", &self.schema.len())
            .field("compartments", &self.compartments.markers().len())
            .field("default_offset", &self.default_offset)
            .field("max_composite_tuples", &self.max_composite_tuples)
            .finish()
    }
}

impl Projector {
    /// Creates a projector with the JSON parser and default compartments.
    pub fn new(schema: Arc<SchemaTable>) -> Self {
        Self {
            schema,
            parser: Arc::new(JsonDocumentParser),
            compartments: CompartmentResolver::default(),
            default_offset: encoders::utc_offset(),
            max_composite_tuples: 64,
        }
    }

    /// Creates a projector from configuration.
    pub fn from_config(schema: Arc<SchemaTable>, config: &IndexerConfig) -> Result<Self, Vec<String>> {
        config.validate()?;
        let offset = config.default_offset().map_err(|e| vec![e])?;
        Ok(Self::new(schema)
            .with_compartments(CompartmentResolver::new(config.compartments.clone()))
            .with_default_offset(offset)
            .with_max_composite_tuples(config.max_composite_tuples))
    }

    /// Replaces the parser.
    pub fn with_parser(mut self, parser: Arc<dyn DocumentParser>) -> Self {
        self.parser = parser;
        self
    }

    /// Replaces the compartment resolver.
    pub fn with_compartments(mut self, compartments: CompartmentResolver) -> Self {
        self.compartments = compartments;
        self
    }

    /// Sets the offset assumed for zone-less timestamps.
    pub fn with_default_offset(mut self, offset: FixedOffset) -> Self {
        self.default_offset = offset;
        self
    }

    /// Caps the combinations emitted per composite root.
    pub fn with_max_composite_tuples(mut self, max: usize) -> Self {
        self.max_composite_tuples = max;
        self
    }

    /// Returns the schema table.
    pub fn schema(&self) -> &SchemaTable {
        &self.schema
    }

    /// Returns the schema table handle.
    pub fn schema_handle(&self) -> Arc<SchemaTable> {
        Arc::clone(&self.schema)
    }

    /// Projects one document.
    pub fn project(
        &self,
        envelope: &DocumentEnvelope,
        base_url: &str,
        chain: Option<&ChainContext>,
    ) -> IndexResult<Projection> {
        let document = self.parser.parse(&envelope.body)?;
        self.project_parsed(&document, envelope, base_url, chain)
    }

    /// Projects an already-parsed document. The envelope supplies tags and
    /// the last-modified fallback; its body is ignored.
    pub fn project_parsed(
        &self,
        document: &ParsedDocument,
        envelope: &DocumentEnvelope,
        base_url: &str,
        chain: Option<&ChainContext>,
    ) -> IndexResult<Projection> {
        let document_id = document.id().map(String::from);
        let resource_type = document
            .resource_type()
            .ok_or_else(|| ProjectionError::MissingResourceType {
                document_id: document_id.clone(),
            })?
            .to_string();

        let schema = self
            .schema
            .get(&resource_type)
            .ok_or_else(|| ProjectionError::UnsupportedType {
                resource_type: resource_type.clone(),
                document_id: document_id.clone(),
            })?;

        validate_envelope(envelope, &resource_type, &document_id, self.default_offset)?;

        let ctx = EncodeContext::new(base_url).with_default_offset(self.default_offset);
        let mut builder = ProjectionBuilder::new(&resource_type, document_id.clone());

        self.universal_entries(document, envelope, &ctx, &mut builder);

        for param in schema.params() {
            if param.kind == EntryKind::Composite {
                self.composite_entries(document, param, &ctx, &mut builder);
            } else {
                self.param_entries(document, param, &ctx, &mut builder);
            }
        }

        let projection = builder.finish(&self.compartments, chain);
        debug!(
            document_type = %projection.resource_type,
            document_id = projection.document_id.as_deref().unwrap_or(""),
            entries = projection.entries.len(),
            skipped = projection.skipped.len(),
            chain_prefix = chain.map(|c| c.originating_parameter_name.as_str()).unwrap_or(""),
            "Projected document"
        );
        Ok(projection)
    }

    fn universal_entries(
        &self,
        document: &ParsedDocument,
        envelope: &DocumentEnvelope,
        ctx: &EncodeContext<'_>,
        builder: &mut ProjectionBuilder,
    ) {
        if let Some(id) = document.id() {
            builder.push("_id", EntryValue::token(id, None, None));
        }
        if let Some(language) = document.language() {
            builder.push("_language", EntryValue::token(language, None, None));
        }

        let (last_updated, field) = match document.last_updated() {
            Some(value) => (Some(value), "meta.lastUpdated"),
            None => (envelope.last_modified.as_deref(), "envelope.last_modified"),
        };
        if let Some(value) = last_updated {
            match date::instant(value, ctx.default_offset) {
                Ok(instant) => builder.push("_lastUpdated", instant),
                Err(e) => builder.skip("_lastUpdated", field, e.to_string()),
            }
        }

        let mut seen: HashSet<(Option<String>, String)> = HashSet::new();
        for tag in document.meta_tags().into_iter().chain(envelope.tags.iter().cloned()) {
            if seen.insert((tag.system.clone(), tag.code.clone())) {
                builder.push("_tag", tag_token(tag));
            }
        }

        for profile in document.profiles() {
            builder.push("_profile", EntryValue::token(profile, None, None));
        }

        for label in document.meta_security() {
            builder.push("_security", tag_token(label));
        }
    }

    fn param_entries(
        &self,
        document: &ParsedDocument,
        param: &ParamDef,
        ctx: &EncodeContext<'_>,
        builder: &mut ProjectionBuilder,
    ) {
        let mut visited: HashSet<*const Value> = HashSet::new();
        for path in &param.paths {
            for node in document.select(path) {
                // a node matched by several paths is one occurrence
                if !visited.insert(std::ptr::from_ref(node.value)) {
                    continue;
                }
                match encoders::encode(param.kind, &node, ctx) {
                    Ok(values) => {
                        if param.chainable {
                            for value in &values {
                                if let EntryValue::Reference { reference } = value
                                    && !reference.starts_with('#')
                                {
                                    builder.chain_target(&param.name, reference);
                                }
                            }
                        }
                        builder.push_occurrence(&param.name, values);
                    }
                    Err(e) => builder.skip(&param.name, path.as_str(), e.to_string()),
                }
            }
        }
    }

    fn composite_entries(
        &self,
        document: &ParsedDocument,
        param: &ParamDef,
        ctx: &EncodeContext<'_>,
        builder: &mut ProjectionBuilder,
    ) {
        let root = Node {
            value: document.root(),
            choice: None,
        };
        let roots: Vec<(Node<'_>, &str)> = if param.paths.is_empty() {
            vec![(root, "")]
        } else {
            param
                .paths
                .iter()
                .flat_map(|p| document.select(p).into_iter().map(move |n| (n, p.as_str())))
                .collect()
        };

        let mut visited: HashSet<*const Value> = HashSet::new();
        for (node, field_path) in roots {
            if !visited.insert(std::ptr::from_ref(node.value)) {
                continue;
            }
            match composite::encode(&node, &param.components, ctx, self.max_composite_tuples) {
                Ok(values) => builder.push_occurrence(&param.name, values),
                Err(e) => builder.skip(&param.name, field_path, e.to_string()),
            }
        }
    }
}

fn tag_token(tag: Tag) -> EntryValue {
    EntryValue::Token {
        code: tag.code,
        system: tag.system,
        text: tag.display,
    }
}

fn validate_envelope(
    envelope: &DocumentEnvelope,
    resource_type: &str,
    document_id: &Option<String>,
    default_offset: FixedOffset,
) -> IndexResult<()> {
    let invalid = |field: &str, message: String| ProjectionError::InvalidEnvelope {
        resource_type: resource_type.to_string(),
        document_id: document_id.clone(),
        field: field.to_string(),
        message,
    };

    if let Some(last_modified) = &envelope.last_modified {
        date::FhirDate::parse(last_modified, default_offset)
            .map_err(|e| invalid("last_modified", e.to_string()))?;
    }

    if envelope.tags.iter().any(|t| t.code.trim().is_empty()) {
        return Err(invalid("tags", "tag code is empty".to_string()));
    }

    Ok(())
}

/// Accumulates entries for one document before they are frozen into a
/// [`Projection`].
struct ProjectionBuilder {
    resource_type: String,
    document_id: Option<String>,
    entries: Vec<Entry>,
    skipped: Vec<EncodingError>,
    chain_targets: Vec<ChainTarget>,
}

impl ProjectionBuilder {
    fn new(resource_type: &str, document_id: Option<String>) -> Self {
        Self {
            resource_type: resource_type.to_string(),
            document_id,
            entries: Vec::new(),
            skipped: Vec::new(),
            chain_targets: Vec::new(),
        }
    }

    fn push(&mut self, param: &str, value: EntryValue) {
        self.entries.push(Entry::new(param, value));
    }

    // Values encoded from one node; repeats within it are kept once
    fn push_occurrence(&mut self, param: &str, values: Vec<EntryValue>) {
        let mut seen: HashSet<&EntryValue> = HashSet::new();
        let unique: Vec<EntryValue> = values
            .iter()
            .filter(|value| seen.insert(*value))
            .cloned()
            .collect();
        for value in unique {
            self.push(param, value);
        }
    }

    fn chain_target(&mut self, param: &str, reference: &str) {
        let target = ChainTarget {
            param: param.to_string(),
            reference: reference.to_string(),
        };
        if !self.chain_targets.contains(&target) {
            self.chain_targets.push(target);
        }
    }

    fn skip(&mut self, param: &str, field_path: &str, message: String) {
        let error = EncodingError {
            param_name: param.to_string(),
            field_path: field_path.to_string(),
            resource_type: self.resource_type.clone(),
            document_id: self.document_id.clone(),
            message,
        };
        warn!(
            document_type = %error.resource_type,
            document_id = error.document_id.as_deref().unwrap_or(""),
            param = %error.param_name,
            field_path = %error.field_path,
            error = %error.message,
            "Skipping value that cannot be encoded"
        );
        self.skipped.push(error);
    }

    fn finish(mut self, compartments: &CompartmentResolver, chain: Option<&ChainContext>) -> Projection {
        compartments.augment(&mut self.entries);

        let depth = chain.map(|c| c.depth).unwrap_or(0);
        let entries = self
            .entries
            .into_iter()
            .map(|mut entry| {
                if let Some(ctx) = chain {
                    entry.parameter_name = ctx.prefixed(&entry.parameter_name);
                }
                entry
                    .with_source(self.document_id.clone())
                    .with_depth(depth)
            })
            .collect();

        Projection {
            resource_type: self.resource_type,
            document_id: self.document_id,
            entries,
            skipped: self.skipped,
            chain_targets: self.chain_targets,
            chain_failures: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::ParamDef;
    use serde_json::json;

    const BASE: &str = "https://ex.org/fhir/";

    fn projector() -> Projector {
        Projector::new(Arc::new(SchemaTable::builtin().unwrap()))
    }

    fn project(value: serde_json::Value) -> Projection {
        projector()
            .project(&DocumentEnvelope::from_json(&value), BASE, None)
            .unwrap()
    }

    #[test]
    fn test_subject_reference_and_patient_compartment() {
        let projection = project(json!({
            "resourceType": "Observation",
            "id": "obs1",
            "status": "final",
            "subject": {"reference": "Patient/123"}
        }));

        let subject: Vec<_> = projection.entries_named("subject").collect();
        assert_eq!(subject.len(), 1);
        assert_eq!(
            subject[0].value,
            EntryValue::reference("https://ex.org/fhir/Patient/123")
        );

        let patient: Vec<_> = projection.entries_named("patient").collect();
        assert_eq!(patient.len(), 1);
        assert_eq!(
            patient[0].primary_value().as_deref(),
            Some("https://ex.org/fhir/Patient/123")
        );

        assert_eq!(
            projection.chain_targets,
            vec![ChainTarget {
                param: "subject".into(),
                reference: "https://ex.org/fhir/Patient/123".into()
            }]
        );
    }

    #[test]
    fn test_universal_entries() {
        let envelope = DocumentEnvelope::from_json(&json!({
            "resourceType": "Task",
            "id": "t1",
            "language": "en",
            "meta": {
                "lastUpdated": "2024-01-15T10:30:00Z",
                "tag": [{"system": "http://ex.org/tags", "code": "batch"}],
                "profile": ["http://ex.org/StructureDefinition/task"],
                "security": [{"system": "http://terminology.hl7.org/CodeSystem/v3-Confidentiality", "code": "N"}]
            }
        }))
        .with_tag(Tag::new(Some("http://ex.org/tags".into()), "batch"))
        .with_tag(Tag::new(None, "imported"));

        let projection = projector().project(&envelope, BASE, None).unwrap();
        assert_eq!(projection.entries_named("_id").count(), 1);
        assert_eq!(projection.entries_named("_language").count(), 1);
        assert_eq!(projection.entries_named("_tag").count(), 2);
        assert_eq!(projection.entries_named("_profile").count(), 1);
        assert_eq!(projection.entries_named("_security").count(), 1);

        let last_updated: Vec<_> = projection.entries_named("_lastUpdated").collect();
        assert_eq!(
            last_updated[0].value,
            EntryValue::Instant {
                utc: "2024-01-15T10:30:00.000Z".into(),
                local: "2024-01-15T10:30:00.000+00:00".into(),
            }
        );
    }

    #[test]
    fn test_envelope_last_modified_fallback() {
        let envelope = DocumentEnvelope::from_json(&json!({"resourceType": "Task", "id": "t1"}))
            .with_last_modified("2024-02-01T00:00:00Z");
        let projection = projector().project(&envelope, BASE, None).unwrap();
        assert_eq!(projection.entries_named("_lastUpdated").count(), 1);
    }

    #[test]
    fn test_sparsity() {
        let projection = project(json!({"resourceType": "Task", "id": "t1"}));
        let names: Vec<&str> = projection
            .entries
            .iter()
            .map(|e| e.parameter_name.as_str())
            .collect();
        assert_eq!(names, vec!["_id"]);
    }

    #[test]
    fn test_unsupported_type() {
        let err = projector()
            .project(
                &DocumentEnvelope::from_json(&json!({"resourceType": "Nonexistent", "id": "x"})),
                BASE,
                None,
            )
            .unwrap_err();
        assert!(matches!(err, ProjectionError::UnsupportedType { ref resource_type, .. } if resource_type == "Nonexistent"));
        assert_eq!(err.document_id(), Some("x"));
    }

    #[test]
    fn test_parse_failure_and_missing_type() {
        let err = projector()
            .project(&DocumentEnvelope::new("not json"), BASE, None)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::Parse { .. }));

        let err = projector()
            .project(&DocumentEnvelope::from_json(&json!({"id": "x"})), BASE, None)
            .unwrap_err();
        assert!(matches!(err, ProjectionError::MissingResourceType { .. }));
    }

    #[test]
    fn test_invalid_envelope() {
        let envelope = DocumentEnvelope::from_json(&json!({"resourceType": "Task", "id": "t1"}))
            .with_last_modified("yesterday");
        let err = projector().project(&envelope, BASE, None).unwrap_err();
        assert!(matches!(err, ProjectionError::InvalidEnvelope { ref field, .. } if field == "last_modified"));
    }

    #[test]
    fn test_encoding_error_skips_one_value() {
        let projection = project(json!({
            "resourceType": "Task",
            "id": "t1",
            "status": "ready",
            "authoredOn": "not-a-date"
        }));
        assert_eq!(projection.entries_named("status").count(), 1);
        assert_eq!(projection.entries_named("authored-on").count(), 0);
        assert_eq!(projection.skipped.len(), 1);
        assert_eq!(projection.skipped[0].param_name, "authored-on");
        assert_eq!(projection.skipped[0].field_path, "authoredOn");
    }

    #[test]
    fn test_chain_context_prefixes_names() {
        let ctx = ChainContext::new(BASE, "subject");
        let projection = projector()
            .project(
                &DocumentEnvelope::from_json(&json!({
                    "resourceType": "Patient",
                    "id": "123",
                    "name": [{"family": "Smith", "given": ["Ann"]}],
                    "managingOrganization": {"reference": "Organization/1"}
                })),
                BASE,
                Some(&ctx),
            )
            .unwrap();

        assert!(
            projection
                .entries
                .iter()
                .all(|e| e.parameter_name.starts_with("subject.") && e.chain_depth == 1)
        );
        assert_eq!(projection.entries_named("subject.name").count(), 1);
        assert_eq!(projection.entries_named("subject._id").count(), 1);
        assert!(
            projection
                .entries
                .iter()
                .all(|e| e.source_document_id.as_deref() == Some("123"))
        );
    }

    #[test]
    fn test_composite_from_components() {
        let projection = project(json!({
            "resourceType": "ValueSet",
            "id": "vs1",
            "useContext": [{
                "code": {"system": "http://terminology.hl7.org/CodeSystem/usage-context-type", "code": "focus"},
                "valueCodeableConcept": {"coding": [{"system": "http://snomed.info/sct", "code": "123"}]}
            }]
        }));
        let composite: Vec<_> = projection.entries_named("context-type-value").collect();
        assert_eq!(composite.len(), 1);
        assert!(composite[0].is_composite());
        assert_eq!(
            composite[0].primary_value().as_deref(),
            Some("http://terminology.hl7.org/CodeSystem/usage-context-type|focus$http://snomed.info/sct|123")
        );
    }

    #[test]
    fn test_custom_schema_and_duplicates() {
        let mut table = SchemaTable::new();
        table
            .insert(
                "Organization",
                ParamDef::new("name", EntryKind::String, &["name", "alias"]).unwrap(),
            )
            .unwrap();
        let projector = Projector::new(Arc::new(table));
        let projection = projector
            .project(
                &DocumentEnvelope::from_json(&json!({
                    "resourceType": "Organization",
                    "name": "Acme",
                    "alias": ["Acme", "ACME Corp"]
                })),
                BASE,
                None,
            )
            .unwrap();
        assert_eq!(projection.entries_named("name").count(), 3);
    }

    #[test]
    fn test_one_entry_per_occurrence() {
        let mut table = SchemaTable::new();
        table
            .insert(
                "Patient",
                ParamDef::new(
                    "identifier",
                    EntryKind::Token,
                    &["identifier", "identifier.where(system='urn:mrn')"],
                )
                .unwrap(),
            )
            .unwrap();
        let projection = Projector::new(Arc::new(table))
            .project(
                &DocumentEnvelope::from_json(&json!({
                    "resourceType": "Patient",
                    "identifier": [
                        {"system": "urn:mrn", "value": "42"},
                        {"system": "urn:mrn", "value": "42"}
                    ]
                })),
                BASE,
                None,
            )
            .unwrap();

        let identifiers: Vec<_> = projection.entries_named("identifier").collect();
        assert_eq!(identifiers.len(), 2);
        assert_eq!(identifiers[0], identifiers[1]);
    }

    #[test]
    fn test_from_config_rejects_invalid() {
        let config = IndexerConfig {
            default_timezone_offset: "bogus".into(),
            ..Default::default()
        };
        assert!(Projector::from_config(Arc::new(SchemaTable::new()), &config).is_err());
    }
}
