//! Built-in parameter table for common clinical and administrative types.

use crate::error::SchemaError;
use crate::types::EntryKind::{
    self, Composite, Date, Number, Quantity, Reference, String as Text, Token,
};

use super::{ParamDef, SchemaTable};

/// Chained reference.
const C: bool = true;
/// Not chained.
const N: bool = false;

type Row = (&'static str, &'static str, EntryKind, &'static [&'static str], bool);

#[rustfmt::skip]
const PARAMS: &[Row] = &[
    // Patient
    ("Patient", "identifier", Token, &["identifier"], N),
    ("Patient", "active", Token, &["active"], N),
    ("Patient", "name", Text, &["name"], N),
    ("Patient", "family", Text, &["name.family"], N),
    ("Patient", "given", Text, &["name.given"], N),
    ("Patient", "gender", Token, &["gender"], N),
    ("Patient", "birthdate", Date, &["birthDate"], N),
    ("Patient", "death-date", Date, &["deceased.ofType(dateTime)"], N),
    ("Patient", "deceased", Token, &["deceased.ofType(boolean)"], N),
    ("Patient", "address", Text, &["address"], N),
    ("Patient", "address-city", Text, &["address.city"], N),
    ("Patient", "address-postalcode", Text, &["address.postalCode"], N),
    ("Patient", "telecom", Token, &["telecom"], N),
    ("Patient", "phone", Token, &["telecom.where(system='phone')"], N),
    ("Patient", "email", Token, &["telecom.where(system='email')"], N),
    ("Patient", "language", Token, &["communication.language"], N),
    ("Patient", "general-practitioner", Reference, &["generalPractitioner"], C),
    ("Patient", "organization", Reference, &["managingOrganization"], C),
    ("Patient", "link", Reference, &["link.other"], N),

    // Practitioner
    ("Practitioner", "identifier", Token, &["identifier"], N),
    ("Practitioner", "active", Token, &["active"], N),
    ("Practitioner", "name", Text, &["name"], N),
    ("Practitioner", "family", Text, &["name.family"], N),
    ("Practitioner", "given", Text, &["name.given"], N),
    ("Practitioner", "gender", Token, &["gender"], N),
    ("Practitioner", "telecom", Token, &["telecom"], N),
    ("Practitioner", "address", Text, &["address"], N),
    ("Practitioner", "communication", Token, &["communication"], N),

    // PractitionerRole
    ("PractitionerRole", "identifier", Token, &["identifier"], N),
    ("PractitionerRole", "active", Token, &["active"], N),
    ("PractitionerRole", "date", Date, &["period"], N),
    ("PractitionerRole", "practitioner", Reference, &["practitioner"], C),
    ("PractitionerRole", "organization", Reference, &["organization"], C),
    ("PractitionerRole", "role", Token, &["code"], N),
    ("PractitionerRole", "specialty", Token, &["specialty"], N),
    ("PractitionerRole", "location", Reference, &["location"], C),
    ("PractitionerRole", "service", Reference, &["healthcareService"], N),

    // RelatedPerson
    ("RelatedPerson", "identifier", Token, &["identifier"], N),
    ("RelatedPerson", "active", Token, &["active"], N),
    ("RelatedPerson", "patient", Reference, &["patient"], C),
    ("RelatedPerson", "name", Text, &["name"], N),
    ("RelatedPerson", "relationship", Token, &["relationship"], N),
    ("RelatedPerson", "birthdate", Date, &["birthDate"], N),
    ("RelatedPerson", "gender", Token, &["gender"], N),
    ("RelatedPerson", "telecom", Token, &["telecom"], N),

    // Organization
    ("Organization", "identifier", Token, &["identifier"], N),
    ("Organization", "active", Token, &["active"], N),
    ("Organization", "name", Text, &["name", "alias"], N),
    ("Organization", "type", Token, &["type"], N),
    ("Organization", "address", Text, &["address"], N),
    ("Organization", "partof", Reference, &["partOf"], C),
    ("Organization", "endpoint", Reference, &["endpoint"], N),

    // Location
    ("Location", "identifier", Token, &["identifier"], N),
    ("Location", "name", Text, &["name", "alias"], N),
    ("Location", "status", Token, &["status"], N),
    ("Location", "operational-status", Token, &["operationalStatus"], N),
    ("Location", "type", Token, &["type"], N),
    ("Location", "address", Text, &["address"], N),
    ("Location", "address-city", Text, &["address.city"], N),
    ("Location", "organization", Reference, &["managingOrganization"], C),
    ("Location", "partof", Reference, &["partOf"], C),

    // Encounter
    ("Encounter", "identifier", Token, &["identifier"], N),
    ("Encounter", "status", Token, &["status"], N),
    ("Encounter", "class", Token, &["class"], N),
    ("Encounter", "type", Token, &["type"], N),
    ("Encounter", "subject", Reference, &["subject"], C),
    ("Encounter", "participant", Reference, &["participant.individual"], C),
    ("Encounter", "participant-type", Token, &["participant.type"], N),
    ("Encounter", "date", Date, &["period"], N),
    ("Encounter", "length", Quantity, &["length"], N),
    ("Encounter", "reason-code", Token, &["reasonCode"], N),
    ("Encounter", "reason-reference", Reference, &["reasonReference"], N),
    ("Encounter", "location", Reference, &["location.location"], C),
    ("Encounter", "service-provider", Reference, &["serviceProvider"], C),
    ("Encounter", "part-of", Reference, &["partOf"], N),
    ("Encounter", "episode-of-care", Reference, &["episodeOfCare"], N),

    // Observation
    ("Observation", "identifier", Token, &["identifier"], N),
    ("Observation", "status", Token, &["status"], N),
    ("Observation", "category", Token, &["category"], N),
    ("Observation", "code", Token, &["code"], N),
    ("Observation", "subject", Reference, &["subject"], C),
    ("Observation", "focus", Reference, &["focus"], N),
    ("Observation", "encounter", Reference, &["encounter"], C),
    ("Observation", "date", Date, &["effective"], N),
    ("Observation", "issued", Date, &["issued"], N),
    ("Observation", "performer", Reference, &["performer"], C),
    ("Observation", "value-quantity", Quantity, &["value.ofType(Quantity)"], N),
    ("Observation", "value-concept", Token, &["value.ofType(CodeableConcept)"], N),
    ("Observation", "value-date", Date, &["value.ofType(dateTime)", "value.ofType(Period)"], N),
    ("Observation", "value-string", Text, &["value.ofType(string)"], N),
    ("Observation", "component-code", Token, &["component.code"], N),
    ("Observation", "component-value-quantity", Quantity, &["component.value.ofType(Quantity)"], N),
    ("Observation", "data-absent-reason", Token, &["dataAbsentReason"], N),
    ("Observation", "method", Token, &["method"], N),
    ("Observation", "device", Reference, &["device"], N),
    ("Observation", "based-on", Reference, &["basedOn"], N),
    ("Observation", "has-member", Reference, &["hasMember"], N),
    ("Observation", "derived-from", Reference, &["derivedFrom"], N),
    ("Observation", "specimen", Reference, &["specimen"], N),

    // Condition
    ("Condition", "identifier", Token, &["identifier"], N),
    ("Condition", "clinical-status", Token, &["clinicalStatus"], N),
    ("Condition", "verification-status", Token, &["verificationStatus"], N),
    ("Condition", "category", Token, &["category"], N),
    ("Condition", "severity", Token, &["severity"], N),
    ("Condition", "code", Token, &["code"], N),
    ("Condition", "body-site", Token, &["bodySite"], N),
    ("Condition", "subject", Reference, &["subject"], C),
    ("Condition", "encounter", Reference, &["encounter"], C),
    ("Condition", "onset-date", Date, &["onset.ofType(dateTime)", "onset.ofType(Period)"], N),
    ("Condition", "onset-age", Quantity, &["onset.ofType(Age)"], N),
    ("Condition", "abatement-date", Date, &["abatement.ofType(dateTime)", "abatement.ofType(Period)"], N),
    ("Condition", "recorded-date", Date, &["recordedDate"], N),
    ("Condition", "asserter", Reference, &["asserter"], C),

    // Procedure
    ("Procedure", "identifier", Token, &["identifier"], N),
    ("Procedure", "status", Token, &["status"], N),
    ("Procedure", "category", Token, &["category"], N),
    ("Procedure", "code", Token, &["code"], N),
    ("Procedure", "subject", Reference, &["subject"], C),
    ("Procedure", "encounter", Reference, &["encounter"], C),
    ("Procedure", "date", Date, &["performed"], N),
    ("Procedure", "performer", Reference, &["performer.actor"], C),
    ("Procedure", "location", Reference, &["location"], C),
    ("Procedure", "reason-code", Token, &["reasonCode"], N),
    ("Procedure", "based-on", Reference, &["basedOn"], N),
    ("Procedure", "part-of", Reference, &["partOf"], N),

    // Appointment
    ("Appointment", "identifier", Token, &["identifier"], N),
    ("Appointment", "status", Token, &["status"], N),
    ("Appointment", "service-category", Token, &["serviceCategory"], N),
    ("Appointment", "service-type", Token, &["serviceType"], N),
    ("Appointment", "specialty", Token, &["specialty"], N),
    ("Appointment", "appointment-type", Token, &["appointmentType"], N),
    ("Appointment", "reason-code", Token, &["reasonCode"], N),
    ("Appointment", "reason-reference", Reference, &["reasonReference"], N),
    ("Appointment", "date", Date, &["start"], N),
    ("Appointment", "actor", Reference, &["participant.actor"], C),
    ("Appointment", "part-status", Token, &["participant.status"], N),
    ("Appointment", "practitioner", Reference, &["participant.actor.where(resolve() is Practitioner)"], C),
    ("Appointment", "location", Reference, &["participant.actor.where(resolve() is Location)"], C),
    ("Appointment", "slot", Reference, &["slot"], N),
    ("Appointment", "based-on", Reference, &["basedOn"], N),
    ("Appointment", "supporting-info", Reference, &["supportingInformation"], N),

    // AuditEvent
    ("AuditEvent", "type", Token, &["type"], N),
    ("AuditEvent", "subtype", Token, &["subtype"], N),
    ("AuditEvent", "action", Token, &["action"], N),
    ("AuditEvent", "date", Date, &["recorded"], N),
    ("AuditEvent", "outcome", Token, &["outcome"], N),
    ("AuditEvent", "agent", Reference, &["agent.who"], C),
    ("AuditEvent", "agent-name", Text, &["agent.name"], N),
    ("AuditEvent", "agent-role", Token, &["agent.role"], N),
    ("AuditEvent", "altid", Token, &["agent.altId"], N),
    ("AuditEvent", "address", Token, &["agent.network.address"], N),
    ("AuditEvent", "policy", Token, &["agent.policy"], N),
    ("AuditEvent", "site", Token, &["source.site"], N),
    ("AuditEvent", "source", Reference, &["source.observer"], C),
    ("AuditEvent", "entity", Reference, &["entity.what"], C),
    ("AuditEvent", "entity-name", Text, &["entity.name"], N),
    ("AuditEvent", "entity-role", Token, &["entity.role"], N),
    ("AuditEvent", "entity-type", Token, &["entity.type"], N),
    ("AuditEvent", "purpose", Token, &["purposeOfEvent", "agent.purposeOfUse"], N),

    // Task
    ("Task", "identifier", Token, &["identifier"], N),
    ("Task", "status", Token, &["status"], N),
    ("Task", "business-status", Token, &["businessStatus"], N),
    ("Task", "intent", Token, &["intent"], N),
    ("Task", "priority", Token, &["priority"], N),
    ("Task", "code", Token, &["code"], N),
    ("Task", "focus", Reference, &["focus"], C),
    ("Task", "subject", Reference, &["for"], C),
    ("Task", "encounter", Reference, &["encounter"], C),
    ("Task", "authored-on", Date, &["authoredOn"], N),
    ("Task", "modified", Date, &["lastModified"], N),
    ("Task", "period", Date, &["executionPeriod"], N),
    ("Task", "requester", Reference, &["requester"], C),
    ("Task", "owner", Reference, &["owner"], C),
    ("Task", "performer", Token, &["performerType"], N),
    ("Task", "based-on", Reference, &["basedOn"], N),
    ("Task", "part-of", Reference, &["partOf"], N),
    ("Task", "group-identifier", Token, &["groupIdentifier"], N),

    // ValueSet
    ("ValueSet", "url", Token, &["url"], N),
    ("ValueSet", "identifier", Token, &["identifier"], N),
    ("ValueSet", "version", Token, &["version"], N),
    ("ValueSet", "name", Text, &["name"], N),
    ("ValueSet", "title", Text, &["title"], N),
    ("ValueSet", "status", Token, &["status"], N),
    ("ValueSet", "date", Date, &["date"], N),
    ("ValueSet", "publisher", Text, &["publisher"], N),
    ("ValueSet", "description", Text, &["description"], N),
    ("ValueSet", "jurisdiction", Token, &["jurisdiction"], N),
    ("ValueSet", "reference", Token, &["compose.include.system"], N),
    ("ValueSet", "code", Token, &["expansion.contains.code", "compose.include.concept.code"], N),
    ("ValueSet", "expansion", Token, &["expansion.identifier"], N),
    ("ValueSet", "context-type", Token, &["useContext.code"], N),
    ("ValueSet", "context", Token, &["useContext.value.ofType(CodeableConcept)"], N),
    ("ValueSet", "context-quantity", Quantity, &["useContext.value.ofType(Quantity)"], N),

    // CodeSystem
    ("CodeSystem", "url", Token, &["url"], N),
    ("CodeSystem", "identifier", Token, &["identifier"], N),
    ("CodeSystem", "version", Token, &["version"], N),
    ("CodeSystem", "name", Text, &["name"], N),
    ("CodeSystem", "title", Text, &["title"], N),
    ("CodeSystem", "status", Token, &["status"], N),
    ("CodeSystem", "date", Date, &["date"], N),
    ("CodeSystem", "publisher", Text, &["publisher"], N),
    ("CodeSystem", "content-mode", Token, &["content"], N),
    ("CodeSystem", "code", Token, &["concept.code"], N),
    ("CodeSystem", "system", Token, &["url"], N),
    ("CodeSystem", "supplements", Reference, &["supplements"], N),

    // DiagnosticReport
    ("DiagnosticReport", "identifier", Token, &["identifier"], N),
    ("DiagnosticReport", "status", Token, &["status"], N),
    ("DiagnosticReport", "category", Token, &["category"], N),
    ("DiagnosticReport", "code", Token, &["code"], N),
    ("DiagnosticReport", "subject", Reference, &["subject"], C),
    ("DiagnosticReport", "encounter", Reference, &["encounter"], C),
    ("DiagnosticReport", "date", Date, &["effective"], N),
    ("DiagnosticReport", "issued", Date, &["issued"], N),
    ("DiagnosticReport", "performer", Reference, &["performer"], C),
    ("DiagnosticReport", "result", Reference, &["result"], C),
    ("DiagnosticReport", "conclusion", Token, &["conclusionCode"], N),
    ("DiagnosticReport", "based-on", Reference, &["basedOn"], N),

    // MedicationRequest
    ("MedicationRequest", "identifier", Token, &["identifier"], N),
    ("MedicationRequest", "status", Token, &["status"], N),
    ("MedicationRequest", "intent", Token, &["intent"], N),
    ("MedicationRequest", "priority", Token, &["priority"], N),
    ("MedicationRequest", "category", Token, &["category"], N),
    ("MedicationRequest", "code", Token, &["medication.ofType(CodeableConcept)"], N),
    ("MedicationRequest", "medication", Reference, &["medication.ofType(Reference)"], C),
    ("MedicationRequest", "subject", Reference, &["subject"], C),
    ("MedicationRequest", "encounter", Reference, &["encounter"], C),
    ("MedicationRequest", "authoredon", Date, &["authoredOn"], N),
    ("MedicationRequest", "requester", Reference, &["requester"], C),
    ("MedicationRequest", "intended-performer", Reference, &["performer"], N),
    ("MedicationRequest", "date", Date, &["dosageInstruction.timing.event"], N),

    // AllergyIntolerance
    ("AllergyIntolerance", "identifier", Token, &["identifier"], N),
    ("AllergyIntolerance", "clinical-status", Token, &["clinicalStatus"], N),
    ("AllergyIntolerance", "verification-status", Token, &["verificationStatus"], N),
    ("AllergyIntolerance", "type", Token, &["type"], N),
    ("AllergyIntolerance", "category", Token, &["category"], N),
    ("AllergyIntolerance", "criticality", Token, &["criticality"], N),
    ("AllergyIntolerance", "code", Token, &["code", "reaction.substance"], N),
    ("AllergyIntolerance", "patient", Reference, &["patient"], C),
    ("AllergyIntolerance", "recorder", Reference, &["recorder"], C),
    ("AllergyIntolerance", "asserter", Reference, &["asserter"], C),
    ("AllergyIntolerance", "onset", Date, &["reaction.onset"], N),
    ("AllergyIntolerance", "date", Date, &["recordedDate"], N),
    ("AllergyIntolerance", "last-date", Date, &["lastOccurrence"], N),
    ("AllergyIntolerance", "manifestation", Token, &["reaction.manifestation"], N),
    ("AllergyIntolerance", "severity", Token, &["reaction.severity"], N),

    // Immunization
    ("Immunization", "identifier", Token, &["identifier"], N),
    ("Immunization", "status", Token, &["status"], N),
    ("Immunization", "vaccine-code", Token, &["vaccineCode"], N),
    ("Immunization", "patient", Reference, &["patient"], C),
    ("Immunization", "date", Date, &["occurrence"], N),
    ("Immunization", "lot-number", Text, &["lotNumber"], N),
    ("Immunization", "manufacturer", Reference, &["manufacturer"], C),
    ("Immunization", "location", Reference, &["location"], C),
    ("Immunization", "performer", Reference, &["performer.actor"], C),
    ("Immunization", "reason-code", Token, &["reasonCode"], N),
    ("Immunization", "status-reason", Token, &["statusReason"], N),
    ("Immunization", "series", Text, &["protocolApplied.series"], N),
    ("Immunization", "target-disease", Token, &["protocolApplied.targetDisease"], N),

    // DocumentReference
    ("DocumentReference", "identifier", Token, &["masterIdentifier", "identifier"], N),
    ("DocumentReference", "status", Token, &["status"], N),
    ("DocumentReference", "type", Token, &["type"], N),
    ("DocumentReference", "category", Token, &["category"], N),
    ("DocumentReference", "subject", Reference, &["subject"], C),
    ("DocumentReference", "date", Date, &["date"], N),
    ("DocumentReference", "author", Reference, &["author"], C),
    ("DocumentReference", "custodian", Reference, &["custodian"], C),
    ("DocumentReference", "description", Text, &["description"], N),
    ("DocumentReference", "contenttype", Token, &["content.attachment.contentType"], N),
    ("DocumentReference", "language", Token, &["content.attachment.language"], N),
    ("DocumentReference", "location", Token, &["content.attachment.url"], N),
    ("DocumentReference", "format", Token, &["content.format"], N),
    ("DocumentReference", "period", Date, &["context.period"], N),
    ("DocumentReference", "encounter", Reference, &["context.encounter"], C),
    ("DocumentReference", "relatesto", Reference, &["relatesTo.target"], N),

    // Device
    ("Device", "identifier", Token, &["identifier"], N),
    ("Device", "status", Token, &["status"], N),
    ("Device", "type", Token, &["type"], N),
    ("Device", "manufacturer", Text, &["manufacturer"], N),
    ("Device", "model", Text, &["modelNumber"], N),
    ("Device", "udi-di", Text, &["udiCarrier.deviceIdentifier"], N),
    ("Device", "patient", Reference, &["patient"], C),
    ("Device", "organization", Reference, &["owner"], C),
    ("Device", "location", Reference, &["location"], C),
    ("Device", "url", Token, &["url"], N),

    // Coverage
    ("Coverage", "identifier", Token, &["identifier"], N),
    ("Coverage", "status", Token, &["status"], N),
    ("Coverage", "type", Token, &["type"], N),
    ("Coverage", "beneficiary", Reference, &["beneficiary"], C),
    ("Coverage", "subscriber", Reference, &["subscriber"], C),
    ("Coverage", "payor", Reference, &["payor"], C),
    ("Coverage", "period", Date, &["period"], N),

    // Claim
    ("Claim", "identifier", Token, &["identifier"], N),
    ("Claim", "status", Token, &["status"], N),
    ("Claim", "use", Token, &["use"], N),
    ("Claim", "patient", Reference, &["patient"], C),
    ("Claim", "created", Date, &["created"], N),
    ("Claim", "provider", Reference, &["provider"], C),
    ("Claim", "insurer", Reference, &["insurer"], C),
    ("Claim", "priority", Token, &["priority"], N),
    ("Claim", "total", Quantity, &["total"], N),

    // RiskAssessment
    ("RiskAssessment", "identifier", Token, &["identifier"], N),
    ("RiskAssessment", "subject", Reference, &["subject"], C),
    ("RiskAssessment", "date", Date, &["occurrence"], N),
    ("RiskAssessment", "method", Token, &["method"], N),
    ("RiskAssessment", "probability", Number, &["prediction.probability.ofType(decimal)"], N),
    ("RiskAssessment", "risk", Token, &["prediction.qualitativeRisk"], N),
];

type CompositeRow = (
    &'static str,
    &'static str,
    &'static [&'static str],
    &'static [(EntryKind, &'static str)],
);

#[rustfmt::skip]
const COMPOSITES: &[CompositeRow] = &[
    ("Observation", "code-value-quantity", &[], &[(Token, "code"), (Quantity, "value.ofType(Quantity)")]),
    ("Observation", "code-value-concept", &[], &[(Token, "code"), (Token, "value.ofType(CodeableConcept)")]),
    ("Observation", "code-value-date", &[], &[(Token, "code"), (Date, "value.ofType(dateTime)")]),
    ("Observation", "code-value-string", &[], &[(Token, "code"), (Text, "value.ofType(string)")]),
    ("Observation", "component-code-value-quantity", &["component"], &[(Token, "code"), (Quantity, "value.ofType(Quantity)")]),
    ("Observation", "component-code-value-concept", &["component"], &[(Token, "code"), (Token, "value.ofType(CodeableConcept)")]),
    ("ValueSet", "context-type-value", &["useContext"], &[(Token, "code"), (Token, "value.ofType(CodeableConcept)")]),
    ("ValueSet", "context-type-quantity", &["useContext"], &[(Token, "code"), (Quantity, "value.ofType(Quantity)")]),
    ("CodeSystem", "context-type-value", &["useContext"], &[(Token, "code"), (Token, "value.ofType(CodeableConcept)")]),
];

// Types indexed with the universal parameters only
const BARE_TYPES: &[&str] = &["Basic", "Binary", "Bundle", "Group", "Schedule", "Slot"];

pub(super) fn table() -> Result<SchemaTable, SchemaError> {
    let mut table = SchemaTable::new();

    for &(resource_type, name, kind, paths, chainable) in PARAMS {
        let mut param = ParamDef::new(name, kind, paths)?;
        if chainable {
            param = param.chainable();
        }
        table.insert(resource_type, param)?;
    }

    for &(resource_type, name, roots, components) in COMPOSITES {
        let mut param = ParamDef::new(name, Composite, roots)?;
        for &(kind, path) in components {
            param = param.with_component(kind, path)?;
        }
        table.insert(resource_type, param)?;
    }

    for resource_type in BARE_TYPES {
        table.register_type(resource_type);
    }

    Ok(table)
}
