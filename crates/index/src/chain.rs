//! Chaining coordinator.
//!
//! Follows chainable references to the target document and projects it
//! under a [`ChainContext`], so its entries come out prefixed with the
//! originating parameter (`subject.name`, `subject.organization.name`).
//!
//! A failed step only loses the entries under its own prefix: the caller's
//! entries and sibling chains are unaffected.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::encoders::reference::absolutize;
use crate::engine::{ChainTarget, Projection, Projector};
use crate::error::ChainError;
use crate::lookup::ResourceLookup;
use crate::types::{ChainContext, Entry, EntryValue};

type FollowFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Entry>, ChainError>> + Send + 'a>>;

/// Resolves references and projects their targets under a chain prefix.
#[derive(Clone)]
pub struct ChainCoordinator {
    projector: Projector,
    lookup: Arc<dyn ResourceLookup>,
    max_depth: usize,
}

impl std::fmt::Debug for ChainCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChainCoordinator")
            .field("projector", &self.projector)
            .field("max_depth", &self.max_depth)
            .finish_non_exhaustive()
    }
}

impl ChainCoordinator {
    /// Creates a coordinator following one hop.
    pub fn new(projector: Projector, lookup: Arc<dyn ResourceLookup>) -> Self {
        Self {
            projector,
            lookup,
            max_depth: 1,
        }
    }

    /// Sets the number of hops followed from a top-level document.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Returns the maximum chain depth.
    pub fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Follows one reference entry of a top-level document and returns the
    /// target's entries prefixed with `param`.
    ///
    /// Non-reference entries yield nothing. Failures of deeper hops are
    /// logged and dropped; use [`chain_projection`](Self::chain_projection)
    /// to collect them.
    pub async fn chain(&self, entry: &Entry, param: &str, base_url: &str) -> Result<Vec<Entry>, ChainError> {
        let EntryValue::Reference { reference } = &entry.value else {
            return Ok(Vec::new());
        };
        let context = ChainContext::new(base_url, param).with_visited([reference.as_str()]);
        let mut nested = Vec::new();
        self.follow(reference, context, &mut nested).await
    }

    /// Follows `reference` one hop below `parent`.
    pub async fn chain_from(
        &self,
        parent: &ChainContext,
        param: &str,
        reference: &str,
    ) -> Result<Vec<Entry>, ChainError> {
        if parent.has_visited(reference) {
            return Err(ChainError::Cycle {
                param: parent.prefixed(param),
                reference: reference.to_string(),
            });
        }
        let context = parent.descend(param, reference);
        let mut nested = Vec::new();
        self.follow(reference, context, &mut nested).await
    }

    /// Follows every chain target of a top-level projection, appending the
    /// chained entries and any failures to it.
    pub async fn chain_projection(&self, projection: &mut Projection, base_url: &str) {
        let origin = projection
            .document_id
            .as_ref()
            .map(|id| absolutize(base_url, &format!("{}/{}", projection.resource_type, id)));

        let targets: Vec<ChainTarget> = projection.chain_targets.clone();
        for target in targets {
            if origin.as_deref() == Some(target.reference.as_str()) {
                let error = ChainError::Cycle {
                    param: target.param.clone(),
                    reference: target.reference.clone(),
                };
                log_failure(&error);
                projection.chain_failures.push(error);
                continue;
            }

            let context = ChainContext::new(base_url, target.param.as_str())
                .with_visited(origin.iter().cloned().chain([target.reference.clone()]));
            let mut nested = Vec::new();
            match self.follow(&target.reference, context, &mut nested).await {
                Ok(entries) => projection.entries.extend(entries),
                Err(error) => projection.chain_failures.push(error),
            }
            projection.chain_failures.extend(nested);
        }
    }

    // Failures below this hop go to `nested`; this hop's own failure is the
    // returned error.
    fn follow<'a>(
        &'a self,
        reference: &'a str,
        context: ChainContext,
        nested: &'a mut Vec<ChainError>,
    ) -> FollowFuture<'a> {
        Box::pin(async move {
            let param = context.originating_parameter_name.clone();
            if context.depth > self.max_depth {
                let error = ChainError::DepthExceeded {
                    param,
                    reference: reference.to_string(),
                    depth: context.depth,
                    max: self.max_depth,
                };
                log_failure(&error);
                return Err(error);
            }

            let envelope = match self.lookup.resolve(reference).await {
                Ok(envelope) => envelope,
                Err(source) => {
                    let error = ChainError::Lookup {
                        param,
                        reference: reference.to_string(),
                        source,
                    };
                    log_failure(&error);
                    return Err(error);
                }
            };

            let projection = match self
                .projector
                .project(&envelope, &context.base_url, Some(&context))
            {
                Ok(projection) => projection,
                Err(source) => {
                    let error = ChainError::Projection {
                        param,
                        reference: reference.to_string(),
                        source,
                    };
                    log_failure(&error);
                    return Err(error);
                }
            };

            let Projection {
                mut entries,
                chain_targets,
                ..
            } = projection;

            if context.depth < self.max_depth {
                for target in chain_targets {
                    if context.has_visited(&target.reference) {
                        let error = ChainError::Cycle {
                            param: context.prefixed(&target.param),
                            reference: target.reference,
                        };
                        log_failure(&error);
                        nested.push(error);
                        continue;
                    }

                    let child = context.descend(&target.param, &target.reference);
                    match self.follow(&target.reference, child, nested).await {
                        Ok(chained) => entries.extend(chained),
                        Err(error) => nested.push(error),
                    }
                }
            }

            debug!(
                param = %param,
                reference = %reference,
                depth = context.depth,
                entries = entries.len(),
                "Chained reference"
            );
            Ok(entries)
        })
    }
}

fn log_failure(error: &ChainError) {
    warn!(
        param = %error.param(),
        reference = %error.reference(),
        error = %error,
        "Chain step failed; entries under this prefix are omitted"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::LookupError;
    use crate::lookup::InMemoryLookup;
    use crate::schema::SchemaTable;
    use crate::types::DocumentEnvelope;
    use serde_json::json;

    const BASE: &str = "https://ex.org/fhir/";

    fn projector() -> Projector {
        Projector::new(Arc::new(SchemaTable::builtin().unwrap()))
    }

    fn lookup() -> Arc<InMemoryLookup> {
        let lookup = InMemoryLookup::new();
        lookup
            .insert_json(&json!({
                "resourceType": "Patient",
                "id": "123",
                "name": [{"family": "Smith"}],
                "managingOrganization": {"reference": "Organization/org1"}
            }))
            .unwrap();
        lookup
            .insert_json(&json!({
                "resourceType": "Organization",
                "id": "org1",
                "name": "Acme Health",
                "partOf": {"reference": "Organization/org1"}
            }))
            .unwrap();
        Arc::new(lookup)
    }

    fn observation() -> DocumentEnvelope {
        DocumentEnvelope::from_json(&json!({
            "resourceType": "Observation",
            "id": "obs1",
            "status": "final",
            "subject": {"reference": "Patient/123"},
            "performer": [{"reference": "Practitioner/missing"}]
        }))
    }

    #[tokio::test]
    async fn test_chain_single_entry() {
        let coordinator = ChainCoordinator::new(projector(), lookup());
        let entry = Entry::new("subject", EntryValue::reference("https://ex.org/fhir/Patient/123"));
        let entries = coordinator.chain(&entry, "subject", BASE).await.unwrap();

        assert!(entries.iter().all(|e| e.parameter_name.starts_with("subject.")));
        assert!(entries.iter().any(|e| e.parameter_name == "subject.name"));
        assert!(entries.iter().all(|e| e.chain_depth == 1));
        // one hop only by default
        assert!(!entries.iter().any(|e| e.parameter_name.starts_with("subject.organization.")));
    }

    #[tokio::test]
    async fn test_chain_non_reference_is_empty() {
        let coordinator = ChainCoordinator::new(projector(), lookup());
        let entry = Entry::new("status", EntryValue::token("final", None, None));
        assert!(coordinator.chain(&entry, "status", BASE).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_chain_projection_contains_failures() {
        let coordinator = ChainCoordinator::new(projector(), lookup());
        let mut projection = projector().project(&observation(), BASE, None).unwrap();
        let outer = projection.entries.clone();

        coordinator.chain_projection(&mut projection, BASE).await;

        assert!(outer.iter().all(|e| projection.entries.contains(e)));
        assert!(projection.entries.iter().any(|e| e.parameter_name == "subject.name"));
        assert!(!projection.entries.iter().any(|e| e.parameter_name.starts_with("performer.")));

        assert_eq!(projection.chain_failures.len(), 1);
        match &projection.chain_failures[0] {
            ChainError::Lookup { param, source, .. } => {
                assert_eq!(param, "performer");
                assert!(matches!(source, LookupError::NotFound { .. }));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_two_hops_with_cycle_guard() {
        let coordinator = ChainCoordinator::new(projector(), lookup()).with_max_depth(2);
        let mut projection = projector().project(&observation(), BASE, None).unwrap();
        coordinator.chain_projection(&mut projection, BASE).await;

        let org_names: Vec<_> = projection
            .entries
            .iter()
            .filter(|e| e.parameter_name == "subject.organization.name")
            .collect();
        assert_eq!(org_names.len(), 1);
        assert_eq!(org_names[0].chain_depth, 2);

        // depth 2 is the limit, so the organization's self reference is not followed
        assert!(
            !projection
                .entries
                .iter()
                .any(|e| e.parameter_name.starts_with("subject.organization.partof."))
        );
    }

    #[tokio::test]
    async fn test_cycle_detected() {
        let coordinator = ChainCoordinator::new(projector(), lookup()).with_max_depth(3);
        let organization = DocumentEnvelope::from_json(&json!({
            "resourceType": "Organization",
            "id": "org1",
            "name": "Acme Health",
            "partOf": {"reference": "Organization/org1"}
        }));
        let mut projection = projector().project(&organization, BASE, None).unwrap();
        coordinator.chain_projection(&mut projection, BASE).await;

        assert!(
            projection
                .chain_failures
                .iter()
                .any(|e| matches!(e, ChainError::Cycle { .. }))
        );
        assert!(!projection.entries.iter().any(|e| e.parameter_name.starts_with("partof.")));
    }

    #[tokio::test]
    async fn test_chain_from_depth_exceeded() {
        let coordinator = ChainCoordinator::new(projector(), lookup());
        let parent = ChainContext::new(BASE, "subject");
        let err = coordinator
            .chain_from(&parent, "organization", "https://ex.org/fhir/Organization/org1")
            .await
            .unwrap_err();
        assert!(matches!(err, ChainError::DepthExceeded { depth: 2, max: 1, .. }));
        assert_eq!(err.param(), "subject.organization");
    }
}
