//! Resource lookup collaborators.
//!
//! Chaining resolves reference strings to documents through a
//! [`ResourceLookup`]. Two implementations are provided, plus a wrapper
//! that bounds concurrent lookups:
//!
//! - [`InMemoryLookup`] - documents registered by `Type/id`
//! - [`FileSystemLookup`] - reads `<root>/<Type>/<id>.json`
//! - [`RateLimitedLookup`] - limits in-flight lookups with a semaphore

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::sync::Semaphore;

use crate::error::LookupError;
use crate::path::reference_type;
use crate::types::DocumentEnvelope;

/// Resolves a reference string into the target document.
#[async_trait]
pub trait ResourceLookup: Send + Sync {
    /// Resolves `reference` (absolute or relative).
    async fn resolve(&self, reference: &str) -> Result<DocumentEnvelope, LookupError>;
}

#[async_trait]
impl<T: ResourceLookup + ?Sized> ResourceLookup for Arc<T> {
    async fn resolve(&self, reference: &str) -> Result<DocumentEnvelope, LookupError> {
        (**self).resolve(reference).await
    }
}

/// Returns the `Type/id` tail of a reference, dropping any `_history` part.
///
/// `https://ex.org/fhir/Patient/1/_history/2` gives `("Patient", "1")`.
/// Fragments and URNs have no such tail.
pub fn type_and_id(reference: &str) -> Option<(&str, &str)> {
    if reference.starts_with('#') || reference.to_ascii_lowercase().starts_with("urn:") {
        return None;
    }
    let resource_type = reference_type(reference)?;
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let mut previous = None;
    for part in path.split('/').filter(|p| !p.is_empty()) {
        if previous == Some(resource_type) {
            return Some((resource_type, part));
        }
        previous = Some(part);
    }
    None
}

/// Lookup over documents held in memory.
#[derive(Debug, Default)]
pub struct InMemoryLookup {
    documents: RwLock<HashMap<String, DocumentEnvelope>>,
}

impl InMemoryLookup {
    /// Creates an empty lookup.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a document under `key` (`Type/id`, or any exact reference
    /// such as a `urn:uuid:`).
    pub fn insert(&self, key: impl Into<String>, document: DocumentEnvelope) {
        self.documents.write().insert(key.into(), document);
    }

    /// Registers a JSON document under its own `resourceType/id`.
    pub fn insert_json(&self, document: &serde_json::Value) -> Result<(), LookupError> {
        let resource_type = document.get("resourceType").and_then(|v| v.as_str());
        let id = document.get("id").and_then(|v| v.as_str());
        let (Some(resource_type), Some(id)) = (resource_type, id) else {
            return Err(LookupError::Unresolvable {
                reference: String::new(),
                message: "document needs resourceType and id".to_string(),
            });
        };
        self.insert(
            format!("{}/{}", resource_type, id),
            DocumentEnvelope::from_json(document),
        );
        Ok(())
    }

    /// Returns the number of registered documents.
    pub fn len(&self) -> usize {
        self.documents.read().len()
    }

    /// Returns true if no document is registered.
    pub fn is_empty(&self) -> bool {
        self.documents.read().is_empty()
    }
}

#[async_trait]
impl ResourceLookup for InMemoryLookup {
    async fn resolve(&self, reference: &str) -> Result<DocumentEnvelope, LookupError> {
        let documents = self.documents.read();
        if let Some(document) = documents.get(reference) {
            return Ok(document.clone());
        }
        type_and_id(reference)
            .and_then(|(t, id)| documents.get(&format!("{}/{}", t, id)))
            .cloned()
            .ok_or_else(|| LookupError::NotFound {
                reference: reference.to_string(),
            })
    }
}

/// Lookup over a directory laid out as `<root>/<Type>/<id>.json`.
#[derive(Debug, Clone)]
pub struct FileSystemLookup {
    root: PathBuf,
}

impl FileSystemLookup {
    /// Creates a lookup rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Returns the root directory.
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn path_for(&self, reference: &str) -> Result<PathBuf, LookupError> {
        let (resource_type, id) =
            type_and_id(reference).ok_or_else(|| LookupError::Unresolvable {
                reference: reference.to_string(),
                message: "reference has no Type/id".to_string(),
            })?;

        let safe = |s: &str| {
            !s.is_empty()
                && !s.starts_with('.')
                && s.chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.')
        };
        if !safe(resource_type) || !safe(id) {
            return Err(LookupError::Unresolvable {
                reference: reference.to_string(),
                message: "reference contains unsupported characters".to_string(),
            });
        }

        Ok(self.root.join(resource_type).join(format!("{}.json", id)))
    }
}

#[async_trait]
impl ResourceLookup for FileSystemLookup {
    async fn resolve(&self, reference: &str) -> Result<DocumentEnvelope, LookupError> {
        let path = self.path_for(reference)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(DocumentEnvelope::new(body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(LookupError::NotFound {
                reference: reference.to_string(),
            }),
            Err(e) => Err(LookupError::Unavailable {
                reference: reference.to_string(),
                message: format!("{}: {}", path.display(), e),
            }),
        }
    }
}

/// Bounds the number of concurrent lookups against an inner lookup.
#[derive(Debug)]
pub struct RateLimitedLookup<L> {
    inner: L,
    permits: Arc<Semaphore>,
}

impl<L> RateLimitedLookup<L> {
    /// Wraps `inner`, allowing at most `max_in_flight` concurrent lookups.
    pub fn new(inner: L, max_in_flight: usize) -> Self {
        Self {
            inner,
            permits: Arc::new(Semaphore::new(max_in_flight.max(1))),
        }
    }

    /// Returns the number of lookups that may start right now.
    pub fn available_permits(&self) -> usize {
        self.permits.available_permits()
    }
}

#[async_trait]
impl<L: ResourceLookup> ResourceLookup for RateLimitedLookup<L> {
    async fn resolve(&self, reference: &str) -> Result<DocumentEnvelope, LookupError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| LookupError::Unavailable {
                reference: reference.to_string(),
                message: e.to_string(),
            })?;
        self.inner.resolve(reference).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_type_and_id() {
        assert_eq!(
            type_and_id("https://ex.org/fhir/Patient/1/_history/2"),
            Some(("Patient", "1"))
        );
        assert_eq!(type_and_id("Organization/org-1"), Some(("Organization", "org-1")));
        assert_eq!(type_and_id("#p1"), None);
        assert_eq!(type_and_id("urn:uuid:1234"), None);
        assert_eq!(type_and_id("Patient"), None);
    }

    #[tokio::test]
    async fn test_in_memory_lookup() {
        let lookup = InMemoryLookup::new();
        lookup
            .insert_json(&json!({"resourceType": "Patient", "id": "123"}))
            .unwrap();
        assert_eq!(lookup.len(), 1);

        assert!(lookup.resolve("https://ex.org/fhir/Patient/123").await.is_ok());
        assert!(lookup.resolve("Patient/123").await.is_ok());

        let err = lookup.resolve("Patient/404").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_in_memory_exact_key() {
        let lookup = InMemoryLookup::new();
        lookup.insert("urn:uuid:abc", DocumentEnvelope::new("{}"));
        assert!(lookup.resolve("urn:uuid:abc").await.is_ok());
    }

    #[tokio::test]
    async fn test_file_system_lookup() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("Patient")).unwrap();
        std::fs::write(
            dir.path().join("Patient").join("p1.json"),
            r#"{"resourceType": "Patient", "id": "p1"}"#,
        )
        .unwrap();

        let lookup = FileSystemLookup::new(dir.path());
        let document = lookup.resolve("https://ex.org/fhir/Patient/p1").await.unwrap();
        assert!(!document.body.is_empty());

        let err = lookup.resolve("Patient/missing").await.unwrap_err();
        assert!(matches!(err, LookupError::NotFound { .. }));

        let err = lookup.resolve("#contained").await.unwrap_err();
        assert!(matches!(err, LookupError::Unresolvable { .. }));
    }

    #[tokio::test]
    async fn test_rate_limited_lookup() {
        let inner = InMemoryLookup::new();
        inner
            .insert_json(&json!({"resourceType": "Patient", "id": "1"}))
            .unwrap();
        let lookup = RateLimitedLookup::new(inner, 2);
        assert_eq!(lookup.available_permits(), 2);
        assert!(lookup.resolve("Patient/1").await.is_ok());
        assert_eq!(lookup.available_permits(), 2);
    }
}
