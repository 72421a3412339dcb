//! Parser collaborator and the parsed document view.
//!
//! The projector never inspects wire bytes itself. A [`DocumentParser`] turns
//! bytes into a [`ParsedDocument`], which exposes the typed accessors the
//! projector needs: resource type, id, language, `meta`, and field-path
//! selection.

use std::io::Read;

use serde_json::Value;

use crate::error::ProjectionError;
use crate::path::{FieldPath, Node};
use crate::types::Tag;

/// Turns raw document bytes into a [`ParsedDocument`].
pub trait DocumentParser: Send + Sync {
    /// Parses a complete document.
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ProjectionError>;

    /// Parses a document from a reader. The reader is only borrowed; the
    /// caller's handle is released when it goes out of scope, on success and
    /// on failure alike.
    fn parse_reader(&self, reader: &mut dyn Read) -> Result<ParsedDocument, ProjectionError> {
        let mut bytes = Vec::new();
        reader
            .read_to_end(&mut bytes)
            .map_err(|e| ProjectionError::Parse {
                document_id: None,
                message: format!("read failed: {}", e),
            })?;
        self.parse(&bytes)
    }
}

/// Parser for FHIR JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonDocumentParser;

impl DocumentParser for JsonDocumentParser {
    fn parse(&self, bytes: &[u8]) -> Result<ParsedDocument, ProjectionError> {
        let value: Value = serde_json::from_slice(bytes).map_err(|e| ProjectionError::Parse {
            document_id: None,
            message: e.to_string(),
        })?;

        if !value.is_object() {
            return Err(ProjectionError::Parse {
                document_id: None,
                message: "document must be a JSON object".to_string(),
            });
        }

        Ok(ParsedDocument::from_value(value))
    }
}

/// An immutable, parsed document.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedDocument {
    root: Value,
}

impl ParsedDocument {
    /// Wraps an already-parsed JSON value.
    pub fn from_value(root: Value) -> Self {
        Self { root }
    }

    /// Returns the underlying JSON.
    pub fn root(&self) -> &Value {
        &self.root
    }

    /// Returns the declared resource type.
    pub fn resource_type(&self) -> Option<&str> {
        self.str_at(&["resourceType"])
    }

    /// Returns the logical id.
    pub fn id(&self) -> Option<&str> {
        self.str_at(&["id"])
    }

    /// Returns the document language.
    pub fn language(&self) -> Option<&str> {
        self.str_at(&["language"])
    }

    /// Returns `meta.lastUpdated`.
    pub fn last_updated(&self) -> Option<&str> {
        self.str_at(&["meta", "lastUpdated"])
    }

    /// Returns `meta.tag` as tags.
    pub fn meta_tags(&self) -> Vec<Tag> {
        self.codings_at("tag")
    }

    /// Returns `meta.security` as tags.
    pub fn meta_security(&self) -> Vec<Tag> {
        self.codings_at("security")
    }

    /// Returns `meta.profile` canonicals.
    pub fn profiles(&self) -> Vec<&str> {
        self.root
            .get("meta")
            .and_then(|m| m.get("profile"))
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .filter(|s| !s.trim().is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Selects the nodes reached by `path`.
    pub fn select(&self, path: &FieldPath) -> Vec<Node<'_>> {
        path.select(&self.root)
    }

    fn str_at(&self, keys: &[&str]) -> Option<&str> {
        let mut current = &self.root;
        for key in keys {
            current = current.get(key)?;
        }
        current.as_str().filter(|s| !s.trim().is_empty())
    }

    fn codings_at(&self, key: &str) -> Vec<Tag> {
        let Some(items) = self
            .root
            .get("meta")
            .and_then(|m| m.get(key))
            .and_then(Value::as_array)
        else {
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|coding| {
                let code = coding.get("code").and_then(Value::as_str)?;
                if code.trim().is_empty() {
                    return None;
                }
                Some(Tag {
                    system: coding
                        .get("system")
                        .and_then(Value::as_str)
                        .map(String::from),
                    code: code.to_string(),
                    display: coding
                        .get("display")
                        .and_then(Value::as_str)
                        .map(String::from),
                })
            })
            .collect()
    }
}
