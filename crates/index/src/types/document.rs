//! Document envelopes handed to the projector.

use serde::{Deserialize, Serialize};

/// A tag attached to a document by its containing envelope.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tag {
    /// Tag system URI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Tag code.
    pub code: String,
    /// Tag display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Tag {
    /// Creates a tag with system and code.
    pub fn new(system: Option<String>, code: impl Into<String>) -> Self {
        Self {
            system,
            code: code.into(),
            display: None,
        }
    }

    /// Sets the display text.
    pub fn with_display(mut self, display: impl Into<String>) -> Self {
        self.display = Some(display.into());
        self
    }
}

/// Raw document bytes plus the metadata of the envelope they arrived in.
///
/// The body is parsed by a [`DocumentParser`](crate::parser::DocumentParser);
/// the envelope fields supplement what the document itself declares.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentEnvelope {
    /// Raw document bytes.
    pub body: Vec<u8>,
    /// Tags assigned by the envelope (merged with `meta.tag`).
    pub tags: Vec<Tag>,
    /// Last-modified timestamp of the envelope, used when the document has no
    /// `meta.lastUpdated`.
    pub last_modified: Option<String>,
}

impl DocumentEnvelope {
    /// Wraps raw bytes with no envelope metadata.
    pub fn new(body: impl Into<Vec<u8>>) -> Self {
        Self {
            body: body.into(),
            tags: Vec::new(),
            last_modified: None,
        }
    }

    /// Serializes a JSON value into an envelope.
    pub fn from_json(value: &serde_json::Value) -> Self {
        Self::new(value.to_string())
    }

    /// Adds an envelope tag.
    pub fn with_tag(mut self, tag: Tag) -> Self {
        self.tags.push(tag);
        self
    }

    /// Sets the envelope's last-modified timestamp.
    pub fn with_last_modified(mut self, timestamp: impl Into<String>) -> Self {
        self.last_modified = Some(timestamp.into());
        self
    }
}
