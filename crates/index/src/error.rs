//! Error types for the indexing layer.
//!
//! Errors are split by how far they reach:
//!
//! - [`ProjectionError`] is fatal for one document. No entries are emitted.
//! - [`EncodingError`] covers a single malformed field. The entry is skipped and
//!   projection continues with the remaining parameters.
//! - [`ChainError`] covers a failed chain step. The chained entries are omitted
//!   while the outer document's own entries remain valid.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Result alias for fatal projection failures.
pub type IndexResult<T> = Result<T, ProjectionError>;

/// Fatal errors raised while projecting one document.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProjectionError {
    /// The document bytes could not be parsed.
    #[error("failed to parse document{}: {message}", display_id(.document_id))]
    Parse {
        document_id: Option<String>,
        message: String,
    },

    /// The parsed document carries no `resourceType`.
    #[error("document{} has no resourceType", display_id(.document_id))]
    MissingResourceType { document_id: Option<String> },

    /// The declared type is absent from the schema table.
    #[error("unsupported document type '{resource_type}'{}", display_id(.document_id))]
    UnsupportedType {
        resource_type: String,
        document_id: Option<String>,
    },

    /// The envelope around the document is malformed.
    #[error("invalid envelope for {resource_type}{}: field '{field}': {message}", display_id(.document_id))]
    InvalidEnvelope {
        resource_type: String,
        document_id: Option<String>,
        field: String,
        message: String,
    },
}

impl ProjectionError {
    /// Returns the document id the error refers to, if known.
    pub fn document_id(&self) -> Option<&str> {
        match self {
            ProjectionError::Parse { document_id, .. }
            | ProjectionError::MissingResourceType { document_id }
            | ProjectionError::UnsupportedType { document_id, .. }
            | ProjectionError::InvalidEnvelope { document_id, .. } => document_id.as_deref(),
        }
    }
}

fn display_id(id: &Option<String>) -> String {
    match id {
        Some(id) => format!(" '{}'", id),
        None => String::new(),
    }
}

/// A single field that could not be encoded into an entry.
///
/// Encoding errors never abort a projection; they are logged and reported
/// alongside the successfully produced entries.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("cannot encode {resource_type}{}.{field_path} for parameter '{param_name}': {message}", display_id(.document_id))]
pub struct EncodingError {
    pub param_name: String,
    pub field_path: String,
    pub resource_type: String,
    pub document_id: Option<String>,
    pub message: String,
}

/// Raised by encoders before document context is attached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct ValueError(pub String);

impl ValueError {
    /// Creates a new value error.
    pub fn new(message: impl Into<String>) -> Self {
        ValueError(message.into())
    }
}

/// Errors returned by a resource lookup collaborator.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    /// No document exists for the reference.
    #[error("reference not found: {reference}")]
    NotFound { reference: String },

    /// The reference cannot be resolved by this lookup (e.g. external server).
    #[error("reference not resolvable: {reference}: {message}")]
    Unresolvable { reference: String, message: String },

    /// The backing store failed.
    #[error("lookup failed for {reference}: {message}")]
    Unavailable { reference: String, message: String },
}

/// A failed chain step. Never fatal for the outer projection.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    /// The referenced document could not be fetched.
    #[error("chain '{param}' -> {reference}: {source}")]
    Lookup {
        param: String,
        reference: String,
        #[source]
        source: LookupError,
    },

    /// The referenced document was fetched but could not be projected.
    #[error("chain '{param}' -> {reference}: {source}")]
    Projection {
        param: String,
        reference: String,
        #[source]
        source: ProjectionError,
    },

    /// The reference was already visited on this chain.
    #[error("chain '{param}' -> {reference}: cycle detected")]
    Cycle { param: String, reference: String },

    /// The chain would exceed the configured depth.
    #[error("chain '{param}' -> {reference}: depth {depth} exceeds maximum {max}")]
    DepthExceeded {
        param: String,
        reference: String,
        depth: usize,
        max: usize,
    },
}

impl ChainError {
    /// Returns the chain parameter name.
    pub fn param(&self) -> &str {
        match self {
            ChainError::Lookup { param, .. }
            | ChainError::Projection { param, .. }
            | ChainError::Cycle { param, .. }
            | ChainError::DepthExceeded { param, .. } => param,
        }
    }

    /// Returns the reference that failed to chain.
    pub fn reference(&self) -> &str {
        match self {
            ChainError::Lookup { reference, .. }
            | ChainError::Projection { reference, .. }
            | ChainError::Cycle { reference, .. }
            | ChainError::DepthExceeded { reference, .. } => reference,
        }
    }
}

/// Errors raised while building or loading a schema table.
#[derive(Error, Debug)]
pub enum SchemaError {
    /// A parameter definition is invalid.
    #[error("invalid parameter '{param}' on {resource_type}: {message}")]
    InvalidParameter {
        resource_type: String,
        param: String,
        message: String,
    },

    /// A field path could not be parsed.
    #[error("invalid field path '{path}': {message}")]
    InvalidPath { path: String, message: String },

    /// A SearchParameter resource is missing a required element.
    #[error("SearchParameter{} missing required field '{field}'", display_id(.url))]
    MissingField { field: String, url: Option<String> },

    /// Reading a schema file failed.
    #[error("failed to read schema file '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A schema file is not valid JSON for the expected format.
    #[error("invalid schema document: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors raised by an entry sink.
#[derive(Error, Debug)]
pub enum SinkError {
    /// Writing entries failed.
    #[error("failed to write entries for {resource_type}/{document_id}: {message}")]
    Write {
        resource_type: String,
        document_id: String,
        message: String,
    },

    /// The sink's I/O failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Entries could not be serialized.
    #[error(transparent)]
    Serialize(#[from] serde_json::Error),
}
