//! Helios FHIR Server Search Indexing
//!
//! This crate projects FHIR resources into flat, typed search entries and
//! follows chainable references so that chained searches
//! (`Observation?subject.name=smith`) can be answered from the index.
//!
//! # Features
//!
//! - **Declarative schema**: one table of search parameters per resource type,
//!   built in or loaded from schema files and `SearchParameter` resources
//! - **Typed encoders**: token, reference, date, quantity, string, number and
//!   composite values, with dual UTC/local date rendering
//! - **Compartments**: implicit `patient`, `practitioner`, ... entries inferred
//!   from reference targets
//! - **Chaining**: referenced documents indexed under a prefixed name, with a
//!   depth limit and cycle guard
//! - **Batch indexing**: concurrent indexing into an [`EntrySink`]
//!
//! # Architecture
//!
//! - [`types`] - entries, document envelopes and chain context
//! - [`error`] - error types for all operations
//! - [`parser`] - document parser collaborator
//! - [`path`] - field paths and JSON navigation
//! - [`encoders`] - value encoders per entry kind
//! - [`compartment`] - compartment inference
//! - [`schema`] - the schema table and its loaders
//! - [`engine`] - the projection engine
//! - [`chain`] - the chaining coordinator
//! - [`lookup`] - resource lookup collaborators
//! - [`indexer`] - projection plus chaining
//! - [`sink`] - entry sinks
//! - [`batch`] - batch indexing
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use helios_index::{IndexerConfig, Projector, SchemaTable};
//! use helios_index::types::{DocumentEnvelope, EntryValue};
//! use serde_json::json;
//!
//! let projector = Projector::new(Arc::new(SchemaTable::builtin().unwrap()));
//! let envelope = DocumentEnvelope::from_json(&json!({
//!     "resourceType": "Observation",
//!     "id": "obs-1",
//!     "subject": {"reference": "Patient/123"}
//! }));
//!
//! let projection = projector.project(&envelope, "https://ex.org/fhir/", None).unwrap();
//! let subject = projection.entries_named("subject").next().unwrap();
//! assert_eq!(subject.value, EntryValue::reference("https://ex.org/fhir/Patient/123"));
//! assert_eq!(projection.entries_named("patient").count(), 1);
//! # let _ = IndexerConfig::default();
//! ```
//!
//! # Chaining
//!
//! ```
//! use std::sync::Arc;
//! use helios_index::{Indexer, InMemoryLookup};
//! use helios_index::types::DocumentEnvelope;
//! use serde_json::json;
//!
//! # let rt = tokio::runtime::Builder::new_multi_thread().build().unwrap();
//! # rt.block_on(async {
//! let lookup = InMemoryLookup::new();
//! lookup.insert_json(&json!({"resourceType": "Patient", "id": "123", "gender": "female"})).unwrap();
//!
//! let indexer = Indexer::with_defaults("https://ex.org/fhir/")
//!     .unwrap()
//!     .with_lookup(Arc::new(lookup));
//!
//! let projection = indexer
//!     .index(&DocumentEnvelope::from_json(&json!({
//!         "resourceType": "Observation",
//!         "id": "obs-1",
//!         "subject": {"reference": "Patient/123"}
//!     })))
//!     .await
//!     .unwrap();
//! assert_eq!(projection.entries_named("subject.gender").count(), 1);
//! # });
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod batch;
pub mod chain;
pub mod compartment;
pub mod config;
pub mod encoders;
pub mod engine;
pub mod error;
pub mod indexer;
pub mod lookup;
pub mod parser;
pub mod path;
pub mod schema;
pub mod sink;
pub mod types;

// Re-export commonly used types at crate root
pub use batch::{BatchDocument, BatchIndexer, BatchProgress, BatchStatus};
pub use chain::ChainCoordinator;
pub use compartment::{CompartmentMarker, CompartmentResolver};
pub use config::IndexerConfig;
pub use engine::{ChainTarget, Projection, Projector};
pub use error::{
    ChainError, EncodingError, IndexResult, LookupError, ProjectionError, SchemaError, SinkError,
};
pub use indexer::Indexer;
pub use lookup::{FileSystemLookup, InMemoryLookup, RateLimitedLookup, ResourceLookup};
pub use parser::{DocumentParser, JsonDocumentParser, ParsedDocument};
pub use schema::{ParamDef, SchemaLoader, SchemaTable};
pub use sink::{EntrySink, InMemorySink, JsonLinesSink};
pub use types::{ChainContext, DocumentEnvelope, Entry, EntryKind, EntryValue, PreciseDecimal};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
