//! Indexer facade combining projection and chaining.

use std::sync::Arc;

use tracing::debug;

use crate::chain::ChainCoordinator;
use crate::config::IndexerConfig;
use crate::engine::{Projection, Projector};
use crate::error::IndexResult;
use crate::lookup::{RateLimitedLookup, ResourceLookup};
use crate::schema::SchemaTable;
use crate::types::DocumentEnvelope;

/// Projects top-level documents and follows their chainable references.
///
/// Without a lookup (or with chaining disabled) [`index`](Self::index) is
/// plain projection.
#[derive(Debug, Clone)]
pub struct Indexer {
    config: IndexerConfig,
    projector: Projector,
    chains: Option<ChainCoordinator>,
}

impl Indexer {
    /// Creates an indexer over `schema`. Fails with the configuration's
    /// validation errors.
    pub fn new(schema: Arc<SchemaTable>, config: IndexerConfig) -> Result<Self, Vec<String>> {
        let projector = Projector::from_config(schema, &config)?;
        Ok(Self {
            config,
            projector,
            chains: None,
        })
    }

    /// Creates an indexer over the built-in schema with default settings.
    pub fn with_defaults(base_url: impl Into<String>) -> Result<Self, Vec<String>> {
        let schema = SchemaTable::builtin().map_err(|e| vec![e.to_string()])?;
        Self::new(Arc::new(schema), IndexerConfig::with_base_url(base_url))
    }

    /// Enables chaining through `lookup`, bounded by
    /// [`lookup_concurrency`](IndexerConfig::lookup_concurrency) in-flight
    /// lookups.
    pub fn with_lookup(mut self, lookup: Arc<dyn ResourceLookup>) -> Self {
        if !self.config.chaining_enabled {
            debug!("Chaining disabled; lookup ignored");
            return self;
        }
        let limited = RateLimitedLookup::new(lookup, self.config.lookup_concurrency);
        self.chains = Some(
            ChainCoordinator::new(self.projector.clone(), Arc::new(limited))
                .with_max_depth(self.config.max_chain_depth),
        );
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &IndexerConfig {
        &self.config
    }

    /// Returns the projector.
    pub fn projector(&self) -> &Projector {
        &self.projector
    }

    /// Returns true if chainable references will be followed.
    pub fn chaining(&self) -> bool {
        self.chains.is_some()
    }

    /// Projects a document without chaining.
    pub fn project(&self, envelope: &DocumentEnvelope) -> IndexResult<Projection> {
        self.projector.project(envelope, &self.config.base_url, None)
    }

    /// Projects a document and follows its chainable references.
    ///
    /// Only projection errors are returned; chain failures are recorded on
    /// the projection.
    pub async fn index(&self, envelope: &DocumentEnvelope) -> IndexResult<Projection> {
        let mut projection = self.project(envelope)?;
        if let Some(chains) = &self.chains {
            chains
                .chain_projection(&mut projection, &self.config.base_url)
                .await;
        }
        Ok(projection)
    }
}
