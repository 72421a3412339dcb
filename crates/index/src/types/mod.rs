//! Core types shared across the indexing layer.
//!
//! - [`Entry`], [`EntryValue`], [`EntryKind`] - projection output
//! - [`EntryRecord`] - flat wire shape of an entry
//! - [`PreciseDecimal`] - quantity and number payloads
//! - [`DocumentEnvelope`], [`Tag`] - projection input
//! - [`ChainContext`] - state threaded through chained projections

mod chain;
mod decimal;
mod document;
mod entry;

pub use chain::ChainContext;
pub use decimal::PreciseDecimal;
pub use document::{DocumentEnvelope, Tag};
pub use entry::{Entry, EntryKind, EntryRecord, EntryValue, PERIOD_TAG};
