//! Value encoders.
//!
//! Each encoder turns one node reached by a field path into zero or more
//! [`EntryValue`]s of a single kind. Encoders are pure: they see the node,
//! the base URL and the default offset, nothing else.
//!
//! | Kind | Sources |
//! |------|---------|
//! | Token | code, string, boolean, `Coding`, `CodeableConcept`, `Identifier`, `ContactPoint` |
//! | Reference | `Reference`, canonical/uri strings |
//! | Date | date/dateTime/instant strings, `Period`, `Timing` |
//! | Quantity | `Quantity`, `Age`, `Duration`, `Money` |
//! | String | strings, `HumanName`, `Address` |
//! | Number | decimal/integer primitives |
//!
//! Composites are encoded by [`composite::encode`] from their component
//! definitions rather than from a single node.

pub mod composite;
pub mod date;
pub mod number;
pub mod quantity;
pub mod reference;
pub mod string;
pub mod token;

use chrono::{FixedOffset, Offset, Utc};

use crate::error::ValueError;
use crate::path::Node;
use crate::types::{EntryKind, EntryValue};

/// Inputs shared by all encoders for one projection.
#[derive(Debug, Clone, Copy)]
pub struct EncodeContext<'a> {
    /// Base URL for absolutizing relative references.
    pub base_url: &'a str,
    /// Offset assumed for timestamps that carry none.
    pub default_offset: FixedOffset,
}

impl<'a> EncodeContext<'a> {
    /// Creates a context with a UTC default offset.
    pub fn new(base_url: &'a str) -> Self {
        Self {
            base_url,
            default_offset: utc_offset(),
        }
    }

    /// Sets the offset assumed for zone-less timestamps.
    pub fn with_default_offset(mut self, offset: FixedOffset) -> Self {
        self.default_offset = offset;
        self
    }
}

/// Encodes one node as `kind`.
///
/// Composite parameters have no single source node and return an error here.
pub fn encode(
    kind: EntryKind,
    node: &Node<'_>,
    ctx: &EncodeContext<'_>,
) -> Result<Vec<EntryValue>, ValueError> {
    match kind {
        EntryKind::Token => token::encode(node),
        EntryKind::Reference => reference::encode(node, ctx.base_url),
        EntryKind::Date => date::encode(node, ctx.default_offset),
        EntryKind::Quantity => quantity::encode(node),
        EntryKind::String => string::encode(node),
        EntryKind::Number => number::encode(node),
        EntryKind::Composite => Err(ValueError::new(
            "composite values are encoded from their components",
        )),
    }
}

pub(crate) fn utc_offset() -> FixedOffset {
    Utc.fix()
}
