//! Index entries produced by projection.
//!
//! An [`Entry`] pairs a parameter name with a kind-specific [`EntryValue`].
//! Because the payload is an enum, an entry can only carry the fields that
//! belong to its kind. The flat wire shape handed to storage is
//! [`EntryRecord`].

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::PreciseDecimal;

/// Marker carried by period-valued date entries.
pub const PERIOD_TAG: &str = "PERIOD";

/// Entry kind discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Exact-match code with optional system.
    Token,
    /// Absolute reference to another document.
    Reference,
    /// Instant or period.
    Date,
    /// Decimal with unit.
    Quantity,
    /// Free text.
    String,
    /// Several sub-values that must match jointly.
    Composite,
    /// Plain decimal.
    Number,
}

impl EntryKind {
    /// Returns the lowercase name used on the wire.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Token => "token",
            EntryKind::Reference => "reference",
            EntryKind::Date => "date",
            EntryKind::Quantity => "quantity",
            EntryKind::String => "string",
            EntryKind::Composite => "composite",
            EntryKind::Number => "number",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "token" => Ok(EntryKind::Token),
            "reference" => Ok(EntryKind::Reference),
            "date" => Ok(EntryKind::Date),
            "quantity" => Ok(EntryKind::Quantity),
            "string" => Ok(EntryKind::String),
            "composite" => Ok(EntryKind::Composite),
            "number" => Ok(EntryKind::Number),
            _ => Err(format!("unknown entry kind: {}", s)),
        }
    }
}

/// Kind-specific payload of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryValue {
    /// A code with optional system and display text.
    Token {
        /// The code (or identifier value).
        code: String,
        /// Code system URI.
        system: Option<String>,
        /// Display text.
        text: Option<String>,
    },

    /// An absolute reference.
    Reference {
        /// Absolute reference string.
        reference: String,
    },

    /// A single instant, dual formatted.
    Instant {
        /// UTC, fixed-width, lexicographically sortable.
        utc: String,
        /// The same instant rendered in its local offset.
        local: String,
    },

    /// A period with optional open ends.
    Period {
        /// UTC start.
        start: Option<String>,
        /// UTC end.
        end: Option<String>,
        /// Local start.
        start_local: Option<String>,
        /// Local end.
        end_local: Option<String>,
    },

    /// A quantity.
    Quantity {
        /// Decimal value with its original scale.
        value: PreciseDecimal,
        /// Unit system URI.
        system: Option<String>,
        /// Coded unit, falling back to the display unit.
        code: Option<String>,
        /// Display unit.
        unit: Option<String>,
        /// Comparator (`<`, `<=`, `>=`, `>`).
        comparator: Option<String>,
    },

    /// Free text.
    String(String),

    /// Pre-joined composite tuple.
    Composite(String),

    /// Plain decimal.
    Number(PreciseDecimal),
}

impl EntryValue {
    /// Returns the kind of this value.
    pub fn kind(&self) -> EntryKind {
        match self {
            EntryValue::Token { .. } => EntryKind::Token,
            EntryValue::Reference { .. } => EntryKind::Reference,
            EntryValue::Instant { .. } | EntryValue::Period { .. } => EntryKind::Date,
            EntryValue::Quantity { .. } => EntryKind::Quantity,
            EntryValue::String(_) => EntryKind::String,
            EntryValue::Composite(_) => EntryKind::Composite,
            EntryValue::Number(_) => EntryKind::Number,
        }
    }

    /// Creates a token value.
    pub fn token(code: impl Into<String>, system: Option<String>, text: Option<String>) -> Self {
        EntryValue::Token {
            code: code.into(),
            system,
            text,
        }
    }

    /// Creates a reference value.
    pub fn reference(reference: impl Into<String>) -> Self {
        EntryValue::Reference {
            reference: reference.into(),
        }
    }

    /// Returns the primary value as a string (code, reference, UTC instant, ...).
    ///
    /// Periods have no single value and return `None`.
    pub fn primary(&self) -> Option<String> {
        match self {
            EntryValue::Token { code, .. } => Some(code.clone()),
            EntryValue::Reference { reference } => Some(reference.clone()),
            EntryValue::Instant { utc, .. } => Some(utc.clone()),
            EntryValue::Period { .. } => None,
            EntryValue::Quantity { value, .. } => Some(value.to_string()),
            EntryValue::String(s) | EntryValue::Composite(s) => Some(s.clone()),
            EntryValue::Number(n) => Some(n.to_string()),
        }
    }
}

/// A single indexed attribute extracted from a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    /// Parameter name, chain-prefixed for chained entries (e.g. `subject.name`).
    pub parameter_name: String,
    /// Kind-specific payload.
    pub value: EntryValue,
    /// Id of the document the entry was read from.
    pub source_document_id: Option<String>,
    /// 0 for the projected document, 1 for a directly chained one, ...
    pub chain_depth: usize,
}

impl Entry {
    /// Creates a top-level entry.
    pub fn new(parameter_name: impl Into<String>, value: EntryValue) -> Self {
        Self {
            parameter_name: parameter_name.into(),
            value,
            source_document_id: None,
            chain_depth: 0,
        }
    }

    /// Sets the source document id.
    pub fn with_source(mut self, document_id: Option<String>) -> Self {
        self.source_document_id = document_id;
        self
    }

    /// Sets the chain depth.
    pub fn with_depth(mut self, depth: usize) -> Self {
        self.chain_depth = depth;
        self
    }

    /// Returns the entry kind.
    pub fn kind(&self) -> EntryKind {
        self.value.kind()
    }

    /// Returns true for composite entries.
    pub fn is_composite(&self) -> bool {
        self.kind() == EntryKind::Composite
    }

    /// Returns the primary value string (see [`EntryValue::primary`]).
    pub fn primary_value(&self) -> Option<String> {
        self.value.primary()
    }

    /// Converts the entry into its flat wire record.
    pub fn to_record(&self) -> EntryRecord {
        let mut record = EntryRecord {
            parameter_name: self.parameter_name.clone(),
            kind: self.kind(),
            value: None,
            system: None,
            code: None,
            text: None,
            unit: None,
            comparator: None,
            range_start: None,
            range_end: None,
            range_start_local: None,
            range_end_local: None,
            is_composite: self.is_composite(),
            tag: None,
            source_document_id: self.source_document_id.clone(),
            chain_depth: self.chain_depth,
        };

        match &self.value {
            EntryValue::Token { code, system, text } => {
                record.value = Some(code.clone());
                record.system = system.clone();
                record.text = text.clone();
            }
            EntryValue::Reference { reference } => {
                record.value = Some(reference.clone());
            }
            EntryValue::Instant { utc, local } => {
                record.value = Some(utc.clone());
                record.range_start_local = Some(local.clone());
            }
            EntryValue::Period {
                start,
                end,
                start_local,
                end_local,
            } => {
                record.range_start = start.clone();
                record.range_end = end.clone();
                record.range_start_local = start_local.clone();
                record.range_end_local = end_local.clone();
                record.tag = Some(PERIOD_TAG.to_string());
            }
            EntryValue::Quantity {
                value,
                system,
                code,
                unit,
                comparator,
            } => {
                record.value = Some(value.to_string());
                record.system = system.clone();
                record.code = code.clone();
                record.unit = unit.clone();
                record.comparator = comparator.clone();
            }
            EntryValue::String(s) | EntryValue::Composite(s) => {
                record.value = Some(s.clone());
            }
            EntryValue::Number(n) => {
                record.value = Some(n.to_string());
            }
        }

        record
    }
}

impl Serialize for Entry {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_record().serialize(serializer)
    }
}

/// Flat representation of an entry as handed to storage.
///
/// Field names and the `kind` discriminator are stable across releases.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Parameter name.
    pub parameter_name: String,
    /// Kind discriminator.
    pub kind: EntryKind,
    /// Primary value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Code or unit system.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    /// Quantity unit code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Token display text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// Quantity display unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    /// Quantity comparator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comparator: Option<String>,
    /// Period start (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start: Option<String>,
    /// Period end (UTC).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end: Option<String>,
    /// Local start (instants and periods).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_start_local: Option<String>,
    /// Local end.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub range_end_local: Option<String>,
    /// True for composite entries.
    #[serde(default)]
    pub is_composite: bool,
    /// `PERIOD` for period-valued date entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    /// Source document id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_document_id: Option<String>,
    /// Chain depth.
    #[serde(default)]
    pub chain_depth: usize,
}
