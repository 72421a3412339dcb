//! Indexer configuration.
//!
//! # Example
//!
//! ```rust
//! use helios_index::IndexerConfig;
//!
//! let config = IndexerConfig {
//!     base_url: "https://ex.org/fhir/".to_string(),
//!     max_chain_depth: 2,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use chrono::FixedOffset;
use serde::{Deserialize, Serialize};

use crate::compartment::{CompartmentMarker, default_markers};

/// Configuration for projection and chaining.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    /// Base URL used to absolutize relative references.
    pub base_url: String,

    /// Whether chainable references are followed.
    pub chaining_enabled: bool,

    /// Maximum number of hops followed from a top-level document.
    pub max_chain_depth: usize,

    /// Offset applied to timestamps without one (`+00:00`, `-05:00`, `Z`).
    pub default_timezone_offset: String,

    /// Compartment markers used to infer implicit parameters.
    pub compartments: Vec<CompartmentMarker>,

    /// Cap on combinations emitted per composite parameter and root element.
    pub max_composite_tuples: usize,

    /// Maximum concurrent lookups (and batch projections).
    pub lookup_concurrency: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/".to_string(),
            chaining_enabled: true,
            max_chain_depth: 1,
            default_timezone_offset: "+00:00".to_string(),
            compartments: default_markers(),
            max_composite_tuples: 64,
            lookup_concurrency: 8,
        }
    }
}

impl IndexerConfig {
    /// Creates a configuration with the given base URL.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Parses [`default_timezone_offset`](Self::default_timezone_offset).
    pub fn default_offset(&self) -> Result<FixedOffset, String> {
        parse_offset(&self.default_timezone_offset)
    }

    /// Validates the configuration and returns errors if any.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.base_url.trim().is_empty() {
            errors.push("Base URL cannot be empty".to_string());
        }

        if self.chaining_enabled && self.max_chain_depth == 0 {
            errors.push("Max chain depth must be at least 1 when chaining is enabled".to_string());
        }

        if let Err(e) = self.default_offset() {
            errors.push(e);
        }

        if self.max_composite_tuples == 0 {
            errors.push("Max composite tuples cannot be 0".to_string());
        }

        if self.lookup_concurrency == 0 {
            errors.push("Lookup concurrency cannot be 0".to_string());
        }

        for marker in &self.compartments {
            if marker.marker.is_empty() || marker.parameter.is_empty() {
                errors.push("Compartment markers need a marker and a parameter".to_string());
                break;
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Parses `Z`, `+hh:mm` or `-hh:mm`.
pub fn parse_offset(raw: &str) -> Result<FixedOffset, String> {
    let s = raw.trim();
    if s.eq_ignore_ascii_case("z") {
        return FixedOffset::east_opt(0).ok_or_else(|| invalid_offset(raw));
    }

    let sign = match s.chars().next() {
        Some('+') => 1,
        Some('-') => -1,
        _ => return Err(invalid_offset(raw)),
    };
    let (hours, minutes) = s[1..].split_once(':').ok_or_else(|| invalid_offset(raw))?;
    let hours: i32 = hours.parse().map_err(|_| invalid_offset(raw))?;
    let minutes: i32 = minutes.parse().map_err(|_| invalid_offset(raw))?;
    if hours > 23 || minutes > 59 {
        return Err(invalid_offset(raw));
    }

    FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).ok_or_else(|| invalid_offset(raw))
}

fn invalid_offset(raw: &str) -> String {
    format!("Invalid time-zone offset '{}' (expected Z or +hh:mm)", raw)
}
