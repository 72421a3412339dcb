//! Chain context threaded through chained projections.

use std::collections::BTreeSet;

/// Context for projecting a document reached through a reference.
///
/// `originating_parameter_name` holds the full prefix: for a two-hop chain it
/// is `subject.organization`, so chained entries come out as
/// `subject.organization.name`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainContext {
    /// Base URL used to absolutize references in the chained document.
    pub base_url: String,
    /// Prefix applied to every parameter produced under this context.
    pub originating_parameter_name: String,
    /// 1 for a direct chain from a top-level document.
    pub depth: usize,
    /// Absolute references already visited on this chain.
    pub visited_reference_ids: BTreeSet<String>,
}

impl ChainContext {
    /// Creates a first-hop context.
    pub fn new(base_url: impl Into<String>, param: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            originating_parameter_name: param.into(),
            depth: 1,
            visited_reference_ids: BTreeSet::new(),
        }
    }

    /// Records references as visited.
    pub fn with_visited<I, S>(mut self, references: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.visited_reference_ids
            .extend(references.into_iter().map(Into::into));
        self
    }

    /// Returns a context one hop deeper, through `param` to `reference`.
    pub fn descend(&self, param: &str, reference: &str) -> Self {
        let mut visited = self.visited_reference_ids.clone();
        visited.insert(reference.to_string());
        Self {
            base_url: self.base_url.clone(),
            originating_parameter_name: format!("{}.{}", self.originating_parameter_name, param),
            depth: self.depth + 1,
            visited_reference_ids: visited,
        }
    }

    /// Returns true if `reference` was already visited.
    pub fn has_visited(&self, reference: &str) -> bool {
        self.visited_reference_ids.contains(reference)
    }

    /// Applies the chain prefix to a parameter name.
    pub fn prefixed(&self, name: &str) -> String {
        format!("{}.{}", self.originating_parameter_name, name)
    }
}
