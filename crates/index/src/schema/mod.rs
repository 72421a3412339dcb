//! Schema table.
//!
//! The table maps each document type to its declared parameters: name, kind,
//! source field paths and whether the parameter may be chained. It is built
//! once (from the built-in table, schema files or `SearchParameter`
//! resources) and read-only afterwards.
//!
//! Parameters keep their declaration order so projection output is stable.

mod builtin;
mod loader;

pub use loader::SchemaLoader;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::SchemaError;
use crate::path::FieldPath;
use crate::types::EntryKind;

/// One component of a composite parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Kind the component is encoded as.
    pub kind: EntryKind,
    /// Path relative to the composite's root element.
    pub path: FieldPath,
}

/// A declared parameter of one document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamDef {
    /// Parameter name.
    pub name: String,
    /// Entry kind.
    pub kind: EntryKind,
    /// Source paths. For composites these select the root elements the
    /// components are read from; empty means the document itself.
    pub paths: Vec<FieldPath>,
    /// Reference parameters only: whether targets are chained.
    pub chainable: bool,
    /// Composite components, in encoding order.
    pub components: Vec<Component>,
}

impl ParamDef {
    /// Creates a parameter from path strings.
    pub fn new(name: impl Into<String>, kind: EntryKind, paths: &[&str]) -> Result<Self, SchemaError> {
        let paths = paths
            .iter()
            .map(|p| FieldPath::parse(p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            name: name.into(),
            kind,
            paths,
            chainable: false,
            components: Vec::new(),
        })
    }

    /// Marks a reference parameter as chainable.
    pub fn chainable(mut self) -> Self {
        self.chainable = self.kind == EntryKind::Reference;
        self
    }

    /// Adds a composite component.
    pub fn with_component(mut self, kind: EntryKind, path: &str) -> Result<Self, SchemaError> {
        self.components.push(Component {
            kind,
            path: FieldPath::parse(path)?,
        });
        Ok(self)
    }

    /// Checks the definition against `resource_type`.
    pub fn validate(&self, resource_type: &str) -> Result<(), SchemaError> {
        let fail = |message: &str| SchemaError::InvalidParameter {
            resource_type: resource_type.to_string(),
            param: self.name.clone(),
            message: message.to_string(),
        };

        if self.name.trim().is_empty() {
            return Err(fail("name is empty"));
        }
        if self.name.contains('.') {
            return Err(fail("name must not contain '.'"));
        }
        if self.chainable && self.kind != EntryKind::Reference {
            return Err(fail("only reference parameters can be chained"));
        }
        match self.kind {
            EntryKind::Composite => {
                if self.components.len() < 2 {
                    return Err(fail("composite needs at least two components"));
                }
                if self.components.iter().any(|c| c.kind == EntryKind::Composite) {
                    return Err(fail("composite components cannot be composite"));
                }
            }
            _ => {
                if self.paths.is_empty() {
                    return Err(fail("no source paths"));
                }
                if !self.components.is_empty() {
                    return Err(fail("only composite parameters have components"));
                }
            }
        }
        Ok(())
    }
}

/// Parameters of one document type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceSchema {
    params: Vec<ParamDef>,
}

impl ResourceSchema {
    /// Returns parameters in declaration order.
    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// Looks up a parameter by name.
    pub fn param(&self, name: &str) -> Option<&ParamDef> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Adds a parameter, replacing one of the same name in place.
    pub fn upsert(&mut self, param: ParamDef) {
        match self.params.iter_mut().find(|p| p.name == param.name) {
            Some(existing) => *existing = param,
            None => self.params.push(param),
        }
    }
}

/// Per-type parameter table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SchemaTable {
    types: HashMap<String, ResourceSchema>,
}

impl SchemaTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates the built-in table.
    pub fn builtin() -> Result<Self, SchemaError> {
        builtin::table()
    }

    /// Returns the schema of `resource_type`.
    pub fn get(&self, resource_type: &str) -> Option<&ResourceSchema> {
        self.types.get(resource_type)
    }

    /// Returns true if `resource_type` has a schema.
    pub fn supports(&self, resource_type: &str) -> bool {
        self.types.contains_key(resource_type)
    }

    /// Adds or replaces a parameter of `resource_type`.
    pub fn insert(&mut self, resource_type: &str, param: ParamDef) -> Result<(), SchemaError> {
        param.validate(resource_type)?;
        self.types
            .entry(resource_type.to_string())
            .or_default()
            .upsert(param);
        Ok(())
    }

    /// Registers a type with no parameters of its own. Its documents still
    /// get the universal entries.
    pub fn register_type(&mut self, resource_type: &str) {
        self.types.entry(resource_type.to_string()).or_default();
    }

    /// Merges `other` into this table. Parameters from `other` win.
    pub fn merge(&mut self, other: SchemaTable) {
        let mut incoming: Vec<_> = other.types.into_iter().collect();
        incoming.sort_by(|a, b| a.0.cmp(&b.0));
        for (resource_type, schema) in incoming {
            let target = self.types.entry(resource_type).or_default();
            for param in schema.params {
                target.upsert(param);
            }
        }
    }

    /// Returns the supported types, sorted.
    pub fn resource_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.types.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }

    /// Returns the number of supported types.
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Returns true if no type is supported.
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Serialized form of a schema file.
///
/// ```json
/// {
///   "resources": {
///     "Task": [
///       {"name": "owner", "kind": "reference", "paths": ["owner"], "chainable": true}
///     ]
///   }
/// }
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaFile {
    /// Parameters per document type.
    pub resources: std::collections::BTreeMap<String, Vec<ParamSpec>>,
}

/// Serialized parameter definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParamSpec {
    /// Parameter name.
    pub name: String,
    /// Entry kind (`token`, `reference`, ...).
    pub kind: EntryKind,
    /// Source paths.
    #[serde(default)]
    pub paths: Vec<String>,
    /// Whether reference targets are chained.
    #[serde(default)]
    pub chainable: bool,
    /// Composite components.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub components: Vec<ComponentSpec>,
}

/// Serialized composite component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentSpec {
    /// Component kind.
    pub kind: EntryKind,
    /// Path relative to the composite root.
    pub path: String,
}

impl ParamSpec {
    /// Converts into a parameter definition.
    pub fn into_param(self) -> Result<ParamDef, SchemaError> {
        let paths: Vec<&str> = self.paths.iter().map(String::as_str).collect();
        let mut param = ParamDef::new(self.name, self.kind, &paths)?;
        param.chainable = self.chainable;
        for component in &self.components {
            param = param.with_component(component.kind, &component.path)?;
        }
        Ok(param)
    }
}
