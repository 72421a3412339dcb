//! Schema loading.
//!
//! Loads parameter tables from:
//! - schema files (`{"resources": {...}}`, see [`SchemaFile`])
//! - FHIR `SearchParameter` resources (a Bundle, an array, or a single one)
//!
//! `SearchParameter` expressions are read with the [`FieldPath`] subset.
//! Unions (`a | b`) are split and routed to the base type each branch names.
//! Parameters whose expressions fall outside the subset are skipped with a
//! warning; structural problems (missing `code`, unknown `type`) are errors.

use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use tracing::{debug, warn};

use crate::error::SchemaError;
use crate::path::FieldPath;
use crate::types::EntryKind;

use super::{Component, ParamDef, SchemaFile, SchemaTable};

/// Loader for schema files and `SearchParameter` resources.
#[derive(Debug, Clone, Copy, Default)]
pub struct SchemaLoader;

impl SchemaLoader {
    /// Creates a loader.
    pub fn new() -> Self {
        Self
    }

    /// Loads a schema file or `SearchParameter` JSON from disk.
    pub fn load_file(&self, path: &Path) -> Result<SchemaTable, SchemaError> {
        let content = std::fs::read_to_string(path).map_err(|e| SchemaError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let json: Value = serde_json::from_str(&content)?;
        let table = self.load_from_json(&json)?;
        debug!(
            path = %path.display(),
            resource_types = table.len(),
            "Loaded schema file"
        );
        Ok(table)
    }

    /// Loads from parsed JSON, detecting the format.
    pub fn load_from_json(&self, json: &Value) -> Result<SchemaTable, SchemaError> {
        if json.get("resources").is_some() {
            let file: SchemaFile = serde_json::from_value(json.clone())?;
            return self.load_schema_file(file);
        }
        self.load_search_parameters(json)
    }

    /// Converts a deserialized schema file.
    pub fn load_schema_file(&self, file: SchemaFile) -> Result<SchemaTable, SchemaError> {
        let mut table = SchemaTable::new();
        for (resource_type, specs) in file.resources {
            table.register_type(&resource_type);
            for spec in specs {
                table.insert(&resource_type, spec.into_param()?)?;
            }
        }
        Ok(table)
    }

    /// Loads `SearchParameter` resources from a Bundle, an array or a single
    /// resource.
    pub fn load_search_parameters(&self, json: &Value) -> Result<SchemaTable, SchemaError> {
        let resources: Vec<&Value> = if let Some(entries) = json.get("entry").and_then(Value::as_array) {
            entries.iter().filter_map(|e| e.get("resource")).collect()
        } else if let Some(items) = json.as_array() {
            items.iter().collect()
        } else {
            vec![json]
        };

        let resources: Vec<&Value> = resources
            .into_iter()
            .filter(|r| r.get("resourceType").and_then(Value::as_str) == Some("SearchParameter"))
            .collect();

        // Component definitions point at other parameters by URL
        let mut kinds_by_url: HashMap<&str, EntryKind> = HashMap::new();
        for resource in &resources {
            let url = resource.get("url").and_then(Value::as_str);
            let kind = resource
                .get("type")
                .and_then(Value::as_str)
                .and_then(|t| parse_kind(t).ok().flatten());
            if let (Some(url), Some(kind)) = (url, kind) {
                kinds_by_url.insert(url, kind);
            }
        }

        let mut table = SchemaTable::new();
        for resource in resources {
            self.add_search_parameter(&mut table, resource, &kinds_by_url)?;
        }
        Ok(table)
    }

    fn add_search_parameter(
        &self,
        table: &mut SchemaTable,
        resource: &Value,
        kinds_by_url: &HashMap<&str, EntryKind>,
    ) -> Result<(), SchemaError> {
        let url = resource.get("url").and_then(Value::as_str).map(String::from);
        let missing = |field: &str| SchemaError::MissingField {
            field: field.to_string(),
            url: url.clone(),
        };

        let code = resource
            .get("code")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("code"))?;
        let type_str = resource
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| missing("type"))?;
        let Some(kind) = parse_kind(type_str).map_err(|message| SchemaError::InvalidParameter {
            resource_type: "SearchParameter".to_string(),
            param: code.to_string(),
            message,
        })?
        else {
            debug!(param = code, "Skipping special search parameter");
            return Ok(());
        };

        if resource.get("status").and_then(Value::as_str) == Some("retired") {
            debug!(param = code, "Skipping retired search parameter");
            return Ok(());
        }

        // Universal parameters are produced by the projector itself
        if code.starts_with('_') {
            return Ok(());
        }

        let bases: Vec<&str> = resource
            .get("base")
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if bases.is_empty() {
            return Err(missing("base"));
        }

        let expression = resource
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or("")
            .trim();
        if expression.is_empty() && kind != EntryKind::Composite {
            return Err(missing("expression"));
        }

        let components = if kind == EntryKind::Composite {
            match self.parse_components(resource, kinds_by_url) {
                Ok(components) => components,
                Err(e) => {
                    warn!(param = code, error = %e, "Skipping composite search parameter");
                    return Ok(());
                }
            }
        } else {
            Vec::new()
        };

        for base in bases {
            let branches = branches_for(expression, base);
            if branches.is_empty() && kind != EntryKind::Composite {
                continue;
            }

            let mut paths = Vec::new();
            let mut unsupported = None;
            for branch in branches {
                // `Observation` alone selects the document itself
                if branch == base {
                    continue;
                }
                match FieldPath::parse(branch) {
                    Ok(path) => paths.push(path),
                    Err(e) => unsupported = Some(e),
                }
            }

            if let Some(e) = unsupported {
                warn!(
                    resource_type = base,
                    param = code,
                    error = %e,
                    "Skipping search parameter with unsupported expression"
                );
                continue;
            }

            let param = ParamDef {
                name: code.to_string(),
                kind,
                paths,
                chainable: kind == EntryKind::Reference,
                components: components.clone(),
            };
            table.insert(base, param)?;
        }

        Ok(())
    }

    fn parse_components(
        &self,
        resource: &Value,
        kinds_by_url: &HashMap<&str, EntryKind>,
    ) -> Result<Vec<Component>, SchemaError> {
        let url = resource.get("url").and_then(Value::as_str).map(String::from);
        let items = resource
            .get("component")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaError::MissingField {
                field: "component".to_string(),
                url: url.clone(),
            })?;

        let mut components = Vec::with_capacity(items.len());
        for item in items {
            let definition = item
                .get("definition")
                .and_then(Value::as_str)
                .ok_or_else(|| SchemaError::MissingField {
                    field: "component.definition".to_string(),
                    url: url.clone(),
                })?;
            let kind = kinds_by_url
                .get(definition)
                .copied()
                .ok_or_else(|| SchemaError::InvalidPath {
                    path: definition.to_string(),
                    message: "component definition not found in the same source".to_string(),
                })?;
            let expression = item
                .get("expression")
                .and_then(Value::as_str)
                .unwrap_or("")
                .trim();
            components.push(Component {
                kind,
                path: FieldPath::parse(expression)?,
            });
        }
        Ok(components)
    }
}

/// Maps a `SearchParameter.type` to an entry kind. `special` has no kind.
fn parse_kind(type_str: &str) -> Result<Option<EntryKind>, String> {
    match type_str {
        "uri" => Ok(Some(EntryKind::Token)),
        "special" => Ok(None),
        other => other.parse::<EntryKind>().map(Some),
    }
}

/// Returns the union branches of `expression` that apply to `base`.
///
/// A branch applies when it starts with `base`, with a generic resource
/// prefix, or with no type prefix at all.
fn branches_for<'a>(expression: &'a str, base: &str) -> Vec<&'a str> {
    if expression.is_empty() {
        return Vec::new();
    }

    split_union(expression)
        .into_iter()
        .map(str::trim)
        .filter(|branch| match type_prefix(branch) {
            Some(prefix) => {
                prefix == base || prefix == "Resource" || prefix == "DomainResource"
            }
            None => true,
        })
        .collect()
}

fn type_prefix(branch: &str) -> Option<&str> {
    let head = branch.trim_start_matches('(').trim_start();
    let end = head
        .find(|c: char| !c.is_ascii_alphanumeric())
        .unwrap_or(head.len());
    let name = &head[..end];
    name.chars()
        .next()
        .is_some_and(|c| c.is_ascii_uppercase())
        .then_some(name)
}

fn split_union(expression: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (i, c) in expression.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => depth = depth.saturating_sub(1),
            '|' if !in_quote && depth == 0 => {
                parts.push(&expression[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&expression[start..]);
    parts
}
