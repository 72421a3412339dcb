//! Field paths and navigation over parsed documents.
//!
//! A [`FieldPath`] is a restricted FHIRPath: dotted element names plus a few
//! functions that can be answered without evaluation.
//!
//! | Syntax | Meaning |
//! |--------|---------|
//! | `participant.actor` | child elements, arrays flattened |
//! | `occurrence[x]` | any typed variant (`occurrenceDateTime`, `occurrencePeriod`, ...) |
//! | `value.ofType(Quantity)`, `value.as(Quantity)` | one typed variant |
//! | `(Observation.value as Quantity)` | same, FHIRPath cast form |
//! | `telecom.where(system='phone')` | keep elements whose `system` is `phone` |
//! | `subject.where(resolve() is Patient)` | keep references whose type segment is `Patient` |
//!
//! A leading resource type (`Task.owner`) is stripped.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::SchemaError;

static WHERE_EQ: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^where\(\s*([A-Za-z_][A-Za-z0-9_]*)\s*=\s*'([^']*)'\s*\)$")
        .expect("valid where pattern")
});

static WHERE_RESOLVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^where\(\s*resolve\(\)\s+is\s+([A-Za-z]+)\s*\)$")
        .expect("valid resolve pattern")
});

static TYPE_FN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:ofType|as)\(\s*([A-Za-z]+)\s*\)$")
        .expect("valid type pattern")
});

static CAST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\(\s*([A-Za-z0-9_.\[\]]+)\s+as\s+([A-Za-z]+)\s*\)$")
        .expect("valid cast pattern")
});

/// Concrete type of a polymorphic (`[x]`) element.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ChoiceType {
    Boolean,
    Integer,
    Decimal,
    String,
    Code,
    Uri,
    Date,
    DateTime,
    Instant,
    Period,
    Timing,
    Quantity,
    Age,
    Duration,
    Money,
    Range,
    Coding,
    CodeableConcept,
    Identifier,
    Reference,
    /// Any other datatype, by its FHIR name.
    Other(String),
}

impl ChoiceType {
    /// Returns the FHIR datatype name.
    pub fn name(&self) -> &str {
        match self {
            ChoiceType::Boolean => "boolean",
            ChoiceType::Integer => "integer",
            ChoiceType::Decimal => "decimal",
            ChoiceType::String => "string",
            ChoiceType::Code => "code",
            ChoiceType::Uri => "uri",
            ChoiceType::Date => "date",
            ChoiceType::DateTime => "dateTime",
            ChoiceType::Instant => "instant",
            ChoiceType::Period => "Period",
            ChoiceType::Timing => "Timing",
            ChoiceType::Quantity => "Quantity",
            ChoiceType::Age => "Age",
            ChoiceType::Duration => "Duration",
            ChoiceType::Money => "Money",
            ChoiceType::Range => "Range",
            ChoiceType::Coding => "Coding",
            ChoiceType::CodeableConcept => "CodeableConcept",
            ChoiceType::Identifier => "Identifier",
            ChoiceType::Reference => "Reference",
            ChoiceType::Other(name) => name,
        }
    }

    /// Parses a datatype name (`dateTime`) or property suffix (`DateTime`).
    pub fn from_name(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "boolean" => ChoiceType::Boolean,
            "integer" | "positiveint" | "unsignedint" | "integer64" => ChoiceType::Integer,
            "decimal" => ChoiceType::Decimal,
            "string" | "markdown" => ChoiceType::String,
            "code" | "id" => ChoiceType::Code,
            "uri" | "url" | "canonical" | "oid" | "uuid" => ChoiceType::Uri,
            "date" => ChoiceType::Date,
            "datetime" => ChoiceType::DateTime,
            "instant" => ChoiceType::Instant,
            "period" => ChoiceType::Period,
            "timing" => ChoiceType::Timing,
            "quantity" | "simplequantity" | "count" | "distance" => ChoiceType::Quantity,
            "age" => ChoiceType::Age,
            "duration" => ChoiceType::Duration,
            "money" => ChoiceType::Money,
            "range" => ChoiceType::Range,
            "coding" => ChoiceType::Coding,
            "codeableconcept" => ChoiceType::CodeableConcept,
            "identifier" => ChoiceType::Identifier,
            "reference" => ChoiceType::Reference,
            _ => ChoiceType::Other(s.to_string()),
        }
    }

    /// Returns true for the Quantity family (Age, Duration, ...).
    pub fn is_quantity(&self) -> bool {
        matches!(
            self,
            ChoiceType::Quantity | ChoiceType::Age | ChoiceType::Duration | ChoiceType::Money
        )
    }

    /// Returns true for primitive date-like types.
    pub fn is_temporal(&self) -> bool {
        matches!(
            self,
            ChoiceType::Date | ChoiceType::DateTime | ChoiceType::Instant
        )
    }
}

impl fmt::Display for ChoiceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One step of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// A named child element. Falls back to typed variants when the plain
    /// name is absent, so `effective` also finds `effectiveDateTime`.
    Field(String),
    /// A polymorphic element, optionally restricted to some types.
    Choice {
        /// Element name without the type suffix.
        name: String,
        /// Allowed types; empty means any.
        allowed: Vec<ChoiceType>,
    },
    /// Keeps objects whose `key` property equals `value`.
    Where {
        /// Property name.
        key: String,
        /// Required string value.
        value: String,
    },
    /// Keeps references whose type segment equals the given type.
    ResolvesTo(String),
}

/// A parsed field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldPath {
    raw: String,
    segments: Vec<Segment>,
}

impl FieldPath {
    /// Parses a field path.
    pub fn parse(raw: &str) -> Result<Self, SchemaError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(invalid(raw, "empty path"));
        }

        let rewritten;
        let source = if let Some(caps) = CAST.captures(trimmed) {
            rewritten = format!("{}.ofType({})", &caps[1], &caps[2]);
            rewritten.as_str()
        } else {
            trimmed
        };

        let parts = split_top_level(source).map_err(|m| invalid(raw, m))?;
        let mut segments: Vec<Segment> = Vec::new();

        for (index, part) in parts.iter().enumerate() {
            let part = part.trim();
            if part.is_empty() {
                return Err(invalid(raw, "empty segment"));
            }

            // Resource type prefix
            if index == 0 && parts.len() > 1 && starts_uppercase(part) && !part.contains('(') {
                continue;
            }

            if let Some(caps) = WHERE_RESOLVE.captures(part) {
                segments.push(Segment::ResolvesTo(caps[1].to_string()));
            } else if let Some(caps) = WHERE_EQ.captures(part) {
                segments.push(Segment::Where {
                    key: caps[1].to_string(),
                    value: caps[2].to_string(),
                });
            } else if let Some(caps) = TYPE_FN.captures(part) {
                let ty = parse_choice(&caps[1]);
                match segments.pop() {
                    Some(Segment::Field(name)) => segments.push(Segment::Choice {
                        name,
                        allowed: vec![ty],
                    }),
                    Some(Segment::Choice { name, allowed }) if allowed.is_empty() => {
                        segments.push(Segment::Choice {
                            name,
                            allowed: vec![ty],
                        })
                    }
                    _ => return Err(invalid(raw, "type filter must follow an element")),
                }
            } else if let Some(name) = part.strip_suffix("[x]") {
                if !is_identifier(name) {
                    return Err(invalid(raw, format!("invalid element name '{}'", name)));
                }
                segments.push(Segment::Choice {
                    name: name.to_string(),
                    allowed: Vec::new(),
                });
            } else if is_identifier(part) {
                segments.push(Segment::Field(part.to_string()));
            } else {
                return Err(invalid(raw, format!("unsupported expression '{}'", part)));
            }
        }

        if segments.is_empty() {
            return Err(invalid(raw, "path selects the whole document"));
        }

        Ok(Self {
            raw: raw.trim().to_string(),
            segments,
        })
    }

    /// Returns the path as written.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Returns the parsed segments.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Selects all nodes reachable through this path from `root`.
    pub fn select<'a>(&self, root: &'a Value) -> Vec<Node<'a>> {
        let mut current = vec![Node::new(root)];

        for segment in &self.segments {
            let mut next = Vec::new();
            for node in current {
                step(node, segment, &mut next);
            }
            if next.is_empty() {
                return next;
            }
            current = next;
        }

        current
    }
}

impl fmt::Display for FieldPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

/// A value reached by a field path, with its concrete type when the element
/// was polymorphic.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Node<'a> {
    /// The JSON value.
    pub value: &'a Value,
    /// Concrete type from the property suffix, for choice elements.
    pub choice: Option<&'a str>,
}

impl<'a> Node<'a> {
    fn new(value: &'a Value) -> Self {
        Self {
            value,
            choice: None,
        }
    }

    /// Returns the concrete type, if known.
    pub fn choice_type(&self) -> Option<ChoiceType> {
        self.choice.map(parse_choice)
    }

    /// Returns the string value of a primitive node.
    pub fn as_str(&self) -> Option<&'a str> {
        self.value.as_str()
    }

    /// Returns a string property of an object node.
    pub fn str_field(&self, key: &str) -> Option<&'a str> {
        self.value
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.trim().is_empty())
    }
}

fn step<'a>(node: Node<'a>, segment: &Segment, out: &mut Vec<Node<'a>>) {
    // Collections are flattened before each step
    if let Value::Array(items) = node.value {
        for item in items {
            step(
                Node {
                    value: item,
                    choice: node.choice,
                },
                segment,
                out,
            );
        }
        return;
    }

    match segment {
        Segment::Field(name) => {
            let Value::Object(obj) = node.value else {
                return;
            };
            if let Some(child) = obj.get(name) {
                push_flat(Node::new(child), out);
            } else {
                select_choice(obj, name, &[], true, out);
            }
        }
        Segment::Choice { name, allowed } => {
            if let Value::Object(obj) = node.value {
                select_choice(obj, name, allowed, false, out);
            }
        }
        Segment::Where { key, value } => {
            if node.value.get(key).and_then(Value::as_str) == Some(value.as_str()) {
                out.push(node);
            }
        }
        Segment::ResolvesTo(target) => {
            let reference = node
                .value
                .get("reference")
                .and_then(Value::as_str)
                .or_else(|| node.value.as_str());
            if reference.is_some_and(|r| reference_type(r) == Some(target.as_str())) {
                out.push(node);
            }
        }
    }
}

fn select_choice<'a>(
    obj: &'a serde_json::Map<String, Value>,
    name: &str,
    allowed: &[ChoiceType],
    known_only: bool,
    out: &mut Vec<Node<'a>>,
) {
    for (key, child) in obj {
        let Some(suffix) = key.strip_prefix(name) else {
            continue;
        };
        if !starts_uppercase(suffix) {
            continue;
        }
        let ty = parse_choice(suffix);
        // `statusReason` is not a typed variant of `status`
        if known_only && matches!(ty, ChoiceType::Other(_)) {
            continue;
        }
        if !allowed.is_empty() && !allowed.contains(&ty) {
            continue;
        }
        push_flat(
            Node {
                value: child,
                choice: Some(suffix),
            },
            out,
        );
    }
}

fn push_flat<'a>(node: Node<'a>, out: &mut Vec<Node<'a>>) {
    match node.value {
        Value::Array(items) => {
            for item in items {
                push_flat(
                    Node {
                        value: item,
                        choice: node.choice,
                    },
                    out,
                );
            }
        }
        Value::Null => {}
        _ => out.push(node),
    }
}

/// Returns the resource type segment of a reference (`Patient` for
/// `Patient/1` or `https://ex.org/fhir/Patient/1/_history/2`).
pub fn reference_type(reference: &str) -> Option<&str> {
    let path = reference.split(['?', '#']).next().unwrap_or(reference);
    let parts: Vec<&str> = path.split('/').filter(|p| !p.is_empty()).collect();
    let parts = match parts.iter().position(|p| *p == "_history") {
        Some(pos) => &parts[..pos],
        None => &parts[..],
    };
    if parts.len() < 2 {
        return None;
    }
    let candidate = parts[parts.len() - 2];
    starts_uppercase(candidate).then_some(candidate)
}

fn parse_choice(name: &str) -> ChoiceType {
    ChoiceType::from_name(name)
}

fn split_top_level(source: &str) -> Result<Vec<&str>, &'static str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut in_quote = false;
    let mut start = 0;

    for (i, c) in source.char_indices() {
        match c {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.checked_sub(1).ok_or("unbalanced parentheses")?;
            }
            '.' if !in_quote && depth == 0 => {
                parts.push(&source[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }

    if depth != 0 || in_quote {
        return Err("unbalanced parentheses or quotes");
    }
    parts.push(&source[start..]);
    Ok(parts)
}

fn starts_uppercase(s: &str) -> bool {
    s.chars().next().is_some_and(|c| c.is_ascii_uppercase())
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

fn invalid(path: &str, message: impl Into<String>) -> SchemaError {
    SchemaError::InvalidPath {
        path: path.to_string(),
        message: message.into(),
    }
}
