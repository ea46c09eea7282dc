#![allow(clippy::result_large_err)]

//! Front-matter schema validation.
//!
//! The schema is embedded at build time and compiled once per process. Errors
//! carry the JSON pointer of the offending node and, when the node can be found
//! in the source text, a `file:line:col` location.

pub mod locator;

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow::triggers::KNOWN_EVENTS;
use crate::core::workflow::values::{keys, to_json};
use jsonschema::Validator;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};
use std::path::Path;
use std::sync::OnceLock;

const SCHEMA_JSON: &str = include_str!("main_workflow.schema.json");

static VALIDATOR: OnceLock<Result<Validator, String>> = OnceLock::new();

/// Keys recognised inside maps the schema leaves open; others warn.
const OPEN_MAP_KEYS: &[(&str, &[&str])] = &[
    ("network", &["allowed", "firewall"]),
    ("sandbox", &["agent"]),
];

/// Compiler settings accepted under `on:` next to event names.
const TRIGGER_SETTING_KEYS: &[&str] = &["reaction", "manual-approval", "stop-after"];

/// Classified schema violation.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaErrorKind {
    MissingRequired,
    UnknownField { field: String },
    TypeMismatch { actual: String },
    InvalidEnum,
    Other,
}

#[derive(Debug, Clone)]
pub struct SchemaError {
    /// JSON pointer of the offending node, e.g. `/sandbox/agent`
    pub path: String,
    pub message: String,
    pub kind: SchemaErrorKind,
}

pub struct FrontMatterSchemaValidator {
    validator: &'static Validator,
}

impl FrontMatterSchemaValidator {
    pub fn new() -> Result<Self, AppError> {
        let compiled = VALIDATOR.get_or_init(|| {
            let schema: JsonValue = serde_json::from_str(SCHEMA_JSON)
                .map_err(|e| format!("failed to parse embedded schema: {}", e))?;
            Validator::new(&schema).map_err(|e| format!("failed to compile embedded schema: {}", e))
        });
        match compiled {
            Ok(validator) => Ok(Self { validator }),
            Err(reason) => Err(AppError::new(ErrorCategory::OperationError, reason.clone())
                .with_code("AW-OPS-020")),
        }
    }

    /// Raw violations of `front_matter`, in schema traversal order.
    pub fn violations(&self, front_matter: &Mapping) -> Vec<SchemaError> {
        let instance = to_json(&Value::Mapping(front_matter.clone()));
        self.validator
            .iter_errors(&instance)
            .map(|error| {
                let kind = classify_error(&error);
                let path = error.instance_path.to_string();
                let message = match &kind {
                    SchemaErrorKind::TypeMismatch { actual } => format!("{} (got {})", error, actual),
                    SchemaErrorKind::UnknownField { field } => format!("unknown property '{}'", field),
                    _ => error.to_string(),
                };
                let path = match &kind {
                    SchemaErrorKind::UnknownField { field } => format!("{}/{}", path, field),
                    _ => path,
                };
                SchemaError { path, message, kind }
            })
            .collect()
    }

    /// Validate and convert violations into one batched error.
    pub fn validate(
        &self,
        front_matter: &Mapping,
        source_path: &Path,
        front_matter_text: &str,
        first_line: usize,
    ) -> Result<(), AppError> {
        let violations = self.violations(front_matter);
        if violations.is_empty() {
            return Ok(());
        }
        let errors = violations
            .into_iter()
            .map(|violation| {
                let (line, column) = locator::locate(front_matter_text, &violation.path).unwrap_or((1, 1));
                let field = if violation.path.is_empty() {
                    "/".to_string()
                } else {
                    violation.path.clone()
                };
                AppError::validation(violation.message)
                    .with_code(code_for(&violation.kind))
                    .with_field(field)
                    .with_location(format!(
                        "{}:{}:{}",
                        source_path.display(),
                        line + first_line - 1,
                        column
                    ))
            })
            .collect();
        Err(AppError::batch(ErrorCategory::ValidationError, errors))
    }
}

fn code_for(kind: &SchemaErrorKind) -> &'static str {
    match kind {
        SchemaErrorKind::MissingRequired => "AW-SCH-001",
        SchemaErrorKind::UnknownField { .. } => "AW-SCH-002",
        SchemaErrorKind::TypeMismatch { .. } => "AW-SCH-003",
        SchemaErrorKind::InvalidEnum => "AW-SCH-004",
        SchemaErrorKind::Other => "AW-SCH-000",
    }
}

fn classify_error(error: &jsonschema::ValidationError) -> SchemaErrorKind {
    let kind = format!("{:?}", error.kind);
    if kind.starts_with("Required") {
        SchemaErrorKind::MissingRequired
    } else if kind.starts_with("AdditionalProperties") {
        let field = extract_quoted(&error.to_string()).unwrap_or_else(|| "unknown".to_string());
        SchemaErrorKind::UnknownField { field }
    } else if kind.starts_with("Type") {
        SchemaErrorKind::TypeMismatch {
            actual: json_type_name(&error.instance).to_string(),
        }
    } else if kind.starts_with("Enum") {
        SchemaErrorKind::InvalidEnum
    } else {
        SchemaErrorKind::Other
    }
}

fn extract_quoted(message: &str) -> Option<String> {
    for quote in ['\'', '"'] {
        if let Some(start) = message.find(quote) {
            if let Some(end) = message[start + 1..].find(quote) {
                return Some(message[start + 1..start + 1 + end].to_string());
            }
        }
    }
    None
}

fn json_type_name(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(n) if n.is_f64() => "number",
        JsonValue::Number(_) => "integer",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "array",
        JsonValue::Object(_) => "object",
    }
}

/// Warn about unrecognised keys inside open maps.
pub fn warn_unknown_nested_keys(front_matter: &Mapping, context: &CompilerContext) {
    if let Some(Value::Mapping(on)) = front_matter.get("on") {
        for key in keys(on) {
            if !KNOWN_EVENTS.contains(&key.as_str()) && !TRIGGER_SETTING_KEYS.contains(&key.as_str()) {
                context.warn(format!("unknown event '{}' in 'on' is passed through unchanged", key));
            }
        }
    }
    for (section, known) in OPEN_MAP_KEYS {
        let Some(Value::Mapping(map)) = front_matter.get(*section) else {
            continue;
        };
        for key in keys(map) {
            if !known.contains(&key.as_str()) {
                context.warn(format!("unknown key '{}' in '{}' is ignored", key, section));
            }
        }
    }
}
