//! Canonicalization helpers for dynamically typed front-matter values.
//!
//! Front matter arrives as an open union of scalars, lists and maps. These
//! helpers are the only place that branches on the runtime type; everything
//! downstream works with the canonical strings and integers they return.

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use serde_json::Value as JsonValue;
use serde_yaml::{Mapping, Value};

/// JSON-Schema style name of a value's type, used in error messages.
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Sequence(_) => "array",
        Value::Mapping(_) => "object",
        Value::Tagged(tagged) => type_name(&tagged.value),
    }
}

/// Render a scalar as its canonical decimal or textual form.
///
/// Whole floats drop their fraction (`30.0` → `"30"`); other floats keep the
/// shortest round-trip form (`3.11` → `"3.11"`).
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(i.to_string())
            } else if let Some(u) = n.as_u64() {
                Some(u.to_string())
            } else {
                n.as_f64().map(float_to_string)
            }
        }
        Value::Tagged(tagged) => scalar_to_string(&tagged.value),
        _ => None,
    }
}

fn float_to_string(f: f64) -> String {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

/// Read an integer, truncating floats toward negative infinity with a counted warning.
pub fn parse_int_value(
    value: &Value,
    field: &str,
    context: Option<&CompilerContext>,
) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                return Some(i);
            }
            if let Some(u) = n.as_u64() {
                return i64::try_from(u).ok();
            }
            let f = n.as_f64()?;
            if !f.is_finite() {
                return None;
            }
            if f.fract() != 0.0 {
                let message = format!("{} value {} truncated to {}", field, f, f.floor());
                match context {
                    Some(ctx) => ctx.warn(message),
                    None => tracing::warn!("{}", message),
                }
            }
            Some(f.floor() as i64)
        }
        Value::String(s) => s.trim().parse::<i64>().ok(),
        Value::Tagged(tagged) => parse_int_value(&tagged.value, field, context),
        _ => None,
    }
}

/// Reactions accepted on `on.reaction`.
pub const VALID_REACTIONS: &[&str] = &[
    "+1", "-1", "laugh", "confused", "heart", "hooray", "rocket", "eyes", "none",
];

/// Canonicalize an `on.reaction` value; numeric `1`/`-1` become `+1`/`-1`.
pub fn parse_reaction_value(value: &Value) -> Result<String, AppError> {
    let reaction = match value {
        Value::Number(n) => match n.as_f64() {
            Some(f) if f == 1.0 => Some("+1".to_string()),
            Some(f) if f == -1.0 => Some("-1".to_string()),
            _ => None,
        },
        Value::String(s) => Some(s.clone()),
        _ => None,
    };
    match reaction {
        Some(reaction) if VALID_REACTIONS.contains(&reaction.as_str()) => Ok(reaction),
        _ => Err(AppError::validation(format!(
            "invalid reaction value; must be one of: {}",
            VALID_REACTIONS.join(", ")
        ))
        .with_code("AW-VAL-040")
        .with_field("on.reaction")
        .with_value(scalar_to_string(value).unwrap_or_else(|| type_name(value).to_string()))),
    }
}

pub fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        _ => None,
    }
}

pub fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        _ => None,
    }
}

/// Look up a nested key path inside a mapping.
pub fn get_path<'a>(map: &'a Mapping, path: &[&str]) -> Option<&'a Value> {
    let (first, rest) = path.split_first()?;
    let mut current = map.get(*first)?;
    for key in rest {
        current = current.as_mapping()?.get(*key)?;
    }
    Some(current)
}

pub fn get_str<'a>(map: &'a Mapping, key: &str) -> Option<&'a str> {
    map.get(key).and_then(as_str)
}

pub fn get_bool(map: &Mapping, key: &str) -> Option<bool> {
    map.get(key).and_then(as_bool)
}

pub fn get_string(map: &Mapping, key: &str) -> Option<String> {
    map.get(key).and_then(scalar_to_string)
}

/// A list of scalars as strings; a lone scalar becomes a one-element list.
pub fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::Sequence(items) => Some(items.iter().filter_map(scalar_to_string).collect()),
        Value::Null => None,
        other => scalar_to_string(other).map(|s| vec![s]),
    }
}

/// Comma-separated or list form, trimmed, empties removed.
pub fn comma_or_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        other => string_list(other)
            .unwrap_or_default()
            .into_iter()
            .map(|item| item.trim().to_string())
            .filter(|item| !item.is_empty())
            .collect(),
    }
}

/// Keys of a mapping as strings, in document order.
pub fn keys(map: &Mapping) -> Vec<String> {
    map.keys().filter_map(scalar_to_string).collect()
}

/// Convert YAML into JSON, stringifying non-string keys.
pub fn to_json(value: &Value) -> JsonValue {
    match value {
        Value::Null => JsonValue::Null,
        Value::Bool(b) => JsonValue::Bool(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                JsonValue::from(i)
            } else if let Some(u) = n.as_u64() {
                JsonValue::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map(JsonValue::Number)
                    .unwrap_or(JsonValue::Null)
            }
        }
        Value::String(s) => JsonValue::String(s.clone()),
        Value::Sequence(items) => JsonValue::Array(items.iter().map(to_json).collect()),
        Value::Mapping(map) => {
            let mut out = serde_json::Map::new();
            for (key, item) in map {
                let key = scalar_to_string(key).unwrap_or_else(|| "null".to_string());
                out.insert(key, to_json(item));
            }
            JsonValue::Object(out)
        }
        Value::Tagged(tagged) => to_json(&tagged.value),
    }
}

/// Append items to a list, skipping ones already present.
pub fn push_unique(list: &mut Vec<String>, items: impl IntoIterator<Item = String>) {
    for item in items {
        if !list.contains(&item) {
            list.push(item);
        }
    }
}
