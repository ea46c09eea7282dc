#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::workflow::values::scalar_to_string;
use serde_yaml::{Mapping, Value};

/// Sections whose entries are MCP-style server maps; differing scalars there conflict.
const SERVER_SECTIONS: &[&str] = &["tools", "mcp-servers"];

/// Merge `incoming` beneath `base`.
///
/// Scalars already present in `base` win, maps merge key-wise and sequences are
/// unioned with `base` items first.
pub fn merge_under(base: &mut Mapping, incoming: &Mapping) {
    for (key, value) in incoming {
        match base.get_mut(key) {
            Some(existing) => merge_value(existing, value),
            None => {
                base.insert(key.clone(), value.clone());
            }
        }
    }
}

fn merge_value(base: &mut Value, incoming: &Value) {
    match (base, incoming) {
        (Value::Mapping(base_map), Value::Mapping(incoming_map)) => merge_under(base_map, incoming_map),
        (Value::Sequence(base_items), Value::Sequence(incoming_items)) => {
            union_sequence(base_items, incoming_items)
        }
        _ => {}
    }
}

fn union_sequence(base: &mut Vec<Value>, incoming: &[Value]) {
    for item in incoming {
        if !base.contains(item) {
            base.push(item.clone());
        }
    }
}

/// Fold one imported front matter into the accumulated imports.
///
/// Behaves like [`merge_under`] except that server entries under `tools:` and
/// `mcp-servers:` must agree on every field other than `allowed`.
pub fn merge_import(acc: &mut Mapping, incoming: &Mapping, origin: &str) -> Result<(), AppError> {
    for (key, value) in incoming {
        let key_name = scalar_to_string(key).unwrap_or_default();
        let is_server_section = SERVER_SECTIONS.contains(&key_name.as_str());
        match (acc.get_mut(key), value) {
            (Some(Value::Mapping(existing)), Value::Mapping(servers)) if is_server_section => {
                for (name, server) in servers {
                    let server_name = scalar_to_string(name).unwrap_or_default();
                    match existing.get_mut(name) {
                        Some(current) => merge_server(current, server, &server_name, origin)?,
                        None => {
                            existing.insert(name.clone(), server.clone());
                        }
                    }
                }
            }
            (Some(existing), _) => merge_value(existing, value),
            (None, _) => {
                acc.insert(key.clone(), value.clone());
            }
        }
    }
    Ok(())
}

fn merge_server(current: &mut Value, incoming: &Value, name: &str, origin: &str) -> Result<(), AppError> {
    match (current, incoming) {
        (Value::Mapping(current_map), Value::Mapping(incoming_map)) => {
            for (field, value) in incoming_map {
                let field_name = scalar_to_string(field).unwrap_or_default();
                match current_map.get_mut(field) {
                    None => {
                        current_map.insert(field.clone(), value.clone());
                    }
                    Some(existing) => merge_server_field(existing, value, name, &field_name, origin)?,
                }
            }
            Ok(())
        }
        (current, incoming) => merge_server_field(current, incoming, name, "", origin),
    }
}

fn merge_server_field(
    existing: &mut Value,
    incoming: &Value,
    name: &str,
    field: &str,
    origin: &str,
) -> Result<(), AppError> {
    match (existing, incoming) {
        (Value::Sequence(items), Value::Sequence(more)) => {
            union_sequence(items, more);
            Ok(())
        }
        (nested @ Value::Mapping(_), Value::Mapping(_)) => merge_server(nested, incoming, name, origin),
        (existing, incoming) if *existing == *incoming => Ok(()),
        _ => Err(AppError::configuration(format!(
            "conflict in imported configuration for '{}': field '{}' differs from an earlier import",
            name, field
        ))
        .with_code("AW-CFG-010")
        .with_field(if field.is_empty() { name.to_string() } else { format!("{}.{}", name, field) })
        .with_value(origin)
        .with_suggestion("define the server in a single shared file or make the imports agree")),
    }
}
