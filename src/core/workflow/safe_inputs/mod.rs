#![allow(clippy::result_large_err)]

//! `safe-inputs.json` and the tool bodies written next to it.

use crate::core::error::AppError;
use crate::core::workflow::model::{SafeInputLanguage, SafeInputsConfig};
use crate::core::workflow::safe_outputs::input_schema;
use serde_json::{json, Value as JsonValue};

pub const SAFE_INPUTS_FILE: &str = "safe-inputs.json";

fn language_name(language: SafeInputLanguage) -> &'static str {
    match language {
        SafeInputLanguage::JavaScript => "javascript",
        SafeInputLanguage::Shell => "shell",
        SafeInputLanguage::Python => "python",
        SafeInputLanguage::Go => "go",
    }
}

pub fn safe_inputs_json_value(config: &SafeInputsConfig) -> JsonValue {
    let tools: Vec<JsonValue> = config
        .tools
        .values()
        .map(|tool| {
            json!({
                "name": tool.name,
                "description": tool.description,
                "language": language_name(tool.language),
                "file": tool.handler_file(),
                "timeout": tool.timeout,
                "inputSchema": input_schema(&tool.inputs),
            })
        })
        .collect();
    json!({ "tools": tools })
}

/// Rendered descriptor plus `(file name, body)` for each tool.
pub fn render_safe_inputs(config: &SafeInputsConfig) -> Result<(String, Vec<(String, String)>), AppError> {
    let mut descriptor = serde_json::to_string_pretty(&safe_inputs_json_value(config))
        .map_err(|e| AppError::operation("failed to render safe-inputs.json", e).with_code("AW-OPS-042"))?;
    descriptor.push('\n');
    let bodies = config
        .tools
        .values()
        .map(|tool| {
            let mut body = tool.body.clone();
            if !body.ends_with('\n') {
                body.push('\n');
            }
            (tool.handler_file(), body)
        })
        .collect();
    Ok((descriptor, bodies))
}
