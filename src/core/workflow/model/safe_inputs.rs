use super::engine::string_map;
use super::safe_outputs::{parse_inputs, ToolInput};
use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::workflow::values::{get_string, keys, parse_int_value};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

pub const DEFAULT_SAFE_INPUT_TIMEOUT_SECS: u64 = 60;

/// How a safe-input tool body is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafeInputLanguage {
    JavaScript,
    Shell,
    Python,
    Go,
}

impl SafeInputLanguage {
    const KEYS: &'static [(&'static str, SafeInputLanguage)] = &[
        ("script", SafeInputLanguage::JavaScript),
        ("run", SafeInputLanguage::Shell),
        ("py", SafeInputLanguage::Python),
        ("go", SafeInputLanguage::Go),
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            SafeInputLanguage::JavaScript => "cjs",
            SafeInputLanguage::Shell => "sh",
            SafeInputLanguage::Python => "py",
            SafeInputLanguage::Go => "go",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SafeInputTool {
    pub name: String,
    pub description: String,
    pub language: SafeInputLanguage,
    pub body: String,
    pub inputs: IndexMap<String, ToolInput>,
    pub env: IndexMap<String, String>,
    pub timeout: u64,
}

impl SafeInputTool {
    fn parse(name: &str, map: &Mapping, context: &CompilerContext) -> Result<Self, AppError> {
        let field = format!("safe-inputs.{}", name);
        let bodies: Vec<(SafeInputLanguage, String)> = SafeInputLanguage::KEYS
            .iter()
            .filter_map(|(key, language)| get_string(map, key).map(|body| (*language, body)))
            .collect();
        let (language, body) = match bodies.as_slice() {
            [single] => single.clone(),
            [] => {
                return Err(AppError::validation(format!(
                    "safe-input tool '{}' must define one of: script, run, py, go",
                    name
                ))
                .with_code("AW-VAL-110")
                .with_field(field))
            }
            _ => {
                return Err(AppError::validation(format!(
                    "safe-input tool '{}' must define exactly one of: script, run, py, go",
                    name
                ))
                .with_code("AW-VAL-111")
                .with_field(field))
            }
        };

        let timeout = match map.get("timeout") {
            Some(value) => match parse_int_value(value, &format!("{}.timeout", field), Some(context)) {
                Some(secs) if secs > 0 => secs as u64,
                _ => {
                    return Err(AppError::validation(format!(
                        "timeout of safe-input tool '{}' must be a positive number of seconds",
                        name
                    ))
                    .with_code("AW-VAL-112")
                    .with_field(format!("{}.timeout", field)))
                }
            },
            None => DEFAULT_SAFE_INPUT_TIMEOUT_SECS,
        };

        Ok(SafeInputTool {
            name: name.to_string(),
            description: get_string(map, "description").unwrap_or_else(|| format!("Run the {} tool", name)),
            language,
            body,
            inputs: parse_inputs(map.get("inputs")),
            env: string_map(map.get("env")),
            timeout,
        })
    }

    /// File name of the tool body next to `safe-inputs.json`.
    pub fn handler_file(&self) -> String {
        format!("{}.{}", self.name, self.language.extension())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SafeInputsConfig {
    pub tools: IndexMap<String, SafeInputTool>,
}

impl SafeInputsConfig {
    /// Parse `safe-inputs:`; `None` when no tool is declared.
    pub fn parse(value: Option<&Value>, context: &CompilerContext) -> Result<Option<Self>, AppError> {
        let Some(Value::Mapping(map)) = value else {
            return Ok(None);
        };
        let mut tools = IndexMap::new();
        for name in keys(map) {
            let Some(Value::Mapping(tool)) = map.get(name.as_str()) else {
                return Err(AppError::validation(format!("safe-input tool '{}' must be a map", name))
                    .with_code("AW-VAL-110")
                    .with_field(format!("safe-inputs.{}", name)));
            };
            tools.insert(name.clone(), SafeInputTool::parse(&name, tool, context)?);
        }
        Ok((!tools.is_empty()).then_some(SafeInputsConfig { tools }))
    }

    /// Environment every tool needs, merged in declaration order.
    pub fn env(&self) -> IndexMap<String, String> {
        let mut env = IndexMap::new();
        for tool in self.tools.values() {
            for (key, value) in &tool.env {
                env.entry(key.clone()).or_insert_with(|| value.clone());
            }
        }
        env
    }
}
