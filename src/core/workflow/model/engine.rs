use crate::core::error::AppError;
use crate::core::workflow::values::{get_string, keys, scalar_to_string};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EngineId {
    #[default]
    Copilot,
    Claude,
    Codex,
    Custom,
}

impl EngineId {
    pub fn as_str(&self) -> &'static str {
        match self {
            EngineId::Copilot => "copilot",
            EngineId::Claude => "claude",
            EngineId::Codex => "codex",
            EngineId::Custom => "custom",
        }
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineId {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "copilot" => Ok(EngineId::Copilot),
            "claude" => Ok(EngineId::Claude),
            "codex" => Ok(EngineId::Codex),
            "custom" => Ok(EngineId::Custom),
            other => Err(AppError::validation(format!(
                "unknown engine '{}'; supported engines: copilot, claude, codex, custom",
                other
            ))
            .with_code("AW-VAL-090")
            .with_field("engine.id")
            .with_value(other)),
        }
    }
}

/// `engine:` after normalization.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EngineConfig {
    pub id: EngineId,
    pub version: Option<String>,
    pub model: Option<String>,
    /// Replaces the installed CLI; install steps are skipped when set
    pub command: Option<String>,
    pub max_turns: Option<String>,
    pub env: IndexMap<String, String>,
    pub concurrency: Option<Value>,
    pub steps: Vec<Value>,
    pub args: Vec<String>,
}

impl EngineConfig {
    pub fn from_value(value: Option<&Value>) -> Result<Self, AppError> {
        let Some(Value::Mapping(map)) = value else {
            return Ok(EngineConfig::default());
        };
        let id = get_string(map, "id").unwrap_or_else(|| "copilot".to_string());
        Ok(EngineConfig {
            id: id.parse()?,
            version: get_string(map, "version"),
            model: get_string(map, "model"),
            command: get_string(map, "command"),
            max_turns: get_string(map, "max-turns"),
            env: string_map(map.get("env")),
            concurrency: map.get("concurrency").cloned(),
            steps: map
                .get("steps")
                .and_then(Value::as_sequence)
                .cloned()
                .unwrap_or_default(),
            args: map
                .get("args")
                .and_then(Value::as_sequence)
                .map(|items| items.iter().filter_map(scalar_to_string).collect())
                .unwrap_or_default(),
        })
    }
}

/// A map of scalars as strings, in document order.
pub fn string_map(value: Option<&Value>) -> IndexMap<String, String> {
    let Some(Value::Mapping(map)) = value else {
        return IndexMap::new();
    };
    mapping_strings(map)
}

pub fn mapping_strings(map: &Mapping) -> IndexMap<String, String> {
    keys(map)
        .into_iter()
        .filter_map(|key| {
            let value = map.get(key.as_str()).and_then(scalar_to_string)?;
            Some((key, value))
        })
        .collect()
}
