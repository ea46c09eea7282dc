#![allow(clippy::result_large_err)]

use super::{execution_env, AgenticEngine, EngineRunConfig};
use crate::core::error::AppError;
use crate::core::workflow::model::{EngineId, WorkflowModel};
use crate::core::workflow::steps::StepEntry;
use crate::core::workflow::tools::McpFormat;
use serde_yaml::{Mapping, Value};

/// Runs the workflow's own `engine.steps` in place of a CLI.
pub struct CustomEngine;

impl AgenticEngine for CustomEngine {
    fn id(&self) -> EngineId {
        EngineId::Custom
    }

    fn display_name(&self) -> &'static str {
        "Custom Steps"
    }

    fn mcp_format(&self) -> McpFormat {
        McpFormat::Claude
    }

    fn install_steps(&self, _model: &WorkflowModel) -> Vec<StepEntry> {
        vec![]
    }

    fn execution_steps(&self, run: &EngineRunConfig<'_>) -> Result<Vec<StepEntry>, AppError> {
        let shared = execution_env(vec![], run);
        let steps = run
            .model
            .engine
            .steps
            .iter()
            .map(|step| {
                let mut step = step.clone();
                if let Value::Mapping(map) = &mut step {
                    let mut env = map
                        .get("env")
                        .and_then(Value::as_mapping)
                        .cloned()
                        .unwrap_or_else(Mapping::new);
                    for (key, value) in &shared {
                        let key = Value::from(key.as_str());
                        if !env.contains_key(&key) {
                            env.insert(key, Value::from(value.as_str()));
                        }
                    }
                    map.insert(Value::from("env"), Value::Mapping(env));
                }
                StepEntry::Raw(step)
            })
            .collect();
        Ok(steps)
    }
}
