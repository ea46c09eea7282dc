#![allow(clippy::result_large_err)]

use super::{
    cli_command, execution_env, execution_script, execution_step, AgenticEngine, EngineRunConfig, AGENT_LOGS_DIR,
    PROMPT_PATH,
};
use crate::core::error::AppError;
use crate::core::workflow::model::{EngineId, WorkflowModel};
use crate::core::workflow::steps::StepEntry;
use crate::core::workflow::tools::{copilot_allow_tool_args, effective_copilot_token, McpFormat};

pub const DEFAULT_COPILOT_VERSION: &str = "0.0.354";

pub struct CopilotEngine;

impl AgenticEngine for CopilotEngine {
    fn id(&self) -> EngineId {
        EngineId::Copilot
    }

    fn display_name(&self) -> &'static str {
        "GitHub Copilot CLI"
    }

    fn mcp_format(&self) -> McpFormat {
        McpFormat::Copilot
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@github/copilot")
    }

    fn default_version(&self) -> &'static str {
        DEFAULT_COPILOT_VERSION
    }

    fn required_secrets(&self) -> &'static [&'static str] {
        &["COPILOT_GITHUB_TOKEN", "GH_AW_GITHUB_TOKEN"]
    }

    fn domains(&self) -> &'static [&'static str] {
        &[
            "api.business.githubcopilot.com",
            "api.enterprise.githubcopilot.com",
            "api.github.com",
            "api.githubcopilot.com",
            "api.individual.githubcopilot.com",
            "github.com",
            "registry.npmjs.org",
        ]
    }

    fn execution_steps(&self, run: &EngineRunConfig<'_>) -> Result<Vec<StepEntry>, AppError> {
        let model = run.model;
        let mut args = vec![
            cli_command(model, "copilot").to_string(),
            "--add-dir /tmp/".to_string(),
            "--add-dir /tmp/gh-aw/".to_string(),
            "--log-level all".to_string(),
            format!("--log-dir {}", AGENT_LOGS_DIR),
            "--disable-builtin-mcps".to_string(),
        ];
        if let Some(name) = &model.engine.model {
            args.push(format!("--model {}", name));
        }
        args.extend(
            copilot_allow_tool_args(&model.tools, run.mcp_servers)
                .chunks(2)
                .map(|pair| pair.join(" ")),
        );
        args.extend(model.engine.args.iter().cloned());
        args.push(format!("--prompt \"$(cat {})\"", PROMPT_PATH));
        let command = args.join(" \\\n  ");

        let env = execution_env(
            vec![
                ("COPILOT_AGENT_RUNNER_TYPE", "STANDALONE".to_string()),
                ("COPILOT_GITHUB_TOKEN", effective_copilot_token(github_token_override(model))),
                ("GITHUB_HEAD_REF", "${{ github.head_ref }}".to_string()),
                ("GITHUB_REF_NAME", "${{ github.ref_name }}".to_string()),
                ("GITHUB_STEP_SUMMARY", "${{ env.GITHUB_STEP_SUMMARY }}".to_string()),
                ("GITHUB_WORKSPACE", "${{ github.workspace }}".to_string()),
                ("XDG_CONFIG_HOME", "/home/runner".to_string()),
            ],
            run,
        );
        Ok(vec![execution_step(
            self.display_name(),
            execution_script(&[], &command, run),
            env,
            model,
        )
        .into()])
    }
}

/// A `COPILOT_GITHUB_TOKEN` value given through `engine.env` wins over the default.
fn github_token_override(model: &WorkflowModel) -> Option<&str> {
    model.engine.env.get("COPILOT_GITHUB_TOKEN").map(String::as_str)
}
