#![allow(clippy::result_large_err)]

use super::{cli_command, execution_env, execution_script, execution_step, AgenticEngine, EngineRunConfig, PROMPT_PATH};
use crate::core::error::AppError;
use crate::core::workflow::model::EngineId;
use crate::core::workflow::steps::StepEntry;
use crate::core::workflow::tools::{claude_allowed_tools, McpFormat};

pub const DEFAULT_CLAUDE_VERSION: &str = "2.0.42";

pub struct ClaudeEngine;

impl AgenticEngine for ClaudeEngine {
    fn id(&self) -> EngineId {
        EngineId::Claude
    }

    fn display_name(&self) -> &'static str {
        "Claude Code CLI"
    }

    fn mcp_format(&self) -> McpFormat {
        McpFormat::Claude
    }

    fn native_web_fetch(&self) -> bool {
        true
    }

    fn supports_web_search(&self) -> bool {
        true
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@anthropic-ai/claude-code")
    }

    fn default_version(&self) -> &'static str {
        DEFAULT_CLAUDE_VERSION
    }

    fn required_secrets(&self) -> &'static [&'static str] {
        &["ANTHROPIC_API_KEY", "CLAUDE_CODE_OAUTH_TOKEN"]
    }

    fn domains(&self) -> &'static [&'static str] {
        &[
            "anthropic.com",
            "api.anthropic.com",
            "api.github.com",
            "github.com",
            "registry.npmjs.org",
            "sentry.io",
            "statsig.anthropic.com",
        ]
    }

    fn execution_steps(&self, run: &EngineRunConfig<'_>) -> Result<Vec<StepEntry>, AppError> {
        let model = run.model;
        let mut args = vec![
            cli_command(model, "claude").to_string(),
            "--print".to_string(),
            "--debug".to_string(),
            "--verbose".to_string(),
            "--permission-mode bypassPermissions".to_string(),
            "--output-format stream-json".to_string(),
        ];
        if !run.mcp_servers.is_empty() || model.safe_outputs.is_some() {
            args.push(format!("--mcp-config {}", McpFormat::Claude.config_path()));
        }
        let allowed = claude_allowed_tools(&model.tools, run.mcp_servers);
        if !allowed.is_empty() {
            args.push(format!("--allowed-tools '{}'", allowed));
        }
        if let Some(max_turns) = &model.engine.max_turns {
            args.push(format!("--max-turns {}", max_turns));
        }
        if let Some(name) = &model.engine.model {
            args.push(format!("--model {}", name));
        }
        args.extend(model.engine.args.iter().cloned());
        args.push(format!("\"$(cat {})\"", PROMPT_PATH));
        let command = args.join(" \\\n  ");

        let env = execution_env(
            vec![
                ("ANTHROPIC_API_KEY", "${{ secrets.ANTHROPIC_API_KEY }}".to_string()),
                ("CLAUDE_CODE_OAUTH_TOKEN", "${{ secrets.CLAUDE_CODE_OAUTH_TOKEN }}".to_string()),
                ("DISABLE_TELEMETRY", "1".to_string()),
                ("DISABLE_ERROR_REPORTING", "1".to_string()),
                ("DISABLE_BUG_COMMAND", "1".to_string()),
                ("MCP_TIMEOUT", "120000".to_string()),
                ("MCP_TOOL_TIMEOUT", "60000".to_string()),
                ("BASH_DEFAULT_TIMEOUT_MS", "60000".to_string()),
                ("BASH_MAX_TIMEOUT_MS", "60000".to_string()),
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
