#![allow(clippy::result_large_err)]

use super::{cli_command, execution_env, execution_script, execution_step, AgenticEngine, EngineRunConfig, PROMPT_PATH};
use crate::core::error::AppError;
use crate::core::workflow::model::EngineId;
use crate::core::workflow::steps::StepEntry;
use crate::core::workflow::tools::McpFormat;

pub const DEFAULT_CODEX_VERSION: &str = "0.58.0";

/// Directory Codex reads `config.toml` from.
pub const CODEX_HOME: &str = "/tmp/gh-aw/mcp-config";

pub struct CodexEngine;

impl AgenticEngine for CodexEngine {
    fn id(&self) -> EngineId {
        EngineId::Codex
    }

    fn display_name(&self) -> &'static str {
        "Codex CLI"
    }

    fn mcp_format(&self) -> McpFormat {
        McpFormat::Codex
    }

    fn supports_web_search(&self) -> bool {
        true
    }

    fn npm_package(&self) -> Option<&'static str> {
        Some("@openai/codex")
    }

    fn default_version(&self) -> &'static str {
        DEFAULT_CODEX_VERSION
    }

    fn required_secrets(&self) -> &'static [&'static str] {
        &["CODEX_API_KEY", "OPENAI_API_KEY"]
    }

    fn domains(&self) -> &'static [&'static str] {
        &[
            "api.github.com",
            "api.openai.com",
            "github.com",
            "openai.com",
            "registry.npmjs.org",
        ]
    }

    fn execution_steps(&self, run: &EngineRunConfig<'_>) -> Result<Vec<StepEntry>, AppError> {
        let model = run.model;
        let mut args = vec![cli_command(model, "codex").to_string()];
        if let Some(name) = &model.engine.model {
            args.push(format!("-c model={}", name));
        }
        if model.tools.web_search {
            args.push("-c tools.web_search=true".to_string());
        }
        args.push("exec".to_string());
        args.push("--full-auto".to_string());
        args.push("--skip-git-repo-check".to_string());
        args.extend(model.engine.args.iter().cloned());
        args.push("\"$INSTRUCTION\"".to_string());
        let command = args.join(" \\\n  ");
        let prelude = [
            format!("INSTRUCTION=\"$(cat {})\"", PROMPT_PATH),
            "mkdir -p \"$CODEX_HOME/logs\"".to_string(),
        ];

        let env = execution_env(
            vec![
                ("CODEX_API_KEY", "${{ secrets.CODEX_API_KEY || secrets.OPENAI_API_KEY }}".to_string()),
                ("OPENAI_API_KEY", "${{ secrets.OPENAI_API_KEY || secrets.CODEX_API_KEY }}".to_string()),
                ("CODEX_HOME", CODEX_HOME.to_string()),
                ("RUST_LOG", "trace,hyper_util=info,mio=info,reqwest=info,os_info=info,codex_otel=warn,codex_core=debug,codex_exec=debug".to_string()),
            ],
            run,
        );
        Ok(vec![execution_step(
            self.display_name(),
            execution_script(&prelude, &command, run),
            env,
            model,
        )
        .into()])
    }
}
