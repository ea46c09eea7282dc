#![allow(clippy::result_large_err)]

//! Agentic engines: how each CLI is installed, configured and invoked in the
//! agent job.

use crate::core::error::AppError;
use crate::core::workflow::model::{EngineId, WorkflowModel};
use crate::core::workflow::steps::{Step, StepEntry};
use crate::core::workflow::tools::McpFormat;
use indexmap::IndexMap;
use std::collections::BTreeMap;

pub mod claude;
pub mod codex;
pub mod copilot;
pub mod custom;

pub const PROMPT_PATH: &str = "/tmp/gh-aw/aw-prompts/prompt.txt";
pub const AGENT_STDIO_LOG: &str = "/tmp/gh-aw/agent-stdio.log";
pub const FIREWALL_LOGS_DIR: &str = "/tmp/gh-aw/sandbox/firewall/logs";
pub const AGENT_LOGS_DIR: &str = "/tmp/gh-aw/sandbox/agent/logs/";
pub const DEFAULT_AWF_VERSION: &str = "v0.5.0";
pub const EXECUTION_STEP_ID: &str = "agentic_execution";

/// Everything an engine needs to build its execution step.
pub struct EngineRunConfig<'a> {
    pub model: &'a WorkflowModel,
    /// MCP server names the agent is allowed to use
    pub mcp_servers: &'a [String],
    /// Variables the rendered MCP configuration references
    pub mcp_env: &'a BTreeMap<String, String>,
    pub allowed_domains: &'a [String],
    pub firewall: bool,
}

/// Trait implemented by each agentic engine.
pub trait AgenticEngine: Send + Sync {
    fn id(&self) -> EngineId;

    /// Name used in step titles.
    fn display_name(&self) -> &'static str;

    fn mcp_format(&self) -> McpFormat;

    /// Whether the CLI fetches web pages itself, so no fetch server is added.
    fn native_web_fetch(&self) -> bool {
        false
    }

    fn supports_web_search(&self) -> bool {
        false
    }

    /// npm package installed globally, if the engine ships as one.
    fn npm_package(&self) -> Option<&'static str> {
        None
    }

    fn default_version(&self) -> &'static str {
        ""
    }

    /// Secrets the execution step reads; their values are redacted from logs.
    fn required_secrets(&self) -> &'static [&'static str] {
        &[]
    }

    /// Hosts the CLI itself must reach.
    fn domains(&self) -> &'static [&'static str] {
        &[]
    }

    fn install_steps(&self, model: &WorkflowModel) -> Vec<StepEntry> {
        default_install_steps(self, model)
    }

    fn execution_steps(&self, run: &EngineRunConfig<'_>) -> Result<Vec<StepEntry>, AppError>;
}

pub fn engine_for(id: EngineId) -> Box<dyn AgenticEngine> {
    match id {
        EngineId::Copilot => Box::new(copilot::CopilotEngine),
        EngineId::Claude => Box::new(claude::ClaudeEngine),
        EngineId::Codex => Box::new(codex::CodexEngine),
        EngineId::Custom => Box::new(custom::CustomEngine),
    }
}

/// Secret check plus `npm install -g` at the configured or default version.
/// Skipped entirely when `engine.command` replaces the CLI.
pub fn default_install_steps<E: AgenticEngine + ?Sized>(engine: &E, model: &WorkflowModel) -> Vec<StepEntry> {
    if model.engine.command.is_some() {
        tracing::debug!("engine.command is set; skipping {} install", engine.display_name());
        return vec![];
    }
    let mut steps: Vec<StepEntry> = Vec::new();
    if let Some(step) = secret_validation_step(engine.display_name(), engine.required_secrets()) {
        steps.push(step.into());
    }
    if let Some(package) = engine.npm_package() {
        let version = model.engine.version.as_deref().unwrap_or(engine.default_version());
        steps.push(
            Step::run(
                format!("Install {}", engine.display_name()),
                format!("npm install -g --silent {}@{}", package, version),
            )
            .into(),
        );
    }
    steps
}

/// Fails the job early when none of the engine's secrets is set.
fn secret_validation_step(display_name: &str, secrets: &[&str]) -> Option<Step> {
    let (first, _) = secrets.split_first()?;
    let checks = secrets
        .iter()
        .map(|name| format!("[ -n \"${}\" ]", name))
        .collect::<Vec<_>>()
        .join(" || ");
    let script = format!(
        "if ! {{ {checks}; }}; then\n  echo \"::error::{names} must be set to run {display_name}\"\n  exit 1\nfi\necho \"{display_name} secret is configured\"\n",
        checks = checks,
        names = secrets.join(" or "),
        display_name = display_name,
    );
    Some(
        Step::run(format!("Validate {} secret", first), script)
            .envs(secrets.iter().map(|name| (*name, format!("${{{{ secrets.{} }}}}", name)))),
    )
}

/// Installs the agent workflow firewall binary.
pub fn firewall_install_step(version: Option<&str>) -> Step {
    let version = version.unwrap_or(DEFAULT_AWF_VERSION);
    Step::run(
        "Install awf binary",
        format!(
            "echo \"Installing awf {version}\"\ncurl -sSL https://raw.githubusercontent.com/githubnext/gh-aw-firewall/main/install.sh | sudo AWF_VERSION={version} bash\nwhich awf\nawf --version\n",
            version = version
        ),
    )
}

/// Wrap an engine command so it only reaches the allowed domains.
pub fn wrap_with_firewall(command: &str, domains: &[String]) -> String {
    format!(
        "sudo -E awf --env-all --container-workdir \"${{GITHUB_WORKSPACE}}\" --mount /tmp:/tmp:rw --allow-domains '{}' --log-level info --proxy-logs-dir {} \\\n  -- {}",
        domains.join(","),
        FIREWALL_LOGS_DIR,
        command
    )
}

/// Script of the execution step: `prelude` lines, then the command piped
/// into the stdio log. Only the command runs inside the firewall.
pub fn execution_script(prelude: &[String], command: &str, run: &EngineRunConfig<'_>) -> String {
    let command = if run.firewall {
        wrap_with_firewall(command, run.allowed_domains)
    } else {
        command.to_string()
    };
    let mut script = format!("set -o pipefail\nmkdir -p {}\n", AGENT_LOGS_DIR);
    for line in prelude {
        script.push_str(line);
        script.push('\n');
    }
    script.push_str(&format!("{} \\\n  2>&1 | tee {}\n", command, AGENT_STDIO_LOG));
    script
}

/// Environment shared by every engine's execution step, in emission order:
/// engine base env, MCP references, safe-outputs wiring, then `engine.env`.
pub fn execution_env(base: Vec<(&str, String)>, run: &EngineRunConfig<'_>) -> IndexMap<String, String> {
    let mut env: IndexMap<String, String> = base.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    env.insert("GH_AW_PROMPT".into(), PROMPT_PATH.into());
    for (name, expression) in run.mcp_env {
        env.insert(name.clone(), expression.clone());
    }
    if let Some(outputs) = &run.model.safe_outputs {
        env.insert("GH_AW_SAFE_OUTPUTS".into(), "${{ env.GH_AW_SAFE_OUTPUTS }}".into());
        if outputs.staged {
            env.insert("GH_AW_SAFE_OUTPUTS_STAGED".into(), "true".into());
        }
    }
    if let Some(max_turns) = &run.model.engine.max_turns {
        env.insert("GH_AW_MAX_TURNS".into(), max_turns.clone());
    }
    for (key, value) in &run.model.engine.env {
        env.insert(key.clone(), value.clone());
    }
    env
}

/// The step that runs the agent.
pub fn execution_step(display_name: &str, script: String, env: IndexMap<String, String>, model: &WorkflowModel) -> Step {
    let mut step = Step::run(format!("Execute {}", display_name), script)
        .id(EXECUTION_STEP_ID)
        .timeout(model.timeout_minutes);
    step.env = env;
    step
}

/// `engine.command` when set, otherwise the CLI's own name.
pub fn cli_command<'a>(model: &'a WorkflowModel, default: &'a str) -> &'a str {
    model.engine.command.as_deref().unwrap_or(default)
}
