#![allow(clippy::result_large_err)]

//! The agent job: prepares the prompt and tools, runs the engine, then
//! redacts secrets before any artifact leaves the runner.

use super::{activation::ACTIVATED_OUTPUT, Job, JobBuildContext, ACTIVATION_JOB, AGENT_JOB, AGENT_OUTPUT_ARTIFACT, PATCH_ARTIFACT};
use crate::core::error::AppError;
use crate::core::workflow::engines::{
    engine_for, firewall_install_step, EngineRunConfig, AGENT_LOGS_DIR, AGENT_STDIO_LOG, FIREWALL_LOGS_DIR, PROMPT_PATH,
};
use crate::core::workflow::model::{PermissionLevel, WorkflowModel};
use crate::core::workflow::network::allowed_domains;
use crate::core::workflow::pins;
use crate::core::workflow::runtimes::{apply_runtime_overrides, detect_runtime_requirements, runtime_setup_steps};
use crate::core::workflow::safe_outputs::{render_config_json, TOOLS_FILE};
use crate::core::workflow::steps::{Step, StepEntry, StepOrderTracker};
use crate::core::workflow::tools::{collect_mcp_servers, render_mcp_config, McpServerSet, SAFE_OUTPUTS_SERVER};
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

pub const SAFE_OUTPUTS_DIR: &str = "/tmp/gh-aw/safeoutputs";
pub const SAFE_OUTPUTS_FILE: &str = "/tmp/gh-aw/safeoutputs/outputs.jsonl";
pub const PATCH_DIR: &str = "/tmp/gh-aw/patch/";
pub const MCP_LOGS_DIR: &str = "/tmp/gh-aw/mcp-logs/";
pub const AGENT_OUTPUT_PATH: &str = "/tmp/gh-aw/agent_output.json";
const COLLECT_STEP_ID: &str = "collect_output";
const PR_CHECKOUT_CONDITION: &str = "github.event.pull_request || github.event.issue.pull_request";

static EXPRESSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{\{\s*(.+?)\s*\}\}").expect("expression regex is valid"));

static SECRET_REF_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"secrets\.([A-Za-z_][A-Za-z0-9_]*)").expect("secret reference regex is valid"));

/// Prompt text with every `${{ expr }}` replaced by a `__GH_AW_X__`
/// placeholder, and the env entries that supply the values at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct PromptText {
    pub text: String,
    pub env: IndexMap<String, String>,
}

fn placeholder_name(expression: &str) -> String {
    let mut name = String::from("GH_AW_");
    let mut last_underscore = true;
    for c in expression.chars() {
        if c.is_ascii_alphanumeric() {
            name.push(c.to_ascii_uppercase());
            last_underscore = false;
        } else if !last_underscore {
            name.push('_');
            last_underscore = true;
        }
    }
    name.trim_end_matches('_').to_string()
}

/// Lift workflow expressions out of the prompt so the runner never expands
/// them inside a shell script.
pub fn extract_prompt_expressions(prompt: &str) -> Result<PromptText, AppError> {
    let mut env = IndexMap::new();
    let mut errors = Vec::new();
    let text = EXPRESSION_RE.replace_all(prompt, |caps: &regex::Captures<'_>| {
        let expression = caps[1].trim();
        if expression.contains("secrets.") {
            errors.push(
                AppError::validation("secrets cannot be referenced in the prompt")
                    .with_code("AW-VAL-150")
                    .with_field("prompt")
                    .with_value(expression)
                    .with_suggestion("pass the value through a tool or step environment instead"),
            );
            return String::new();
        }
        let name = placeholder_name(expression);
        env.entry(name.clone())
            .or_insert_with(|| format!("${{{{ {} }}}}", expression));
        format!("__{}__", name)
    });
    let text = text.into_owned();
    match errors.len() {
        0 => Ok(PromptText { text, env }),
        1 => Err(errors.remove(0)),
        _ => Err(AppError::batch(crate::core::types::ErrorCategory::ValidationError, errors)),
    }
}

/// Sections appended after the user's prompt.
fn prompt_supplements(model: &WorkflowModel, mcp: &McpServerSet) -> String {
    let mut out = String::from(
        "\n---\n\n## Temporary files\n\nUse /tmp/gh-aw/agent/ for scratch files instead of the repository root.\n",
    );
    for cache in &model.cache_memory {
        out.push_str(&format!(
            "\n## Cache folder available\n\nA persistent cache folder is available at `{}`. Files you save there are restored on the next run.\n",
            cache.path()
        ));
        if let Some(description) = &cache.description {
            out.push_str(&format!("{}\n", description));
        }
    }
    if let Some(outputs) = &model.safe_outputs {
        let mut tools: Vec<String> = outputs.outputs.keys().map(|kind| kind.output_type()).collect();
        tools.extend(outputs.jobs.values().map(|job| job.job_id()));
        out.push_str(&format!(
            "\n## Reporting results\n\nYou cannot write to GitHub directly. Use the `{}` MCP tools instead: {}. If a tool you need is not available, call `missing_tool`.\n",
            SAFE_OUTPUTS_SERVER,
            tools.iter().map(|tool| format!("`{}`", tool)).collect::<Vec<_>>().join(", ")
        ));
    }
    if let Some(inputs) = &model.safe_inputs {
        out.push_str(&format!(
            "\n## Additional tools\n\nThe `safeinputs` MCP server provides: {}.\n",
            inputs.tools.keys().map(|tool| format!("`{}`", tool)).collect::<Vec<_>>().join(", ")
        ));
    }
    if mcp.github_remote.is_some() || mcp.servers.contains_key("github") {
        out.push_str("\n## GitHub access\n\nUse the `github` MCP server to read repository data.\n");
    }
    out
}

fn heredoc(path: &str, content: &str, marker: &str) -> String {
    let mut script = format!("cat > \"{}\" << '{}'\n", path, marker);
    script.push_str(content.trim_end_matches('\n'));
    script.push('\n');
    script.push_str(marker);
    script.push('\n');
    script
}

fn create_prompt_step(text: &str) -> Result<Step, AppError> {
    if text.lines().any(|line| line.trim() == "PROMPT_EOF") {
        return Err(AppError::validation("the prompt must not contain a line reading 'PROMPT_EOF'")
            .with_code("AW-VAL-151")
            .with_field("prompt"));
    }
    let mut script = String::from("mkdir -p \"$(dirname \"$GH_AW_PROMPT\")\"\n");
    script.push_str(&heredoc("$GH_AW_PROMPT", text, "PROMPT_EOF"));
    Ok(Step::run("Create prompt", script).env("GH_AW_PROMPT", PROMPT_PATH))
}

fn validate_placeholders_step() -> Step {
    Step::run(
        "Validate prompt placeholders",
        "if grep -q \"__GH_AW_[A-Z0-9_]*__\" \"$GH_AW_PROMPT\"; then\n  echo \"::error::Prompt has unresolved placeholders:\"\n  grep -o \"__GH_AW_[A-Z0-9_]*__\" \"$GH_AW_PROMPT\" | sort -u\n  exit 1\nfi\necho \"All prompt placeholders were interpolated\"\n",
    )
    .env("GH_AW_PROMPT", PROMPT_PATH)
}

fn print_prompt_step() -> Step {
    Step::run(
        "Print prompt",
        "{\n  echo \"<details>\"\n  echo \"<summary>Generated Prompt</summary>\"\n  echo \"\"\n  echo '``````markdown'\n  cat \"$GH_AW_PROMPT\"\n  echo '``````'\n  echo \"\"\n  echo \"</details>\"\n} >> \"$GITHUB_STEP_SUMMARY\"\n",
    )
    .env("GH_AW_PROMPT", PROMPT_PATH)
}

fn upload_step(name: &str, artifact: &str, path: &str) -> Result<Step, AppError> {
    Ok(Step::uses(name, pins::pinned("actions/upload-artifact", "v5")?)
        .when("always()")
        .input("name", artifact)
        .input("path", path)
        .input("if-no-files-found", "ignore"))
}

/// Secret names referenced anywhere in `texts`, plus `required`.
pub fn secret_names<'t, I: IntoIterator<Item = &'t str>>(texts: I, required: &[&str]) -> Vec<String> {
    let mut names: BTreeSet<String> = required.iter().map(|name| name.to_string()).collect();
    for text in texts {
        for caps in SECRET_REF_RE.captures_iter(text) {
            names.insert(caps[1].to_string());
        }
    }
    names.into_iter().collect()
}

fn step_texts(step: &StepEntry) -> Vec<String> {
    match step {
        StepEntry::Built(step) => step
            .env
            .values()
            .chain(step.with.values())
            .chain(step.run.iter())
            .cloned()
            .collect(),
        StepEntry::Raw(value) => serde_yaml::to_string(value).into_iter().collect(),
    }
}

fn pin_raw(step: Value, ctx: &JobBuildContext<'_>) -> Result<StepEntry, AppError> {
    let mut step = step;
    pins::pin_user_step(&mut step, ctx.model.strict, ctx.context)?;
    Ok(StepEntry::Raw(step))
}

/// Steps of the agent job, recorded by the order tracker as they are added.
#[derive(Default)]
struct AgentSteps {
    steps: Vec<StepEntry>,
    tracker: StepOrderTracker,
}

impl AgentSteps {
    fn push<S: Into<StepEntry>>(&mut self, step: S) {
        let step = step.into();
        self.tracker.record(&step);
        self.steps.push(step);
    }
}

pub fn build_agent_job(ctx: &mut JobBuildContext<'_>) -> Result<Job, AppError> {
    let model = ctx.model;
    let engine = engine_for(model.engine.id);
    tracing::debug!("building agent job for engine {}", engine.display_name());

    let mut job = Job::new(AGENT_JOB, model.runs_on.clone().unwrap_or_else(|| ctx.runner()));
    job.needs = vec![ACTIVATION_JOB.to_string()];
    job.if_condition = Some(format!("needs.{}.outputs.{} == 'true'", ACTIVATION_JOB, ACTIVATED_OUTPUT));
    job.permissions = model.permissions.clone();
    job.environment = model.environment.clone();
    job.concurrency = model.engine.concurrency.clone();
    job.container = model.container.clone();
    job.services = model.services.clone();

    let needs_helpers = model.safe_outputs.is_some() || model.safe_inputs.is_some();
    let mut steps = AgentSteps::default();

    if model.can_checkout() {
        steps.push(
            Step::uses("Checkout repository", pins::pinned("actions/checkout", "v5")?)
                .input("persist-credentials", "false"),
        );
    } else if needs_helpers {
        job.permissions.grant("contents", PermissionLevel::Read);
        steps.push(ctx.helper_checkout_step()?);
    }
    steps.push(Step::run(
        "Create gh-aw temp directory",
        format!("mkdir -p /tmp/gh-aw/agent\nmkdir -p {}\necho \"Created /tmp/gh-aw/agent\"\n", AGENT_LOGS_DIR),
    ));
    for cache in &model.cache_memory {
        let prefix = if cache.id == "default" {
            "memory-".to_string()
        } else {
            format!("memory-{}-", cache.id)
        };
        let key = cache
            .key
            .clone()
            .unwrap_or_else(|| format!("{}${{{{ github.workflow }}}}-${{{{ github.run_id }}}}", prefix));
        steps.push(Step::run(
            format!("Create cache-memory directory ({})", cache.id),
            format!("mkdir -p {}\n", cache.path()),
        ));
        steps.push(
            Step::uses(format!("Cache memory file share data ({})", cache.id), pins::pinned("actions/cache", "v4")?)
                .input("key", key)
                .input("path", cache.path())
                .input("restore-keys", format!("{}${{{{ github.workflow }}}}-", prefix)),
        );
    }
    if model.can_checkout() {
        steps.push(Step::run(
            "Configure Git credentials",
            "git config --global user.email \"github-actions[bot]@users.noreply.github.com\"\ngit config --global user.name \"github-actions[bot]\"\necho \"Git configured with standard GitHub Actions identity\"\n",
        ));
        if model.triggers.has_pull_request_event() {
            steps.push(
                ctx.script_step("Checkout PR branch", "checkout_pr_branch")?
                    .when(PR_CHECKOUT_CONDITION)
                    .env("GH_TOKEN", "${{ github.token }}"),
            );
        }
    }

    let mut requirements =
        detect_runtime_requirements(model, engine.npm_package().is_some() && model.engine.command.is_none());
    apply_runtime_overrides(&model.runtimes, &mut requirements);
    for step in runtime_setup_steps(&requirements, model, ctx.context)? {
        steps.push(step);
    }
    for step in &model.custom_steps {
        steps.push(pin_raw(step.clone(), ctx)?);
    }

    for step in engine.install_steps(model) {
        steps.push(step);
    }
    let firewall = model.firewall_enabled();
    if firewall {
        steps.push(firewall_install_step(model.sandbox.agent.version.as_deref()));
    }

    if let Some(outputs) = &model.safe_outputs {
        job.env.insert("GH_AW_SAFE_OUTPUTS".into(), SAFE_OUTPUTS_FILE.into());
        ctx.use_script("safe_outputs_mcp_server");
        let mut script = format!("mkdir -p {}\n", SAFE_OUTPUTS_DIR);
        if outputs.needs_git() {
            script.push_str(&format!("mkdir -p {}\n", PATCH_DIR));
        }
        script.push_str(&heredoc(
            &format!("{}/config.json", SAFE_OUTPUTS_DIR),
            &render_config_json(outputs)?,
            "EOF",
        ));
        script.push_str(&format!("cp {}/{} {}/tools.json\n", ctx.aux_rel, TOOLS_FILE, SAFE_OUTPUTS_DIR));
        steps.push(Step::run("Setup Safe Outputs Collector MCP", script));
    }
    if model.safe_inputs.is_some() {
        ctx.use_script("safe_inputs_mcp_server");
    }

    let mcp = collect_mcp_servers(model, engine.native_web_fetch(), ctx.aux_rel);
    let rendered = if mcp.is_empty() {
        None
    } else {
        Some(render_mcp_config(&mcp, engine.mcp_format())?)
    };
    if let Some(rendered) = &rendered {
        let dir = rendered.path.rsplit_once('/').map(|(dir, _)| dir).unwrap_or(".");
        let mut script = format!("mkdir -p {}\nmkdir -p {}\n", dir, MCP_LOGS_DIR);
        script.push_str(&heredoc(rendered.path, &rendered.content, "EOF"));
        steps.push(Step::run("Setup MCPs", script));
    }

    let mut prompt = extract_prompt_expressions(&model.prompt)?;
    prompt.text.push_str(&prompt_supplements(model, &mcp));
    steps.push(create_prompt_step(&prompt.text)?);
    steps.push(
        ctx.script_step("Interpolate variables and render templates", "interpolate_prompt")?
            .env("GH_AW_PROMPT", PROMPT_PATH)
            .envs(prompt.env.iter().map(|(k, v)| (k.clone(), v.clone()))),
    );
    steps.push(validate_placeholders_step());
    steps.push(print_prompt_step());

    let mcp_names = mcp.names();
    let empty_env = BTreeMap::new();
    let mcp_env = rendered.as_ref().map(|r| &r.env).unwrap_or(&empty_env);
    let domains = allowed_domains(&model.network, engine.domains())?;
    let run = EngineRunConfig {
        model,
        mcp_servers: &mcp_names,
        mcp_env,
        allowed_domains: &domains,
        firewall,
    };
    let execution = engine.execution_steps(&run)?;
    let front_matter = serde_yaml::to_string(&model.front_matter).map_err(|e| {
        AppError::compiler_bug(format!("front matter could not be re-serialized for secret scanning: {}", e))
            .with_code("AW-BUG-004")
    })?;
    let mut secret_sources: Vec<String> = vec![front_matter];
    if let Some(rendered) = &rendered {
        secret_sources.push(rendered.content.clone());
    }
    for step in execution {
        secret_sources.extend(step_texts(&step));
        let step = match step {
            StepEntry::Raw(value) => pin_raw(value, ctx)?,
            built => built,
        };
        steps.push(step);
    }
    steps.tracker.mark_agent_execution_complete();

    if model.safe_outputs.is_some() {
        steps.push(
            ctx.script_step("Ingest agent output", "collect_ndjson_output")?
                .id(COLLECT_STEP_ID)
                .when("always()")
                .env("GH_AW_SAFE_OUTPUTS", "${{ env.GH_AW_SAFE_OUTPUTS }}")
                .env("GH_AW_SAFE_OUTPUTS_CONFIG_PATH", format!("{}/config.json", SAFE_OUTPUTS_DIR)),
        );
        for name in ["output", "output_types", "has_patch"] {
            job.outputs
                .insert(name.to_string(), format!("${{{{ steps.{}.outputs.{} }}}}", COLLECT_STEP_ID, name));
        }
    }

    let names = secret_names(secret_sources.iter().map(String::as_str), engine.required_secrets());
    let mut redact = ctx
        .script_step("Redact secrets in logs", "redact_secrets")?
        .when("always()")
        .env("GH_AW_SECRET_NAMES", names.join(","));
    for name in &names {
        redact = redact.env(format!("SECRET_{}", name), format!("${{{{ secrets.{} }}}}", name));
    }
    steps.push(redact);
    if let Some(masking) = &model.secret_masking {
        for step in &masking.steps {
            steps.push(pin_raw(step.clone(), ctx)?);
        }
    }

    steps.push(upload_step("Upload prompt", "prompt.txt", PROMPT_PATH)?);
    if let Some(outputs) = &model.safe_outputs {
        steps.push(upload_step("Upload Safe Outputs", "safe_output.jsonl", "${{ env.GH_AW_SAFE_OUTPUTS }}")?);
        steps.push(upload_step("Upload sanitized agent output", AGENT_OUTPUT_ARTIFACT, AGENT_OUTPUT_PATH)?);
        if outputs.needs_git() {
            steps.push(upload_step("Upload git patch", PATCH_ARTIFACT, PATCH_DIR)?);
        }
    }
    if rendered.is_some() {
        steps.push(upload_step("Upload MCP logs", "mcp-logs", MCP_LOGS_DIR)?);
    }
    steps.push(upload_step("Upload agent stdio", "agent-stdio.log", AGENT_STDIO_LOG)?);
    steps.push(upload_step("Upload engine logs", "agent-logs", AGENT_LOGS_DIR)?);
    if firewall {
        steps.push(upload_step("Upload firewall logs", "firewall-logs", &format!("{}/", FIREWALL_LOGS_DIR))?);
    }
    for cache in &model.cache_memory {
        if let Some(days) = cache.retention_days {
            steps.push(
                upload_step(
                    &format!("Upload cache-memory data as artifact ({})", cache.id),
                    &format!("cache-memory-{}", cache.id),
                    &cache.path(),
                )?
                .input("retention-days", days.to_string()),
            );
        }
    }

    steps.tracker.validate()?;
    job.steps = steps.steps;
    Ok(job)
}
