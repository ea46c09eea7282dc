#![allow(clippy::result_large_err)]

//! MCP server descriptors: which servers the agent gets and how each engine
//! expects them written.

use super::github::{toolsets_value, DEFAULT_GITHUB_MCP_VERSION, GITHUB_MCP_IMAGE, GITHUB_REMOTE_MCP_URL};
use super::tokens::effective_github_token;
use crate::core::error::AppError;
use crate::core::workflow::model::{
    GitHubMode, McpServerConfig, McpTransport, SerenaMode, WorkflowModel,
};
use indexmap::IndexMap;
use regex::Regex;
use serde_json::{json, Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const DEFAULT_PLAYWRIGHT_MCP_VERSION: &str = "v0.0.41";
pub const PLAYWRIGHT_MCP_IMAGE: &str = "mcr.microsoft.com/playwright/mcp";
pub const SERENA_IMAGE: &str = "ghcr.io/oraios/serena:latest";
pub const SAFE_OUTPUTS_SERVER: &str = "safeoutputs";
pub const SAFE_INPUTS_SERVER: &str = "safeinputs";

/// Base images for interpreters that are run inside a container by default.
const INTERPRETER_IMAGES: &[(&str, &str)] = &[
    ("npx", "node:lts-alpine"),
    ("uvx", "ghcr.io/astral-sh/uv:python3.12-alpine"),
];

static SECRET_EXPR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$\{\{\s*secrets\.([A-Za-z_][A-Za-z0-9_]*)\s*\}\}").expect("secret expression regex is valid")
});
static ENV_REF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}").expect("env reference regex is valid"));

/// Config file layout an engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpFormat {
    Copilot,
    Claude,
    Codex,
}

impl McpFormat {
    pub fn config_path(&self) -> &'static str {
        match self {
            McpFormat::Copilot => "/home/runner/.copilot/mcp-config.json",
            McpFormat::Claude => "/tmp/gh-aw/mcp-config/mcp-servers.json",
            McpFormat::Codex => "/tmp/gh-aw/mcp-config/config.toml",
        }
    }
}

/// Options for the hosted GitHub MCP server.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GitHubMCPRemoteOptions {
    pub read_only: bool,
    pub toolsets: String,
    pub authorization_value: String,
    pub include_tools_field: bool,
    pub allowed_tools: Vec<String>,
    pub include_env_section: bool,
}

/// JSON descriptor of the hosted GitHub MCP server.
pub fn render_github_mcp_remote_config(options: &GitHubMCPRemoteOptions) -> JsonValue {
    let mut headers: BTreeMap<&str, String> = BTreeMap::new();
    headers.insert("Authorization", options.authorization_value.clone());
    if options.read_only {
        headers.insert("X-MCP-Readonly", "true".to_string());
    }
    if !options.toolsets.is_empty() {
        headers.insert("X-MCP-Toolsets", options.toolsets.clone());
    }

    let mut server = Map::new();
    server.insert("type".into(), json!("http"));
    server.insert("url".into(), json!(GITHUB_REMOTE_MCP_URL));
    server.insert("headers".into(), json!(headers));
    if options.include_tools_field {
        let tools = if options.allowed_tools.is_empty() {
            vec!["*".to_string()]
        } else {
            options.allowed_tools.clone()
        };
        server.insert("tools".into(), json!(tools));
    }
    if options.include_env_section {
        server.insert(
            "env".into(),
            json!({ "GITHUB_PERSONAL_ACCESS_TOKEN": "${GITHUB_MCP_SERVER_TOKEN}" }),
        );
    }
    JsonValue::Object(server)
}

/// The servers the agent gets, plus the variables their `${X}` references need.
#[derive(Debug, Clone, Default)]
pub struct McpServerSet {
    pub servers: BTreeMap<String, McpServerConfig>,
    /// Name referenced as `${NAME}` mapped to the workflow expression providing it
    pub env_refs: BTreeMap<String, String>,
    /// GitHub server in hosted mode, rendered separately
    pub github_remote: Option<GitHubMCPRemoteOptions>,
}

impl McpServerSet {
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.servers.keys().cloned().collect();
        if self.github_remote.is_some() {
            names.push("github".to_string());
        }
        names.sort();
        names
    }

    pub fn is_empty(&self) -> bool {
        self.servers.is_empty() && self.github_remote.is_none()
    }
}

/// Move a bare interpreter command into its canonical container.
pub fn auto_containerize(server: &mut McpServerConfig) {
    if server.transport != McpTransport::Stdio || server.container.is_some() {
        return;
    }
    let Some(command) = server.command.clone() else { return };
    let Some((_, image)) = INTERPRETER_IMAGES.iter().find(|(name, _)| *name == command) else {
        return;
    };
    tracing::debug!("running MCP server '{}' in container {}", server.name, image);
    server.container = Some(image.to_string());
    server.entrypoint = Some(command);
    server.entrypoint_args = std::mem::take(&mut server.args);
    server.command = None;
}

/// Collect every MCP server the agent job configures.
pub fn collect_mcp_servers(model: &WorkflowModel, native_web_fetch: bool, aux_rel: &str) -> McpServerSet {
    let mut set = McpServerSet::default();
    let tools = &model.tools;

    if let Some(github) = &tools.github {
        let token = effective_github_token(github.github_token.as_deref(), model.github_token.as_deref());
        set.env_refs.insert("GITHUB_MCP_SERVER_TOKEN".to_string(), token);
        match github.mode {
            GitHubMode::Remote => {
                set.github_remote = Some(GitHubMCPRemoteOptions {
                    read_only: github.read_only,
                    toolsets: toolsets_value(github),
                    authorization_value: "Bearer ${GITHUB_MCP_SERVER_TOKEN}".to_string(),
                    include_tools_field: true,
                    allowed_tools: github.allowed.clone(),
                    include_env_section: true,
                });
            }
            GitHubMode::Local => {
                let version = github.version.as_deref().unwrap_or(DEFAULT_GITHUB_MCP_VERSION);
                let mut server = McpServerConfig::stdio("github", "docker", &[]);
                server.command = None;
                server.container = Some(format!("{}:{}", GITHUB_MCP_IMAGE, version));
                server
                    .env
                    .insert("GITHUB_PERSONAL_ACCESS_TOKEN".into(), "${GITHUB_MCP_SERVER_TOKEN}".into());
                if github.read_only {
                    server.env.insert("GITHUB_READ_ONLY".into(), "1".into());
                }
                server.env.insert("GITHUB_TOOLSETS".into(), toolsets_value(github));
                server.allowed = github.allowed.clone();
                set.servers.insert("github".to_string(), server);
            }
        }
    }

    if let Some(playwright) = &tools.playwright {
        let version = playwright.version.as_deref().unwrap_or(DEFAULT_PLAYWRIGHT_MCP_VERSION);
        let hosts = if playwright.allowed_domains.is_empty() {
            "localhost".to_string()
        } else {
            playwright.allowed_domains.join(",")
        };
        let mut server = McpServerConfig::stdio("playwright", "docker", &["--init", "--network", "host"]);
        server.command = None;
        server.container = Some(format!("{}:{}", PLAYWRIGHT_MCP_IMAGE, version));
        server.entrypoint_args = vec![
            "--output-dir".into(),
            "/tmp/gh-aw/mcp-logs/playwright".into(),
            "--allowed-hosts".into(),
            hosts,
        ];
        set.servers.insert("playwright".to_string(), server);
    }

    if let Some(serena) = &tools.serena {
        let start = [
            "start-mcp-server",
            "--context",
            "codex",
            "--project",
            "${{ github.workspace }}",
        ];
        let server = match serena.mode {
            SerenaMode::Local => {
                let mut args = vec!["--from", "git+https://github.com/oraios/serena", "serena"];
                args.extend(start);
                McpServerConfig::stdio("serena", "uvx", &args)
            }
            SerenaMode::Docker => {
                let mut server = McpServerConfig::stdio(
                    "serena",
                    "docker",
                    &["--network", "host", "-v", "${{ github.workspace }}:${{ github.workspace }}:rw"],
                );
                server.command = None;
                server.container = Some(SERENA_IMAGE.to_string());
                server.entrypoint = Some("serena".to_string());
                server.entrypoint_args = start.iter().map(|a| a.to_string()).collect();
                server
            }
        };
        set.servers.insert("serena".to_string(), server);
    }

    if tools.web_fetch && !native_web_fetch {
        let mut server = McpServerConfig::stdio("web-fetch", "uvx", &["mcp-server-fetch"]);
        auto_containerize(&mut server);
        set.servers.insert("web-fetch".to_string(), server);
    }

    for (name, custom) in &tools.custom {
        let mut server = custom.clone();
        auto_containerize(&mut server);
        extract_secret_refs(&mut server.env, &mut set.env_refs);
        set.servers.insert(name.clone(), server);
    }

    if model.safe_outputs.is_some() {
        let script = format!("${{{{ github.workspace }}}}/{}/safe_outputs_mcp_server.cjs", aux_rel);
        let mut server = McpServerConfig::stdio(SAFE_OUTPUTS_SERVER, "node", &[script.as_str()]);
        server.env.insert("GH_AW_SAFE_OUTPUTS".into(), "${GH_AW_SAFE_OUTPUTS}".into());
        server
            .env
            .insert("GH_AW_SAFE_OUTPUTS_CONFIG_PATH".into(), "/tmp/gh-aw/safeoutputs/config.json".into());
        server
            .env
            .insert("GH_AW_SAFE_OUTPUTS_TOOLS_PATH".into(), "/tmp/gh-aw/safeoutputs/tools.json".into());
        set.env_refs
            .insert("GH_AW_SAFE_OUTPUTS".to_string(), "${{ env.GH_AW_SAFE_OUTPUTS }}".to_string());
        set.servers.insert(SAFE_OUTPUTS_SERVER.to_string(), server);
    }

    if let Some(safe_inputs) = &model.safe_inputs {
        let script = format!("${{{{ github.workspace }}}}/{}/safe_inputs_mcp_server.cjs", aux_rel);
        let mut server = McpServerConfig::stdio(SAFE_INPUTS_SERVER, "node", &[script.as_str()]);
        server.env.insert(
            "GH_AW_SAFE_INPUTS_CONFIG".into(),
            format!("${{{{ github.workspace }}}}/{}/safe-inputs.json", aux_rel),
        );
        let mut tool_env = safe_inputs.env();
        extract_secret_refs(&mut tool_env, &mut set.env_refs);
        for (key, value) in tool_env {
            server.env.insert(key, value);
        }
        set.servers.insert(SAFE_INPUTS_SERVER.to_string(), server);
    }

    set
}

/// Rewrite `${{ secrets.X }}` values to `${X}` and record where `X` comes from.
pub fn extract_secret_refs(values: &mut IndexMap<String, String>, refs: &mut BTreeMap<String, String>) {
    for value in values.values_mut() {
        *value = extract_secrets_from_value(value, refs);
    }
}

fn extract_secrets_from_value(value: &str, refs: &mut BTreeMap<String, String>) -> String {
    SECRET_EXPR
        .replace_all(value, |caps: &regex::Captures| {
            let name = caps[1].to_string();
            refs.entry(name.clone())
                .or_insert_with(|| format!("${{{{ secrets.{} }}}}", name));
            format!("${{{}}}", name)
        })
        .to_string()
}

/// Replace `${X}` references with the expressions that provide them.
fn resolve_refs(value: &str, refs: &BTreeMap<String, String>) -> String {
    ENV_REF
        .replace_all(value, |caps: &regex::Captures| {
            refs.get(&caps[1]).cloned().unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

/// `command` and `args` as launched, with containers expanded to `docker run`.
pub fn launch_command(server: &McpServerConfig) -> (String, Vec<String>) {
    match &server.container {
        Some(image) => {
            let mut args: Vec<String> = vec!["run".into(), "--rm".into(), "-i".into()];
            for key in server.env.keys() {
                args.push("-e".into());
                args.push(key.clone());
            }
            args.extend(server.args.iter().cloned());
            if let Some(entrypoint) = &server.entrypoint {
                args.push("--entrypoint".into());
                args.push(entrypoint.clone());
            }
            args.push(image.clone());
            args.extend(server.entrypoint_args.iter().cloned());
            ("docker".to_string(), args)
        }
        None => (server.command.clone().unwrap_or_default(), server.args.clone()),
    }
}

fn render_json_server(server: &McpServerConfig, format: McpFormat, refs: &mut BTreeMap<String, String>) -> JsonValue {
    let mut out = Map::new();
    let tools = if server.allowed.is_empty() {
        vec!["*".to_string()]
    } else {
        server.allowed.clone()
    };
    match server.transport {
        McpTransport::Stdio => {
            let (command, args) = launch_command(server);
            if format == McpFormat::Copilot {
                out.insert("type".into(), json!("stdio"));
            }
            out.insert("command".into(), json!(command));
            out.insert("args".into(), json!(args));
            if !server.env.is_empty() {
                out.insert("env".into(), json!(server.env));
            }
            if format == McpFormat::Copilot {
                out.insert("tools".into(), json!(tools));
            }
        }
        McpTransport::Http => {
            out.insert("type".into(), json!("http"));
            out.insert("url".into(), json!(server.url.clone().unwrap_or_default()));
            let mut headers = server.headers.clone();
            let mut env: BTreeMap<String, String> = server.env.clone().into_iter().collect();
            if format == McpFormat::Copilot {
                let mut extracted = BTreeMap::new();
                for value in headers.values_mut() {
                    *value = extract_secrets_from_value(value, &mut extracted);
                }
                for name in extracted.keys() {
                    env.insert(name.clone(), format!("${{{}}}", name));
                }
                refs.extend(extracted);
            }
            let headers: BTreeMap<String, String> = headers.into_iter().collect();
            if !headers.is_empty() {
                out.insert("headers".into(), json!(headers));
            }
            if format == McpFormat::Copilot {
                out.insert("tools".into(), json!(tools));
                if !env.is_empty() {
                    out.insert("env".into(), json!(env));
                }
            }
        }
    }
    JsonValue::Object(out)
}

/// A rendered MCP configuration file.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedMcpConfig {
    pub path: &'static str,
    pub content: String,
    /// Variables the agent process must export for `${X}` references
    pub env: BTreeMap<String, String>,
}

/// Render the configuration file for one engine format.
pub fn render_mcp_config(set: &McpServerSet, format: McpFormat) -> Result<RenderedMcpConfig, AppError> {
    let mut refs = set.env_refs.clone();
    let content = match format {
        McpFormat::Copilot | McpFormat::Claude => {
            let mut servers = Map::new();
            let mut names = set.names();
            names.dedup();
            for name in names {
                if name == "github" {
                    if let Some(remote) = &set.github_remote {
                        let mut options = remote.clone();
                        if format == McpFormat::Claude {
                            options.include_tools_field = false;
                            options.include_env_section = false;
                        }
                        servers.insert(name, render_github_mcp_remote_config(&options));
                        continue;
                    }
                }
                if let Some(server) = set.servers.get(&name) {
                    servers.insert(name, render_json_server(server, format, &mut refs));
                }
            }
            let document = json!({ "mcpServers": JsonValue::Object(servers) });
            serde_json::to_string_pretty(&document).map_err(|e| {
                AppError::operation("failed to render MCP configuration", e).with_code("AW-OPS-030")
            })?
        }
        McpFormat::Codex => render_codex_toml(set, &refs)?,
    };
    let env = match format {
        McpFormat::Codex => BTreeMap::new(),
        _ => refs,
    };
    Ok(RenderedMcpConfig {
        path: format.config_path(),
        content,
        env,
    })
}

fn render_codex_toml(set: &McpServerSet, refs: &BTreeMap<String, String>) -> Result<String, AppError> {
    let mut root = toml::Table::new();
    let mut history = toml::Table::new();
    history.insert("persistence".into(), toml::Value::String("none".into()));
    root.insert("history".into(), toml::Value::Table(history));

    let mut servers = toml::Table::new();
    for (name, server) in &set.servers {
        let mut entry = toml::Table::new();
        match server.transport {
            McpTransport::Stdio => {
                let (command, args) = launch_command(server);
                entry.insert("command".into(), toml::Value::String(command));
                entry.insert(
                    "args".into(),
                    toml::Value::Array(args.into_iter().map(toml::Value::String).collect()),
                );
                if !server.env.is_empty() {
                    let env: toml::Table = server
                        .env
                        .iter()
                        .map(|(k, v)| (k.clone(), toml::Value::String(resolve_refs(v, refs))))
                        .collect();
                    entry.insert("env".into(), toml::Value::Table(env));
                }
            }
            McpTransport::Http => {
                entry.insert("url".into(), toml::Value::String(server.url.clone().unwrap_or_default()));
                if !server.headers.is_empty() {
                    let headers: toml::Table = server
                        .headers
                        .iter()
                        .map(|(k, v)| (k.clone(), toml::Value::String(resolve_refs(v, refs))))
                        .collect();
                    entry.insert("http_headers".into(), toml::Value::Table(headers));
                }
            }
        }
        servers.insert(name.clone(), toml::Value::Table(entry));
    }
    if let Some(remote) = &set.github_remote {
        let mut entry = toml::Table::new();
        entry.insert("url".into(), toml::Value::String(GITHUB_REMOTE_MCP_URL.into()));
        let mut headers = toml::Table::new();
        headers.insert(
            "Authorization".into(),
            toml::Value::String(resolve_refs(&remote.authorization_value, refs)),
        );
        if remote.read_only {
            headers.insert("X-MCP-Readonly".into(), toml::Value::String("true".into()));
        }
        if !remote.toolsets.is_empty() {
            headers.insert("X-MCP-Toolsets".into(), toml::Value::String(remote.toolsets.clone()));
        }
        entry.insert("http_headers".into(), toml::Value::Table(headers));
        servers.insert("github".into(), toml::Value::Table(entry));
    }
    root.insert("mcp_servers".into(), toml::Value::Table(servers));

    toml::to_string_pretty(&root)
        .map_err(|e| AppError::operation("failed to render Codex MCP configuration", e).with_code("AW-OPS-031"))
}
