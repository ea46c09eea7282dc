use super::engine::string_map;
use crate::core::error::AppError;
use crate::core::workflow::normalize::DEFAULT_TOOLSETS;
use crate::core::workflow::values::{as_str, get_bool, get_string, keys, string_list};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Tool keys with built-in meaning; anything else must describe an MCP server.
pub const BUILTIN_TOOLS: &[&str] = &[
    "github",
    "bash",
    "edit",
    "web-fetch",
    "web-search",
    "playwright",
    "serena",
    "cache-memory",
    "claude",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GitHubMode {
    #[default]
    Local,
    Remote,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GitHubToolConfig {
    pub mode: GitHubMode,
    /// Expanded toolsets; the default bundle when none were listed
    pub toolsets: Vec<String>,
    pub toolsets_explicit: bool,
    pub allowed: Vec<String>,
    pub read_only: bool,
    pub version: Option<String>,
    pub github_token: Option<String>,
}

impl GitHubToolConfig {
    fn from_value(value: &Value) -> Self {
        let empty = Mapping::new();
        let map = value.as_mapping().unwrap_or(&empty);
        let toolsets = map.get("toolsets").and_then(string_list);
        GitHubToolConfig {
            mode: match get_string(map, "mode").as_deref() {
                Some("remote") => GitHubMode::Remote,
                _ => GitHubMode::Local,
            },
            toolsets_explicit: toolsets.is_some(),
            toolsets: toolsets.unwrap_or_else(|| DEFAULT_TOOLSETS.iter().map(|t| t.to_string()).collect()),
            allowed: map.get("allowed").and_then(string_list).unwrap_or_default(),
            read_only: get_bool(map, "read-only").unwrap_or(false),
            version: get_string(map, "version"),
            github_token: get_string(map, "github-token"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaywrightConfig {
    pub version: Option<String>,
    pub allowed_domains: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SerenaMode {
    #[default]
    Docker,
    Local,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SerenaConfig {
    pub mode: SerenaMode,
    pub languages: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum McpTransport {
    Stdio,
    Http,
}

/// One MCP server as declared, before engine rendering.
#[derive(Debug, Clone, PartialEq)]
pub struct McpServerConfig {
    pub name: String,
    pub transport: McpTransport,
    pub command: Option<String>,
    pub args: Vec<String>,
    pub env: IndexMap<String, String>,
    /// Image reference; `version` is already appended as `image:version`
    pub container: Option<String>,
    pub entrypoint: Option<String>,
    pub entrypoint_args: Vec<String>,
    pub url: Option<String>,
    pub headers: IndexMap<String, String>,
    pub allowed: Vec<String>,
}

impl McpServerConfig {
    pub fn stdio(name: &str, command: &str, args: &[&str]) -> Self {
        McpServerConfig {
            name: name.to_string(),
            transport: McpTransport::Stdio,
            command: Some(command.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: IndexMap::new(),
            container: None,
            entrypoint: None,
            entrypoint_args: vec![],
            url: None,
            headers: IndexMap::new(),
            allowed: vec![],
        }
    }

    /// Parse `mcp-servers.<name>` or a custom `tools.<name>` entry.
    pub fn parse(name: &str, map: &Mapping) -> Result<Self, AppError> {
        let field = format!("mcp-servers.{}", name);
        let declared = get_string(map, "type");
        let url = get_string(map, "url");
        let command = get_string(map, "command");
        let container = get_string(map, "container");

        let transport = match declared.as_deref() {
            Some("http") => McpTransport::Http,
            Some("stdio") | Some("local") => McpTransport::Stdio,
            Some(other) => {
                return Err(AppError::configuration(format!(
                    "MCP server '{}' has unsupported type '{}'",
                    name, other
                ))
                .with_code("AW-CFG-010")
                .with_field(format!("{}.type", field)))
            }
            None if url.is_some() => McpTransport::Http,
            None if command.is_some() || container.is_some() => McpTransport::Stdio,
            None => {
                return Err(AppError::configuration(format!(
                    "MCP server '{}' must set 'command', 'container' or 'url'",
                    name
                ))
                .with_code("AW-CFG-011")
                .with_field(field))
            }
        };

        match transport {
            McpTransport::Stdio if command.is_none() && container.is_none() => {
                return Err(AppError::configuration(format!(
                    "stdio MCP server '{}' requires 'command' or 'container'",
                    name
                ))
                .with_code("AW-CFG-012")
                .with_field(field));
            }
            McpTransport::Http if url.is_none() => {
                return Err(AppError::configuration(format!("http MCP server '{}' requires 'url'", name))
                    .with_code("AW-CFG-013")
                    .with_field(field));
            }
            _ => {}
        }
        if let Some(address) = url.as_deref().filter(|address| !address.contains("${{")) {
            let parsed = url::Url::parse(address).map_err(|e| {
                AppError::configuration(format!("MCP server '{}' has an invalid url: {}", name, e))
                    .with_code("AW-CFG-016")
                    .with_field(format!("{}.url", field))
                    .with_value(address)
            })?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(AppError::configuration(format!(
                    "MCP server '{}' url must use http or https",
                    name
                ))
                .with_code("AW-CFG-016")
                .with_field(format!("{}.url", field))
                .with_value(address));
            }
        }

        let container = container.map(|image| match get_string(map, "version") {
            Some(version) if !image.contains(':') => format!("{}:{}", image, version),
            _ => image,
        });

        Ok(McpServerConfig {
            name: name.to_string(),
            transport,
            command,
            args: list(map, "args"),
            env: string_map(map.get("env")),
            container,
            entrypoint: get_string(map, "entrypoint"),
            entrypoint_args: list(map, "entrypointArgs"),
            url,
            headers: string_map(map.get("headers")),
            allowed: list(map, "allowed"),
        })
    }
}

fn list(map: &Mapping, key: &str) -> Vec<String> {
    map.get(key).and_then(string_list).unwrap_or_default()
}

/// Whether a `tools.<name>` entry carries MCP server fields.
pub fn is_mcp_definition(value: &Value) -> bool {
    value.as_mapping().is_some_and(|map| {
        ["command", "container", "url", "type"]
            .iter()
            .any(|key| map.contains_key(*key))
    })
}

/// `tools:` after normalization, split into typed entries.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolsConfig {
    pub github: Option<GitHubToolConfig>,
    /// Effective bash allow-list; `None` when bash is not enabled
    pub bash: Option<Vec<String>>,
    pub edit: bool,
    pub web_fetch: bool,
    pub web_search: bool,
    pub playwright: Option<PlaywrightConfig>,
    pub serena: Option<SerenaConfig>,
    pub custom: IndexMap<String, McpServerConfig>,
    /// Normalized map, kept for engine-specific expansion
    pub raw: Mapping,
}

impl ToolsConfig {
    pub fn from_front_matter(tools: Option<&Value>, mcp_servers: Option<&Value>) -> Result<Self, AppError> {
        let raw = tools.and_then(Value::as_mapping).cloned().unwrap_or_default();
        let mut config = ToolsConfig {
            github: raw.get("github").map(GitHubToolConfig::from_value),
            bash: raw.get("bash").and_then(string_list),
            edit: raw.contains_key("edit"),
            web_fetch: raw.contains_key("web-fetch"),
            web_search: raw.contains_key("web-search"),
            playwright: raw.get("playwright").map(parse_playwright),
            serena: raw.get("serena").map(parse_serena),
            ..ToolsConfig::default()
        };

        for name in keys(&raw) {
            if BUILTIN_TOOLS.contains(&name.as_str()) {
                continue;
            }
            let Some(value) = raw.get(name.as_str()) else { continue };
            match value.as_mapping() {
                Some(map) if is_mcp_definition(value) => {
                    let server = McpServerConfig::parse(&name, map)?;
                    config.custom.insert(name, server);
                }
                _ => {
                    return Err(AppError::configuration(format!(
                        "unknown tool '{}'; custom tools must declare an MCP server with 'command', 'container' or 'url'",
                        name
                    ))
                    .with_code("AW-CFG-014")
                    .with_field(format!("tools.{}", name)))
                }
            }
        }

        if let Some(Value::Mapping(servers)) = mcp_servers {
            for name in keys(servers) {
                let Some(Value::Mapping(map)) = servers.get(name.as_str()) else {
                    return Err(AppError::configuration(format!("MCP server '{}' must be a map", name))
                        .with_code("AW-CFG-011")
                        .with_field(format!("mcp-servers.{}", name)));
                };
                if config.custom.contains_key(&name) {
                    return Err(AppError::configuration(format!(
                        "MCP server '{}' is declared in both tools and mcp-servers",
                        name
                    ))
                    .with_code("AW-CFG-015")
                    .with_field(format!("mcp-servers.{}", name)));
                }
                let server = McpServerConfig::parse(&name, map)?;
                config.custom.insert(name, server);
            }
        }
        config.raw = raw;
        Ok(config)
    }
}

fn parse_playwright(value: &Value) -> PlaywrightConfig {
    let empty = Mapping::new();
    let map = value.as_mapping().unwrap_or(&empty);
    let allowed_domains = map
        .get("allowed_domains")
        .map(crate::core::workflow::values::comma_or_list)
        .unwrap_or_default();
    PlaywrightConfig {
        version: get_string(map, "version"),
        allowed_domains,
    }
}

fn parse_serena(value: &Value) -> SerenaConfig {
    match value {
        Value::Sequence(_) => SerenaConfig {
            mode: SerenaMode::Docker,
            languages: string_list(value).unwrap_or_default(),
        },
        Value::Mapping(map) => SerenaConfig {
            mode: match map.get("mode").and_then(as_str) {
                Some("local") => SerenaMode::Local,
                _ => SerenaMode::Docker,
            },
            languages: match map.get("languages") {
                Some(Value::Mapping(languages)) => keys(languages),
                Some(other) => string_list(other).unwrap_or_default(),
                None => vec![],
            },
        },
        _ => SerenaConfig::default(),
    }
}

/// Names of MCP servers declared on the tool map, used by allow-list rendering.
pub fn mcp_server_names(tools: &ToolsConfig) -> Vec<String> {
    let mut names: Vec<String> = tools.custom.keys().cloned().collect();
    if tools.github.is_some() {
        names.push("github".to_string());
    }
    names.sort();
    names
}
