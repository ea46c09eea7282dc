//! Engine-neutral tools (`bash`, `edit`, `web-fetch`, `web-search`,
//! `playwright`) rewritten into the forms each engine understands.

use crate::core::workflow::model::ToolsConfig;
use crate::core::workflow::values::{keys, string_list};
use serde_yaml::{Mapping, Value};

pub const CLAUDE_EDIT_TOOLS: &[&str] = &["Edit", "MultiEdit", "NotebookEdit", "Write"];

/// Read-only tools Claude always gets.
pub const CLAUDE_DEFAULT_TOOLS: &[&str] = &[
    "ExitPlanMode",
    "Glob",
    "Grep",
    "LS",
    "NotebookRead",
    "Read",
    "Task",
    "TodoWrite",
];

pub const PLAYWRIGHT_TOOLS: &[&str] = &[
    "browser_click",
    "browser_close",
    "browser_console_messages",
    "browser_drag",
    "browser_evaluate",
    "browser_file_upload",
    "browser_fill_form",
    "browser_handle_dialog",
    "browser_hover",
    "browser_install",
    "browser_navigate",
    "browser_navigate_back",
    "browser_network_requests",
    "browser_press_key",
    "browser_resize",
    "browser_select_option",
    "browser_snapshot",
    "browser_tabs",
    "browser_take_screenshot",
    "browser_type",
    "browser_wait_for",
];

fn with_claude_allowed(tools: &mut Mapping, update: impl FnOnce(&mut Mapping)) {
    let mut claude = tools.get("claude").and_then(Value::as_mapping).cloned().unwrap_or_default();
    let mut allowed = claude.get("allowed").and_then(Value::as_mapping).cloned().unwrap_or_default();
    update(&mut allowed);
    claude.insert(Value::from("allowed"), Value::Mapping(allowed));
    tools.insert(Value::from("claude"), Value::Mapping(claude));
}

/// Move neutral tools under `claude.allowed`. Applying it twice changes nothing.
pub fn expand_neutral_tools_to_claude_tools(tools: &Mapping) -> Mapping {
    let mut out = tools.clone();

    if let Some(bash) = out.remove("bash") {
        let commands = string_list(&bash).unwrap_or_default();
        with_claude_allowed(&mut out, |allowed| {
            let mut merged = allowed.get("Bash").and_then(string_list).unwrap_or_default();
            for command in commands {
                if !merged.contains(&command) {
                    merged.push(command);
                }
            }
            allowed.insert(
                Value::from("Bash"),
                Value::Sequence(merged.into_iter().map(Value::from).collect()),
            );
        });
    }
    if out.remove("edit").is_some() {
        with_claude_allowed(&mut out, |allowed| {
            for tool in CLAUDE_EDIT_TOOLS {
                allowed.entry(Value::from(*tool)).or_insert(Value::Null);
            }
        });
    }
    if out.remove("web-fetch").is_some() {
        with_claude_allowed(&mut out, |allowed| {
            allowed.entry(Value::from("WebFetch")).or_insert(Value::Null);
        });
    }
    if out.remove("web-search").is_some() {
        with_claude_allowed(&mut out, |allowed| {
            allowed.entry(Value::from("WebSearch")).or_insert(Value::Null);
        });
    }
    if let Some(playwright) = out.get_mut("playwright") {
        let mut section = playwright.as_mapping().cloned().unwrap_or_default();
        section.insert(
            Value::from("allowed"),
            Value::Sequence(PLAYWRIGHT_TOOLS.iter().map(|t| Value::from(*t)).collect()),
        );
        *playwright = Value::Mapping(section);
    }
    out
}

/// Value of Claude's `--allowed-tools` flag.
pub fn claude_allowed_tools(tools: &ToolsConfig, mcp_servers: &[String]) -> String {
    let expanded = expand_neutral_tools_to_claude_tools(&tools.raw);
    let mut names: Vec<String> = CLAUDE_DEFAULT_TOOLS.iter().map(|t| t.to_string()).collect();

    if let Some(allowed) = expanded
        .get("claude")
        .and_then(|claude| claude.get("allowed"))
        .and_then(Value::as_mapping)
    {
        for tool in keys(allowed) {
            if tool == "Bash" {
                let commands = allowed.get("Bash").and_then(string_list).unwrap_or_default();
                if commands.is_empty() || commands.iter().any(|c| c == "*" || c == ":*") {
                    names.push("Bash".to_string());
                } else {
                    names.extend(commands.iter().map(|c| format!("Bash({})", c)));
                }
            } else {
                names.push(tool);
            }
        }
    }

    if let Some(github) = &tools.github {
        if github.allowed.is_empty() {
            names.push("mcp__github".to_string());
        } else {
            names.extend(github.allowed.iter().map(|t| format!("mcp__github__{}", t)));
        }
    }
    if tools.playwright.is_some() {
        names.extend(PLAYWRIGHT_TOOLS.iter().map(|t| format!("mcp__playwright__{}", t)));
    }
    for server in mcp_servers {
        if server == "github" || server == "playwright" {
            continue;
        }
        match tools.custom.get(server) {
            Some(custom) if !custom.allowed.is_empty() && !custom.allowed.iter().any(|t| t == "*") => {
                names.extend(custom.allowed.iter().map(|t| format!("mcp__{}__{}", server, t)));
            }
            _ => names.push(format!("mcp__{}", server)),
        }
    }

    names.sort();
    names.dedup();
    names.join(",")
}

/// `--allow-tool` arguments for the Copilot CLI.
pub fn copilot_allow_tool_args(tools: &ToolsConfig, mcp_servers: &[String]) -> Vec<String> {
    if tools.bash.as_ref().is_some_and(|b| b.iter().any(|c| c == "*" || c == ":*")) {
        return vec!["--allow-all-tools".to_string()];
    }
    let mut allowed: Vec<String> = Vec::new();
    if let Some(bash) = &tools.bash {
        allowed.extend(bash.iter().map(|c| format!("shell({})", c)));
    }
    if tools.edit {
        allowed.push("write".to_string());
    }
    for server in mcp_servers {
        let specific = match server.as_str() {
            "github" => tools.github.as_ref().map(|g| g.allowed.clone()).unwrap_or_default(),
            _ => tools.custom.get(server).map(|c| c.allowed.clone()).unwrap_or_default(),
        };
        if specific.is_empty() || specific.iter().any(|t| t == "*") {
            allowed.push(server.clone());
        } else {
            allowed.extend(specific.iter().map(|t| format!("{}({})", server, t)));
        }
    }
    allowed.sort();
    allowed.dedup();
    allowed
        .into_iter()
        .flat_map(|tool| ["--allow-tool".to_string(), shell_quote(&tool)])
        .collect()
}

/// Single-quote an argument that contains shell metacharacters.
pub fn shell_quote(arg: &str) -> String {
    let plain = arg
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | ',' | '@' | '+'));
    if plain && !arg.is_empty() {
        arg.to_string()
    } else {
        format!("'{}'", arg.replace('\'', "'\\''"))
    }
}
