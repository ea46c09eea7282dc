use ghaw::core::context::CompilerContext;
use ghaw::core::error::AppError;
use ghaw::core::workflow::network::allowed_domains;
use ghaw::core::workflow::normalize::apply_default_pipeline;
use ghaw::core::workflow::tools::{
    claude_allowed_tools, collect_mcp_servers, copilot_allow_tool_args, expand_neutral_tools_to_claude_tools,
    render_mcp_config, McpFormat,
};
use ghaw::core::workflow::{build_model, parse_source, WorkflowModel};
use serde_json::Value as JsonValue;
use serde_yaml::Mapping;
use std::path::Path;

fn try_model(text: &str) -> Result<WorkflowModel, AppError> {
    let context = CompilerContext::new();
    let mut doc = parse_source(text, Path::new("tools.md"))?;
    doc.front_matter = apply_default_pipeline(std::mem::take(&mut doc.front_matter), &context)?;
    build_model(&doc, &context, false)
}

fn model(text: &str) -> WorkflowModel {
    try_model(text).unwrap()
}

#[test]
fn test_claude_allow_list() {
    let model = model(
        "---\non: push\ntools:\n  bash: [make]\n  edit:\n  github:\n    allowed: [list_issues]\n---\nGo\n",
    );
    let allowed = claude_allowed_tools(&model.tools, &["github".to_string()]);
    let names: Vec<&str> = allowed.split(',').collect();
    for expected in ["Bash(make)", "Bash(echo)", "Edit", "Write", "Read", "mcp__github__list_issues"] {
        assert!(names.contains(&expected), "{} missing from {}", expected, allowed);
    }
    let mut sorted = names.clone();
    sorted.sort();
    assert_eq!(names, sorted);
}

#[test]
fn test_neutral_expansion_is_idempotent() {
    let tools: Mapping = serde_yaml::from_str("bash: [ls]\nweb-fetch:\nplaywright:\n").unwrap();
    let once = expand_neutral_tools_to_claude_tools(&tools);
    let twice = expand_neutral_tools_to_claude_tools(&once);
    assert_eq!(once, twice);
    assert!(once.get("bash").is_none());
    assert!(once["claude"]["allowed"].get("WebFetch").is_some());
}

#[test]
fn test_copilot_tool_arguments() {
    let wildcard = model("---\non: push\ntools:\n  bash: true\n---\nGo\n");
    assert_eq!(copilot_allow_tool_args(&wildcard.tools, &[]), vec!["--allow-all-tools"]);

    let scoped = model("---\non: push\ntools:\n  bash: [make]\n  edit:\n---\nGo\n");
    let args = copilot_allow_tool_args(&scoped.tools, &[]);
    assert!(args.windows(2).any(|pair| pair == ["--allow-tool", "'shell(make)'"]));
    assert!(args.windows(2).any(|pair| pair == ["--allow-tool", "write"]));
}

#[test]
fn test_local_github_server_runs_in_docker() {
    let model = model("---\non: push\ntools:\n  github:\n    read-only: true\n---\nGo\n");
    let set = collect_mcp_servers(&model, false, ".github/workflows/aw/tools");
    let github = &set.servers["github"];
    assert_eq!(github.container.as_deref(), Some("ghcr.io/github/github-mcp-server:v0.20.1"));
    assert_eq!(github.env["GITHUB_TOOLSETS"], "context,repos,issues,pull_requests");
    assert_eq!(github.env["GITHUB_READ_ONLY"], "1");
    assert!(set.env_refs.contains_key("GITHUB_MCP_SERVER_TOKEN"));
}

#[test]
fn test_remote_github_server() {
    let model = model("---\non: push\ntools:\n  github:\n    mode: remote\n    toolsets: [repos]\n---\nGo\n");
    let set = collect_mcp_servers(&model, false, "aw/tools");
    assert!(set.servers.get("github").is_none());
    assert_eq!(set.names(), vec!["github"]);

    let rendered = render_mcp_config(&set, McpFormat::Codex).unwrap();
    let parsed: toml::Table = toml::from_str(&rendered.content).unwrap();
    let github = &parsed["mcp_servers"]["github"];
    assert_eq!(github["url"].as_str(), Some("https://api.githubcopilot.com/mcp/"));
    assert_eq!(github["http_headers"]["X-MCP-Toolsets"].as_str(), Some("repos"));
}

#[test]
fn test_custom_interpreter_server_is_containerized() {
    let model = model(
        "---\non: push\nmcp-servers:\n  notion:\n    command: npx\n    args: [\"-y\", \"notion-mcp\"]\n    env:\n      NOTION_TOKEN: \"${{ secrets.NOTION_TOKEN }}\"\n---\nGo\n",
    );
    let set = collect_mcp_servers(&model, false, "aw/tools");
    let notion = &set.servers["notion"];
    assert_eq!(notion.container.as_deref(), Some("node:lts-alpine"));
    assert_eq!(notion.entrypoint.as_deref(), Some("npx"));
    assert_eq!(notion.entrypoint_args, vec!["-y", "notion-mcp"]);
    assert_eq!(notion.env["NOTION_TOKEN"], "${NOTION_TOKEN}");
    assert_eq!(set.env_refs["NOTION_TOKEN"], "${{ secrets.NOTION_TOKEN }}");

    let rendered = render_mcp_config(&set, McpFormat::Copilot).unwrap();
    let json: JsonValue = serde_json::from_str(&rendered.content).unwrap();
    let entry = &json["mcpServers"]["notion"];
    assert_eq!(entry["type"], "stdio");
    assert_eq!(entry["command"], "docker");
    assert_eq!(entry["tools"], serde_json::json!(["*"]));
    assert_eq!(rendered.env["NOTION_TOKEN"], "${{ secrets.NOTION_TOKEN }}");
}

#[test]
fn test_safe_outputs_server_is_added() {
    let model = model("---\non: issues\nsafe-outputs:\n  add-comment:\n---\nGo\n");
    let set = collect_mcp_servers(&model, false, ".github/workflows/aw/tools");
    let server = &set.servers["safeoutputs"];
    assert_eq!(server.command.as_deref(), Some("node"));
    assert_eq!(
        server.args,
        vec!["${{ github.workspace }}/.github/workflows/aw/tools/safe_outputs_mcp_server.cjs"]
    );
}

#[test]
fn test_invalid_server_definitions() {
    let err = try_model("---\non: push\nmcp-servers:\n  api:\n    url: ftp://example.com\n---\nGo\n").unwrap_err();
    assert_eq!(err.code, "AW-CFG-016");
    let err = try_model("---\non: push\ntools:\n  mystery: {}\n---\nGo\n").unwrap_err();
    assert_eq!(err.code, "AW-CFG-014");
}

#[test]
fn test_network_ecosystems_expand() {
    let model = model("---\non: push\nnetwork:\n  allowed: [python, api.example.com]\n---\nGo\n");
    let domains = allowed_domains(&model.network, &["api.anthropic.com"]).unwrap();
    assert!(domains.contains(&"pypi.org".to_string()));
    assert!(domains.contains(&"api.example.com".to_string()));
    assert!(domains.contains(&"api.anthropic.com".to_string()));
}
