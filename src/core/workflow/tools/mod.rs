//! Tool lowering: GitHub toolsets, neutral-tool expansion, MCP descriptors
//! and token selection.

pub mod github;
pub mod mcp;
pub mod neutral;
pub mod tokens;

pub use github::{missing_permissions, missing_toolsets, toolset_table, toolsets_for_tool, MissingPermission};
pub use mcp::{
    collect_mcp_servers, render_github_mcp_remote_config, render_mcp_config, GitHubMCPRemoteOptions, McpFormat,
    McpServerSet, RenderedMcpConfig, SAFE_OUTPUTS_SERVER,
};
pub use neutral::{claude_allowed_tools, copilot_allow_tool_args, expand_neutral_tools_to_claude_tools, shell_quote};
pub use tokens::{effective_copilot_token, effective_github_token, effective_safe_output_token};
