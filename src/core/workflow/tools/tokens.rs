//! Token expressions handed to the GitHub MCP server, safe-output jobs and engines.

pub const DEFAULT_GITHUB_TOKEN: &str =
    "${{ secrets.GH_AW_GITHUB_MCP_SERVER_TOKEN || secrets.GH_AW_GITHUB_TOKEN || secrets.GITHUB_TOKEN }}";
pub const DEFAULT_SAFE_OUTPUT_TOKEN: &str = "${{ secrets.GH_AW_GITHUB_TOKEN || secrets.GITHUB_TOKEN }}";
pub const DEFAULT_COPILOT_TOKEN: &str = "${{ secrets.COPILOT_GITHUB_TOKEN || secrets.GH_AW_GITHUB_TOKEN }}";

fn first_set<'a>(candidates: &[Option<&'a str>], default: &'a str) -> &'a str {
    candidates
        .iter()
        .flatten()
        .find(|token| !token.trim().is_empty())
        .copied()
        .unwrap_or(default)
}

/// Token for the GitHub MCP server: tool-level, then workflow-level, then the default chain.
pub fn effective_github_token(custom: Option<&str>, top_level: Option<&str>) -> String {
    first_set(&[custom, top_level], DEFAULT_GITHUB_TOKEN).to_string()
}

/// Token for a safe-output handler: per-output, then `safe-outputs.github-token`,
/// then workflow-level, then the default chain.
pub fn effective_safe_output_token(per_output: Option<&str>, section: Option<&str>, top_level: Option<&str>) -> String {
    first_set(&[per_output, section, top_level], DEFAULT_SAFE_OUTPUT_TOKEN).to_string()
}

pub fn effective_copilot_token(custom: Option<&str>) -> String {
    first_set(&[custom], DEFAULT_COPILOT_TOKEN).to_string()
}
