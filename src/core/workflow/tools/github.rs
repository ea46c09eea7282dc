#![allow(clippy::result_large_err)]

//! GitHub MCP toolsets: which toolset enables which tool, and which
//! repository permission each toolset needs.

use crate::core::error::AppError;
use crate::core::workflow::model::{GitHubToolConfig, PermissionLevel, PermissionSet};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::LazyLock;

pub const DEFAULT_GITHUB_MCP_VERSION: &str = "v0.20.1";
pub const GITHUB_MCP_IMAGE: &str = "ghcr.io/github/github-mcp-server";
pub const GITHUB_REMOTE_MCP_URL: &str = "https://api.githubcopilot.com/mcp/";

const TOOLSETS_JSON: &str = include_str!("../data/github_toolsets.json");

#[derive(Debug, Clone, Deserialize)]
pub struct ToolsetInfo {
    /// Permission scope the toolset operates on, if any
    pub scope: Option<String>,
    /// Only ever needs read access
    #[serde(default)]
    pub read_only: bool,
    pub tools: Vec<String>,
}

static TOOLSETS: LazyLock<Result<BTreeMap<String, ToolsetInfo>, String>> =
    LazyLock::new(|| serde_json::from_str(TOOLSETS_JSON).map_err(|e| e.to_string()));

/// The embedded toolset table.
pub fn toolset_table() -> Result<&'static BTreeMap<String, ToolsetInfo>, AppError> {
    TOOLSETS.as_ref().map_err(|e| {
        AppError::compiler_bug(format!("embedded GitHub toolset table is invalid: {}", e)).with_code("AW-BUG-010")
    })
}

/// Toolsets that enable `tool`, in table order.
pub fn toolsets_for_tool<'a>(table: &'a BTreeMap<String, ToolsetInfo>, tool: &str) -> Vec<&'a str> {
    table
        .iter()
        .filter(|(_, info)| info.tools.iter().any(|t| t == tool))
        .map(|(name, _)| name.as_str())
        .collect()
}

/// Toolsets an allow-list needs but the configuration does not enable,
/// each with the allowed tools it would enable. Unknown tools are skipped.
pub fn missing_toolsets(
    table: &BTreeMap<String, ToolsetInfo>,
    enabled: &[String],
    allowed: &[String],
) -> BTreeMap<String, Vec<String>> {
    let mut missing: BTreeMap<String, Vec<String>> = BTreeMap::new();
    if enabled.iter().any(|t| t == "all") {
        return missing;
    }
    for tool in allowed {
        let providers = toolsets_for_tool(table, tool);
        if providers.is_empty() || providers.iter().any(|p| enabled.iter().any(|e| e == p)) {
            continue;
        }
        for provider in providers {
            let tools = missing.entry(provider.to_string()).or_default();
            if !tools.contains(tool) {
                tools.push(tool.clone());
            }
        }
    }
    missing
}

/// A permission a toolset needs that the workflow does not grant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingPermission {
    pub scope: String,
    pub level: PermissionLevel,
    pub toolset: String,
}

/// Scopes required by explicitly enabled toolsets that `permissions` does not satisfy.
pub fn missing_permissions(
    table: &BTreeMap<String, ToolsetInfo>,
    github: &GitHubToolConfig,
    permissions: &PermissionSet,
) -> Vec<MissingPermission> {
    let mut out: Vec<MissingPermission> = Vec::new();
    for toolset in &github.toolsets {
        let Some(info) = table.get(toolset) else { continue };
        let Some(scope) = info.scope.as_deref() else { continue };
        let level = if github.read_only || info.read_only {
            PermissionLevel::Read
        } else {
            PermissionLevel::Write
        };
        if permissions.level(scope).satisfies(level) {
            continue;
        }
        if out.iter().any(|m| m.scope == scope && m.level >= level) {
            continue;
        }
        out.retain(|m| m.scope != scope);
        out.push(MissingPermission {
            scope: scope.to_string(),
            level,
            toolset: toolset.clone(),
        });
    }
    out.sort_by(|a, b| a.scope.cmp(&b.scope));
    out
}

/// Value passed to `GITHUB_TOOLSETS` / `X-MCP-Toolsets`.
pub fn toolsets_value(github: &GitHubToolConfig) -> String {
    github.toolsets.join(",")
}
