#![allow(clippy::result_large_err)]

//! Descriptors consumed by the safe-outputs MCP server and the handler jobs.

use crate::core::error::AppError;
use crate::core::workflow::model::{SafeOutputEntry, SafeOutputKind, SafeOutputsConfig, ToolInput};
use crate::core::workflow::values::to_json;
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{json, Map, Value as JsonValue};
use std::sync::LazyLock;

/// Tool descriptor written to the helper directory.
pub const TOOLS_FILE: &str = "tools.json";

const BUILTIN_TOOLS_JSON: &str = include_str!("../data/safe_output_tools.json");

static BUILTIN_TOOLS: LazyLock<Result<Vec<JsonValue>, String>> =
    LazyLock::new(|| serde_json::from_str(BUILTIN_TOOLS_JSON).map_err(|e| e.to_string()));

fn builtin_tools() -> Result<&'static [JsonValue], AppError> {
    BUILTIN_TOOLS.as_deref().map_err(|e| {
        AppError::compiler_bug(format!("embedded safe-output tool table is invalid: {}", e)).with_code("AW-BUG-040")
    })
}

/// Helper script a kind's handler job runs.
pub fn script_name(kind: SafeOutputKind) -> &'static str {
    match kind {
        SafeOutputKind::CreatePullRequestReviewComment => "create_pr_review_comment",
        SafeOutputKind::CreateIssue => "create_issue",
        SafeOutputKind::CreateDiscussion => "create_discussion",
        SafeOutputKind::AddComment => "add_comment",
        SafeOutputKind::CreatePullRequest => "create_pull_request",
        SafeOutputKind::UpdateIssue => "update_issue",
        SafeOutputKind::UpdatePullRequest => "update_pull_request",
        SafeOutputKind::UpdateDiscussion => "update_discussion",
        SafeOutputKind::CloseIssue => "close_issue",
        SafeOutputKind::CloseDiscussion => "close_discussion",
        SafeOutputKind::AddLabels => "add_labels",
        SafeOutputKind::AddReviewer => "add_reviewer",
        SafeOutputKind::AssignMilestone => "assign_milestone",
        SafeOutputKind::PushToPullRequestBranch => "push_to_pull_request_branch",
        SafeOutputKind::MissingTool => "missing_tool",
    }
}

/// How many items a handler processes when `max` is not set.
pub fn default_max(kind: SafeOutputKind) -> Option<i64> {
    match kind {
        SafeOutputKind::CreatePullRequestReviewComment => Some(10),
        SafeOutputKind::AddLabels => Some(3),
        SafeOutputKind::MissingTool => None,
        _ => Some(1),
    }
}

/// JSON Schema for declared inputs. `choice` becomes a string enum.
pub fn input_schema(inputs: &IndexMap<String, ToolInput>) -> JsonValue {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for (name, input) in inputs {
        let mut property = Map::new();
        let json_type = match input.input_type.as_str() {
            "number" => "number",
            "boolean" => "boolean",
            _ => "string",
        };
        property.insert("type".into(), json!(json_type));
        if let Some(description) = &input.description {
            property.insert("description".into(), json!(description));
        }
        if input.input_type == "choice" && !input.options.is_empty() {
            property.insert("enum".into(), json!(input.options));
        }
        if let Some(default) = &input.default {
            property.insert("default".into(), to_json(default));
        }
        if input.required {
            required.push(name.clone());
        }
        properties.insert(name.clone(), JsonValue::Object(property));
    }
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false,
    })
}

/// Built-in tools for the enabled kinds, then one tool per custom safe job.
pub fn tools_json_value(config: &SafeOutputsConfig) -> Result<JsonValue, AppError> {
    let enabled: Vec<String> = config.outputs.keys().map(SafeOutputKind::output_type).collect();
    let mut tools: Vec<JsonValue> = builtin_tools()?
        .iter()
        .filter(|tool| {
            tool.get("name")
                .and_then(JsonValue::as_str)
                .is_some_and(|name| enabled.iter().any(|e| e == name))
        })
        .cloned()
        .collect();
    for job in config.jobs.values() {
        tools.push(json!({
            "name": job.job_id(),
            "description": job
                .description
                .clone()
                .unwrap_or_else(|| format!("Run the {} job", job.name)),
            "inputSchema": input_schema(&job.inputs),
        }));
    }
    Ok(JsonValue::Array(tools))
}

pub fn render_tools_json(config: &SafeOutputsConfig) -> Result<String, AppError> {
    pretty(&tools_json_value(config)?)
}

/// Per-type limits read by the MCP server and the output collector.
pub fn config_json_value(config: &SafeOutputsConfig) -> JsonValue {
    let mut root = Map::new();
    for (kind, entry) in &config.outputs {
        let mut settings = Map::new();
        if let Some(max) = entry.max.or_else(|| default_max(*kind)) {
            settings.insert("max".into(), json!(max));
        }
        root.insert(kind.output_type(), JsonValue::Object(settings));
    }
    for job in config.jobs.values() {
        root.insert(job.job_id(), json!({}));
    }
    if config.needs_git() {
        root.insert("max_patch_size".into(), json!(config.max_patch_size));
    }
    JsonValue::Object(root)
}

pub fn render_config_json(config: &SafeOutputsConfig) -> Result<String, AppError> {
    serde_json::to_string(&config_json_value(config))
        .map_err(|e| AppError::operation("failed to render safe outputs config", e).with_code("AW-OPS-040"))
}

/// Settings handed to one handler through `GH_AW_HANDLER_CONFIG`.
#[derive(Debug, Serialize)]
pub struct HandlerConfig<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_repo: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub labels: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub allowed: &'a [String],
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub reviewers: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub draft: Option<bool>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    pub required_labels: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required_title_prefix: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_patch_size: Option<i64>,
}

impl<'a> HandlerConfig<'a> {
    pub fn new(kind: SafeOutputKind, entry: &'a SafeOutputEntry, max_patch_size: i64) -> Self {
        HandlerConfig {
            max: entry.max.or_else(|| default_max(kind)),
            target: entry.target.as_deref(),
            target_repo: entry.target_repo.as_deref(),
            title_prefix: entry.title_prefix.as_deref(),
            labels: &entry.labels,
            allowed: &entry.allowed,
            reviewers: &entry.reviewers,
            category: entry.category.as_deref(),
            draft: entry.draft,
            required_labels: &entry.required_labels,
            required_title_prefix: entry.required_title_prefix.as_deref(),
            max_patch_size: kind.needs_git().then_some(max_patch_size),
        }
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string(self)
            .map_err(|e| AppError::operation("failed to render handler config", e).with_code("AW-OPS-041"))
    }
}

fn pretty(value: &JsonValue) -> Result<String, AppError> {
    serde_json::to_string_pretty(value)
        .map(|mut text| {
            text.push('\n');
            text
        })
        .map_err(|e| AppError::operation("failed to render JSON descriptor", e).with_code("AW-OPS-040"))
}
