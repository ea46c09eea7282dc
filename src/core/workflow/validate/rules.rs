use super::{SemanticRule, ValidationFinding};
use crate::core::types::ErrorCategory;
use crate::core::workflow::model::{PermissionLevel, SerenaMode, WorkflowModel};
use crate::core::workflow::normalize::expand_toolsets;
use crate::core::workflow::tools::github::{missing_permissions, missing_toolsets, toolset_table};
use crate::core::workflow::values::{keys, type_name};
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

static TARGET_NUMBER: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]*$").expect("target regex is valid"));
static TARGET_EXPRESSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\$\{\{.+\}\}$").expect("target expression regex is valid"));
static COMMIT_SHA: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9a-f]{40}$").expect("sha regex is valid"));
static TRACKER_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]{8,}$").expect("tracker-id regex is valid"));

/// Feature flags the compiler reads; anything else passes through with a warning.
pub const KNOWN_FEATURES: &[&str] = &["action-tag"];

/// Scopes strict mode refuses to grant the agent at write level.
const STRICT_WRITE_SCOPES: &[&str] = &["contents", "issues", "pull-requests", "discussions"];

pub fn built_in_rules() -> Vec<Box<dyn SemanticRule>> {
    vec![
        Box::new(SafeOutputTargetRule),
        Box::new(ActionTagRule),
        Box::new(UnknownFeatureRule),
        Box::new(TrackerIdRule),
        Box::new(GitHubToolsetRule),
        Box::new(ToolsetPermissionRule),
        Box::new(SerenaLocalModeRule),
        Box::new(SandboxDisabledRule),
        Box::new(FirewallToggleRule),
        Box::new(StrictWritePermissionsRule),
        Box::new(StrictNetworkWildcardRule),
    ]
}

/// `""`, `triggering`, `*`, a positive integer without leading zeros, or `${{ ... }}`.
pub fn is_valid_target(target: &str) -> bool {
    matches!(target, "" | "triggering" | "*") || TARGET_NUMBER.is_match(target) || TARGET_EXPRESSION.is_match(target)
}

struct SafeOutputTargetRule;

impl SemanticRule for SafeOutputTargetRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let Some(outputs) = &model.safe_outputs else {
            return vec![];
        };
        outputs
            .outputs
            .iter()
            .filter_map(|(kind, entry)| {
                let target = entry.target.as_deref()?;
                (!is_valid_target(target)).then(|| {
                    ValidationFinding::error(
                        "AW-SEM-001",
                        ErrorCategory::ValidationError,
                        format!("invalid target value for {}: \"{}\"", kind.key(), target),
                    )
                    .field(format!("safe-outputs.{}.target", kind.key()))
                    .suggestion("use \"triggering\", \"*\", a positive issue number, or a ${{ }} expression")
                })
            })
            .collect()
    }
}

struct ActionTagRule;

impl SemanticRule for ActionTagRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let finding = |message: &str, value: String| {
            ValidationFinding::error("AW-SEM-002", ErrorCategory::ValidationError, message)
                .field("features.action-tag")
                .value(value)
        };
        match model.features.get("action-tag") {
            None | Some(Value::Null) => vec![],
            Some(Value::String(tag)) if tag.is_empty() || COMMIT_SHA.is_match(tag) => vec![],
            Some(Value::String(tag)) => vec![finding("action-tag must be a full 40-character commit SHA", tag.clone())
                .suggestion("use the full lowercase commit SHA, e.g. from `git rev-parse HEAD`")],
            Some(other) => vec![finding("action-tag must be a string", type_name(other).to_string())],
        }
    }
}

struct UnknownFeatureRule;

impl SemanticRule for UnknownFeatureRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let Some(Value::Mapping(declared)) = model.front_matter.get("features") else {
            return vec![];
        };
        keys(declared)
            .into_iter()
            .filter(|name| !KNOWN_FEATURES.contains(&name.as_str()))
            .map(|name| {
                ValidationFinding::warning("AW-SEM-003", format!("unknown feature '{}' is passed through unchecked", name))
                    .field(format!("features.{}", name))
            })
            .collect()
    }
}

struct TrackerIdRule;

impl SemanticRule for TrackerIdRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        match &model.tracker_id {
            Some(id) if !TRACKER_ID.is_match(id) => vec![ValidationFinding::error(
                "AW-SEM-004",
                ErrorCategory::ValidationError,
                "tracker-id must be at least 8 characters of letters, digits, '-' or '_'",
            )
            .field("tracker-id")
            .value(id.clone())],
            _ => vec![],
        }
    }
}

struct GitHubToolsetRule;

impl SemanticRule for GitHubToolsetRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let Some(github) = &model.tools.github else {
            return vec![];
        };
        if github.allowed.is_empty() {
            return vec![];
        }
        let table = match toolset_table() {
            Ok(table) => table,
            Err(e) => return vec![ValidationFinding::error(e.code, e.category, e.message)],
        };
        let enabled = expand_toolsets(&github.toolsets);
        let missing = missing_toolsets(table, &enabled, &github.allowed);
        if missing.is_empty() {
            return vec![];
        }
        let details: Vec<String> = missing
            .iter()
            .map(|(toolset, tools)| format!("Toolset '{}' is required by: {}", toolset, tools.join(", ")))
            .collect();
        let names: Vec<&str> = missing.keys().map(String::as_str).collect();
        vec![ValidationFinding::error(
            "AW-SEM-010",
            ErrorCategory::ConfigurationError,
            format!("allowed GitHub tools need toolsets that are not enabled. {}", details.join("; ")),
        )
        .field("tools.github.toolsets")
        .suggestion(format!("add {} to tools.github.toolsets", names.join(", ")))]
    }
}

struct ToolsetPermissionRule;

impl SemanticRule for ToolsetPermissionRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let Some(github) = model.tools.github.as_ref().filter(|github| github.toolsets_explicit) else {
            return vec![];
        };
        let table = match toolset_table() {
            Ok(table) => table,
            Err(e) => return vec![ValidationFinding::error(e.code, e.category, e.message)],
        };
        let mut expanded = github.clone();
        expanded.toolsets = expand_toolsets(&github.toolsets);
        let missing = missing_permissions(table, &expanded, &model.permissions);
        if missing.is_empty() {
            return vec![];
        }
        let lines: Vec<String> = missing
            .iter()
            .map(|m| format!("{}: {} (required by {})", m.scope, m.level, m.toolset))
            .collect();
        let suggestion = if missing.iter().any(|m| m.level == PermissionLevel::Write) && !github.read_only {
            "grant the listed permissions, or set tools.github.read-only: true and remove the toolsets you do not need"
        } else {
            "grant the listed permissions, or remove the toolsets you do not need"
        };
        vec![ValidationFinding::strict(
            model.strict,
            "AW-SEM-011",
            ErrorCategory::ConfigurationError,
            format!("GitHub toolsets need permissions the workflow does not grant: {}", lines.join(", ")),
        )
        .field("permissions")
        .suggestion(suggestion)]
    }
}

struct SerenaLocalModeRule;

impl SemanticRule for SerenaLocalModeRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        match &model.tools.serena {
            Some(serena) if model.strict && serena.mode == SerenaMode::Local => vec![ValidationFinding::error(
                "AW-SEM-020",
                ErrorCategory::ConfigurationError,
                "strict mode does not allow serena in local mode",
            )
            .field("tools.serena.mode")
            .suggestion("use mode: docker or turn off strict mode")],
            _ => vec![],
        }
    }
}

struct SandboxDisabledRule;

impl SemanticRule for SandboxDisabledRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        if !model.sandbox.explicitly_disabled {
            return vec![];
        }
        let finding = if model.strict {
            ValidationFinding::error(
                "AW-SEM-030",
                ErrorCategory::ConfigurationError,
                "strict mode does not allow sandbox: false",
            )
            .suggestion("remove sandbox: false or compile without strict mode")
        } else {
            ValidationFinding::warning("AW-SEM-030", "sandbox: false runs the agent without the network firewall")
        };
        vec![finding.field("sandbox")]
    }
}

struct FirewallToggleRule;

impl SemanticRule for FirewallToggleRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        if model.network.firewall != Some(false) {
            return vec![];
        }
        vec![ValidationFinding::warning("AW-SEM-031", "network.firewall is deprecated; use sandbox.agent instead")
            .field("network.firewall")]
    }
}

struct StrictWritePermissionsRule;

impl SemanticRule for StrictWritePermissionsRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        if !model.strict {
            return vec![];
        }
        STRICT_WRITE_SCOPES
            .iter()
            .filter(|scope| model.permissions.level(scope) == PermissionLevel::Write)
            .map(|scope| {
                ValidationFinding::error(
                    "AW-SEM-032",
                    ErrorCategory::ConfigurationError,
                    format!("strict mode does not allow '{}: write' on the agent job", scope),
                )
                .field(format!("permissions.{}", scope))
                .suggestion("request the change through safe-outputs instead")
            })
            .collect()
    }
}

struct StrictNetworkWildcardRule;

impl SemanticRule for StrictNetworkWildcardRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let wildcard = model
            .network
            .allowed
            .as_ref()
            .is_some_and(|allowed| allowed.iter().any(|domain| domain == "*"));
        if !model.strict || !wildcard {
            return vec![];
        }
        vec![ValidationFinding::error(
            "AW-SEM-033",
            ErrorCategory::ConfigurationError,
            "strict mode does not allow '*' in network.allowed",
        )
        .field("network.allowed")
        .suggestion("list the domains the agent needs")]
    }
}
