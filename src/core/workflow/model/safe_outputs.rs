use super::engine::string_map;
use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::workflow::values::{get_bool, get_string, keys, parse_int_value, string_list};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

/// Side effects the agent may request through the safe-outputs MCP server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SafeOutputKind {
    CreateIssue,
    CreateDiscussion,
    AddComment,
    CreatePullRequest,
    CreatePullRequestReviewComment,
    UpdateIssue,
    UpdatePullRequest,
    UpdateDiscussion,
    CloseIssue,
    CloseDiscussion,
    AddLabels,
    AddReviewer,
    AssignMilestone,
    PushToPullRequestBranch,
    MissingTool,
}

impl SafeOutputKind {
    pub const ALL: &'static [SafeOutputKind] = &[
        SafeOutputKind::CreateIssue,
        SafeOutputKind::CreateDiscussion,
        SafeOutputKind::AddComment,
        SafeOutputKind::CreatePullRequest,
        SafeOutputKind::CreatePullRequestReviewComment,
        SafeOutputKind::UpdateIssue,
        SafeOutputKind::UpdatePullRequest,
        SafeOutputKind::UpdateDiscussion,
        SafeOutputKind::CloseIssue,
        SafeOutputKind::CloseDiscussion,
        SafeOutputKind::AddLabels,
        SafeOutputKind::AddReviewer,
        SafeOutputKind::AssignMilestone,
        SafeOutputKind::PushToPullRequestBranch,
        SafeOutputKind::MissingTool,
    ];

    /// Canonical front-matter key.
    pub fn key(&self) -> &'static str {
        match self {
            SafeOutputKind::CreateIssue => "create-issue",
            SafeOutputKind::CreateDiscussion => "create-discussion",
            SafeOutputKind::AddComment => "add-comment",
            SafeOutputKind::CreatePullRequest => "create-pull-request",
            SafeOutputKind::CreatePullRequestReviewComment => "create-pull-request-review-comment",
            SafeOutputKind::UpdateIssue => "update-issue",
            SafeOutputKind::UpdatePullRequest => "update-pull-request",
            SafeOutputKind::UpdateDiscussion => "update-discussion",
            SafeOutputKind::CloseIssue => "close-issue",
            SafeOutputKind::CloseDiscussion => "close-discussion",
            SafeOutputKind::AddLabels => "add-labels",
            SafeOutputKind::AddReviewer => "add-reviewer",
            SafeOutputKind::AssignMilestone => "assign-milestone",
            SafeOutputKind::PushToPullRequestBranch => "push-to-pull-request-branch",
            SafeOutputKind::MissingTool => "missing-tool",
        }
    }

    /// The other accepted spelling of the key.
    pub fn alternate_key(&self) -> Option<&'static str> {
        match self {
            SafeOutputKind::CreateIssue => Some("create-issues"),
            SafeOutputKind::CreateDiscussion => Some("create-discussions"),
            SafeOutputKind::AddComment => Some("add-comments"),
            SafeOutputKind::CreatePullRequest => Some("create-pull-requests"),
            SafeOutputKind::CreatePullRequestReviewComment => Some("create-pull-request-review-comments"),
            SafeOutputKind::UpdateIssue => Some("update-issues"),
            SafeOutputKind::UpdatePullRequest => Some("update-pull-requests"),
            SafeOutputKind::UpdateDiscussion => Some("update-discussions"),
            SafeOutputKind::CloseIssue => Some("close-issues"),
            SafeOutputKind::CloseDiscussion => Some("close-discussions"),
            SafeOutputKind::AddLabels => Some("add-label"),
            SafeOutputKind::AddReviewer => Some("add-reviewers"),
            SafeOutputKind::AssignMilestone => Some("assign-milestones"),
            SafeOutputKind::PushToPullRequestBranch => None,
            SafeOutputKind::MissingTool => Some("missing-tools"),
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.key() == key || kind.alternate_key() == Some(key))
    }

    /// Record `type` written by the agent and matched by the handler job.
    pub fn output_type(&self) -> String {
        self.key().replace('-', "_")
    }

    /// Name of the handler job in the lock file.
    pub fn job_name(&self) -> &'static str {
        match self {
            SafeOutputKind::CreateIssue => "create_issue",
            SafeOutputKind::CreateDiscussion => "create_discussion",
            SafeOutputKind::AddComment => "add_comment",
            SafeOutputKind::CreatePullRequest => "create_pull_request",
            SafeOutputKind::CreatePullRequestReviewComment => "create_pr_review_comment",
            SafeOutputKind::UpdateIssue => "update_issues",
            SafeOutputKind::UpdatePullRequest => "update_pull_requests",
            SafeOutputKind::UpdateDiscussion => "update_discussions",
            SafeOutputKind::CloseIssue => "close_issues",
            SafeOutputKind::CloseDiscussion => "close_discussions",
            SafeOutputKind::AddLabels => "add_labels",
            SafeOutputKind::AddReviewer => "add_reviewer",
            SafeOutputKind::AssignMilestone => "assign_milestone",
            SafeOutputKind::PushToPullRequestBranch => "push_to_pull_request_branch",
            SafeOutputKind::MissingTool => "missing_tool",
        }
    }

    /// Whether the kind accepts a `target` setting.
    pub fn accepts_target(&self) -> bool {
        !matches!(
            self,
            SafeOutputKind::CreateIssue
                | SafeOutputKind::CreateDiscussion
                | SafeOutputKind::CreatePullRequest
                | SafeOutputKind::MissingTool
        )
    }

    /// Whether the handler needs the repository and the agent's patch.
    pub fn needs_git(&self) -> bool {
        matches!(
            self,
            SafeOutputKind::CreatePullRequest | SafeOutputKind::PushToPullRequestBranch
        )
    }
}

/// Settings of one enabled safe output.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SafeOutputEntry {
    pub max: Option<i64>,
    pub target: Option<String>,
    pub target_repo: Option<String>,
    pub title_prefix: Option<String>,
    pub labels: Vec<String>,
    pub allowed: Vec<String>,
    pub reviewers: Vec<String>,
    pub category: Option<String>,
    pub draft: Option<bool>,
    pub github_token: Option<String>,
    /// `required-labels`/`required-title-prefix` filters for update and close kinds
    pub required_labels: Vec<String>,
    pub required_title_prefix: Option<String>,
}

impl SafeOutputEntry {
    fn parse(kind: SafeOutputKind, value: &Value, context: &CompilerContext) -> Self {
        let empty = Mapping::new();
        let map = value.as_mapping().unwrap_or(&empty);
        let list = |key: &str| map.get(key).and_then(string_list).unwrap_or_default();
        SafeOutputEntry {
            max: map
                .get("max")
                .and_then(|max| parse_int_value(max, &format!("safe-outputs.{}.max", kind.key()), Some(context))),
            target: get_string(map, "target"),
            target_repo: get_string(map, "target-repo"),
            title_prefix: get_string(map, "title-prefix"),
            labels: list("labels"),
            allowed: list("allowed"),
            reviewers: list("reviewers"),
            category: get_string(map, "category"),
            draft: get_bool(map, "draft"),
            github_token: get_string(map, "github-token"),
            required_labels: list("required-labels"),
            required_title_prefix: get_string(map, "required-title-prefix"),
        }
    }
}

/// Input declared by a custom safe job or safe-input tool.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ToolInput {
    pub description: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub input_type: String,
    pub options: Vec<String>,
}

impl ToolInput {
    pub fn parse(value: &Value) -> Self {
        let empty = Mapping::new();
        let map = value.as_mapping().unwrap_or(&empty);
        ToolInput {
            description: get_string(map, "description"),
            required: get_bool(map, "required").unwrap_or(false),
            default: map.get("default").cloned(),
            input_type: get_string(map, "type").unwrap_or_else(|| "string".to_string()),
            options: map.get("options").and_then(string_list).unwrap_or_default(),
        }
    }
}

pub fn parse_inputs(value: Option<&Value>) -> IndexMap<String, ToolInput> {
    let Some(Value::Mapping(map)) = value else {
        return IndexMap::new();
    };
    keys(map)
        .into_iter()
        .filter_map(|name| {
            let input = map.get(name.as_str()).map(ToolInput::parse)?;
            Some((name, input))
        })
        .collect()
}

/// `safe-outputs.jobs.<name>`: a user-defined job the agent can trigger.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SafeJobConfig {
    pub name: String,
    pub description: Option<String>,
    pub runs_on: Option<Value>,
    pub if_condition: Option<String>,
    pub needs: Vec<String>,
    pub permissions: Option<Value>,
    pub env: IndexMap<String, String>,
    pub steps: Vec<Value>,
    pub inputs: IndexMap<String, ToolInput>,
    pub output: Option<String>,
    pub github_token: Option<String>,
}

impl SafeJobConfig {
    fn parse(name: &str, value: &Value) -> Self {
        let empty = Mapping::new();
        let map = value.as_mapping().unwrap_or(&empty);
        SafeJobConfig {
            name: name.to_string(),
            description: get_string(map, "description"),
            runs_on: map.get("runs-on").cloned(),
            if_condition: get_string(map, "if"),
            needs: map.get("needs").and_then(string_list).unwrap_or_default(),
            permissions: map.get("permissions").cloned(),
            env: string_map(map.get("env")),
            steps: map.get("steps").and_then(Value::as_sequence).cloned().unwrap_or_default(),
            inputs: parse_inputs(map.get("inputs")),
            output: get_string(map, "output"),
            github_token: get_string(map, "github-token"),
        }
    }

    /// Job id in the lock file.
    pub fn job_id(&self) -> String {
        self.name.replace('-', "_")
    }
}

pub const DEFAULT_MAX_PATCH_SIZE_KB: i64 = 1024;

#[derive(Debug, Clone, PartialEq)]
pub struct SafeOutputsConfig {
    pub outputs: BTreeMap<SafeOutputKind, SafeOutputEntry>,
    pub jobs: IndexMap<String, SafeJobConfig>,
    pub staged: bool,
    pub env: IndexMap<String, String>,
    pub github_token: Option<String>,
    pub max_patch_size: i64,
}

impl SafeOutputsConfig {
    /// Parse `safe-outputs:`; `None` when the section is absent or empty.
    pub fn parse(value: Option<&Value>, context: &CompilerContext) -> Result<Option<Self>, AppError> {
        let Some(Value::Mapping(map)) = value else {
            return Ok(None);
        };
        let mut outputs = BTreeMap::new();
        let mut jobs = IndexMap::new();

        for key in keys(map) {
            let Some(entry) = map.get(key.as_str()) else { continue };
            match key.as_str() {
                "staged" | "env" | "github-token" | "max-patch-size" => {}
                "jobs" => {
                    if let Value::Mapping(declared) = entry {
                        for name in keys(declared) {
                            let job = declared
                                .get(name.as_str())
                                .map(|job| SafeJobConfig::parse(&name, job))
                                .unwrap_or_default();
                            jobs.insert(name, job);
                        }
                    }
                }
                other => {
                    let Some(kind) = SafeOutputKind::from_key(other) else {
                        return Err(AppError::validation(format!("unknown safe output '{}'", other))
                            .with_code("AW-VAL-100")
                            .with_field(format!("safe-outputs.{}", other)));
                    };
                    if outputs.contains_key(&kind) {
                        return Err(AppError::validation(format!(
                            "safe output '{}' is declared more than once",
                            kind.key()
                        ))
                        .with_code("AW-VAL-101")
                        .with_field(format!("safe-outputs.{}", other)));
                    }
                    if matches!(entry, Value::Bool(false)) {
                        continue;
                    }
                    outputs.insert(kind, SafeOutputEntry::parse(kind, entry, context));
                }
            }
        }

        if outputs.is_empty() && jobs.is_empty() {
            return Ok(None);
        }
        outputs.entry(SafeOutputKind::MissingTool).or_default();

        Ok(Some(SafeOutputsConfig {
            outputs,
            jobs,
            staged: get_bool(map, "staged").unwrap_or(false),
            env: string_map(map.get("env")),
            github_token: get_string(map, "github-token"),
            max_patch_size: map
                .get("max-patch-size")
                .and_then(|size| parse_int_value(size, "safe-outputs.max-patch-size", Some(context)))
                .unwrap_or(DEFAULT_MAX_PATCH_SIZE_KB),
        }))
    }

    pub fn has(&self, kind: SafeOutputKind) -> bool {
        self.outputs.contains_key(&kind)
    }

    pub fn needs_git(&self) -> bool {
        self.outputs.keys().any(SafeOutputKind::needs_git)
    }
}
