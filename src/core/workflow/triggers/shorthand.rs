//! Natural-language trigger forms such as `pull_request opened affecting src/**`.

use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};

/// Event names accepted verbatim under `on:`.
pub const KNOWN_EVENTS: &[&str] = &[
    "push",
    "pull_request",
    "pull_request_target",
    "pull_request_review",
    "pull_request_review_comment",
    "issues",
    "issue_comment",
    "discussion",
    "discussion_comment",
    "schedule",
    "workflow_dispatch",
    "workflow_run",
    "workflow_call",
    "repository_dispatch",
    "release",
    "watch",
    "fork",
    "create",
    "delete",
    "label",
    "milestone",
    "check_run",
    "check_suite",
    "status",
    "deployment",
    "deployment_status",
    "merge_group",
    "page_build",
    "public",
    "registry_package",
    "code_scanning_alert",
    "branch_protection_rule",
    "gollum",
    "project",
    "project_card",
    "project_column",
];

const PULL_REQUEST_TYPES: &[&str] = &["opened", "synchronize", "reopened", "labeled", "closed", "edited"];
const ISSUE_TYPES: &[&str] = &["opened", "edited", "closed", "reopened", "assigned", "unassigned", "labeled"];
const DISCUSSION_TYPES: &[&str] = &["created", "edited", "answered", "unanswered", "deleted"];
const RELEASE_TYPES: &[&str] = &["published", "prereleased", "created"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TriggerParseError {
    #[error("empty trigger shorthand")]
    Empty,
    #[error("unrecognized trigger '{0}'")]
    Unrecognized(String),
    #[error("trigger '{form}' is missing its {argument}")]
    MissingArgument { form: String, argument: &'static str },
    #[error("unsupported {event} activity '{activity}' in trigger '{form}'")]
    UnsupportedActivity {
        event: &'static str,
        activity: String,
        form: String,
    },
}

/// Typed result of lowering one shorthand.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerIR {
    pub event: String,
    pub types: Vec<String>,
    /// `branches`, `tags`, `paths` or `workflows` filters, in insertion order
    pub filters: IndexMap<String, Vec<String>>,
    /// Extra keys emitted under the event, e.g. `inputs`
    pub extra: Mapping,
    /// Expressions the activation job must AND into its `if:`
    pub conditions: Vec<String>,
}

impl TriggerIR {
    fn new(event: &str) -> Self {
        Self {
            event: event.to_string(),
            ..Self::default()
        }
    }

    fn with_types(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| t.to_string()).collect();
        self
    }

    fn with_filter(mut self, key: &str, value: &str) -> Self {
        self.filters.entry(key.to_string()).or_default().push(value.to_string());
        self
    }

    fn with_condition(mut self, condition: String) -> Self {
        self.conditions.push(condition);
        self
    }

    /// The `on:` map for this trigger; an event without settings renders as `{}`.
    pub fn to_yaml_map(&self) -> Mapping {
        let mut body = Mapping::new();
        if !self.types.is_empty() {
            body.insert(Value::from("types"), string_seq(&self.types));
        }
        for (key, values) in &self.filters {
            body.insert(Value::from(key.as_str()), string_seq(values));
        }
        for (key, value) in &self.extra {
            body.insert(key.clone(), value.clone());
        }
        let mut on = Mapping::new();
        on.insert(Value::from(self.event.as_str()), Value::Mapping(body));
        on
    }
}

fn string_seq(values: &[String]) -> Value {
    Value::Sequence(values.iter().map(|v| Value::from(v.as_str())).collect())
}

pub fn is_known_event(name: &str) -> bool {
    KNOWN_EVENTS.contains(&name)
}

fn activity<'a>(
    event: &'static str,
    allowed: &[&str],
    word: &'a str,
    form: &str,
) -> Result<&'a str, TriggerParseError> {
    if allowed.contains(&word) {
        Ok(word)
    } else {
        Err(TriggerParseError::UnsupportedActivity {
            event,
            activity: word.to_string(),
            form: form.to_string(),
        })
    }
}

fn required<'a>(word: Option<&'a str>, form: &str, argument: &'static str) -> Result<&'a str, TriggerParseError> {
    word.ok_or_else(|| TriggerParseError::MissingArgument {
        form: form.to_string(),
        argument,
    })
}

/// Lower a shorthand string.
///
/// Returns `Ok(None)` for a bare known event name, which is emitted unchanged.
pub fn parse_trigger_shorthand(input: &str) -> Result<Option<TriggerIR>, TriggerParseError> {
    let form = input.trim();
    if form.is_empty() {
        return Err(TriggerParseError::Empty);
    }
    if is_known_event(form) {
        return Ok(None);
    }

    let words: Vec<&str> = form.split_whitespace().collect();
    let lowered: Vec<String> = words.iter().map(|w| w.to_lowercase()).collect();
    let lower: Vec<&str> = lowered.iter().map(String::as_str).collect();

    let ir = match lower.as_slice() {
        ["manual"] => TriggerIR::new("workflow_dispatch"),
        ["manual", "with", "input", ..] => {
            let name = required(words.get(3).copied(), form, "input name")?;
            let mut input = Mapping::new();
            input.insert(Value::from("description"), Value::from(name));
            input.insert(Value::from("required"), Value::from(false));
            input.insert(Value::from("type"), Value::from("string"));
            let mut inputs = Mapping::new();
            inputs.insert(Value::from(name), Value::Mapping(input));
            let mut ir = TriggerIR::new("workflow_dispatch");
            ir.extra.insert(Value::from("inputs"), Value::Mapping(inputs));
            ir
        }
        ["push", "to", ..] => {
            TriggerIR::new("push").with_filter("branches", required(words.get(2).copied(), form, "branch")?)
        }
        ["push", "tags", ..] => {
            TriggerIR::new("push").with_filter("tags", required(words.get(2).copied(), form, "tag pattern")?)
        }
        ["dependabot", "pull", "request"] | ["dependabot", "pull_request"] => TriggerIR::new("pull_request")
            .with_types(&["opened", "synchronize", "reopened"])
            .with_condition("github.actor == 'dependabot[bot]'".to_string()),
        ["pull", "request", rest @ ..] | ["pull_request", rest @ ..] => {
            let offset = words.len() - rest.len();
            pull_request_form(rest, &words[offset..], form)?
        }
        ["issue", rest @ ..] | ["issues", rest @ ..] => {
            let offset = words.len() - rest.len();
            issue_form(rest, &words[offset..], form)?
        }
        ["discussion", kind] => {
            TriggerIR::new("discussion").with_types(&[activity("discussion", DISCUSSION_TYPES, kind, form)?])
        }
        ["comment", "created"] => TriggerIR::new("issue_comment").with_types(&["created"]),
        ["release", kind] => TriggerIR::new("release").with_types(&[activity("release", RELEASE_TYPES, kind, form)?]),
        ["repository", "starred"] => TriggerIR::new("watch").with_types(&["started"]),
        ["repository", "forked"] => TriggerIR::new("fork"),
        ["workflow", "completed", ..] => {
            let name = required(
                (words.len() > 2).then(|| form.splitn(3, char::is_whitespace).nth(2)).flatten().map(str::trim),
                form,
                "workflow name",
            )?;
            TriggerIR::new("workflow_run")
                .with_types(&["completed"])
                .with_filter("workflows", name)
        }
        ["api", "dispatch", ..] => {
            let event_type = required(words.get(2).copied(), form, "event type")?;
            TriggerIR::new("repository_dispatch").with_types(&[event_type])
        }
        ["security", "alert"] | ["code", "scanning", "alert"] => {
            TriggerIR::new("code_scanning_alert").with_types(&["created", "reopened", "fixed"])
        }
        _ => return Err(TriggerParseError::Unrecognized(form.to_string())),
    };
    Ok(Some(ir))
}

fn pull_request_form(lower: &[&str], words: &[&str], form: &str) -> Result<TriggerIR, TriggerParseError> {
    let mut ir = TriggerIR::new("pull_request");
    let mut index = 0;
    if let Some(kind) = lower.first().filter(|word| **word != "affecting") {
        if *kind == "merged" {
            ir = ir
                .with_types(&["closed"])
                .with_condition("github.event.pull_request.merged == true".to_string());
        } else {
            ir = ir.with_types(&[activity("pull_request", PULL_REQUEST_TYPES, kind, form)?]);
        }
        index = 1;
    }
    match lower.get(index) {
        Some(&"affecting") => {
            let glob = required(words.get(index + 1).copied(), form, "path glob")?;
            Ok(ir.with_filter("paths", glob))
        }
        Some(_) => Err(TriggerParseError::Unrecognized(form.to_string())),
        None => Ok(ir),
    }
}

fn issue_form(lower: &[&str], words: &[&str], form: &str) -> Result<TriggerIR, TriggerParseError> {
    let kind = required(lower.first().copied(), form, "activity")?;
    let kind = activity("issues", ISSUE_TYPES, kind, form)?;
    let ir = TriggerIR::new("issues").with_types(&[kind]);
    match lower {
        ["labeled", _] => {
            let label = words[1];
            Ok(ir.with_condition(format!("github.event.label.name == '{}'", label)))
        }
        [_, "labeled", _] => {
            let label = words[2];
            Ok(ir.with_condition(format!("contains(github.event.issue.labels.*.name, '{}')", label)))
        }
        [_] => Ok(ir),
        _ => Err(TriggerParseError::Unrecognized(form.to_string())),
    }
}
