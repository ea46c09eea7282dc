#![allow(clippy::result_large_err)]

//! Deterministic text rendering of the lock file.

pub mod header;

use crate::core::error::AppError;
use crate::core::workflow::jobs::Job;
use crate::core::workflow::steps::{Step, StepEntry};
use indexmap::IndexMap;
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

pub use header::{frontmatter_hash, render_header, LockHeader};

/// Longest `if:` expression kept on one line.
pub const MAX_INLINE_IF: usize = 120;
const FOLD_WIDTH: usize = 100;

static QUOTED_USES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(\s*(?:- )?uses: )(["'])(.+ # .+)(["'])\s*$"#).expect("quoted uses regex is valid")
});

/// Whether `text` can be written as a plain YAML scalar and read back unchanged.
fn is_plain_safe(text: &str) -> bool {
    if text.is_empty() || text != text.trim() {
        return false;
    }
    if text.chars().any(|c| c.is_control()) {
        return false;
    }
    if let Some(first) = text.chars().next() {
        if "-?:,[]{}#&*!|>'\"%@`".contains(first) {
            return false;
        }
    }
    if text.contains(": ") || text.contains(" #") || text.ends_with(':') {
        return false;
    }
    let lower = text.to_ascii_lowercase();
    if matches!(
        lower.as_str(),
        "true" | "false" | "yes" | "no" | "on" | "off" | "null" | "~" | "y" | "n" | ".inf" | ".nan"
    ) {
        return false;
    }
    if text.parse::<f64>().is_ok() || lower.starts_with("0x") || lower.starts_with("0o") {
        return false;
    }
    true
}

/// Single-line scalar, quoted only when needed.
pub fn yaml_scalar(text: &str) -> String {
    if is_plain_safe(text) {
        text.to_string()
    } else {
        serde_json::to_string(text).unwrap_or_else(|_| format!("\"{}\"", text.escape_default()))
    }
}

/// `key: value` lines; multi-line text becomes a literal block.
pub fn render_text(key: &str, text: &str, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    if !text.contains('\n') {
        return vec![format!("{}{}: {}", pad, key, yaml_scalar(text))];
    }
    let chomp = if text.ends_with('\n') { "|" } else { "|-" };
    let mut lines = vec![format!("{}{}: {}", pad, key, chomp)];
    for line in text.trim_end_matches('\n').lines() {
        if line.is_empty() {
            lines.push(String::new());
        } else {
            lines.push(format!("{}  {}", pad, line));
        }
    }
    lines
}

/// `if:` line, folded when the expression is long.
pub fn render_if(expression: &str, indent: usize) -> Vec<String> {
    let expression = expression.trim();
    if expression.is_empty() {
        return vec![];
    }
    let pad = " ".repeat(indent);
    if expression.chars().count() <= MAX_INLINE_IF {
        return vec![format!("{}if: {}", pad, yaml_scalar(expression))];
    }
    let mut lines = vec![format!("{}if: >", pad)];
    let mut current = String::new();
    for word in expression.split(' ') {
        let breakable = !word.is_empty() && !current.is_empty() && !current.ends_with(' ');
        if breakable && current.len() + 1 + word.len() > FOLD_WIDTH {
            lines.push(format!("{}  {}", pad, current));
            current = word.to_string();
        } else if current.is_empty() {
            current = word.to_string();
        } else {
            current.push(' ');
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(format!("{}  {}", pad, current));
    }
    lines
}

/// Drop the quotes the YAML serializer puts around pinned `uses:` values.
pub fn unquote_uses_with_comments(text: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    for line in text.split('\n') {
        match QUOTED_USES.captures(line) {
            Some(caps) if caps[2] == caps[4] => out.push(format!("{}{}", &caps[1], &caps[3])),
            _ => out.push(line.to_string()),
        }
    }
    out.join("\n")
}

/// `key:` followed by a YAML value, inline when it is a scalar.
pub fn render_value(key: &str, value: &Value, indent: usize) -> Result<Vec<String>, AppError> {
    let pad = " ".repeat(indent);
    match value {
        Value::String(text) => Ok(render_text(key, text, indent)),
        Value::Mapping(map) if map.is_empty() => Ok(vec![format!("{}{}: {{}}", pad, key)]),
        Value::Sequence(items) if items.is_empty() => Ok(vec![format!("{}{}: []", pad, key)]),
        Value::Mapping(_) | Value::Sequence(_) | Value::Tagged(_) => {
            let body = serde_yaml::to_string(value).map_err(|e| {
                AppError::operation(format!("failed to render '{}'", key), e).with_code("AW-OPS-040")
            })?;
            let mut lines = vec![format!("{}{}:", pad, key)];
            lines.extend(indent_block(&body, indent + 2));
            Ok(lines)
        }
        scalar => {
            let text = serde_yaml::to_string(scalar).map_err(|e| {
                AppError::operation(format!("failed to render '{}'", key), e).with_code("AW-OPS-040")
            })?;
            Ok(vec![format!("{}{}: {}", pad, key, text.trim_end())])
        }
    }
}

fn indent_block(body: &str, indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    body.trim_end_matches('\n')
        .split('\n')
        .map(|line| if line.is_empty() { String::new() } else { format!("{}{}", pad, line) })
        .collect()
}

fn render_map(key: &str, entries: &IndexMap<String, String>, indent: usize) -> Vec<String> {
    if entries.is_empty() {
        return vec![];
    }
    let mut lines = vec![format!("{}{}:", " ".repeat(indent), key)];
    for (name, value) in entries {
        lines.extend(render_text(name, value, indent + 2));
    }
    lines
}

fn render_built_step(step: &Step, indent: usize) -> Vec<String> {
    let inner = indent + 2;
    let pad = " ".repeat(inner);
    let mut lines = Vec::new();
    if let Some(name) = &step.name {
        lines.push(format!("{}name: {}", pad, yaml_scalar(name)));
    }
    if let Some(id) = &step.id {
        lines.push(format!("{}id: {}", pad, yaml_scalar(id)));
    }
    if let Some(condition) = &step.if_condition {
        lines.extend(render_if(condition, inner));
    }
    if step.continue_on_error {
        lines.push(format!("{}continue-on-error: true", pad));
    }
    if let Some(minutes) = step.timeout_minutes {
        lines.push(format!("{}timeout-minutes: {}", pad, minutes));
    }
    if let Some(uses) = &step.uses {
        lines.push(format!("{}uses: {}", pad, uses));
    }
    lines.extend(render_map("env", &step.env, inner));
    if let Some(dir) = &step.working_directory {
        lines.push(format!("{}working-directory: {}", pad, yaml_scalar(dir)));
    }
    if let Some(shell) = &step.shell {
        lines.push(format!("{}shell: {}", pad, yaml_scalar(shell)));
    }
    if let Some(run) = &step.run {
        lines.extend(render_text("run", run, inner));
    }
    lines.extend(render_map("with", &step.with, inner));
    mark_list_item(&mut lines, indent);
    lines
}

fn mark_list_item(lines: &mut [String], indent: usize) {
    if let Some(first) = lines.first_mut() {
        let content = first.trim_start().to_string();
        *first = format!("{}- {}", " ".repeat(indent), content);
    }
}

/// One entry of `steps:`.
pub fn render_step(step: &StepEntry, indent: usize) -> Result<Vec<String>, AppError> {
    match step {
        StepEntry::Built(step) => Ok(render_built_step(step, indent)),
        StepEntry::Raw(value) => {
            let body = serde_yaml::to_string(&Value::Sequence(vec![value.clone()])).map_err(|e| {
                AppError::operation("failed to render workflow step", e).with_code("AW-OPS-041")
            })?;
            Ok(indent_block(&body, indent))
        }
    }
}

fn render_needs(needs: &[String], indent: usize) -> Vec<String> {
    let pad = " ".repeat(indent);
    match needs {
        [] => vec![],
        [single] => vec![format!("{}needs: {}", pad, single)],
        many => {
            let mut lines = vec![format!("{}needs:", pad)];
            lines.extend(many.iter().map(|need| format!("{}  - {}", pad, need)));
            lines
        }
    }
}

/// A job block under `jobs:`.
pub fn render_job(job: &Job) -> Result<Vec<String>, AppError> {
    let mut lines = vec![format!("  {}:", job.id)];
    let inner = 4;
    if let Some(name) = &job.display_name {
        lines.push(format!("    name: {}", yaml_scalar(name)));
    }
    lines.extend(render_needs(&job.needs, inner));
    if let Some(condition) = &job.if_condition {
        lines.extend(render_if(condition, inner));
    }
    lines.extend(render_value("runs-on", &job.runs_on, inner)?);
    if let Some(environment) = &job.environment {
        lines.extend(render_value("environment", environment, inner)?);
    }
    lines.extend(job.permissions.render(inner));
    if let Some(concurrency) = &job.concurrency {
        lines.extend(render_value("concurrency", concurrency, inner)?);
    }
    if let Some(container) = &job.container {
        lines.extend(render_value("container", container, inner)?);
    }
    if let Some(services) = &job.services {
        lines.extend(render_value("services", services, inner)?);
    }
    lines.extend(render_map("env", &job.env, inner));
    lines.extend(render_map("outputs", &job.outputs, inner));
    if let Some(minutes) = job.timeout_minutes {
        lines.push(format!("    timeout-minutes: {}", minutes));
    }
    lines.push("    steps:".to_string());
    for step in &job.steps {
        lines.extend(render_step(step, 6)?);
    }
    Ok(lines)
}

/// Top-level sections of a lock file other than `jobs`.
#[derive(Debug, Clone)]
pub struct LockDocument<'a> {
    pub header: LockHeader,
    pub name: &'a str,
    pub on: &'a Value,
    pub concurrency: Option<Value>,
    pub env: &'a IndexMap<String, String>,
    pub jobs: Vec<&'a Job>,
}

/// Render the full lock file text.
pub fn render_workflow(document: &LockDocument<'_>) -> Result<String, AppError> {
    let mut lines = render_header(&document.header);
    lines.push(format!("name: {}", yaml_scalar(document.name)));
    lines.extend(render_value("\"on\"", document.on, 0)?);
    lines.push(String::new());
    lines.push("permissions: {}".to_string());
    lines.push(String::new());
    if let Some(concurrency) = &document.concurrency {
        lines.extend(render_value("concurrency", concurrency, 0)?);
        lines.push(String::new());
    }
    lines.push(format!("run-name: {}", yaml_scalar(document.name)));
    lines.push(String::new());
    if !document.env.is_empty() {
        lines.extend(render_map("env", document.env, 0));
        lines.push(String::new());
    }
    lines.push("jobs:".to_string());
    for (index, job) in document.jobs.iter().enumerate() {
        if index > 0 {
            lines.push(String::new());
        }
        lines.extend(render_job(job)?);
    }
    let mut text = unquote_uses_with_comments(&lines.join("\n"));
    text.push('\n');
    Ok(text)
}
