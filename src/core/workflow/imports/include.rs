#![allow(clippy::result_large_err)]

use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow::source::parse_source;
use regex::Regex;
use serde_yaml::Mapping;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

/// A body-level `@include`/`@import` directive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeDirective {
    pub path: String,
    pub section: Option<String>,
    pub optional: bool,
}

/// Result of splicing includes into a body.
#[derive(Debug, Default)]
pub struct ExpandedBody {
    pub text: String,
    /// Front matter of every included file, in splice order
    pub front_matters: Vec<Mapping>,
}

static DIRECTIVE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:@(?:include|import)(\?)?\s+(\S+)|\{\{#import(\?)?\s+([^}\s]+)\s*\}\})\s*$")
        .expect("directive regex is valid")
});

static TEMPLATE_OPEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{#if\s[^}]*\}\}").expect("template regex is valid"));

/// Parse one line as an include directive.
pub fn parse_directive(line: &str) -> Option<IncludeDirective> {
    let caps = DIRECTIVE_RE.captures(line)?;
    let (optional, target) = match (caps.get(2), caps.get(4)) {
        (Some(target), _) => (caps.get(1).is_some(), target.as_str()),
        (None, Some(target)) => (caps.get(3).is_some(), target.as_str()),
        _ => return None,
    };
    let (path, section) = match target.split_once('#') {
        Some((path, section)) => (path.to_string(), Some(section.to_string())),
        None => (target.to_string(), None),
    };
    Some(IncludeDirective {
        path,
        section,
        optional,
    })
}

/// Reject include directives that sit inside `{{#if}} ... {{/if}}` regions.
pub fn check_template_regions(body: &str) -> Result<(), AppError> {
    let mut depth: usize = 0;
    let mut in_fence = false;
    let mut violations = Vec::new();
    for line in body.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if depth > 0 {
            if let Some(directive) = parse_directive(line) {
                let target = match &directive.section {
                    Some(section) => format!("{}#{}", directive.path, section),
                    None => directive.path.clone(),
                };
                violations.push(
                    AppError::validation("import directives cannot be used inside template regions")
                        .with_code("AW-VAL-020")
                        .with_value(target)
                        .with_suggestion("move the directive outside the {{#if}} block"),
                );
            }
        }
        depth += TEMPLATE_OPEN_RE.find_iter(line).count();
        depth = depth.saturating_sub(line.matches("{{/if}}").count());
    }
    if violations.is_empty() {
        Ok(())
    } else {
        Err(AppError::batch(ErrorCategory::ValidationError, violations))
    }
}

/// Splice included files into `body`, resolving paths against `base_dir`.
///
/// `stack` holds the files currently being expanded; re-entering one of them
/// is skipped rather than reported.
pub fn expand_includes(
    body: &str,
    base_dir: &Path,
    stack: &mut Vec<PathBuf>,
) -> Result<ExpandedBody, AppError> {
    check_template_regions(body)?;

    let mut out = ExpandedBody::default();
    let mut in_fence = false;
    for line in body.split_inclusive('\n') {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
        }
        let directive = if in_fence { None } else { parse_directive(line) };
        let Some(directive) = directive else {
            out.text.push_str(line);
            continue;
        };

        let path = base_dir.join(&directive.path);
        if !path.is_file() {
            if directive.optional {
                tracing::debug!("optional include {} not found, skipping", path.display());
                continue;
            }
            return Err(AppError::validation(format!("include file not found: {}", path.display()))
                .with_code("AW-VAL-021")
                .with_value(&directive.path));
        }
        let key = path.canonicalize().unwrap_or_else(|_| path.clone());
        if stack.contains(&key) {
            tracing::debug!("include {} already being expanded, skipping", path.display());
            continue;
        }

        let text = std::fs::read_to_string(&path).map_err(|e| {
            AppError::operation(format!("failed to read include {}", path.display()), e)
        })?;
        let included = parse_source(&text, &path)?;
        let content = match &directive.section {
            Some(section) => extract_section(&included.body, section).ok_or_else(|| {
                AppError::validation(format!(
                    "section '{}' not found in {}",
                    section,
                    path.display()
                ))
                .with_code("AW-VAL-022")
            })?,
            None => included.body.clone(),
        };

        stack.push(key);
        let nested_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let nested = expand_includes(&content, &nested_dir, stack)?;
        stack.pop();

        if !included.front_matter.is_empty() {
            out.front_matters.push(included.front_matter);
        }
        out.front_matters.extend(nested.front_matters);
        out.text.push_str(&nested.text);
        if !nested.text.ends_with('\n') {
            out.text.push('\n');
        }
    }
    Ok(out)
}

/// Select a Markdown section by heading text, up to the next heading of the same or higher level.
pub fn extract_section(body: &str, section: &str) -> Option<String> {
    let wanted = section.trim().trim_start_matches('#').trim().to_lowercase();
    let mut collected = String::new();
    let mut level: Option<usize> = None;
    for line in body.split_inclusive('\n') {
        let heading = heading_of(line);
        match (level, heading) {
            (None, Some((depth, title))) if title.to_lowercase() == wanted => {
                level = Some(depth);
                collected.push_str(line);
            }
            (Some(current), Some((depth, _))) if depth <= current => break,
            (Some(_), _) => collected.push_str(line),
            _ => {}
        }
    }
    level.map(|_| collected)
}

fn heading_of(line: &str) -> Option<(usize, String)> {
    let trimmed = line.trim_end();
    let depth = trimmed.chars().take_while(|c| *c == '#').count();
    if depth == 0 || depth > 6 {
        return None;
    }
    let rest = &trimmed[depth..];
    if !rest.starts_with(' ') {
        return None;
    }
    Some((depth, rest.trim().to_string()))
}
