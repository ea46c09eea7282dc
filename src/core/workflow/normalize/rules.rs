use super::FrontMatterTransform;
use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::workflow::values::{
    comma_or_list, parse_int_value, parse_reaction_value, push_unique, scalar_to_string,
};
use serde_yaml::{Mapping, Value};

/// Commands every bash allow-list starts from.
pub const DEFAULT_BASH_COMMANDS: &[&str] = &[
    "echo", "ls", "pwd", "cat", "head", "tail", "grep", "wc", "sort", "uniq", "date", "yq",
];

/// Commands added when a safe output has to commit changes.
pub const GIT_BASH_COMMANDS: &[&str] = &[
    "git checkout:*",
    "git branch:*",
    "git switch:*",
    "git add:*",
    "git rm:*",
    "git commit:*",
    "git merge:*",
    "git status",
];

/// Toolsets `default` and `action-friendly` expand to.
pub const DEFAULT_TOOLSETS: &[&str] = &["context", "repos", "issues", "pull_requests"];

const GIT_SAFE_OUTPUTS: &[&str] = &[
    "create-pull-request",
    "create-pull-requests",
    "push-to-pull-request-branch",
];

fn tools_mut(front_matter: &mut Mapping) -> Option<&mut Mapping> {
    front_matter.get_mut("tools").and_then(Value::as_mapping_mut)
}

/// `engine: copilot` becomes `engine: { id: copilot }`; version is canonicalized.
pub struct EngineShorthandTransform;

impl FrontMatterTransform for EngineShorthandTransform {
    fn name(&self) -> &'static str {
        "engine-shorthand"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        if let Some(Value::String(id)) = front_matter.get("engine") {
            let mut engine = Mapping::new();
            engine.insert(Value::from("id"), Value::from(id.clone()));
            front_matter.insert(Value::from("engine"), Value::Mapping(engine));
        }
        if let Some(Value::Mapping(engine)) = front_matter.get_mut("engine") {
            canonicalize_string_field(engine, "version");
        }
        Ok(front_matter)
    }
}

fn canonicalize_string_field(map: &mut Mapping, key: &str) {
    let canonical = match map.get(key) {
        Some(value @ (Value::Number(_) | Value::Bool(_))) => scalar_to_string(value),
        _ => None,
    };
    if let Some(canonical) = canonical {
        map.insert(Value::from(key), Value::from(canonical));
    }
}

fn canonicalize_int_field(map: &mut Mapping, key: &str, field: &str, context: &CompilerContext) {
    let canonical = match map.get(key) {
        Some(value @ Value::Number(n)) if n.is_f64() => parse_int_value(value, field, Some(context)),
        _ => None,
    };
    if let Some(canonical) = canonical {
        map.insert(Value::from(key), Value::from(canonical));
    }
}

/// Integers that arrive as floats, and versions that arrive as numbers.
pub struct ScalarCanonicalTransform;

impl FrontMatterTransform for ScalarCanonicalTransform {
    fn name(&self) -> &'static str {
        "scalar-canonical"
    }

    fn transform(&self, mut front_matter: Mapping, context: &CompilerContext) -> Result<Mapping, AppError> {
        canonicalize_int_field(&mut front_matter, "timeout-minutes", "timeout-minutes", context);

        if let Some(Value::Mapping(runtimes)) = front_matter.get_mut("runtimes") {
            for (_, runtime) in runtimes.iter_mut() {
                if let Value::Mapping(runtime) = runtime {
                    canonicalize_string_field(runtime, "version");
                    canonicalize_string_field(runtime, "action-version");
                }
            }
        }

        if let Some(Value::Mapping(inputs)) = front_matter.get_mut("safe-inputs") {
            for (name, tool) in inputs.iter_mut() {
                if let Value::Mapping(tool) = tool {
                    let field = format!("safe-inputs.{}.timeout", scalar_to_string(name).unwrap_or_default());
                    canonicalize_int_field(tool, "timeout", &field, context);
                }
            }
        }

        if let Some(Value::Mapping(tools)) = front_matter.get_mut("tools") {
            if let Some(Value::Mapping(github)) = tools.get_mut("github") {
                canonicalize_string_field(github, "version");
            }
        }
        Ok(front_matter)
    }
}

/// A bare concurrency group string becomes `{ group: <string> }`.
pub struct ConcurrencyTransform;

impl FrontMatterTransform for ConcurrencyTransform {
    fn name(&self) -> &'static str {
        "concurrency"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        if let Some(Value::String(group)) = front_matter.get("concurrency") {
            let mut concurrency = Mapping::new();
            concurrency.insert(Value::from("group"), Value::from(group.clone()));
            front_matter.insert(Value::from("concurrency"), Value::Mapping(concurrency));
        }
        Ok(front_matter)
    }
}

/// `network: defaults` becomes `network: { allowed: [defaults] }`.
pub struct NetworkShorthandTransform;

impl FrontMatterTransform for NetworkShorthandTransform {
    fn name(&self) -> &'static str {
        "network-shorthand"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        if let Some(Value::String(shorthand)) = front_matter.get("network") {
            let mut network = Mapping::new();
            network.insert(
                Value::from("allowed"),
                Value::Sequence(vec![Value::from(shorthand.clone())]),
            );
            front_matter.insert(Value::from("network"), Value::Mapping(network));
        }
        Ok(front_matter)
    }
}

/// Numeric reactions become their `+1`/`-1` strings.
pub struct ReactionTransform;

impl FrontMatterTransform for ReactionTransform {
    fn name(&self) -> &'static str {
        "reaction"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        if let Some(Value::Mapping(on)) = front_matter.get_mut("on") {
            if let Some(reaction) = on.get("reaction") {
                let canonical = parse_reaction_value(reaction)?;
                on.insert(Value::from("reaction"), Value::from(canonical));
            }
        }
        Ok(front_matter)
    }
}

/// Expand toolset aliases, preserving first-occurrence order.
pub fn expand_toolsets(toolsets: &[String]) -> Vec<String> {
    let mut out = Vec::new();
    for toolset in toolsets {
        match toolset.as_str() {
            "default" | "action-friendly" => {
                push_unique(&mut out, DEFAULT_TOOLSETS.iter().map(|t| t.to_string()))
            }
            other => push_unique(&mut out, [other.to_string()]),
        }
    }
    out
}

/// `tools.github.toolsets` (or `toolset`) becomes an expanded list.
pub struct GitHubToolsetTransform;

impl FrontMatterTransform for GitHubToolsetTransform {
    fn name(&self) -> &'static str {
        "github-toolsets"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        let Some(Value::Mapping(github)) = tools_mut(&mut front_matter).and_then(|tools| tools.get_mut("github")) else {
            return Ok(front_matter);
        };
        if let Some(singular) = github.remove("toolset") {
            if !github.contains_key("toolsets") {
                github.insert(Value::from("toolsets"), singular);
            }
        }
        if let Some(raw) = github.get("toolsets") {
            if matches!(raw, Value::String(_) | Value::Sequence(_)) {
                let expanded = expand_toolsets(&comma_or_list(raw));
                github.insert(
                    Value::from("toolsets"),
                    Value::Sequence(expanded.into_iter().map(Value::from).collect()),
                );
            }
        }
        Ok(front_matter)
    }
}

/// Merge a bash tool value with the default allow-list.
///
/// Returns `None` when bash is disabled.
pub fn expand_bash_tools(value: Option<&Value>, needs_git: bool) -> Option<Value> {
    let with_defaults = |custom: &[String]| {
        let mut commands: Vec<String> = DEFAULT_BASH_COMMANDS.iter().map(|c| c.to_string()).collect();
        push_unique(&mut commands, custom.iter().cloned());
        if needs_git {
            push_unique(&mut commands, GIT_BASH_COMMANDS.iter().map(|c| c.to_string()));
        }
        Value::Sequence(commands.into_iter().map(Value::from).collect())
    };
    match value {
        Some(Value::Bool(false)) => None,
        Some(Value::Bool(true)) => Some(Value::Sequence(vec![Value::from("*")])),
        Some(Value::Sequence(items)) if items.is_empty() => Some(Value::Sequence(vec![])),
        Some(Value::Sequence(items)) => {
            let custom: Vec<String> = items.iter().filter_map(scalar_to_string).collect();
            if custom.iter().any(|c| c == "*" || c == ":*") {
                Some(Value::Sequence(vec![Value::from("*")]))
            } else {
                Some(with_defaults(&custom))
            }
        }
        Some(Value::Null) => Some(with_defaults(&[])),
        None if needs_git => Some(with_defaults(&[])),
        None => None,
        Some(other) => Some(other.clone()),
    }
}

/// Expand `tools.bash` into its effective allow-list.
pub struct BashToolTransform;

impl FrontMatterTransform for BashToolTransform {
    fn name(&self) -> &'static str {
        "bash-tool"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        let needs_git = front_matter
            .get("safe-outputs")
            .and_then(Value::as_mapping)
            .is_some_and(|outputs| GIT_SAFE_OUTPUTS.iter().any(|key| outputs.contains_key(*key)));

        let current = front_matter
            .get("tools")
            .and_then(Value::as_mapping)
            .and_then(|tools| tools.get("bash"))
            .cloned();
        let has_tools = front_matter.get("tools").is_some_and(Value::is_mapping);
        if current.is_none() && !(needs_git && has_tools) {
            return Ok(front_matter);
        }

        let expanded = expand_bash_tools(current.as_ref(), needs_git);
        if let Some(tools) = tools_mut(&mut front_matter) {
            match expanded {
                Some(value) => {
                    tools.insert(Value::from("bash"), value);
                }
                None => {
                    tools.remove("bash");
                }
            }
        }
        Ok(front_matter)
    }
}

/// `tools.cache-memory` becomes a list of named caches with unique ids.
pub struct CacheMemoryTransform;

impl FrontMatterTransform for CacheMemoryTransform {
    fn name(&self) -> &'static str {
        "cache-memory"
    }

    fn transform(&self, mut front_matter: Mapping, _context: &CompilerContext) -> Result<Mapping, AppError> {
        let Some(tools) = tools_mut(&mut front_matter) else {
            return Ok(front_matter);
        };
        let Some(raw) = tools.get("cache-memory").cloned() else {
            return Ok(front_matter);
        };

        let entries: Vec<Mapping> = match raw {
            Value::Bool(false) => {
                tools.remove("cache-memory");
                return Ok(front_matter);
            }
            Value::Null | Value::Bool(true) => vec![Mapping::new()],
            Value::Mapping(map) => vec![map],
            Value::Sequence(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::Mapping(map) => Ok(map),
                    _ => Err(AppError::validation("cache-memory list entries must be objects")
                        .with_code("AW-VAL-050")
                        .with_field("tools.cache-memory")),
                })
                .collect::<Result<_, _>>()?,
            // Anything else is left for schema validation to report.
            _ => return Ok(front_matter),
        };

        let mut seen: Vec<String> = Vec::new();
        let mut caches = Vec::with_capacity(entries.len());
        for mut entry in entries {
            let id = entry
                .get("id")
                .and_then(scalar_to_string)
                .unwrap_or_else(|| "default".to_string());
            if seen.contains(&id) {
                return Err(AppError::validation(format!("duplicate cache-memory id '{}'", id))
                    .with_code("AW-VAL-051")
                    .with_field("tools.cache-memory")
                    .with_suggestion("give every cache-memory entry a unique id"));
            }
            seen.push(id.clone());
            entry.insert(Value::from("id"), Value::from(id));
            caches.push(Value::Mapping(entry));
        }
        tools.insert(Value::from("cache-memory"), Value::Sequence(caches));
        Ok(front_matter)
    }
}
