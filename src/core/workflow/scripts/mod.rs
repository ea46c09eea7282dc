#![allow(clippy::result_large_err)]

//! JavaScript helpers shipped with the compiler.
//!
//! Every helper is registered with the runtime it executes in and checked by
//! the guards before it can be bundled. The compiler writes the helpers a
//! workflow needs next to its lock file, and the lock steps `require` them.

pub mod guards;

use crate::core::error::AppError;
use crate::core::workflow::pins;
use crate::core::workflow::steps::Step;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::LazyLock;

pub use guards::{validate_no_exec_sync, validate_no_github_script_globals, ScriptGuardError};

/// Prefix of the dependency keys used while tracing `require` edges.
pub const SOURCE_BASE: &str = "js";

static REQUIRE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"require\(\s*["'](\.{1,2}/[^"']+)["']\s*\)"#).expect("require regex is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeMode {
    /// Runs inside `actions/github-script` with `core`, `exec` and `github` in scope
    GitHubScript,
    /// Runs as a plain `node` process
    NodeJs,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptRecord {
    pub name: String,
    pub body: String,
    pub mode: RuntimeMode,
}

impl ScriptRecord {
    pub fn file_name(&self) -> String {
        format!("{}.cjs", self.name)
    }
}

macro_rules! embedded {
    ($($name:literal => $mode:ident),* $(,)?) => {
        &[$(($name, include_str!(concat!("js/", $name, ".cjs")), RuntimeMode::$mode)),*]
    };
}

const EMBEDDED: &[(&str, &str, RuntimeMode)] = embedded![
    "add_comment" => GitHubScript,
    "add_labels" => GitHubScript,
    "add_reaction" => GitHubScript,
    "add_reviewer" => GitHubScript,
    "assign_milestone" => GitHubScript,
    "check_stop_time" => GitHubScript,
    "check_workflow_timestamp" => GitHubScript,
    "checkout_pr_branch" => GitHubScript,
    "close_discussion" => GitHubScript,
    "close_issue" => GitHubScript,
    "collect_ndjson_output" => GitHubScript,
    "create_discussion" => GitHubScript,
    "create_issue" => GitHubScript,
    "create_pr_review_comment" => GitHubScript,
    "create_pull_request" => GitHubScript,
    "interpolate_prompt" => GitHubScript,
    "load_agent_output" => GitHubScript,
    "missing_tool" => GitHubScript,
    "push_to_pull_request_branch" => GitHubScript,
    "redact_secrets" => GitHubScript,
    "resolve_target" => GitHubScript,
    "staged_preview" => GitHubScript,
    "update_discussion" => GitHubScript,
    "update_issue" => GitHubScript,
    "update_pull_request" => GitHubScript,
    "mcp_server_core" => NodeJs,
    "safe_inputs_mcp_server" => NodeJs,
    "safe_outputs_append" => NodeJs,
    "safe_outputs_config" => NodeJs,
    "safe_outputs_mcp_server" => NodeJs,
];

#[derive(Debug, Default)]
pub struct ScriptRegistry {
    scripts: BTreeMap<String, ScriptRecord>,
}

impl ScriptRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding every helper compiled into the binary.
    pub fn with_embedded() -> Result<Self, AppError> {
        let mut registry = Self::new();
        for (name, body, mode) in EMBEDDED {
            registry.register_with_mode(name, body, *mode)?;
        }
        Ok(registry)
    }

    /// Register `body` under `name` after running the guard for its mode.
    pub fn register_with_mode(&mut self, name: &str, body: &str, mode: RuntimeMode) -> Result<(), AppError> {
        validate_no_exec_sync(name, body, mode)?;
        validate_no_github_script_globals(name, body, mode)?;
        tracing::trace!(script = name, ?mode, "registered helper script");
        self.scripts.insert(
            name.to_string(),
            ScriptRecord {
                name: name.to_string(),
                body: body.to_string(),
                mode,
            },
        );
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&ScriptRecord> {
        self.scripts.get(name)
    }

    pub fn len(&self) -> usize {
        self.scripts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Bodies keyed as `js/<name>.cjs`, the shape the dependency tracer walks.
    pub fn sources(&self) -> BTreeMap<String, String> {
        self.scripts
            .values()
            .map(|record| (format!("{}/{}", SOURCE_BASE, record.file_name()), record.body.clone()))
            .collect()
    }

    /// The named helpers plus everything they transitively require, by name.
    pub fn bundle<'a, I>(&self, roots: I) -> Result<Vec<&ScriptRecord>, AppError>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let sources = self.sources();
        let mut names = BTreeSet::new();
        for root in roots {
            let record = self.get(root).ok_or_else(|| {
                AppError::compiler_bug(format!("helper script '{}' is not registered", root)).with_code("AW-BUG-031")
            })?;
            names.insert(record.name.clone());
            for dependency in find_javascript_dependencies(&record.body, &sources, SOURCE_BASE)? {
                names.insert(script_name(&dependency));
            }
        }
        names
            .iter()
            .map(|name| {
                self.get(name).ok_or_else(|| {
                    AppError::compiler_bug(format!("helper script '{}' is not registered", name)).with_code("AW-BUG-031")
                })
            })
            .collect()
    }
}

fn script_name(key: &str) -> String {
    let file = key.rsplit('/').next().unwrap_or(key);
    file.trim_end_matches(".cjs").to_string()
}

/// Every source key `main_content` transitively requires through relative
/// `require("./x.cjs")` calls, resolved against `base_path`.
///
/// Cycles terminate; a required file missing from `sources` is an error.
pub fn find_javascript_dependencies(
    main_content: &str,
    sources: &BTreeMap<String, String>,
    base_path: &str,
) -> Result<BTreeSet<String>, AppError> {
    let mut found = BTreeSet::new();
    let mut pending: Vec<(String, String)> = requires(main_content)
        .into_iter()
        .map(|path| (base_path.to_string(), path))
        .collect();

    while let Some((dir, relative)) = pending.pop() {
        let key = join_relative(&dir, &relative);
        if found.contains(&key) {
            continue;
        }
        let content = sources.get(&key).ok_or_else(|| {
            AppError::compiler_bug(format!("required file not found in sources: {}", key))
                .with_code("AW-BUG-032")
                .with_value(&relative)
        })?;
        let key_dir = key.rsplit_once('/').map(|(d, _)| d.to_string()).unwrap_or_default();
        pending.extend(requires(content).into_iter().map(|path| (key_dir.clone(), path)));
        found.insert(key);
    }
    Ok(found)
}

fn requires(content: &str) -> Vec<String> {
    REQUIRE_RE
        .captures_iter(content)
        .filter_map(|caps| caps.get(1).map(|m| m.as_str().to_string()))
        .collect()
}

fn join_relative(dir: &str, relative: &str) -> String {
    let mut parts: Vec<&str> = dir.split('/').filter(|p| !p.is_empty()).collect();
    for segment in relative.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            other => parts.push(other),
        }
    }
    parts.join("/")
}

/// Body of a github-script step that loads a helper from the checked-out
/// auxiliary directory and runs its `main`.
pub fn github_script_body(aux_rel: &str, name: &str) -> String {
    format!(
        "global.core = core;\nglobal.github = github;\nglobal.context = context;\nglobal.exec = exec;\nconst {{ main }} = require('./{}/{}.cjs');\nawait main();\n",
        aux_rel.trim_end_matches('/'),
        name
    )
}

/// An `actions/github-script` step that runs helper `name`.
pub fn github_script_step(display_name: &str, aux_rel: &str, name: &str) -> Result<Step, AppError> {
    Ok(Step::uses(display_name, pins::pinned("actions/github-script", "v8")?)
        .input("script", github_script_body(aux_rel, name)))
}
