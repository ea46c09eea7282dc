#![allow(clippy::result_large_err)]

//! Language runtimes the agent job sets up before running user steps.

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::workflow::model::WorkflowModel;
use crate::core::workflow::pins;
use crate::core::workflow::steps::{Step, StepEntry};
use crate::core::workflow::values::scalar_to_string;
use serde_yaml::{Mapping, Value};
use std::collections::BTreeMap;

struct RuntimeSpec {
    id: &'static str,
    name: &'static str,
    action_repo: &'static str,
    action_version: &'static str,
    version_field: &'static str,
    default_version: &'static str,
    commands: &'static [&'static str],
    extra_inputs: &'static [(&'static str, &'static str)],
}

const CATALOGUE: &[RuntimeSpec] = &[
    RuntimeSpec {
        id: "node",
        name: "Node.js",
        action_repo: "actions/setup-node",
        action_version: "v6",
        version_field: "node-version",
        default_version: "24",
        commands: &["node", "npm", "npx", "yarn", "pnpm"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "python",
        name: "Python",
        action_repo: "actions/setup-python",
        action_version: "v6",
        version_field: "python-version",
        default_version: "3.12",
        commands: &["python", "python3", "pip", "pip3"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "uv",
        name: "uv",
        action_repo: "astral-sh/setup-uv",
        action_version: "v5",
        version_field: "version",
        default_version: "",
        commands: &["uv", "uvx"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "go",
        name: "Go",
        action_repo: "actions/setup-go",
        action_version: "v6",
        version_field: "go-version",
        default_version: "1.25",
        commands: &["go"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "ruby",
        name: "Ruby",
        action_repo: "ruby/setup-ruby",
        action_version: "v1",
        version_field: "ruby-version",
        default_version: "3.3",
        commands: &["ruby", "gem", "bundle"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "bun",
        name: "Bun",
        action_repo: "oven-sh/setup-bun",
        action_version: "v2",
        version_field: "bun-version",
        default_version: "latest",
        commands: &["bun", "bunx"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "deno",
        name: "Deno",
        action_repo: "denoland/setup-deno",
        action_version: "v2",
        version_field: "deno-version",
        default_version: "v2.x",
        commands: &["deno"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "dotnet",
        name: ".NET",
        action_repo: "actions/setup-dotnet",
        action_version: "v4",
        version_field: "dotnet-version",
        default_version: "8.0",
        commands: &["dotnet"],
        extra_inputs: &[],
    },
    RuntimeSpec {
        id: "java",
        name: "Java",
        action_repo: "actions/setup-java",
        action_version: "v4",
        version_field: "java-version",
        default_version: "21",
        commands: &["java", "javac", "mvn", "gradle"],
        extra_inputs: &[("distribution", "temurin")],
    },
    RuntimeSpec {
        id: "elixir",
        name: "Elixir",
        action_repo: "erlef/setup-beam",
        action_version: "v1",
        version_field: "elixir-version",
        default_version: "1.17",
        commands: &["elixir", "mix", "iex"],
        extra_inputs: &[("otp-version", "27")],
    },
    RuntimeSpec {
        id: "haskell",
        name: "Haskell",
        action_repo: "haskell-actions/setup",
        action_version: "v2",
        version_field: "ghc-version",
        default_version: "9.10",
        commands: &["ghc", "cabal", "stack"],
        extra_inputs: &[],
    },
];

/// A runtime with its setup action, possibly overridden by `runtimes:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Runtime {
    pub id: String,
    pub name: String,
    pub action_repo: String,
    pub action_version: String,
    pub version_field: String,
    pub default_version: String,
    extra_inputs: Vec<(String, String)>,
}

impl From<&RuntimeSpec> for Runtime {
    fn from(spec: &RuntimeSpec) -> Self {
        Runtime {
            id: spec.id.to_string(),
            name: spec.name.to_string(),
            action_repo: spec.action_repo.to_string(),
            action_version: spec.action_version.to_string(),
            version_field: spec.version_field.to_string(),
            default_version: spec.default_version.to_string(),
            extra_inputs: spec
                .extra_inputs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        }
    }
}

pub fn find_runtime(id: &str) -> Option<Runtime> {
    CATALOGUE.iter().find(|spec| spec.id == id).map(Runtime::from)
}

fn runtime_for_command(command: &str) -> Option<&'static RuntimeSpec> {
    CATALOGUE.iter().find(|spec| spec.commands.contains(&command))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeRequirement {
    pub runtime: Runtime,
    /// Empty means the runtime's default version
    pub version: String,
}

impl RuntimeRequirement {
    pub fn new(runtime: Runtime) -> Self {
        RuntimeRequirement {
            runtime,
            version: String::new(),
        }
    }

    pub fn effective_version(&self) -> &str {
        if self.version.is_empty() {
            &self.runtime.default_version
        } else {
            &self.version
        }
    }
}

/// Runtimes needed by the user's run commands, plus node when the engine
/// installs through npm.
pub fn detect_runtime_requirements(model: &WorkflowModel, engine_uses_npm: bool) -> BTreeMap<String, RuntimeRequirement> {
    let mut requirements = BTreeMap::new();
    for command in command_words(&model.custom_steps_text()) {
        if let Some(spec) = runtime_for_command(&command) {
            requirements
                .entry(spec.id.to_string())
                .or_insert_with(|| RuntimeRequirement::new(Runtime::from(spec)));
        }
    }
    if engine_uses_npm {
        if let Some(node) = find_runtime("node") {
            requirements
                .entry(node.id.clone())
                .or_insert_with(|| RuntimeRequirement::new(node));
        }
    }
    tracing::debug!(runtimes = ?requirements.keys().collect::<Vec<_>>(), "detected runtimes");
    requirements
}

/// First word of every command in a shell script, skipping `sudo` and
/// leading `VAR=value` assignments.
fn command_words(script: &str) -> Vec<String> {
    let mut words = Vec::new();
    for line in script.lines() {
        let line = line.trim();
        if line.starts_with('#') {
            continue;
        }
        for segment in line.split(['|', '&', ';', '(', ')']) {
            let first = segment
                .split_whitespace()
                .find(|word| *word != "sudo" && *word != "exec" && !word.contains('='));
            if let Some(word) = first {
                let command = word.rsplit('/').next().unwrap_or(word);
                words.push(command.to_string());
            }
        }
    }
    words
}

/// Apply `runtimes.<id>.{version, action-repo, action-version}`.
///
/// Unknown ids are ignored; a known runtime that was not detected is added.
pub fn apply_runtime_overrides(runtimes: &Mapping, requirements: &mut BTreeMap<String, RuntimeRequirement>) {
    for (key, config) in runtimes {
        let Some(id) = key.as_str() else { continue };
        let Some(config) = config.as_mapping() else { continue };
        let version = config.get("version").and_then(scalar_to_string);
        let action_repo = config.get("action-repo").and_then(Value::as_str);
        let action_version = config.get("action-version").and_then(scalar_to_string);

        if !requirements.contains_key(id) {
            let Some(runtime) = find_runtime(id) else {
                tracing::debug!(runtime = id, "ignoring override for unknown runtime");
                continue;
            };
            requirements.insert(id.to_string(), RuntimeRequirement::new(runtime));
        }
        let Some(requirement) = requirements.get_mut(id) else { continue };
        if let Some(version) = version {
            requirement.version = version;
        }
        if let Some(repo) = action_repo {
            requirement.runtime.action_repo = repo.to_string();
        }
        if let Some(version) = action_version {
            requirement.runtime.action_version = version;
        }
    }
}

/// Setup steps for each requirement, skipping runtimes whose setup action the
/// user's own steps already invoke.
pub fn runtime_setup_steps(
    requirements: &BTreeMap<String, RuntimeRequirement>,
    model: &WorkflowModel,
    context: &CompilerContext,
) -> Result<Vec<StepEntry>, AppError> {
    let user_actions: Vec<String> = model
        .custom_steps
        .iter()
        .chain(model.engine.steps.iter())
        .filter_map(|step| step.get("uses").and_then(Value::as_str))
        .map(|uses| uses.split('@').next().unwrap_or(uses).to_string())
        .collect();

    let mut steps = Vec::new();
    for requirement in requirements.values() {
        let runtime = &requirement.runtime;
        if user_actions.iter().any(|repo| repo == &runtime.action_repo) {
            tracing::debug!(runtime = %runtime.id, "user steps already set up runtime");
            continue;
        }
        let name = format!("Setup {}", runtime.name);
        let mut with: Vec<(String, String)> = Vec::new();
        let version = requirement.effective_version();
        if !version.is_empty() {
            with.push((runtime.version_field.clone(), version.to_string()));
        }
        with.extend(runtime.extra_inputs.iter().cloned());

        match pins::lookup(&runtime.action_repo, &runtime.action_version)? {
            Some(sha) => {
                let mut step = Step::uses(name, format!("{}@{} # {}", runtime.action_repo, sha, runtime.action_version));
                for (key, value) in with {
                    step = step.input(key, value);
                }
                steps.push(step.into());
            }
            None => {
                let mut inputs = Mapping::new();
                for (key, value) in with {
                    inputs.insert(Value::from(key), Value::from(value));
                }
                let mut step = Mapping::new();
                step.insert(Value::from("name"), Value::from(name));
                step.insert(
                    Value::from("uses"),
                    Value::from(format!("{}@{}", runtime.action_repo, runtime.action_version)),
                );
                if !inputs.is_empty() {
                    step.insert(Value::from("with"), Value::Mapping(inputs));
                }
                let mut step = Value::Mapping(step);
                pins::pin_user_step(&mut step, model.strict, context)?;
                steps.push(StepEntry::Raw(step));
            }
        }
    }
    Ok(steps)
}
