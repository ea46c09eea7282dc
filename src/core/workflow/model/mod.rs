#![allow(clippy::result_large_err)]

//! Typed workflow model folded from the normalized front matter.

pub mod engine;
pub mod permissions;
pub mod safe_inputs;
pub mod safe_outputs;
pub mod sandbox;
pub mod tools;

use crate::core::context::{env_features, CompilerContext};
use crate::core::error::AppError;
use crate::core::workflow::source::SourceDocument;
use crate::core::workflow::triggers::{lower_triggers, TriggerSet};
use crate::core::workflow::values::{get_bool, get_string, keys, scalar_to_string, type_name};
use indexmap::IndexMap;
use serde_yaml::{Mapping, Value};
use std::path::PathBuf;

pub use engine::{mapping_strings, string_map, EngineConfig, EngineId};
pub use permissions::{PermissionLevel, PermissionSet, PERMISSION_SCOPES};
pub use safe_inputs::{SafeInputLanguage, SafeInputTool, SafeInputsConfig, DEFAULT_SAFE_INPUT_TIMEOUT_SECS};
pub use safe_outputs::{SafeJobConfig, SafeOutputEntry, SafeOutputKind, SafeOutputsConfig, ToolInput};
pub use sandbox::{extract_agent_sandbox_config, AgentSandboxConfig, NetworkPermissions, SandboxConfig, SandboxType};
pub use tools::{GitHubMode, GitHubToolConfig, McpServerConfig, McpTransport, SerenaMode, ToolsConfig};

pub const DEFAULT_TIMEOUT_MINUTES: i64 = 20;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheMemoryEntry {
    pub id: String,
    pub key: Option<String>,
    pub description: Option<String>,
    pub retention_days: Option<i64>,
}

impl CacheMemoryEntry {
    /// Directory the agent reads and writes for this cache.
    pub fn path(&self) -> String {
        if self.id == "default" {
            "/tmp/gh-aw/cache-memory/".to_string()
        } else {
            format!("/tmp/gh-aw/cache-memory-{}/", self.id)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SecretMaskingConfig {
    pub steps: Vec<Value>,
}

impl SecretMaskingConfig {
    /// `None` when no steps are configured.
    pub fn from_value(value: Option<&Value>) -> Option<Self> {
        let steps = value?.get("steps")?.as_sequence()?.clone();
        (!steps.is_empty()).then_some(SecretMaskingConfig { steps })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConcurrencyConfig {
    pub group: String,
    pub cancel_in_progress: Option<bool>,
}

impl ConcurrencyConfig {
    fn from_value(value: Option<&Value>) -> Option<Self> {
        let map = value?.as_mapping()?;
        Some(ConcurrencyConfig {
            group: get_string(map, "group")?,
            cancel_in_progress: get_bool(map, "cancel-in-progress"),
        })
    }
}

/// The workflow being compiled, owned by one compile.
#[derive(Debug, Clone)]
pub struct WorkflowModel {
    pub name: String,
    pub description: Option<String>,
    pub source: Option<String>,
    pub source_path: PathBuf,
    pub triggers: TriggerSet,
    pub permissions: PermissionSet,
    pub permissions_declared: bool,
    pub runs_on: Option<Value>,
    pub timeout_minutes: i64,
    pub concurrency: Option<ConcurrencyConfig>,
    pub env: IndexMap<String, String>,
    pub if_condition: Option<String>,
    pub environment: Option<Value>,
    pub engine: EngineConfig,
    pub tools: ToolsConfig,
    pub safe_outputs: Option<SafeOutputsConfig>,
    pub safe_inputs: Option<SafeInputsConfig>,
    pub sandbox: SandboxConfig,
    pub network: NetworkPermissions,
    pub cache_memory: Vec<CacheMemoryEntry>,
    pub runtimes: Mapping,
    /// `on.stop-after` as written
    pub stop_after: Option<String>,
    /// Absolute stop time, filled in before step synthesis
    pub stop_time: Option<String>,
    pub tracker_id: Option<String>,
    /// Workflow features merged over `GH_AW_FEATURES`
    pub features: Mapping,
    pub custom_steps: Vec<Value>,
    pub manual_approval_env: Option<String>,
    pub secret_masking: Option<SecretMaskingConfig>,
    pub strict: bool,
    pub github_token: Option<String>,
    pub container: Option<Value>,
    pub services: Option<Value>,
    pub prompt: String,
    /// Merged, normalized front matter the model was built from
    pub front_matter: Mapping,
}

impl WorkflowModel {
    /// Text of every user-provided run command, scanned for runtime usage.
    pub fn custom_steps_text(&self) -> String {
        let mut steps: Vec<&Value> = self.custom_steps.iter().collect();
        steps.extend(self.engine.steps.iter());
        steps
            .into_iter()
            .filter_map(|step| step.get("run").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_safe_output(&self, kind: SafeOutputKind) -> bool {
        self.safe_outputs.as_ref().is_some_and(|outputs| outputs.has(kind))
    }

    /// Sandbox policy combined with the deprecated `network.firewall` toggle.
    pub fn firewall_enabled(&self) -> bool {
        self.sandbox.firewall_enabled() && self.network.firewall != Some(false)
    }

    /// Whether the agent may read repository contents, so checkout is useful.
    pub fn can_checkout(&self) -> bool {
        self.permissions.level("contents").satisfies(PermissionLevel::Read)
    }
}

/// Fold a normalized document into the model.
pub fn build_model(doc: &SourceDocument, context: &CompilerContext, strict: bool) -> Result<WorkflowModel, AppError> {
    let fm = &doc.front_matter;
    tracing::debug!("building model for {}", doc.path.display());

    let triggers = lower_triggers(fm.get("on"))?;
    let permissions = fm.get("permissions").map(PermissionSet::parse).transpose()?;
    let timeout_minutes = match fm.get("timeout-minutes") {
        Some(value) => crate::core::workflow::values::parse_int_value(value, "timeout-minutes", Some(context))
            .filter(|minutes| *minutes > 0)
            .ok_or_else(|| {
                AppError::validation("timeout-minutes must be a positive integer")
                    .with_code("AW-VAL-020")
                    .with_field("timeout-minutes")
                    .with_value(scalar_to_string(value).unwrap_or_else(|| type_name(value).to_string()))
            })?,
        None => DEFAULT_TIMEOUT_MINUTES,
    };

    let mut features = fm.get("features").and_then(Value::as_mapping).cloned().unwrap_or_default();
    for (name, enabled) in env_features() {
        if !features.contains_key(name.as_str()) {
            features.insert(Value::from(name.as_str()), Value::Bool(*enabled));
        }
    }

    let cache_memory = match fm.get("tools").and_then(|tools| tools.get("cache-memory")) {
        Some(Value::Sequence(entries)) => entries
            .iter()
            .filter_map(Value::as_mapping)
            .map(|entry| CacheMemoryEntry {
                id: get_string(entry, "id").unwrap_or_else(|| "default".to_string()),
                key: get_string(entry, "key"),
                description: get_string(entry, "description"),
                retention_days: entry.get("retention-days").and_then(Value::as_i64),
            })
            .collect(),
        _ => vec![],
    };

    let model = WorkflowModel {
        name: get_string(fm, "name").unwrap_or_else(|| doc.stem()),
        description: get_string(fm, "description"),
        source: get_string(fm, "source"),
        source_path: doc.path.clone(),
        manual_approval_env: triggers.manual_approval.clone(),
        stop_after: triggers.stop_after.clone(),
        stop_time: None,
        triggers,
        permissions_declared: permissions.is_some(),
        permissions: permissions.unwrap_or(PermissionSet::ReadAll),
        runs_on: fm.get("runs-on").cloned(),
        timeout_minutes,
        concurrency: ConcurrencyConfig::from_value(fm.get("concurrency")),
        env: string_map(fm.get("env")),
        if_condition: get_string(fm, "if"),
        environment: fm.get("environment").cloned(),
        engine: EngineConfig::from_value(fm.get("engine"))?,
        tools: ToolsConfig::from_front_matter(fm.get("tools"), fm.get("mcp-servers"))?,
        safe_outputs: SafeOutputsConfig::parse(fm.get("safe-outputs"), context)?,
        safe_inputs: SafeInputsConfig::parse(fm.get("safe-inputs"), context)?,
        sandbox: SandboxConfig::from_value(fm.get("sandbox")),
        network: NetworkPermissions::from_value(fm.get("network")),
        cache_memory,
        runtimes: fm.get("runtimes").and_then(Value::as_mapping).cloned().unwrap_or_default(),
        tracker_id: get_string(fm, "tracker-id"),
        features,
        custom_steps: fm.get("steps").and_then(Value::as_sequence).cloned().unwrap_or_default(),
        secret_masking: SecretMaskingConfig::from_value(fm.get("secret-masking")),
        strict: strict || get_bool(fm, "strict").unwrap_or(false),
        github_token: get_string(fm, "github-token"),
        container: fm.get("container").cloned(),
        services: fm.get("services").cloned(),
        prompt: doc.body.clone(),
        front_matter: fm.clone(),
    };
    tracing::debug!(
        "model '{}': engine {}, {} safe output(s), {} custom step(s)",
        model.name,
        model.engine.id,
        model
            .safe_outputs
            .as_ref()
            .map(|outputs| outputs.outputs.len() + outputs.jobs.len())
            .unwrap_or(0),
        model.custom_steps.len()
    );
    Ok(model)
}

/// Names of keys in `features` that are set, for diagnostics.
pub fn feature_names(model: &WorkflowModel) -> Vec<String> {
    keys(&model.features)
}
