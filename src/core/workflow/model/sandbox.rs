use crate::core::workflow::values::{get_bool, get_string, string_list};
use serde_yaml::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SandboxType {
    #[default]
    Awf,
    None,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct AgentSandboxConfig {
    pub sandbox_type: SandboxType,
    pub disabled: bool,
    pub version: Option<String>,
}

/// Host isolation policy for the agent job.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SandboxConfig {
    pub agent: AgentSandboxConfig,
    /// The workflow wrote `sandbox: false`
    pub explicitly_disabled: bool,
}

impl SandboxConfig {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            Some(Value::Bool(false)) => SandboxConfig {
                agent: AgentSandboxConfig {
                    disabled: true,
                    ..AgentSandboxConfig::default()
                },
                explicitly_disabled: true,
            },
            Some(Value::Mapping(map)) => SandboxConfig {
                agent: map
                    .get("agent")
                    .and_then(extract_agent_sandbox_config)
                    .unwrap_or_default(),
                explicitly_disabled: false,
            },
            _ => SandboxConfig::default(),
        }
    }

    /// Whether the engine runs inside the agent workflow firewall.
    pub fn firewall_enabled(&self) -> bool {
        !self.agent.disabled && self.agent.sandbox_type == SandboxType::Awf
    }
}

/// Read `sandbox.agent`; booleans are rejected by the schema and yield `None`.
pub fn extract_agent_sandbox_config(value: &Value) -> Option<AgentSandboxConfig> {
    match value {
        Value::String(kind) => Some(agent_of_type(kind)),
        Value::Mapping(map) => {
            let mut agent = get_string(map, "type").map(|kind| agent_of_type(&kind)).unwrap_or_default();
            if let Some(disabled) = get_bool(map, "disabled") {
                agent.disabled = agent.disabled || disabled;
            }
            agent.version = get_string(map, "version");
            Some(agent)
        }
        _ => None,
    }
}

fn agent_of_type(kind: &str) -> AgentSandboxConfig {
    match kind {
        "none" => AgentSandboxConfig {
            sandbox_type: SandboxType::None,
            disabled: true,
            version: None,
        },
        _ => AgentSandboxConfig::default(),
    }
}

/// `network:` after normalization.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NetworkPermissions {
    /// `None` when the workflow does not restrict the network
    pub allowed: Option<Vec<String>>,
    /// Deprecated `network.firewall` toggle
    pub firewall: Option<bool>,
}

impl NetworkPermissions {
    pub fn from_value(value: Option<&Value>) -> Self {
        let Some(Value::Mapping(map)) = value else {
            return NetworkPermissions::default();
        };
        NetworkPermissions {
            allowed: map.get("allowed").map(|allowed| string_list(allowed).unwrap_or_default()),
            firewall: match map.get("firewall") {
                Some(Value::Bool(enabled)) => Some(*enabled),
                Some(Value::Mapping(_)) | Some(Value::Null) => Some(true),
                _ => None,
            },
        }
    }
}
