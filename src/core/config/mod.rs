use crate::core::types::ActionMode;
use serde::{Deserialize, Serialize};

pub mod loader;
pub mod validation;

pub use loader::ConfigLoader;
pub use validation::ConfigValidator;

/// Compiler configuration loaded from `.ghaw/config/compiler.toml`
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GhawConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,
}

/// Call-site parameters that shape a compile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Reject permissive constructs such as `sandbox: false`
    #[serde(default)]
    pub strict: bool,

    /// Recompute relative stop times instead of carrying the previous value forward
    #[serde(default)]
    pub refresh_stop_time: bool,

    /// Local action paths (`dev`) or pinned published refs (`release`)
    #[serde(default)]
    pub action_mode: ActionMode,

    /// Skip schema validation; only used by test harnesses
    #[serde(default)]
    pub skip_validation: bool,

    /// Write helper scripts and tool descriptors next to the lock file
    #[serde(default = "default_emit_aux_files")]
    pub emit_aux_files: bool,

    /// Runner label used when the workflow does not set `runs-on`
    #[serde(default = "default_runs_on")]
    pub default_runs_on: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            strict: false,
            refresh_stop_time: false,
            action_mode: ActionMode::default(),
            skip_validation: false,
            emit_aux_files: default_emit_aux_files(),
            default_runs_on: default_runs_on(),
        }
    }
}

fn default_emit_aux_files() -> bool {
    true
}

fn default_runs_on() -> String {
    "ubuntu-latest".to_string()
}
