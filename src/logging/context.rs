use std::env;

/// Where the compiler is running, which decides how logs are routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExecutionContext {
    /// A developer terminal.
    LocalDev,
    /// A CI runner (`CI=true` or `GITHUB_ACTIONS=true`).
    Ci,
}

impl ExecutionContext {
    /// Returns `true` when the file sink should stay off regardless of config.
    pub fn disables_file(self) -> bool {
        matches!(self, ExecutionContext::Ci)
    }
}

/// Derive the execution context from the process environment.
pub fn detect_context() -> ExecutionContext {
    if env_flag("CI") || env_flag("GITHUB_ACTIONS") {
        ExecutionContext::Ci
    } else {
        ExecutionContext::LocalDev
    }
}

fn env_flag(name: &str) -> bool {
    env::var(name)
        .map(|value| matches!(value.trim().to_lowercase().as_str(), "true" | "1"))
        .unwrap_or(false)
}
