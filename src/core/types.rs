use serde::{Deserialize, Serialize};

/// Error category enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// A user-supplied value violates a documented contract.
    ValidationError,
    /// A cross-field combination is inconsistent.
    ConfigurationError,
    /// A side effect (read, write, schema load) failed.
    OperationError,
    /// An internal invariant broke while assembling the workflow.
    CompilerBug,
}

impl ErrorCategory {
    /// Short label used in rendered error lines.
    pub fn label(&self) -> &'static str {
        match self {
            ErrorCategory::ValidationError => "validation",
            ErrorCategory::ConfigurationError => "configuration",
            ErrorCategory::OperationError => "operation",
            ErrorCategory::CompilerBug => "compiler-bug",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Error severity enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorSeverity {
    Error,
    Warning,
    Info,
}

/// Where helper actions are resolved from when emitting `uses:` lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionMode {
    /// Local action paths inside the repository checkout.
    Dev,
    /// Published refs pinned to commit SHAs.
    #[default]
    Release,
}

impl std::fmt::Display for ActionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ActionMode::Dev => write!(f, "dev"),
            ActionMode::Release => write!(f, "release"),
        }
    }
}

impl std::str::FromStr for ActionMode {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "dev" => Ok(ActionMode::Dev),
            "release" => Ok(ActionMode::Release),
            _ => Err(format!(
                "invalid action mode '{}'; supported values are dev, release",
                value
            )),
        }
    }
}
