#![allow(clippy::result_large_err)]

use super::GhawConfig;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use std::env;
use std::path::{Path, PathBuf};

pub struct ConfigLoader;

impl ConfigLoader {
    /// Location of the compiler config file inside a repository.
    pub fn config_path(repo_root: &Path) -> PathBuf {
        repo_root.join(".ghaw").join("config").join("compiler.toml")
    }

    /// Closest ancestor of `current_dir` holding `.github` or `.git`, else `current_dir`.
    pub fn find_workspace_root(current_dir: &Path) -> PathBuf {
        current_dir
            .ancestors()
            .find(|path| path.join(".github").is_dir() || path.join(".git").exists())
            .unwrap_or(current_dir)
            .to_path_buf()
    }

    /// Load config from the repository root, then apply environment overrides.
    /// A missing file yields defaults plus env vars.
    pub fn load_from_workspace(repo_root: &Path) -> Result<GhawConfig, AppError> {
        let config_file = Self::load_from_file(&Self::config_path(repo_root))?;
        let mut config = config_file.unwrap_or_default();
        Self::apply_env_overrides(&mut config);
        super::ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Load config from a specific file path; `Ok(None)` when it does not exist.
    pub fn load_from_file(path: &Path) -> Result<Option<GhawConfig>, AppError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path).map_err(|e| {
            AppError::operation(format!("failed to read config file {}", path.display()), e)
        })?;

        let config: GhawConfig = toml::from_str(&content).map_err(|e| {
            AppError::new(
                ErrorCategory::ConfigurationError,
                format!("failed to parse config file {}: {}", path.display(), e),
            )
            .with_code("AW-CFG-001")
        })?;

        Ok(Some(config))
    }

    /// Environment variables take precedence over config file values.
    fn apply_env_overrides(config: &mut GhawConfig) {
        if let Ok(mode) = env::var("GH_AW_ACTION_MODE") {
            match mode.parse() {
                Ok(parsed) => config.compiler.action_mode = parsed,
                Err(err) => tracing::warn!("ignoring GH_AW_ACTION_MODE: {}", err),
            }
        }

        if let Ok(strict) = env::var("GH_AW_STRICT") {
            if let Ok(strict) = strict.trim().parse::<bool>() {
                config.compiler.strict = strict;
            }
        }
    }

    pub fn env_var_documentation() -> &'static [&'static str] {
        &[
            "GH_AW_ACTION_MODE - Override action mode (dev/release, default: release)",
            "GH_AW_STRICT - Force strict mode (true/false)",
            "GH_AW_FEATURES - Comma-separated feature flags merged under features:",
        ]
    }
}
