#![allow(clippy::result_large_err)]

use super::GhawConfig;
use crate::core::error::AppError;

pub struct ConfigValidator;

impl ConfigValidator {
    /// Validate configuration rules
    pub fn validate(config: &GhawConfig) -> Result<(), AppError> {
        if config.compiler.default_runs_on.trim().is_empty() {
            return Err(AppError::configuration("compiler.default_runs_on cannot be empty")
                .with_code("AW-CFG-002")
                .with_field("compiler.default_runs_on"));
        }
        Ok(())
    }
}
