#![allow(clippy::result_large_err)]

//! Cross-field checks the schema cannot express, run on the built model.

use crate::core::context::CompilerContext;
use crate::core::error::AppError;
use crate::core::types::ErrorCategory;
use crate::core::workflow::model::WorkflowModel;
use std::fmt;

pub mod rules;
pub use rules::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

impl Severity {
    fn rank(&self) -> u8 {
        match self {
            Severity::Error => 2,
            Severity::Warning => 1,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "Error"),
            Severity::Warning => write!(f, "Warning"),
        }
    }
}

/// One problem reported by a rule.
#[derive(Debug, Clone)]
pub struct ValidationFinding {
    pub code: String,
    pub severity: Severity,
    pub category: ErrorCategory,
    pub message: String,
    /// Front-matter path, e.g. `safe-outputs.add-labels.target`
    pub field: Option<String>,
    pub value: Option<String>,
    pub suggestion: Option<String>,
}

impl ValidationFinding {
    pub fn error(code: impl Into<String>, category: ErrorCategory, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            severity: Severity::Error,
            category,
            message: message.into(),
            field: None,
            value: None,
            suggestion: None,
        }
    }

    pub fn warning(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            ..Self::error(code, ErrorCategory::ValidationError, message)
        }
    }

    /// Error in strict mode, warning otherwise.
    pub fn strict(strict: bool, code: impl Into<String>, category: ErrorCategory, message: impl Into<String>) -> Self {
        if strict {
            Self::error(code, category, message)
        } else {
            Self::warning(code, message)
        }
    }

    pub fn field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn into_error(self) -> AppError {
        let mut error = AppError::new(self.category, self.message).with_code(self.code);
        if let Some(field) = self.field {
            error = error.with_field(field);
        }
        if let Some(value) = self.value {
            error = error.with_value(value);
        }
        if let Some(suggestion) = self.suggestion {
            error = error.with_suggestion(suggestion);
        }
        error
    }

    /// Single-line rendering used for warnings.
    pub fn render(&self) -> String {
        match &self.field {
            Some(field) => format!("[{}] {}: {}", self.code, field, self.message),
            None => format!("[{}] {}", self.code, self.message),
        }
    }
}

/// A cross-field check over the workflow model.
pub trait SemanticRule {
    fn check(&self, model: &WorkflowModel) -> Vec<ValidationFinding>;
}

/// Runs every built-in rule.
pub struct SemanticValidator {
    rules: Vec<Box<dyn SemanticRule>>,
}

impl SemanticValidator {
    pub fn new() -> Self {
        Self {
            rules: built_in_rules(),
        }
    }

    /// All findings, sorted by `(severity desc, code asc, field asc)`.
    pub fn run(&self, model: &WorkflowModel) -> Vec<ValidationFinding> {
        let mut findings = Vec::new();
        for rule in &self.rules {
            findings.extend(rule.check(model));
        }
        findings.sort_by(|a, b| {
            b.severity
                .rank()
                .cmp(&a.severity.rank())
                .then(a.code.cmp(&b.code))
                .then(a.field.cmp(&b.field))
        });
        findings
    }

    /// Count warnings on `context` and fail with every error at once.
    pub fn validate(&self, model: &WorkflowModel, context: &CompilerContext) -> Result<(), AppError> {
        let mut errors = Vec::new();
        for finding in self.run(model) {
            match finding.severity {
                Severity::Warning => context.warn(finding.render()),
                Severity::Error => errors.push(finding.into_error()),
            }
        }
        tracing::debug!("semantic validation of '{}': {} error(s)", model.name, errors.len());
        match errors.first() {
            None => Ok(()),
            Some(first) => {
                let category = first.category;
                Err(AppError::batch(category, errors))
            }
        }
    }
}

impl Default for SemanticValidator {
    fn default() -> Self {
        Self::new()
    }
}
