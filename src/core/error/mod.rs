use crate::core::types::{ErrorCategory, ErrorSeverity};
use chrono::{DateTime, SecondsFormat, Utc};
use std::collections::BTreeMap;

const VALUE_EXCERPT_LIMIT: usize = 60;

#[derive(Debug)]
pub struct AppError {
    pub category: ErrorCategory,
    pub severity: ErrorSeverity,
    pub code: String,
    pub message: String,
    /// Field name or JSON pointer the error refers to.
    pub field: Option<String>,
    /// Truncated excerpt of the offending value.
    pub value: Option<String>,
    /// `file:line:col` when the error could be located in the source.
    pub location: Option<String>,
    pub context: BTreeMap<String, String>,
    pub recovery_suggestions: Vec<String>,
    pub occurred_at: DateTime<Utc>,
    /// Child errors when several problems are reported together.
    pub related: Vec<AppError>,
    pub source: Option<anyhow::Error>,
}

impl AppError {
    pub fn new<T: Into<String>>(category: ErrorCategory, message: T) -> Self {
        AppError {
            category,
            severity: ErrorSeverity::Error,
            code: default_code(category).to_string(),
            message: message.into(),
            field: None,
            value: None,
            location: None,
            context: BTreeMap::new(),
            recovery_suggestions: vec![],
            occurred_at: Utc::now(),
            related: vec![],
            source: None,
        }
    }

    pub fn validation<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::ValidationError, message)
    }

    pub fn configuration<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::ConfigurationError, message)
    }

    pub fn compiler_bug<T: Into<String>>(message: T) -> Self {
        AppError::new(ErrorCategory::CompilerBug, message)
            .with_suggestion("This is a compiler bug; please report it with the source workflow")
    }

    /// Wrap a failed side effect, keeping the underlying error as the source.
    pub fn operation<T: Into<String>, E>(message: T, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        let mut error = AppError::new(ErrorCategory::OperationError, message);
        error.source = Some(anyhow::Error::new(source));
        error
    }

    /// Combine several errors into one value; a single error is returned unchanged.
    pub fn batch(category: ErrorCategory, mut errors: Vec<AppError>) -> Self {
        if errors.len() == 1 {
            return errors.remove(0);
        }
        let mut error = AppError::new(category, format!("{} errors", errors.len()));
        error.code = "AW-BATCH".to_string();
        error.related = errors;
        error
    }

    pub fn with_code<T: Into<String>>(mut self, code: T) -> Self {
        self.code = code.into();
        self
    }

    pub fn with_field<T: Into<String>>(mut self, field: T) -> Self {
        self.field = Some(field.into());
        self
    }

    pub fn with_value<T: AsRef<str>>(mut self, value: T) -> Self {
        self.value = Some(excerpt(value.as_ref()));
        self
    }

    pub fn with_location<T: Into<String>>(mut self, location: T) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn with_suggestion<T: Into<String>>(mut self, suggestion: T) -> Self {
        self.recovery_suggestions.push(suggestion.into());
        self
    }

    pub fn with_context<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn add_context(&mut self, key: &str, value: &str) {
        self.context.insert(key.to_string(), value.to_string());
    }

    pub fn severity(&self) -> ErrorSeverity {
        self.severity
    }

    /// Number of leaf errors carried by this value.
    pub fn count(&self) -> usize {
        if self.related.is_empty() {
            1
        } else {
            self.related.iter().map(AppError::count).sum()
        }
    }

    /// Flattened leaf errors in report order.
    pub fn leaves(&self) -> Vec<&AppError> {
        if self.related.is_empty() {
            vec![self]
        } else {
            self.related.iter().flat_map(AppError::leaves).collect()
        }
    }

    /// ISO-8601 timestamp of when the error was raised.
    pub fn timestamp(&self) -> String {
        self.occurred_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }

    fn render_line(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(location) = &self.location {
            write!(f, "{}: ", location)?;
        }
        write!(f, "[{}] ", self.code)?;
        if let Some(field) = &self.field {
            write!(f, "{}: ", field)?;
        }
        write!(f, "{}", self.message)?;
        if let Some(value) = &self.value {
            write!(f, " (value: {:?})", value)?;
        }
        if let Some(suggestion) = self.recovery_suggestions.first() {
            write!(f, " (hint: {})", suggestion)?;
        }
        if let Some(source) = &self.source {
            write!(f, ": {}", source)?;
        }
        Ok(())
    }
}

fn default_code(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::ValidationError => "AW-VAL-000",
        ErrorCategory::ConfigurationError => "AW-CFG-000",
        ErrorCategory::OperationError => "AW-OPS-000",
        ErrorCategory::CompilerBug => "AW-BUG-000",
    }
}

/// Truncate long values so a rendered error stays on one readable line.
pub fn excerpt(value: &str) -> String {
    let single_line = value.replace('\n', "\\n");
    if single_line.chars().count() <= VALUE_EXCERPT_LIMIT {
        return single_line;
    }
    let mut out: String = single_line.chars().take(VALUE_EXCERPT_LIMIT).collect();
    out.push('…');
    out
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.related.is_empty() {
            return self.render_line(f);
        }
        let leaves = self.leaves();
        for (index, leaf) in leaves.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            leaf.render_line(f)?;
        }
        Ok(())
    }
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|source| {
            let inner: &(dyn std::error::Error + 'static) = source.as_ref();
            inner
        })
    }
}

impl From<anyhow::Error> for AppError {
    fn from(e: anyhow::Error) -> Self {
        let mut error = AppError::new(ErrorCategory::OperationError, e.to_string());
        error.source = Some(e);
        error
    }
}

impl From<std::io::Error> for AppError {
    fn from(e: std::io::Error) -> Self {
        AppError::operation("I/O failure", e)
            .with_code("AW-OPS-001")
            .with_suggestion("Check file permissions and paths")
    }
}

pub trait ErrorReporter {
    fn report_error(&self, error: &AppError);
    fn report_warning(&self, message: &str, context: Option<String>);
    fn report_summary(&self, compiled: usize, errors: usize, warnings: usize);
}

pub struct DefaultErrorReporter;

impl DefaultErrorReporter {
    pub fn new() -> Self {
        DefaultErrorReporter
    }
}

impl Default for DefaultErrorReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ErrorReporter for DefaultErrorReporter {
    fn report_error(&self, error: &AppError) {
        for leaf in error.leaves() {
            eprintln!("error: {}", leaf);
        }
    }

    fn report_warning(&self, message: &str, context: Option<String>) {
        match context {
            Some(ctx) => eprintln!("warning: {} ({})", message, ctx),
            None => eprintln!("warning: {}", message),
        }
    }

    fn report_summary(&self, compiled: usize, errors: usize, warnings: usize) {
        eprintln!(
            "compiled {} workflow(s): {} error(s), {} warning(s)",
            compiled, errors, warnings
        );
    }
}
