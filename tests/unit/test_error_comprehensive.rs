use ghaw::core::error::{excerpt, AppError};
use ghaw::core::types::{ErrorCategory, ErrorSeverity};
use ghaw::core::workflow::stop_time::{parse_time_delta, TimeDeltaError};
use std::error::Error as _;

#[test]
fn test_new_error_uses_category_default_code() {
    let error = AppError::new(ErrorCategory::ConfigurationError, "bad combination");
    assert_eq!(error.code, "AW-CFG-000");
    assert_eq!(error.severity(), ErrorSeverity::Error);
    assert!(error.related.is_empty());
    assert_eq!(error.count(), 1);
}

#[test]
fn test_display_is_one_line_with_field_value_and_hint() {
    let error = AppError::validation("timeout-minutes must be a positive integer")
        .with_code("AW-VAL-020")
        .with_field("timeout-minutes")
        .with_value("-5")
        .with_suggestion("use a value such as 30");
    let rendered = error.to_string();
    assert_eq!(
        rendered,
        "[AW-VAL-020] timeout-minutes: timeout-minutes must be a positive integer (value: \"-5\") (hint: use a value such as 30)"
    );
    assert!(!rendered.contains('\n'));
}

#[test]
fn test_location_prefixes_rendered_line() {
    let error = AppError::validation("unknown property 'nme'")
        .with_code("AW-SCH-001")
        .with_location(".github/workflows/x.md:3:1");
    assert!(error
        .to_string()
        .starts_with(".github/workflows/x.md:3:1: [AW-SCH-001]"));
}

#[test]
fn test_value_excerpt_is_truncated() {
    let long = "x".repeat(100);
    let value = excerpt(&long);
    assert_eq!(value.chars().count(), 61);
    assert!(value.ends_with('…'));
    assert_eq!(excerpt("a\nb"), "a\\nb");
}

#[test]
fn test_batch_renders_one_line_per_leaf() {
    let first = AppError::validation("first problem").with_code("AW-VAL-001");
    let second = AppError::configuration("second problem").with_code("AW-CFG-002");
    let batch = AppError::batch(ErrorCategory::ValidationError, vec![first, second]);
    assert_eq!(batch.count(), 2);
    assert_eq!(batch.leaves().len(), 2);
    let lines: Vec<String> = batch.to_string().lines().map(str::to_string).collect();
    assert_eq!(
        lines,
        vec!["[AW-VAL-001] first problem", "[AW-CFG-002] second problem"]
    );
}

#[test]
fn test_batch_of_one_is_unchanged() {
    let single = AppError::validation("only").with_code("AW-VAL-009");
    let batch = AppError::batch(ErrorCategory::ConfigurationError, vec![single]);
    assert_eq!(batch.code, "AW-VAL-009");
    assert_eq!(batch.category, ErrorCategory::ValidationError);
}

#[test]
fn test_io_error_becomes_operation_error_with_source() {
    let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing.md");
    let error: AppError = io.into();
    assert_eq!(error.category, ErrorCategory::OperationError);
    assert_eq!(error.code, "AW-OPS-001");
    assert!(error.source().is_some());
    assert!(error.to_string().contains("missing.md"));
}

#[test]
fn test_leaf_error_conversion_keeps_message() {
    let delta_error = parse_time_delta("+1d1d").unwrap_err();
    assert_eq!(delta_error, TimeDeltaError::DuplicateUnit("d".to_string()));
    let error: AppError = delta_error.into();
    assert_eq!(error.category, ErrorCategory::ValidationError);
    assert_eq!(error.field.as_deref(), Some("on.stop-after"));
    assert!(error.to_string().contains("duplicate unit 'd'"));
}

#[test]
fn test_context_and_timestamp() {
    let error = AppError::compiler_bug("dependency graph has a cycle")
        .with_context("job", "agent");
    assert_eq!(error.context.get("job").map(String::as_str), Some("agent"));
    assert!(!error.recovery_suggestions.is_empty());
    assert!(error.timestamp().ends_with('Z'));
}
