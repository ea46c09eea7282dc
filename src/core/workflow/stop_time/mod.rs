#![allow(clippy::result_large_err)]

//! Stop-time resolution and preservation across recompiles.

pub mod absolute;
pub mod delta;

use crate::core::error::AppError;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;

pub use absolute::{parse_absolute_datetime, DateParseError};
pub use delta::{parse_time_delta, parse_time_delta_for_stop_after, TimeDelta, TimeDeltaError};

/// Format written to `GH_AW_STOP_TIME`.
pub const STOP_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

const STOP_TIME_ENV_PREFIX: &str = "GH_AW_STOP_TIME:";

impl From<TimeDeltaError> for AppError {
    fn from(error: TimeDeltaError) -> Self {
        AppError::validation(error.to_string())
            .with_code("AW-VAL-060")
            .with_field("on.stop-after")
    }
}

impl From<DateParseError> for AppError {
    fn from(error: DateParseError) -> Self {
        AppError::validation(error.to_string())
            .with_code("AW-VAL-061")
            .with_field("on.stop-after")
    }
}

pub fn is_relative(stop_after: &str) -> bool {
    stop_after.trim_start().starts_with('+')
}

/// Resolve `stop-after` against `base` into `YYYY-MM-DD HH:MM:SS` (UTC).
pub fn resolve_stop_time(stop_after: &str, base: DateTime<Utc>) -> Result<String, AppError> {
    let resolved = if is_relative(stop_after) {
        let delta = parse_time_delta_for_stop_after(stop_after)?;
        delta.apply(base).ok_or_else(|| {
            AppError::validation("stop-after resolves outside the supported date range")
                .with_code("AW-VAL-062")
                .with_field("on.stop-after")
                .with_value(stop_after)
        })?
    } else {
        parse_absolute_datetime(stop_after)?
    };
    Ok(resolved.format(STOP_TIME_FORMAT).to_string())
}

/// Resolve `+3d`, `-1d` or an absolute date against `base`, returning RFC 3339.
pub fn resolve_relative_date(value: &str, base: DateTime<Utc>) -> Result<String, AppError> {
    let trimmed = value.trim();
    let resolved = if trimmed.starts_with('-') {
        delta::parse_units(trimmed, '-', true)?.apply_backwards(base)
    } else if trimmed.starts_with('+') {
        parse_time_delta(trimmed)?.apply(base)
    } else {
        Some(parse_absolute_datetime(trimmed)?)
    };
    let resolved = resolved.ok_or_else(|| {
        AppError::validation("date resolves outside the supported range").with_value(value)
    })?;
    Ok(resolved.to_rfc3339_opts(SecondsFormat::Secs, true))
}

/// The `GH_AW_STOP_TIME` value recorded in an existing lock file, if any.
pub fn extract_stop_time_from_lock_file(lock_path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(lock_path).ok()?;
    extract_stop_time(&content)
}

pub fn extract_stop_time(lock_content: &str) -> Option<String> {
    lock_content.lines().find_map(|line| {
        let value = line.trim().strip_prefix(STOP_TIME_ENV_PREFIX)?.trim();
        let value = value.trim_matches('"').trim_matches('\'');
        (!value.is_empty()).then(|| value.to_string())
    })
}

/// Decide the stop time for this compile.
///
/// A relative `stop-after` keeps the value from the previous lock file unless
/// `refresh` is set; absolute values are always resolved from the source.
pub fn preserve_stop_time(
    stop_after: &str,
    lock_path: &Path,
    refresh: bool,
    now: DateTime<Utc>,
) -> Result<String, AppError> {
    if is_relative(stop_after) && !refresh {
        if let Some(previous) = extract_stop_time_from_lock_file(lock_path) {
            tracing::info!(
                "preserving stop time {} from {}",
                previous,
                lock_path.display()
            );
            return Ok(previous);
        }
    }
    let resolved = resolve_stop_time(stop_after, now)?;
    tracing::debug!("resolved stop-after '{}' to {}", stop_after, resolved);
    Ok(resolved)
}
