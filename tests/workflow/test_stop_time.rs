use chrono::{DateTime, TimeZone, Utc};
use ghaw::core::context::CompilerContext;
use ghaw::core::workflow::stop_time::{
    extract_stop_time, parse_absolute_datetime, parse_time_delta, parse_time_delta_for_stop_after,
    preserve_stop_time, resolve_relative_date, resolve_stop_time, TimeDelta, TimeDeltaError,
};
use ghaw::core::workflow::Compiler;
use ghaw::core::CompilerConfig;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 8, day, hour, 0, 0).unwrap()
}

fn workflow(dir: &TempDir, stop_after: &str) -> PathBuf {
    let workflows = dir.path().join(".github").join("workflows");
    fs::create_dir_all(&workflows).unwrap();
    let path = workflows.join("nightly.md");
    fs::write(
        &path,
        format!("---\non:\n  schedule:\n    - cron: \"0 3 * * *\"\n  stop-after: \"{}\"\n---\nReport.\n", stop_after),
    )
    .unwrap();
    path
}

fn compile(path: &PathBuf, refresh: bool, now: DateTime<Utc>) -> String {
    let config = CompilerConfig {
        refresh_stop_time: refresh,
        ..CompilerConfig::default()
    };
    let compiled = Compiler::new(config)
        .with_now(now)
        .compile_file(path, &CompilerContext::new())
        .unwrap();
    compiled.lock_content
}

#[test]
fn test_delta_units_combine() {
    assert_eq!(
        parse_time_delta("+1mo2w3d4h5m").unwrap(),
        TimeDelta {
            months: 1,
            weeks: 2,
            days: 3,
            hours: 4,
            minutes: 5,
        }
    );
    assert_eq!(resolve_stop_time("+1d12h", at(15, 12)).unwrap(), "2025-08-17 00:00:00");
    assert_eq!(resolve_stop_time("+1mo", at(15, 12)).unwrap(), "2025-09-15 12:00:00");
}

#[test]
fn test_delta_rejections() {
    assert_eq!(parse_time_delta(""), Err(TimeDeltaError::Empty));
    assert_eq!(parse_time_delta("1d"), Err(TimeDeltaError::MissingPlus("1d".to_string())));
    assert_eq!(parse_time_delta("+"), Err(TimeDeltaError::EmptyAfterPlus));
    assert_eq!(parse_time_delta("+x"), Err(TimeDeltaError::InvalidFormat("+x".to_string())));
    assert_eq!(parse_time_delta("+1d2d"), Err(TimeDeltaError::DuplicateUnit("d".to_string())));
    assert_eq!(parse_time_delta("+1dx"), Err(TimeDeltaError::ExtraCharacters("+1dx".to_string())));
    assert_eq!(
        parse_time_delta("+13mo"),
        Err(TimeDeltaError::TooLarge {
            value: "13".to_string(),
            unit: "months",
            max: 12,
        })
    );
    assert_eq!(parse_time_delta_for_stop_after("+30m"), Err(TimeDeltaError::MinutesNotAllowed));
}

#[test]
fn test_stop_after_errors_carry_codes() {
    let err = resolve_stop_time("+30m", at(15, 12)).unwrap_err();
    assert_eq!(err.code, "AW-VAL-060");
    assert_eq!(err.field.as_deref(), Some("on.stop-after"));
    let err = resolve_stop_time("someday", at(15, 12)).unwrap_err();
    assert_eq!(err.code, "AW-VAL-061");
}

#[test]
fn test_absolute_spellings() {
    let expected = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    for text in ["2025-06-01", "06/01/2025", "June 1st, 2025", "1st June 2025"] {
        assert_eq!(parse_absolute_datetime(text).unwrap(), expected, "{}", text);
    }
    assert_eq!(
        resolve_stop_time("2025-06-01T14:30:00+02:00", at(15, 12)).unwrap(),
        "2025-06-01 12:30:00"
    );
}

#[test]
fn test_relative_dates_go_both_ways() {
    assert_eq!(resolve_relative_date("-1d", at(15, 12)).unwrap(), "2025-08-14T12:00:00Z");
    assert_eq!(resolve_relative_date("+1w", at(15, 12)).unwrap(), "2025-08-22T12:00:00Z");
}

#[test]
fn test_extract_from_lock_text() {
    let lock = "jobs:\n  activation:\n    steps:\n      - env:\n          GH_AW_STOP_TIME: 2025-01-01 00:00:00\n";
    assert_eq!(extract_stop_time(lock).as_deref(), Some("2025-01-01 00:00:00"));
    assert_eq!(extract_stop_time("jobs: {}\n"), None);
}

#[test]
fn test_preserve_reuses_previous_deadline() {
    let dir = TempDir::new().unwrap();
    let lock = dir.path().join("nightly.lock.yml");
    fs::write(&lock, "          GH_AW_STOP_TIME: 2025-01-01 00:00:00\n").unwrap();

    assert_eq!(preserve_stop_time("+2d", &lock, false, at(15, 12)).unwrap(), "2025-01-01 00:00:00");
    assert_eq!(preserve_stop_time("+2d", &lock, true, at(15, 12)).unwrap(), "2025-08-17 12:00:00");
    assert_eq!(
        preserve_stop_time("2025-12-31 23:59:59", &lock, false, at(15, 12)).unwrap(),
        "2025-12-31 23:59:59"
    );
    let missing = dir.path().join("absent.lock.yml");
    assert_eq!(preserve_stop_time("+1w", &missing, false, at(15, 12)).unwrap(), "2025-08-22 12:00:00");
}

#[test]
fn test_recompile_keeps_deadline_until_refreshed() {
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, "+2d");

    let first = compile(&path, false, at(15, 12));
    assert!(first.contains("GH_AW_STOP_TIME: 2025-08-17 12:00:00"), "{}", first);
    assert!(first.contains("Check stop-time limit"));

    let second = compile(&path, false, at(20, 9));
    assert!(second.contains("GH_AW_STOP_TIME: 2025-08-17 12:00:00"));

    let refreshed = compile(&path, true, at(20, 9));
    assert!(refreshed.contains("GH_AW_STOP_TIME: 2025-08-22 09:00:00"));
}

#[test]
fn test_invalid_stop_after_fails_compile() {
    let dir = TempDir::new().unwrap();
    let path = workflow(&dir, "+2x");
    let err = Compiler::new(CompilerConfig::default())
        .with_now(at(15, 12))
        .build(&path, &CompilerContext::new())
        .unwrap_err();
    assert_eq!(err.code, "AW-VAL-060");
}
