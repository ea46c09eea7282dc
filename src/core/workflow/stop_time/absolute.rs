use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use regex::Regex;
use std::sync::LazyLock;

static ORDINAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})(st|nd|rd|th)\b").expect("ordinal regex is valid"));

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%B %d %Y %H:%M:%S",
    "%B %d %Y %H:%M",
    "%b %d %Y %H:%M",
    "%d %B %Y %H:%M",
    "%d %b %Y %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%B %d %Y", "%b %d %Y", "%d %B %Y", "%d %b %Y"];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DateParseError {
    #[error("empty date-time value")]
    Empty,
    #[error(
        "unable to parse date-time '{0}'; supported formats include YYYY-MM-DD HH:MM:SS, \
         MM/DD/YYYY, 'January 2, 2006', '1st June 2025' and RFC 3339"
    )]
    Unrecognized(String),
}

/// Parse one of the accepted absolute date-time spellings as UTC.
pub fn parse_absolute_datetime(input: &str) -> Result<DateTime<Utc>, DateParseError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(DateParseError::Empty);
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(parsed.with_timezone(&Utc));
    }

    let cleaned = ORDINAL_RE.replace_all(trimmed, "$1").replace(',', " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    for format in DATETIME_FORMATS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&cleaned, format) {
            return Ok(parsed.and_utc());
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(&cleaned, format) {
            return Ok(date.and_time(NaiveTime::MIN).and_utc());
        }
    }
    Err(DateParseError::Unrecognized(trimmed.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(input: &str) -> String {
        parse_absolute_datetime(input)
            .unwrap()
            .format("%Y-%m-%d %H:%M:%S")
            .to_string()
    }

    #[test]
    fn test_iso_forms() {
        assert_eq!(render("2025-06-01 14:30:00"), "2025-06-01 14:30:00");
        assert_eq!(render("2025-06-01 14:30"), "2025-06-01 14:30:00");
        assert_eq!(render("2025-06-01"), "2025-06-01 00:00:00");
        assert_eq!(render("2025-06-01T14:30:00"), "2025-06-01 14:30:00");
        assert_eq!(render("2025-06-01T14:30:00+02:00"), "2025-06-01 12:30:00");
        assert_eq!(render("2025-06-01T14:30:00Z"), "2025-06-01 14:30:00");
    }

    #[test]
    fn test_us_and_natural_forms() {
        assert_eq!(render("06/01/2025"), "2025-06-01 00:00:00");
        assert_eq!(render("June 1, 2025"), "2025-06-01 00:00:00");
        assert_eq!(render("Jun 1 2025"), "2025-06-01 00:00:00");
        assert_eq!(render("1 June 2025"), "2025-06-01 00:00:00");
        assert_eq!(render("1st June 2025"), "2025-06-01 00:00:00");
        assert_eq!(render("June 23rd, 2025"), "2025-06-23 00:00:00");
        assert_eq!(render("2nd Jan 2026"), "2026-01-02 00:00:00");
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(matches!(
            parse_absolute_datetime("next tuesday"),
            Err(DateParseError::Unrecognized(_))
        ));
        assert_eq!(parse_absolute_datetime("  "), Err(DateParseError::Empty));
    }
}
