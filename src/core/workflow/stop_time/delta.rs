use chrono::{DateTime, Duration, Months, Utc};
use regex::Regex;
use std::sync::LazyLock;

static UNIT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)(mo|w|d|h|m)").expect("time delta regex is valid"));

const MAX_MONTHS: i64 = 12;
const MAX_WEEKS: i64 = 52;
const MAX_DAYS: i64 = 365;
const MAX_HOURS: i64 = 8760;
const MAX_MINUTES: i64 = 525_600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TimeDeltaError {
    #[error("empty time delta")]
    Empty,
    #[error("time delta must start with '+'; got '{0}'")]
    MissingPlus(String),
    #[error("empty time delta after '+'")]
    EmptyAfterPlus,
    #[error("invalid time delta format: '{0}'; expected +<n><unit> with units mo, w, d, h, m")]
    InvalidFormat(String),
    #[error("duplicate unit '{0}' in time delta")]
    DuplicateUnit(String),
    #[error("time delta too large: {value} {unit} exceeds the maximum of {max} {unit}")]
    TooLarge { value: String, unit: &'static str, max: i64 },
    #[error("invalid time delta '{0}': Extra characters detected")]
    ExtraCharacters(String),
    #[error("minute unit 'm' is not allowed for stop-after; use hours (h) or larger units")]
    MinutesNotAllowed,
}

/// A relative offset such as `+1mo2w3d4h`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TimeDelta {
    pub months: i64,
    pub weeks: i64,
    pub days: i64,
    pub hours: i64,
    pub minutes: i64,
}

impl TimeDelta {
    /// Add calendar months first, then the fixed part.
    pub fn apply(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = base.checked_add_months(Months::new(u32::try_from(self.months).ok()?))?;
        shifted.checked_add_signed(self.fixed_duration())
    }

    /// Subtract the fixed part, then calendar months.
    pub fn apply_backwards(&self, base: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let shifted = base.checked_sub_signed(self.fixed_duration())?;
        shifted.checked_sub_months(Months::new(u32::try_from(self.months).ok()?))
    }

    fn fixed_duration(&self) -> Duration {
        Duration::weeks(self.weeks)
            + Duration::days(self.days)
            + Duration::hours(self.hours)
            + Duration::minutes(self.minutes)
    }
}

/// Parse `+<n><unit>...` where every unit appears at most once.
pub fn parse_time_delta(input: &str) -> Result<TimeDelta, TimeDeltaError> {
    parse_units(input, '+', true)
}

/// Like [`parse_time_delta`] but rejects the minute unit.
pub fn parse_time_delta_for_stop_after(input: &str) -> Result<TimeDelta, TimeDeltaError> {
    parse_units(input, '+', false)
}

pub(crate) fn parse_units(input: &str, sign: char, allow_minutes: bool) -> Result<TimeDelta, TimeDeltaError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(TimeDeltaError::Empty);
    }
    let Some(body) = trimmed.strip_prefix(sign) else {
        return Err(TimeDeltaError::MissingPlus(trimmed.to_string()));
    };
    if body.is_empty() {
        return Err(TimeDeltaError::EmptyAfterPlus);
    }

    let mut delta = TimeDelta::default();
    let mut seen: Vec<&str> = Vec::new();
    let mut position = 0usize;
    for captures in UNIT_RE.captures_iter(body) {
        let Some(whole) = captures.get(0) else {
            continue;
        };
        if whole.start() != position {
            break;
        }
        position = whole.end();

        let digits = captures.get(1).map(|m| m.as_str()).unwrap_or_default();
        let unit = captures.get(2).map(|m| m.as_str()).unwrap_or_default();
        if seen.contains(&unit) {
            return Err(TimeDeltaError::DuplicateUnit(unit.to_string()));
        }
        seen.push(unit);
        if unit == "m" && !allow_minutes {
            return Err(TimeDeltaError::MinutesNotAllowed);
        }

        let (slot, max, unit_name) = match unit {
            "mo" => (&mut delta.months, MAX_MONTHS, "months"),
            "w" => (&mut delta.weeks, MAX_WEEKS, "weeks"),
            "d" => (&mut delta.days, MAX_DAYS, "days"),
            "h" => (&mut delta.hours, MAX_HOURS, "hours"),
            _ => (&mut delta.minutes, MAX_MINUTES, "minutes"),
        };
        let value = digits.parse::<i64>().ok().filter(|value| *value <= max).ok_or_else(|| {
            TimeDeltaError::TooLarge {
                value: digits.to_string(),
                unit: unit_name,
                max,
            }
        })?;
        *slot = value;
    }

    if position == 0 {
        return Err(TimeDeltaError::InvalidFormat(trimmed.to_string()));
    }
    if position != body.len() {
        return Err(TimeDeltaError::ExtraCharacters(trimmed.to_string()));
    }
    Ok(delta)
}
