//! Resolution of raw dashboard time windows into absolute Unix seconds.
//!
//! Accepted bound forms:
//! * a number of seconds (values of 1e11 and above are taken as milliseconds)
//! * `now`, optionally followed by offsets (`now-1h`, `now-1d+6h`) and a
//!   rounding suffix (`now/d`, `now-1w/w`)
//! * an RFC 3339 timestamp
//!
//! Rounding truncates to the start of the unit for a `start` bound and
//! extends to the last second of the unit for an `end` bound. All
//! calendar arithmetic is done in UTC.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Timelike, Utc};

use crate::models::{TimeBound, TimeRange};
use crate::{DashQueryError, Result};

const MILLIS_THRESHOLD: i64 = 100_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: i64,
    pub end: i64,
}

impl ResolvedRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Length in seconds; negative for inverted windows.
    pub fn span(&self) -> i64 {
        self.end.saturating_sub(self.start)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Start,
    End,
}

/// Resolves both bounds against `now`. A missing `end` means `now`.
pub fn resolve(range: &TimeRange, now: DateTime<Utc>) -> Result<ResolvedRange> {
    let start = match &range.start {
        Some(bound) if !bound.is_empty() => resolve_bound(bound, now, Side::Start)?,
        _ => return Err(DashQueryError::TimeRange("missing start".to_string())),
    };
    let end = match &range.end {
        Some(bound) if !bound.is_empty() => resolve_bound(bound, now, Side::End)?,
        _ => now.timestamp(),
    };
    Ok(ResolvedRange { start, end })
}

fn resolve_bound(bound: &TimeBound, now: DateTime<Utc>, side: Side) -> Result<i64> {
    match bound {
        TimeBound::Seconds(value) => Ok(normalize_epoch(*value)),
        TimeBound::Text(text) => {
            let text = text.trim();
            if let Some(rest) = text.strip_prefix("now") {
                return parse_relative(rest, now, side).map(|t| t.timestamp());
            }
            if let Ok(value) = text.parse::<i64>() {
                return Ok(normalize_epoch(value));
            }
            DateTime::parse_from_rfc3339(text)
                .map(|t| t.timestamp())
                .map_err(|e| DashQueryError::TimeRange(format!("{}: {}", text, e)))
        }
    }
}

fn normalize_epoch(value: i64) -> i64 {
    if value.unsigned_abs() >= MILLIS_THRESHOLD as u64 {
        value / 1000
    } else {
        value
    }
}

fn parse_relative(expr: &str, now: DateTime<Utc>, side: Side) -> Result<DateTime<Utc>> {
    let invalid = || DashQueryError::TimeRange(format!("now{}", expr));
    let chars: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    let mut time = now;
    let mut pos = 0;

    while pos < chars.len() {
        match chars[pos] {
            sign @ ('+' | '-') => {
                pos += 1;
                let digits_start = pos;
                while pos < chars.len() && chars[pos].is_ascii_digit() {
                    pos += 1;
                }
                let amount: i64 = if pos == digits_start {
                    1
                } else {
                    chars[digits_start..pos]
                        .iter()
                        .collect::<String>()
                        .parse()
                        .map_err(|_| invalid())?
                };
                let unit = *chars.get(pos).ok_or_else(invalid)?;
                pos += 1;
                let amount = if sign == '-' { -amount } else { amount };
                time = shift(time, amount, unit).ok_or_else(invalid)?;
            }
            '/' => {
                let unit = *chars.get(pos + 1).ok_or_else(invalid)?;
                pos += 2;
                time = match side {
                    Side::Start => round_down(time, unit),
                    Side::End => round_up(time, unit),
                }
                .ok_or_else(invalid)?;
            }
            _ => return Err(invalid()),
        }
    }

    Ok(time)
}

fn shift(time: DateTime<Utc>, amount: i64, unit: char) -> Option<DateTime<Utc>> {
    match unit {
        's' => time.checked_add_signed(Duration::seconds(amount)),
        'm' => time.checked_add_signed(Duration::minutes(amount)),
        'h' => time.checked_add_signed(Duration::hours(amount)),
        'd' => time.checked_add_signed(Duration::days(amount)),
        'w' => time.checked_add_signed(Duration::weeks(amount)),
        'M' => shift_months(time, amount),
        'y' => shift_months(time, amount.checked_mul(12)?),
        _ => None,
    }
}

fn shift_months(time: DateTime<Utc>, months: i64) -> Option<DateTime<Utc>> {
    let magnitude = Months::new(u32::try_from(months.unsigned_abs()).ok()?);
    if months >= 0 {
        time.checked_add_months(magnitude)
    } else {
        time.checked_sub_months(magnitude)
    }
}

fn round_down(time: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let date = time.date_naive();
    let naive = match unit {
        's' => time.naive_utc().with_nanosecond(0),
        'm' => date.and_hms_opt(time.hour(), time.minute(), 0),
        'h' => date.and_hms_opt(time.hour(), 0, 0),
        'd' => date.and_hms_opt(0, 0, 0),
        'w' => {
            let back = i64::from(date.weekday().num_days_from_monday());
            (date - Duration::days(back)).and_hms_opt(0, 0, 0)
        }
        'M' => date.with_day(1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        'y' => NaiveDate::from_ymd_opt(date.year(), 1, 1).and_then(|d| d.and_hms_opt(0, 0, 0)),
        _ => None,
    }?;
    Some(Utc.from_utc_datetime(&naive))
}

fn round_up(time: DateTime<Utc>, unit: char) -> Option<DateTime<Utc>> {
    let start = round_down(time, unit)?;
    shift(start, 1, unit)?.checked_sub_signed(Duration::seconds(1))
}
