//! Human-facing time handling for the front ends.
//!
//! The store and the upstream API work in UTC unix seconds. Users type and
//! read local wall-clock times, so parsing user input, formatting export
//! cells and naming export files happen here, in the host's time zone.

use std::fmt;
use std::str::FromStr;

use chrono::{
    DateTime, Datelike, Local, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone,
};
use serde::{Deserialize, Serialize};

use solarsync_types::timestamp::naive_utc;

/// Error for a timestamp the user typed that cannot be understood.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimeParseError {
    #[error(
        "Invalid timestamp '{0}': expected RFC 3339, YYYY-MM-DDTHH:MM[:SS] or YYYY-MM-DD"
    )]
    Unrecognized(String),
    #[error("Timestamp '{0}' does not exist in the local time zone")]
    Nonexistent(String),
    #[error("Unknown period '{0}': expected one of {1}")]
    UnknownPeriod(String, &'static str),
    #[error("Start {from} is after end {to}")]
    Inverted { from: String, to: String },
}

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// Parse a user-supplied timestamp in the local time zone.
///
/// Accepts RFC 3339 (with offset), a naive date-time interpreted as local
/// time, or a bare date meaning local midnight.
pub fn parse_timestamp(input: &str) -> Result<i64, TimeParseError> {
    parse_timestamp_in(input, &Local)
}

/// Parse a user-supplied timestamp, resolving naive values in `tz`.
pub fn parse_timestamp_in<Tz: TimeZone>(input: &str, tz: &Tz) -> Result<i64, TimeParseError> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.timestamp());
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(input, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(input, "%Y-%m-%d")
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .ok_or_else(|| TimeParseError::Unrecognized(input.to_string()))?;

    resolve_local(tz, naive).ok_or_else(|| TimeParseError::Nonexistent(input.to_string()))
}

/// Combine explicit bounds with an optional named period.
///
/// Explicit bounds override the period's; blank strings count as absent.
/// A missing end is left to the caller, which normally uses the current time.
pub fn resolve_window(
    from: Option<&str>,
    to: Option<&str>,
    period: Option<Period>,
) -> Result<(Option<i64>, Option<i64>), TimeParseError> {
    let (mut start, mut end) = match period {
        Some(period) => {
            let (from, to) = period.window();
            (Some(from), to)
        }
        None => (None, None),
    };

    fn present(s: Option<&str>) -> Option<&str> {
        s.map(str::trim).filter(|s| !s.is_empty())
    }

    if let Some(from) = present(from) {
        start = Some(parse_timestamp(from)?);
    }
    if let Some(to) = present(to) {
        end = Some(parse_timestamp(to)?);
    }

    if let (Some(from), Some(to)) = (start, end)
        && from > to
    {
        return Err(TimeParseError::Inverted {
            from: local_rfc3339(from),
            to: local_rfc3339(to),
        });
    }
    Ok((start, end))
}

// Ambiguous times (DST fall-back) take the earlier instant.
fn resolve_local<Tz: TimeZone>(tz: &Tz, naive: NaiveDateTime) -> Option<i64> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => Some(dt.timestamp()),
        LocalResult::Ambiguous(earliest, _) => Some(earliest.timestamp()),
        LocalResult::None => None,
    }
}

/// Format a unix timestamp as local `YYYY-MM-DD HH:MM:SS` for CSV cells.
pub fn local_naive(timestamp: i64) -> String {
    format_in(timestamp, &Local, "%Y-%m-%d %H:%M:%S")
}

/// Format a unix timestamp as RFC 3339 in the local time zone.
pub fn local_rfc3339(timestamp: i64) -> String {
    match Local.timestamp_opt(timestamp, 0) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.to_rfc3339(),
        LocalResult::None => timestamp.to_string(),
    }
}

fn format_in<Tz: TimeZone>(timestamp: i64, tz: &Tz, fmt: &str) -> String
where
    Tz::Offset: fmt::Display,
{
    match tz.timestamp_opt(timestamp, 0) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.format(fmt).to_string(),
        LocalResult::None => naive_utc(timestamp),
    }
}

/// File name for an export of `[from, to)`.
///
/// `smart_meter_data_<from>-<to>.csv` with local `YYYYMMDDTHHMMSS` stamps;
/// an open start is written as `start`.
pub fn export_filename(from: Option<i64>, to: i64) -> String {
    export_filename_in(from, to, &Local)
}

fn export_filename_in<Tz: TimeZone>(from: Option<i64>, to: i64, tz: &Tz) -> String
where
    Tz::Offset: fmt::Display,
{
    const STAMP: &str = "%Y%m%dT%H%M%S";
    let from = from.map_or_else(|| "start".to_string(), |ts| format_in(ts, tz, STAMP));
    format!("smart_meter_data_{}-{}.csv", from, format_in(to, tz, STAMP))
}

/// Named calendar ranges for common exports and updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Period {
    CurrentMonth,
    LastMonth,
    LastQuarter,
    CurrentYear,
    LastYear,
}

impl Period {
    /// Every period, in display order.
    pub const ALL: [Period; 5] = [
        Period::CurrentMonth,
        Period::LastMonth,
        Period::LastQuarter,
        Period::CurrentYear,
        Period::LastYear,
    ];

    const NAMES: &'static str = "current-month, last-month, last-quarter, current-year, last-year";

    /// Kebab-case name, as accepted by [`FromStr`].
    pub fn as_str(self) -> &'static str {
        match self {
            Period::CurrentMonth => "current-month",
            Period::LastMonth => "last-month",
            Period::LastQuarter => "last-quarter",
            Period::CurrentYear => "current-year",
            Period::LastYear => "last-year",
        }
    }

    /// The local-time window of this period relative to now.
    pub fn window(self) -> (i64, Option<i64>) {
        self.window_at(&Local::now())
    }

    /// The window `[from, to)` relative to `now`, in `now`'s time zone.
    ///
    /// Periods still in progress have no end; callers use the current time.
    pub fn window_at<Tz: TimeZone>(self, now: &DateTime<Tz>) -> (i64, Option<i64>) {
        let tz = now.timezone();
        let (year, month) = (now.year(), now.month());
        let start = |y: i32, m: u32| month_start(&tz, y, m);

        match self {
            Period::CurrentMonth => (start(year, month), None),
            Period::LastMonth => {
                let (y, m) = previous_month(year, month);
                (start(y, m), Some(start(year, month)))
            }
            Period::LastQuarter => {
                let this_quarter = (month - 1) / 3 * 3 + 1;
                let (y, m) = previous_month(year, this_quarter);
                let first = m - 2;
                (start(y, first), Some(start(year, this_quarter)))
            }
            Period::CurrentYear => (start(year, 1), None),
            Period::LastYear => (start(year - 1, 1), Some(start(year, 1))),
        }
    }
}

fn previous_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn month_start<Tz: TimeZone>(tz: &Tz, year: i32, month: u32) -> i64 {
    NaiveDate::from_ymd_opt(year, month, 1)
        .map(|d| d.and_time(NaiveTime::MIN))
        .and_then(|naive| resolve_local(tz, naive))
        .unwrap_or_default()
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Period::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| TimeParseError::UnknownPeriod(s.to_string(), Self::NAMES))
    }
}
