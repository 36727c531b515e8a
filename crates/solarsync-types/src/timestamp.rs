//! Timestamp conversions shared by the fetcher, the store and the front ends.
//!
//! All persisted timestamps are unix seconds in UTC. The upstream API speaks
//! `YYYY-MM-DDTHH:MM:SSZ` on the request side and RFC 3339 on the response side.

use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime};

use crate::error::{ParseError, ParseResult};

/// Longest span the upstream range endpoint serves in a single request.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Format a unix timestamp the way the upstream range endpoint expects it.
///
/// # Examples
///
/// ```
/// use solarsync_types::timestamp::api_timestamp;
///
/// assert_eq!(api_timestamp(1_704_067_200).unwrap(), "2024-01-01T00:00:00Z");
/// ```
pub fn api_timestamp(timestamp: i64) -> ParseResult<String> {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .map_err(|_| ParseError::InvalidTimestamp(timestamp))?
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second]Z"
        ))
        .map_err(|_| ParseError::InvalidTimestamp(timestamp))
}

/// Parse an RFC 3339 date (as returned by the upstream API) into unix seconds.
///
/// Sub-second precision is truncated.
pub fn parse_rfc3339(date: &str) -> ParseResult<i64> {
    OffsetDateTime::parse(date, &Rfc3339)
        .map(OffsetDateTime::unix_timestamp)
        .map_err(|_| ParseError::InvalidDate(date.to_string()))
}

/// Format a unix timestamp as a naive `YYYY-MM-DD HH:MM:SS` string in UTC.
///
/// Out-of-range values fall back to the raw number.
#[must_use]
pub fn naive_utc(timestamp: i64) -> String {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| {
            dt.format(format_description!(
                "[year]-[month]-[day] [hour]:[minute]:[second]"
            ))
            .ok()
        })
        .unwrap_or_else(|| timestamp.to_string())
}

/// Round an energy value to two decimal places (half away from zero).
#[must_use]
pub fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Midnight of the first day of the month containing `now`, in `now`'s offset.
#[must_use]
pub fn start_of_month(now: OffsetDateTime) -> i64 {
    let days_into_month = i64::from(now.day()) - 1;
    let first = now.date().saturating_sub(Duration::days(days_into_month));
    first.midnight().assume_offset(now.offset()).unix_timestamp()
}
