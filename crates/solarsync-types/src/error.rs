//! Error types for data parsing in solarsync-types.

use thiserror::Error;

/// Errors that can occur when converting raw values into solarsync types.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The sampling resolution is not one the upstream API supports.
    #[error("Invalid resolution {0}s: expected one of 10, 300, 900")]
    InvalidResolution(u32),

    /// A date string is not valid RFC 3339 / ISO-8601.
    #[error("Invalid date '{0}': expected RFC 3339 (e.g. 2024-01-15T10:30:00Z)")]
    InvalidDate(String),

    /// A unix timestamp is outside the range representable as a calendar date.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}

/// Result type alias using solarsync-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
