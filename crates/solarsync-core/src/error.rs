//! Error types for solarsync-core.
//!
//! Every failure talking to the upstream metering API maps to one variant of
//! [`Error`]. None of them are retried locally: a failed sync is reported to
//! the caller and re-running it is safe because the store ignores duplicates.
//!
//! | Error Type | Cause |
//! |------------|-------|
//! | [`Error::Auth`] | Login rejected or no token returned |
//! | [`Error::Request`] | Transport failure, including the request timeout |
//! | [`Error::Status`] | Upstream answered with a non-2xx status |
//! | [`Error::Malformed`] | Body is not the JSON shape we expect |
//! | [`Error::InvalidConfig`] | Client could not be built from the configuration |

use thiserror::Error;

use solarsync_types::ParseError;

/// Errors that can occur when talking to the upstream metering API.
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// Authentication failed.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// The request never produced a response (connect error, timeout, ...).
    #[error("Request to {url} failed: {source}")]
    Request {
        /// The URL that was requested.
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// Upstream returned a non-success status code.
    #[error("Upstream returned {status} for {url}: {message}")]
    Status {
        /// The URL that was requested.
        url: String,
        /// HTTP status code.
        status: u16,
        /// Error message extracted from the body, or the status reason.
        message: String,
    },

    /// The response body could not be decoded.
    #[error("Malformed response from {url}: {message}")]
    Malformed {
        /// The URL that was requested.
        url: String,
        /// What went wrong while decoding.
        message: String,
    },

    /// Invalid configuration provided.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Whether the error came from the upstream refusing our credentials.
    #[must_use]
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }

    pub(crate) fn malformed(url: &str, message: impl Into<String>) -> Self {
        Error::Malformed {
            url: url.to_string(),
            message: message.into(),
        }
    }
}

impl From<ParseError> for Error {
    fn from(err: ParseError) -> Self {
        Error::InvalidConfig(err.to_string())
    }
}

/// Result type alias using solarsync-core's Error type.
pub type Result<T> = std::result::Result<T, Error>;
