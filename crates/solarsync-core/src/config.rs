//! Upstream API configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use solarsync_types::Resolution;

/// Default upstream base URL.
pub const DEFAULT_API_URL: &str = "https://cloud.solar-manager.ch";

/// Default timeout applied to every upstream request, in seconds.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Settings for talking to the upstream metering API.
///
/// Passed by reference into the catalog resolver, the fetcher and the sync
/// engine; nothing mutates it after loading.
#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the API, without trailing slash.
    pub url: String,
    /// Login e-mail.
    pub email: String,
    /// Login password.
    pub password: String,
    /// Site (solar manager) ids whose sub-meters are synchronized.
    pub site_ids: Vec<String>,
    /// Sampling interval requested from the range endpoint.
    pub resolution: Resolution,
    /// Timeout for a single upstream request.
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_API_URL.to_string(),
            email: String::new(),
            password: String::new(),
            site_ids: Vec::new(),
            resolution: Resolution::default(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
        }
    }
}

// Keep the password out of logs.
impl std::fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiConfig")
            .field("url", &self.url)
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("site_ids", &self.site_ids)
            .field("resolution", &self.resolution)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl ApiConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Base URL with any trailing slash removed.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Validate the API configuration.
    ///
    /// Returns every problem found rather than stopping at the first one.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        let url = self.base_url();
        if url.is_empty() {
            errors.push(ValidationError::new("api.url", "API URL cannot be empty"));
        } else if !url.starts_with("http://") && !url.starts_with("https://") {
            errors.push(ValidationError::new(
                "api.url",
                format!("URL must start with http:// or https://, got: {}", url),
            ));
        }

        if self.email.trim().is_empty() {
            errors.push(ValidationError::new("api.email", "login e-mail cannot be empty"));
        }
        if self.password.is_empty() {
            errors.push(ValidationError::new(
                "api.password",
                "login password cannot be empty",
            ));
        }

        if self.site_ids.is_empty() {
            errors.push(ValidationError::new(
                "api.site_ids",
                "at least one site id is required",
            ));
        }
        for (i, id) in self.site_ids.iter().enumerate() {
            if id.trim().is_empty() {
                errors.push(ValidationError::new(
                    format!("api.site_ids[{}]", i),
                    "site id cannot be empty",
                ));
            }
        }

        if self.request_timeout_secs == 0 {
            errors.push(ValidationError::new(
                "api.request_timeout_secs",
                "request timeout must be at least 1 second",
            ));
        }

        errors
    }
}

/// A single validation error with context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// The field path (e.g., `api.url` or `api.site_ids[0]`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    /// Create a validation error for `field`.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}
