//! The upstream metering API boundary.
//!
//! [`MeteringApi`] abstracts over the real HTTP client ([`crate::HttpClient`])
//! and the in-process fake ([`crate::MockApi`]) so the catalog resolver, the
//! chunked fetcher and the sync engine can be driven by either.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use solarsync_types::Device;

use crate::error::Result;

/// Bearer token returned by the login endpoint.
///
/// The value is never printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    /// Wrap a raw token.
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token, for building the `Authorization` header.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccessToken(<redacted>)")
    }
}

/// One sample as returned by the range endpoint, before normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    /// RFC 3339 sample time.
    pub date: String,
    /// Energy exported during the interval, in Wh.
    #[serde(rename = "exportedEnergy", alias = "eWh")]
    pub exported_wh: f64,
    /// Energy imported during the interval, in Wh.
    #[serde(rename = "importedEnergy", alias = "iWh")]
    pub imported_wh: f64,
}

impl RawSample {
    /// Create a sample.
    pub fn new(date: impl Into<String>, exported_wh: f64, imported_wh: f64) -> Self {
        Self {
            date: date.into(),
            exported_wh,
            imported_wh,
        }
    }
}

/// Operations the sync engine needs from the upstream service.
///
/// Every call is a single request; implementations must not retry.
///
/// # Example
///
/// ```ignore
/// use solarsync_core::{MeteringApi, Result};
///
/// async fn count_sensors<A: MeteringApi>(api: &A, site: &str) -> Result<usize> {
///     let token = api.login().await?;
///     Ok(api.list_sensors(&token, site).await?.len())
/// }
/// ```
#[async_trait]
pub trait MeteringApi: Send + Sync {
    /// Authenticate with the configured credentials.
    async fn login(&self) -> Result<AccessToken>;

    /// List every sensor registered under `site_id`, of any kind.
    async fn list_sensors(&self, token: &AccessToken, site_id: &str) -> Result<Vec<Device>>;

    /// Fetch samples for `device_id` in `[from, to)` at `interval` seconds.
    ///
    /// Callers keep `to - from` within one day; the order of the returned
    /// samples is unspecified.
    async fn sensor_range(
        &self,
        token: &AccessToken,
        device_id: &str,
        from: i64,
        to: i64,
        interval: u32,
    ) -> Result<Vec<RawSample>>;
}

#[async_trait]
impl<T: MeteringApi + ?Sized> MeteringApi for &T {
    async fn login(&self) -> Result<AccessToken> {
        (**self).login().await
    }

    async fn list_sensors(&self, token: &AccessToken, site_id: &str) -> Result<Vec<Device>> {
        (**self).list_sensors(token, site_id).await
    }

    async fn sensor_range(
        &self,
        token: &AccessToken,
        device_id: &str,
        from: i64,
        to: i64,
        interval: u32,
    ) -> Result<Vec<RawSample>> {
        (**self).sensor_range(token, device_id, from, to, interval).await
    }
}
