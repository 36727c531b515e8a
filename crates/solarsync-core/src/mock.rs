//! In-process fake of the upstream metering API for testing.
//!
//! [`MockApi`] implements [`MeteringApi`] so the catalog, the fetcher and
//! the sync engine can be exercised without network access.
//!
//! # Features
//!
//! - **Call recording**: every login, sensor listing and range request is logged
//! - **Failure injection**: reject logins, or fail range requests after N calls
//! - **Upstream quirks**: range responses include the closing boundary sample
//!   and can be returned newest-first

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use solarsync_types::timestamp::api_timestamp;
use solarsync_types::{Device, DeviceKind};

use crate::api::{AccessToken, MeteringApi, RawSample};
use crate::error::{Error, Result};

const MOCK_TOKEN: &str = "mock-access-token";
const MOCK_URL: &str = "mock://solar-manager";

/// A recorded call to [`MeteringApi::sensor_range`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeCall {
    pub device_id: String,
    pub from: i64,
    pub to: i64,
    pub interval: u32,
}

#[derive(Default)]
struct MockState {
    sensors: BTreeMap<String, Vec<Device>>,
    samples: HashMap<String, BTreeMap<i64, (f64, f64)>>,
    newest_first: bool,
    login_failure: Option<String>,
    range_failure: Option<(usize, String)>,
    login_count: usize,
    list_calls: Vec<String>,
    range_calls: Vec<RangeCall>,
}

/// A fake upstream API.
///
/// # Example
///
/// ```
/// use solarsync_core::{MeteringApi, MockApi};
/// use solarsync_types::DeviceKind;
///
/// #[tokio::main]
/// async fn main() {
///     let api = MockApi::new();
///     api.add_sensor("site-1", "meter-a", "Heat pump", DeviceKind::SubMeter);
///     api.add_regular_samples("meter-a", 0, 3600, 300, 1.0, 0.0);
///
///     let token = api.login().await.unwrap();
///     let samples = api.sensor_range(&token, "meter-a", 0, 900, 300).await.unwrap();
///     assert_eq!(samples.len(), 4); // the boundary sample at 900 is included
/// }
/// ```
#[derive(Default)]
pub struct MockApi {
    state: Mutex<MockState>,
}

impl std::fmt::Debug for MockApi {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("MockApi")
            .field("sites", &state.sensors.len())
            .field("devices_with_samples", &state.samples.len())
            .field("login_count", &state.login_count)
            .finish()
    }
}

impl MockApi {
    /// Create an empty mock with no sites and no data.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Register a sensor under `site_id`.
    pub fn add_sensor(&self, site_id: &str, device_id: &str, name: &str, kind: DeviceKind) {
        self.lock()
            .sensors
            .entry(site_id.to_string())
            .or_default()
            .push(Device {
                device_id: device_id.to_string(),
                site_id: site_id.to_string(),
                display_name: name.to_string(),
                kind,
            });
    }

    /// Store one sample for `device_id`, replacing any at the same timestamp.
    pub fn add_sample(&self, device_id: &str, timestamp: i64, exported_wh: f64, imported_wh: f64) {
        self.lock()
            .samples
            .entry(device_id.to_string())
            .or_default()
            .insert(timestamp, (exported_wh, imported_wh));
    }

    /// Store a sample every `step` seconds in `[from, to)`.
    pub fn add_regular_samples(
        &self,
        device_id: &str,
        from: i64,
        to: i64,
        step: i64,
        exported_wh: f64,
        imported_wh: f64,
    ) {
        let mut state = self.lock();
        let series = state.samples.entry(device_id.to_string()).or_default();
        let mut ts = from;
        while ts < to {
            series.insert(ts, (exported_wh, imported_wh));
            ts += step;
        }
    }

    /// Return range responses newest-first.
    pub fn set_newest_first(&self, newest_first: bool) {
        self.lock().newest_first = newest_first;
    }

    /// Make every login fail with an authentication error.
    pub fn fail_login(&self, message: &str) {
        self.lock().login_failure = Some(message.to_string());
    }

    /// Let `successes` range calls through, then fail every later one with a 500.
    pub fn fail_range_after(&self, successes: usize, message: &str) {
        self.lock().range_failure = Some((successes, message.to_string()));
    }

    /// Clear all injected failures.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.login_failure = None;
        state.range_failure = None;
    }

    /// Number of login calls made so far.
    pub fn login_count(&self) -> usize {
        self.lock().login_count
    }

    /// Site ids passed to `list_sensors`, in call order.
    pub fn list_sensor_calls(&self) -> Vec<String> {
        self.lock().list_calls.clone()
    }

    /// Range requests made so far, in call order.
    pub fn range_calls(&self) -> Vec<RangeCall> {
        self.lock().range_calls.clone()
    }

    /// Forget all recorded calls.
    pub fn reset_calls(&self) {
        let mut state = self.lock();
        state.login_count = 0;
        state.list_calls.clear();
        state.range_calls.clear();
    }
}

fn check_token(token: &AccessToken) -> Result<()> {
    if token.as_str() == MOCK_TOKEN {
        Ok(())
    } else {
        Err(Error::Status {
            url: MOCK_URL.to_string(),
            status: 401,
            message: "invalid token".to_string(),
        })
    }
}

#[async_trait]
impl MeteringApi for MockApi {
    async fn login(&self) -> Result<AccessToken> {
        let mut state = self.lock();
        state.login_count += 1;
        match &state.login_failure {
            Some(message) => Err(Error::Auth(message.clone())),
            None => Ok(AccessToken::new(MOCK_TOKEN)),
        }
    }

    async fn list_sensors(&self, token: &AccessToken, site_id: &str) -> Result<Vec<Device>> {
        check_token(token)?;
        let mut state = self.lock();
        state.list_calls.push(site_id.to_string());
        Ok(state.sensors.get(site_id).cloned().unwrap_or_default())
    }

    async fn sensor_range(
        &self,
        token: &AccessToken,
        device_id: &str,
        from: i64,
        to: i64,
        interval: u32,
    ) -> Result<Vec<RawSample>> {
        check_token(token)?;
        let mut state = self.lock();
        let served = state.range_calls.len();
        state.range_calls.push(RangeCall {
            device_id: device_id.to_string(),
            from,
            to,
            interval,
        });

        if let Some((successes, message)) = &state.range_failure
            && served >= *successes
        {
            return Err(Error::Status {
                url: format!("{}/v1/data/sensor/{}/range", MOCK_URL, device_id),
                status: 500,
                message: message.clone(),
            });
        }

        // Like the real service, the closing boundary is inclusive.
        let mut samples = match state.samples.get(device_id) {
            Some(series) => series
                .range(from..=to)
                .map(|(ts, (exported, imported))| -> Result<RawSample> {
                    Ok(RawSample::new(api_timestamp(*ts)?, *exported, *imported))
                })
                .collect::<Result<Vec<_>>>()?,
            None => Vec::new(),
        };
        if state.newest_first {
            samples.reverse();
        }
        Ok(samples)
    }
}
