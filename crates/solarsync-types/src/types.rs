//! Core types for metered energy data.

use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::ParseError;

/// A single energy sample for one device, as persisted in the store.
///
/// `(device_id, timestamp)` identifies a reading; the store keeps at most one
/// row per key.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Reading {
    /// Site (solar manager installation) the device belongs to.
    pub site_id: String,
    /// Upstream sensor identifier.
    pub device_id: String,
    /// Sample time as unix seconds (UTC).
    pub timestamp: i64,
    /// Energy exported during the sample interval, in Wh.
    pub energy_exported_wh: f64,
    /// Energy imported during the sample interval, in Wh.
    pub energy_imported_wh: f64,
}

impl Reading {
    /// Create a reading.
    pub fn new(
        site_id: impl Into<String>,
        device_id: impl Into<String>,
        timestamp: i64,
        energy_exported_wh: f64,
        energy_imported_wh: f64,
    ) -> Self {
        Self {
            site_id: site_id.into(),
            device_id: device_id.into(),
            timestamp,
            energy_exported_wh,
            energy_imported_wh,
        }
    }
}

/// Role of a sensor within a site.
///
/// Only [`DeviceKind::SubMeter`] devices take part in synchronization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum DeviceKind {
    /// The site's main grid meter.
    PrimaryMeter,
    /// A meter measuring a single circuit or consumer.
    SubMeter,
    /// Anything else the site reports (inverters, batteries, heat pumps, ...).
    Other,
}

impl DeviceKind {
    /// Map the upstream `device_type` string to a kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use solarsync_types::DeviceKind;
    ///
    /// assert_eq!(DeviceKind::from_api("sub-meter"), DeviceKind::SubMeter);
    /// assert_eq!(DeviceKind::from_api("smart-meter"), DeviceKind::PrimaryMeter);
    /// assert_eq!(DeviceKind::from_api("inverter"), DeviceKind::Other);
    /// ```
    #[must_use]
    pub fn from_api(device_type: &str) -> Self {
        match device_type {
            "sub-meter" => DeviceKind::SubMeter,
            "smart-meter" | "primary-meter" => DeviceKind::PrimaryMeter,
            _ => DeviceKind::Other,
        }
    }

    /// Stable lowercase name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceKind::PrimaryMeter => "primary-meter",
            DeviceKind::SubMeter => "sub-meter",
            DeviceKind::Other => "other",
        }
    }
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A sensor as reported by the upstream catalog. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Device {
    /// Upstream sensor identifier.
    pub device_id: String,
    /// Site the sensor was listed under.
    pub site_id: String,
    /// Human-readable name configured upstream (may be empty).
    pub display_name: String,
    /// Role of the sensor.
    pub kind: DeviceKind,
}

impl Device {
    /// Whether this device participates in sync.
    #[must_use]
    pub fn is_sub_meter(&self) -> bool {
        self.kind == DeviceKind::SubMeter
    }
}

/// Sampling interval supported by the upstream range endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "u32", into = "u32"))]
#[repr(u32)]
pub enum Resolution {
    /// 10 second samples. Produces large databases quickly.
    TenSeconds = 10,
    /// 5 minute samples.
    #[default]
    FiveMinutes = 300,
    /// 15 minute samples.
    FifteenMinutes = 900,
}

impl Resolution {
    /// Interval length in seconds.
    #[must_use]
    pub fn as_secs(self) -> u32 {
        self as u32
    }
}

impl TryFrom<u32> for Resolution {
    type Error = ParseError;

    /// Convert a number of seconds to a `Resolution`.
    ///
    /// # Examples
    ///
    /// ```
    /// use solarsync_types::Resolution;
    ///
    /// assert_eq!(Resolution::try_from(300), Ok(Resolution::FiveMinutes));
    /// assert!(Resolution::try_from(60).is_err());
    /// ```
    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            10 => Ok(Resolution::TenSeconds),
            300 => Ok(Resolution::FiveMinutes),
            900 => Ok(Resolution::FifteenMinutes),
            _ => Err(ParseError::InvalidResolution(value)),
        }
    }
}

impl From<Resolution> for u32 {
    fn from(value: Resolution) -> Self {
        value.as_secs()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}s", self.as_secs())
    }
}

/// Half-open time range `[from, to)` in unix seconds.
///
/// `from` is optional: when absent the sync engine derives a resume point
/// from the store instead of starting at the epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncWindow {
    /// Inclusive start.
    pub from: Option<i64>,
    /// Exclusive end.
    pub to: i64,
}

impl SyncWindow {
    /// Create a window.
    #[must_use]
    pub fn new(from: Option<i64>, to: i64) -> Self {
        Self { from, to }
    }

    /// Window ending at the current time.
    #[must_use]
    pub fn until_now(from: Option<i64>) -> Self {
        Self::new(from, time::OffsetDateTime::now_utc().unix_timestamp())
    }

    /// Whether `timestamp` falls inside the window.
    #[must_use]
    pub fn contains(&self, timestamp: i64) -> bool {
        self.from.is_none_or(|from| timestamp >= from) && timestamp < self.to
    }
}
