//! Aggregate views over stored readings.

use serde::{Deserialize, Serialize};

/// Per-device totals over everything stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSummary {
    /// Device identifier.
    pub device_id: String,
    /// Site the device's readings were fetched under.
    pub site_id: String,
    /// Number of stored readings.
    pub count: u64,
    /// Oldest stored timestamp (unix seconds).
    pub first_timestamp: i64,
    /// Newest stored timestamp (unix seconds).
    pub last_timestamp: i64,
}
