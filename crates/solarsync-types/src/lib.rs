//! Shared types for solarsync.
//!
//! This crate holds the data model used by every other solarsync crate:
//! the persisted [`Reading`], the transient [`Device`] resolved from the
//! upstream catalog, the sampling [`Resolution`] and the half-open
//! [`SyncWindow`]. It also provides the [`timestamp`] helpers for the
//! formats the upstream API and the CSV export use.
//!
//! # Example
//!
//! ```
//! use solarsync_types::{Reading, Resolution, SyncWindow};
//!
//! let reading = Reading::new("site-1", "meter-a", 1_704_067_200, 12.5, 0.0);
//! let window = SyncWindow::new(Some(1_704_067_200), 1_704_153_600);
//!
//! assert!(window.contains(reading.timestamp));
//! assert_eq!(Resolution::default().as_secs(), 300);
//! ```

pub mod error;
pub mod timestamp;
pub mod types;

pub use error::{ParseError, ParseResult};
pub use types::{Device, DeviceKind, Reading, Resolution, SyncWindow};

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// Rounding is idempotent and moves a value by at most half a cent.
        #[test]
        fn round_to_cents_is_stable(value in -1.0e9f64..1.0e9f64) {
            let once = timestamp::round_to_cents(value);
            prop_assert_eq!(timestamp::round_to_cents(once), once);
            prop_assert!((once - value).abs() <= 0.005 + 1e-6);
        }

        /// Month starts never lie after the input and stay within 31 days.
        #[test]
        fn start_of_month_precedes_input(ts in 0i64..4_102_444_800i64) {
            let now = time::OffsetDateTime::from_unix_timestamp(ts).unwrap();
            let start = timestamp::start_of_month(now);
            prop_assert!(start <= ts);
            prop_assert!(ts - start < 31 * timestamp::SECONDS_PER_DAY);
        }
    }
}
