//! Local persistence for solarsync energy readings.
//!
//! This crate provides SQLite-based storage for the readings fetched from
//! the metering API, and the wide CSV export built from them.
//!
//! # Features
//!
//! - One row per `(device, timestamp)`; repeated writes are ignored
//! - Batched, transactional inserts
//! - Resume-point queries for incremental sync
//! - Query by device, site and time window
//! - Long-to-wide CSV export with one column pair per device
//!
//! # Example
//!
//! ```no_run
//! use std::collections::BTreeMap;
//!
//! use solarsync_store::Store;
//! use solarsync_types::Reading;
//! use solarsync_types::timestamp::naive_utc;
//!
//! let mut store = Store::open_default()?;
//! store.upsert_many(vec![Reading::new("site-1", "meter-a", 1_704_067_200, 5.0, 1.0)])?;
//!
//! let rows = store.export_csv(None, None, &BTreeMap::new(), &naive_utc, std::io::stdout())?;
//! println!("{} rows", rows);
//! # Ok::<(), solarsync_store::Error>(())
//! ```

mod error;
mod export;
mod models;
mod queries;
mod schema;
mod store;

pub use error::{Error, Result};
pub use export::{ExportHeader, ExportRow, LongRow, PivotRows};
pub use models::DeviceSummary;
pub use queries::ReadingQuery;
pub use store::{BATCH_SIZE, Store};

/// Default database path following platform conventions.
///
/// - Linux: `~/.local/share/solarsync/db.sqlite`
/// - macOS: `~/Library/Application Support/solarsync/db.sqlite`
/// - Windows: `C:\Users\<user>\AppData\Local\solarsync\db.sqlite`
pub fn default_db_path() -> std::path::PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("solarsync")
        .join("db.sqlite")
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;
    use solarsync_types::Reading;
    use std::collections::BTreeMap;

    proptest! {
        /// The resume point is the minimum over devices of their own maximum.
        #[test]
        fn latest_across_is_min_of_per_device_max(
            series in prop::collection::btree_map(
                "[a-e]",
                prop::collection::btree_set(0i64..10_000, 1..20),
                1..5,
            ),
            extra in prop::collection::vec("[v-z]", 0..3),
        ) {
            let mut store = Store::open_in_memory().unwrap();
            let readings = series.iter().flat_map(|(device, stamps)| {
                stamps.iter().map(move |ts| Reading::new("s", device.as_str(), *ts, 1.0, 0.0))
            });
            store.upsert_many(readings).unwrap();

            let expected = series
                .values()
                .filter_map(|stamps| stamps.iter().max().copied())
                .min();

            let mut ids: Vec<String> = series.keys().cloned().collect();
            ids.extend(extra);
            prop_assert_eq!(store.latest_timestamp_across(&ids).unwrap(), expected);

            ids.reverse();
            prop_assert_eq!(store.latest_timestamp_across(&ids).unwrap(), expected);
        }

        /// Every stored reading lands in exactly one export row and cell.
        #[test]
        fn export_row_count_matches_distinct_timestamps(
            series in prop::collection::btree_map(
                "[a-c]",
                prop::collection::btree_set(0i64..500, 0..30),
                0..4,
            ),
        ) {
            let mut store = Store::open_in_memory().unwrap();
            let readings = series.iter().flat_map(|(device, stamps)| {
                stamps.iter().map(move |ts| Reading::new("s", device.as_str(), *ts, 1.0, 0.0))
            });
            store.upsert_many(readings).unwrap();

            let distinct: std::collections::BTreeSet<i64> =
                series.values().flatten().copied().collect();

            let mut out = Vec::new();
            let rows = store
                .export_csv(None, None, &BTreeMap::new(), &|ts| ts.to_string(), &mut out)
                .unwrap();
            prop_assert_eq!(rows, distinct.len());

            let filled = String::from_utf8(out)
                .unwrap()
                .lines()
                .skip(1)
                .flat_map(|line| line.split(',').skip(1).map(str::to_string).collect::<Vec<_>>())
                .filter(|cell| !cell.is_empty())
                .count();
            let total: usize = series.values().map(|s| s.len()).sum();
            prop_assert_eq!(filled, 2 * total);
        }
    }
}
