//! Incremental synchronization from the upstream API into the local store.
//!
//! A sync resolves the active sub-meters, works out where to start, and then
//! streams every device's readings through the chunked fetcher into the
//! store in transactions of [`BATCH_SIZE`] rows. Writes are idempotent, so a
//! sync that overlaps data already stored only adds what is missing.

use std::time::Instant;

use futures::TryStreamExt;
use serde::{Deserialize, Serialize};
use time::{OffsetDateTime, UtcOffset};
use tracing::{debug, info};

use solarsync_core::{ApiConfig, ChunkedFetcher, DeviceCatalog, MeteringApi};
use solarsync_store::{BATCH_SIZE, Store};
use solarsync_types::Reading;
use solarsync_types::timestamp::start_of_month;

/// Errors that abort a sync.
///
/// Batches committed before the error stay in the store.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("Upstream error: {0}")]
    Upstream(#[from] solarsync_core::Error),
    #[error("Storage error: {0}")]
    Store(#[from] solarsync_store::Error),
}

/// Outcome of a successful sync.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Inclusive start actually used (unix seconds).
    pub from: i64,
    /// Exclusive end (unix seconds).
    pub to: i64,
    /// Whether `from` was derived from the store rather than given.
    pub resumed: bool,
    /// Number of sub-meters synchronized.
    pub devices: usize,
    /// Readings received from upstream after normalization.
    pub fetched: usize,
    /// Readings that were new to the store.
    pub inserted: usize,
    /// Transactions committed.
    pub batches: usize,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: u64,
}

/// Where a sync without an explicit start begins.
///
/// The oldest of the devices' latest stored timestamps, so no device is left
/// with a gap. Without any stored data for these devices, midnight UTC of the
/// first day of `now`'s month.
pub fn resume_point<S: AsRef<str>>(
    store: &Store,
    device_ids: &[S],
    now: OffsetDateTime,
) -> Result<i64, solarsync_store::Error> {
    Ok(store
        .latest_timestamp_across(device_ids)?
        .unwrap_or_else(|| start_of_month(now.to_offset(UtcOffset::UTC))))
}

/// Drives the catalog, the fetcher and the store.
pub struct SyncEngine<'a, A: ?Sized> {
    api: &'a A,
    config: &'a ApiConfig,
}

impl<'a, A: MeteringApi + ?Sized> SyncEngine<'a, A> {
    /// Create an engine for the sites and resolution in `config`.
    pub fn new(api: &'a A, config: &'a ApiConfig) -> Self {
        Self { api, config }
    }

    /// Synchronize `[from, to)`; see [`SyncEngine::sync_at`].
    pub async fn sync(
        &self,
        store: &mut Store,
        from: Option<i64>,
        to: i64,
    ) -> Result<SyncReport, SyncError> {
        self.sync_at(store, from, to, OffsetDateTime::now_utc()).await
    }

    /// Synchronize `[from, to)` into `store`, treating `now` as the current time.
    ///
    /// Without `from` the start is the [`resume_point`] of the active devices.
    /// The first error aborts the whole sync.
    pub async fn sync_at(
        &self,
        store: &mut Store,
        from: Option<i64>,
        to: i64,
        now: OffsetDateTime,
    ) -> Result<SyncReport, SyncError> {
        let started = Instant::now();

        let (token, devices) = DeviceCatalog::new(self.api, self.config)
            .sub_meters()
            .await?;

        let resumed = from.is_none();
        let from = match from {
            Some(from) => from,
            None => {
                let ids: Vec<&str> = devices.iter().map(|d| d.device_id.as_str()).collect();
                resume_point(store, &ids, now)?
            }
        };

        let mut report = SyncReport {
            from,
            to,
            resumed,
            devices: devices.len(),
            ..Default::default()
        };

        if from >= to {
            info!("Nothing to sync: start {} is not before end {}", from, to);
            report.elapsed_ms = elapsed_ms(started);
            return Ok(report);
        }

        info!(
            "Syncing {} device(s) from {} to {} at {}",
            devices.len(),
            from,
            to,
            self.config.resolution
        );

        let fetcher = ChunkedFetcher::new(self.api, &token);
        let interval = self.config.resolution.as_secs();
        let mut batch: Vec<Reading> = Vec::with_capacity(BATCH_SIZE);

        for device in &devices {
            debug!("Fetching {} ({})", device.device_id, device.display_name);
            let mut readings =
                fetcher.fetch(&device.device_id, &device.site_id, from, to, interval);
            let mut device_count = 0;

            while let Some(reading) = readings.try_next().await? {
                batch.push(reading);
                device_count += 1;
                if batch.len() == BATCH_SIZE {
                    report.inserted += store.insert_batch(&batch)?;
                    report.batches += 1;
                    batch.clear();
                }
            }

            report.fetched += device_count;
            debug!("{} readings for {}", device_count, device.device_id);
        }

        if !batch.is_empty() {
            report.inserted += store.insert_batch(&batch)?;
            report.batches += 1;
        }

        report.elapsed_ms = elapsed_ms(started);
        info!(
            "Sync finished: {} fetched, {} new, {} batch(es) in {} ms",
            report.fetched, report.inserted, report.batches, report.elapsed_ms
        );
        Ok(report)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use solarsync_core::MockApi;
    use solarsync_types::DeviceKind;
    use time::macros::datetime;

    const DAY: i64 = 86_400;
    const JAN_1: i64 = 1_704_067_200;

    fn config() -> ApiConfig {
        ApiConfig {
            site_ids: vec!["site-1".to_string()],
            ..Default::default()
        }
    }

    fn api_with(devices: &[&str], from: i64, to: i64) -> MockApi {
        let api = MockApi::new();
        for id in devices {
            api.add_sensor("site-1", id, &id.to_uppercase(), DeviceKind::SubMeter);
            api.add_regular_samples(id, from, to, 300, 2.5, 0.25);
        }
        api.add_sensor("site-1", "grid", "Grid", DeviceKind::PrimaryMeter);
        api.add_regular_samples("grid", from, to, 300, 9.0, 9.0);
        api
    }

    #[tokio::test]
    async fn test_sync_writes_sub_meters_only() {
        let api = api_with(&["a", "b"], JAN_1, JAN_1 + DAY);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();

        let report = SyncEngine::new(&api, &config)
            .sync(&mut store, Some(JAN_1), JAN_1 + DAY)
            .await
            .unwrap();

        assert_eq!(report.devices, 2);
        assert_eq!(report.fetched, 576);
        assert_eq!(report.inserted, 576);
        assert_eq!(report.batches, 1);
        assert!(!report.resumed);
        assert_eq!(store.count_readings(Some("grid")).unwrap(), 0);
        assert!(api.range_calls().iter().all(|c| c.device_id != "grid"));
        assert!(api.range_calls().iter().all(|c| c.interval == 300));
        assert_eq!(api.login_count(), 1);
    }

    #[tokio::test]
    async fn test_sync_is_idempotent() {
        let api = api_with(&["a", "b"], JAN_1, JAN_1 + DAY);
        let config = config();
        let engine = SyncEngine::new(&api, &config);
        let mut store = Store::open_in_memory().unwrap();

        engine
            .sync(&mut store, Some(JAN_1), JAN_1 + DAY)
            .await
            .unwrap();
        let count = store.count_readings(None).unwrap();

        let second = engine
            .sync(&mut store, Some(JAN_1), JAN_1 + DAY)
            .await
            .unwrap();

        assert_eq!(second.fetched, 576);
        assert_eq!(second.inserted, 0);
        assert_eq!(store.count_readings(None).unwrap(), count);
    }

    #[tokio::test]
    async fn test_resume_from_oldest_latest() {
        let api = api_with(&["a", "b"], 0, 1_000);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many(vec![
                Reading::new("site-1", "a", 100, 1.0, 0.0),
                Reading::new("site-1", "b", 200, 1.0, 0.0),
            ])
            .unwrap();

        let report = SyncEngine::new(&api, &config)
            .sync(&mut store, None, 1_000)
            .await
            .unwrap();

        assert!(report.resumed);
        assert_eq!(report.from, 100);
        assert!(api.range_calls().iter().all(|c| c.from == 100));
        // The stored row plus upstream samples at 300, 600 and 900
        assert_eq!(store.count_readings(Some("a")).unwrap(), 4);
        assert_eq!(store.count_readings(Some("b")).unwrap(), 4);
    }

    #[test]
    fn test_resume_point_ignores_unlisted_devices() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many(vec![
                Reading::new("s", "a", 100, 1.0, 0.0),
                Reading::new("s", "b", 200, 1.0, 0.0),
                Reading::new("s", "retired", 50, 1.0, 0.0),
            ])
            .unwrap();
        let now = datetime!(2024-03-15 12:00 UTC);

        for ids in [["a", "b"], ["b", "a"]] {
            assert_eq!(resume_point(&store, &ids, now).unwrap(), 100);
        }
        // A device without rows does not pull the resume point back
        assert_eq!(resume_point(&store, &["b", "new"], now).unwrap(), 200);
    }

    #[tokio::test]
    async fn test_resume_falls_back_to_month_start() {
        let api = api_with(&["a"], 0, 0);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();
        let now = datetime!(2024-03-15 12:34:56 UTC);
        let march_1 = datetime!(2024-03-01 00:00 UTC).unix_timestamp();

        let report = SyncEngine::new(&api, &config)
            .sync_at(&mut store, None, now.unix_timestamp(), now)
            .await
            .unwrap();

        assert_eq!(report.from, march_1);
        assert_eq!(api.range_calls()[0].from, march_1);
    }

    #[tokio::test]
    async fn test_month_start_is_utc() {
        let api = api_with(&["a"], 0, 0);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();
        // Already April in UTC+2, still March in UTC
        let now = datetime!(2024-04-01 01:00 +02:00);

        let report = SyncEngine::new(&api, &config)
            .sync_at(&mut store, None, now.unix_timestamp(), now)
            .await
            .unwrap();

        assert_eq!(report.from, datetime!(2024-03-01 00:00 UTC).unix_timestamp());
    }

    #[tokio::test]
    async fn test_to_is_exclusive() {
        let api = api_with(&["a"], 0, 3_600);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();

        SyncEngine::new(&api, &config)
            .sync(&mut store, Some(0), 900)
            .await
            .unwrap();

        assert_eq!(store.count_readings(None).unwrap(), 3);
        assert_eq!(store.global_latest_timestamp().unwrap(), Some(600));
    }

    #[tokio::test]
    async fn test_empty_window_makes_no_range_calls() {
        let api = api_with(&["a"], 0, 3_600);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();

        let report = SyncEngine::new(&api, &config)
            .sync(&mut store, Some(900), 900)
            .await
            .unwrap();

        assert_eq!(report.fetched, 0);
        assert_eq!(report.batches, 0);
        assert!(api.range_calls().is_empty());
    }

    #[tokio::test]
    async fn test_failure_keeps_committed_batches() {
        // One device, five days of five-minute samples: 288 per day
        let api = api_with(&["a"], JAN_1, JAN_1 + 5 * DAY);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();
        api.fail_range_after(4, "upstream unavailable");

        let err = SyncEngine::new(&api, &config)
            .sync(&mut store, Some(JAN_1), JAN_1 + 5 * DAY)
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            SyncError::Upstream(solarsync_core::Error::Status { status: 500, .. })
        ));
        // 4 * 288 = 1152 fetched; only the first full batch was committed
        assert_eq!(store.count_readings(None).unwrap(), BATCH_SIZE as u64);
    }

    #[tokio::test]
    async fn test_auth_failure_writes_nothing() {
        let api = api_with(&["a"], JAN_1, JAN_1 + DAY);
        api.fail_login("invalid credentials");
        let config = config();
        let mut store = Store::open_in_memory().unwrap();

        let err = SyncEngine::new(&api, &config)
            .sync(&mut store, Some(JAN_1), JAN_1 + DAY)
            .await
            .unwrap_err();

        assert!(matches!(err, SyncError::Upstream(ref e) if e.is_auth()));
        assert!(err.to_string().contains("invalid credentials"));
        assert_eq!(store.count_readings(None).unwrap(), 0);
    }

    #[tokio::test]
    async fn test_no_sub_meters() {
        let api = MockApi::new();
        api.add_sensor("site-1", "grid", "Grid", DeviceKind::PrimaryMeter);
        let config = config();
        let mut store = Store::open_in_memory().unwrap();

        let report = SyncEngine::new(&api, &config)
            .sync(&mut store, Some(0), DAY)
            .await
            .unwrap();

        assert_eq!(report.devices, 0);
        assert_eq!(report.inserted, 0);
        assert!(api.range_calls().is_empty());
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;
        use solarsync_types::Reading;

        proptest! {
            /// The resume point is the oldest of the per-device newest
            /// readings; devices without data do not hold it back.
            #[test]
            fn resume_point_is_min_of_latest(
                latest in proptest::collection::vec(
                    proptest::option::of(JAN_1..JAN_1 + 30 * DAY),
                    1..6,
                ),
            ) {
                let mut store = Store::open_in_memory().unwrap();
                let ids: Vec<String> = (0..latest.len()).map(|i| format!("dev-{}", i)).collect();
                let readings = ids.iter().zip(&latest).flat_map(|(id, ts)| {
                    ts.into_iter()
                        .flat_map(move |ts| [ts - 300, *ts])
                        .map(move |ts| Reading::new("site-1", id.as_str(), ts, 1.0, 0.0))
                });
                store.upsert_many(readings.collect::<Vec<_>>()).unwrap();

                let now = datetime!(2024-06-15 12:00 UTC);
                let resume = resume_point(&store, &ids, now).unwrap();
                let expected = latest
                    .iter()
                    .flatten()
                    .min()
                    .copied()
                    .unwrap_or(datetime!(2024-06-01 00:00 UTC).unix_timestamp());
                prop_assert_eq!(resume, expected);
            }
        }
    }
}
