//! Main store implementation.

use std::path::Path;

use rusqlite::{Connection, params, params_from_iter};
use tracing::{debug, info};

use solarsync_types::Reading;

use crate::error::{Error, Result};
use crate::models::DeviceSummary;
use crate::queries::ReadingQuery;
use crate::schema;

/// Rows written per transaction by [`Store::upsert_many`].
pub const BATCH_SIZE: usize = 1000;

const INSERT_READING: &str = "INSERT INTO readings \
     (site_id, device_id, timestamp, energy_exported_wh, energy_imported_wh) \
     VALUES (?1, ?2, ?3, ?4, ?5) \
     ON CONFLICT(device_id, timestamp) DO NOTHING";

/// SQLite-based store for energy readings.
///
/// The connection is not shareable between threads; callers that need
/// concurrent access wrap the store in a mutex.
pub struct Store {
    pub(crate) conn: Connection,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("path", &self.conn.path())
            .finish()
    }
}

impl Store {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
            && !parent.exists()
        {
            std::fs::create_dir_all(parent).map_err(|e| Error::CreateDirectory {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        info!("Opening database at {}", path.display());
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;

        let store = Self { conn };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Open the default database location.
    pub fn open_default() -> Result<Self> {
        Self::open(crate::default_db_path())
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Connection::open_in_memory()?,
        };
        store.ensure_schema()?;
        Ok(store)
    }

    /// Create the table, its uniqueness constraint and indexes if missing.
    pub fn ensure_schema(&self) -> Result<()> {
        schema::initialize(&self.conn)
    }
}

// Write path
impl Store {
    /// Insert one batch in a single transaction, ignoring duplicates.
    ///
    /// Returns how many rows were actually written. On error nothing from
    /// this batch is kept.
    pub fn insert_batch(&mut self, readings: &[Reading]) -> Result<usize> {
        if readings.is_empty() {
            return Ok(0);
        }

        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(INSERT_READING)?;
            for reading in readings {
                inserted += stmt.execute(params![
                    reading.site_id,
                    reading.device_id,
                    reading.timestamp,
                    reading.energy_exported_wh,
                    reading.energy_imported_wh,
                ])?;
            }
        }
        tx.commit()?;

        debug!(
            "Committed batch: {} of {} readings new",
            inserted,
            readings.len()
        );
        Ok(inserted)
    }

    /// Write readings in transactions of [`BATCH_SIZE`] rows.
    ///
    /// Batches committed before an error stay committed.
    pub fn upsert_many<I>(&mut self, readings: I) -> Result<usize>
    where
        I: IntoIterator<Item = Reading>,
    {
        let mut inserted = 0;
        let mut batch = Vec::with_capacity(BATCH_SIZE);

        for reading in readings {
            batch.push(reading);
            if batch.len() == BATCH_SIZE {
                inserted += self.insert_batch(&batch)?;
                batch.clear();
            }
        }
        inserted += self.insert_batch(&batch)?;

        Ok(inserted)
    }
}

// Read path
impl Store {
    /// The "oldest of the newest": each listed device's latest timestamp,
    /// then the minimum of those.
    ///
    /// Devices without rows do not participate. Returns `None` for an empty
    /// list or when none of the devices has data.
    pub fn latest_timestamp_across<S: AsRef<str>>(&self, device_ids: &[S]) -> Result<Option<i64>> {
        if device_ids.is_empty() {
            return Ok(None);
        }

        let placeholders = vec!["?"; device_ids.len()].join(", ");
        let sql = format!(
            "SELECT MIN(latest) FROM (
                SELECT MAX(timestamp) AS latest FROM readings
                WHERE device_id IN ({})
                GROUP BY device_id
             )",
            placeholders
        );

        let latest: Option<i64> = self.conn.query_row(
            &sql,
            params_from_iter(device_ids.iter().map(AsRef::as_ref)),
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    /// Newest timestamp across all rows.
    pub fn global_latest_timestamp(&self) -> Result<Option<i64>> {
        let latest: Option<i64> =
            self.conn
                .query_row("SELECT MAX(timestamp) FROM readings", [], |row| row.get(0))?;
        Ok(latest)
    }

    /// Count readings, optionally for one device.
    pub fn count_readings(&self, device_id: Option<&str>) -> Result<u64> {
        let count: i64 = match device_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM readings WHERE device_id = ?",
                [id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM readings", [], |row| row.get(0))?,
        };

        Ok(count as u64)
    }

    /// Row count and time span per stored device, ordered by device id.
    pub fn device_summaries(&self) -> Result<Vec<DeviceSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT device_id, MAX(site_id), COUNT(*), MIN(timestamp), MAX(timestamp)
             FROM readings GROUP BY device_id ORDER BY device_id",
        )?;

        let summaries = stmt
            .query_map([], |row| {
                Ok(DeviceSummary {
                    device_id: row.get(0)?,
                    site_id: row.get(1)?,
                    count: row.get::<_, i64>(2)? as u64,
                    first_timestamp: row.get(3)?,
                    last_timestamp: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(summaries)
    }

    /// Query readings with filters.
    pub fn query_readings(&self, query: &ReadingQuery) -> Result<Vec<Reading>> {
        let sql = query.build_sql();
        let (_, params) = query.build_where();

        debug!("Executing query: {}", sql);

        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let mut stmt = self.conn.prepare(&sql)?;
        let readings = stmt
            .query_map(params_ref.as_slice(), |row| {
                Ok(Reading {
                    site_id: row.get(0)?,
                    device_id: row.get(1)?,
                    timestamp: row.get(2)?,
                    energy_exported_wh: row.get(3)?,
                    energy_imported_wh: row.get(4)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(device: &str, ts: i64) -> Reading {
        Reading::new("site", device, ts, 1.0, 0.5)
    }

    #[test]
    fn test_open_in_memory() {
        let store = Store::open_in_memory().unwrap();
        assert_eq!(store.count_readings(None).unwrap(), 0);
        assert_eq!(store.global_latest_timestamp().unwrap(), None);
    }

    #[test]
    fn test_open_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("db.sqlite");

        let store = Store::open(&path).unwrap();
        assert!(path.exists());
        drop(store);

        // Reopening keeps the schema and data
        let mut store = Store::open(&path).unwrap();
        store.insert_batch(&[reading("a", 0)]).unwrap();
        drop(store);
        let store = Store::open(&path).unwrap();
        assert_eq!(store.count_readings(None).unwrap(), 1);
    }

    #[test]
    fn test_insert_batch_ignores_duplicates() {
        let mut store = Store::open_in_memory().unwrap();

        let batch = vec![reading("a", 0), reading("a", 300), reading("a", 0)];
        assert_eq!(store.insert_batch(&batch).unwrap(), 2);
        assert_eq!(store.insert_batch(&batch).unwrap(), 0);
        assert_eq!(store.count_readings(Some("a")).unwrap(), 2);
    }

    #[test]
    fn test_duplicate_keeps_first_values() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .insert_batch(&[Reading::new("s", "a", 0, 1.0, 0.0)])
            .unwrap();
        store
            .insert_batch(&[Reading::new("s", "a", 0, 9.0, 9.0)])
            .unwrap();

        let rows = store.query_readings(&ReadingQuery::new()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].energy_exported_wh, 1.0);
    }

    #[test]
    fn test_upsert_many_batches() {
        let mut store = Store::open_in_memory().unwrap();
        let readings = (0..2500).map(|i| reading("a", i * 10));

        assert_eq!(store.upsert_many(readings).unwrap(), 2500);
        assert_eq!(store.count_readings(None).unwrap(), 2500);

        // A second pass writes nothing
        let again = (0..2500).map(|i| reading("a", i * 10));
        assert_eq!(store.upsert_many(again).unwrap(), 0);
    }

    #[test]
    fn test_upsert_many_empty() {
        let mut store = Store::open_in_memory().unwrap();
        assert_eq!(store.upsert_many(Vec::new()).unwrap(), 0);
    }

    #[test]
    fn test_latest_timestamp_across_is_min_of_max() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many(vec![
                reading("a", 50),
                reading("a", 100),
                reading("b", 150),
                reading("b", 200),
            ])
            .unwrap();

        assert_eq!(store.latest_timestamp_across(&["a", "b"]).unwrap(), Some(100));
        assert_eq!(store.latest_timestamp_across(&["b", "a"]).unwrap(), Some(100));
        assert_eq!(store.latest_timestamp_across(&["b"]).unwrap(), Some(200));
    }

    #[test]
    fn test_latest_timestamp_across_ignores_devices_without_rows() {
        let mut store = Store::open_in_memory().unwrap();
        store.upsert_many(vec![reading("a", 100)]).unwrap();

        assert_eq!(
            store.latest_timestamp_across(&["a", "new-device"]).unwrap(),
            Some(100)
        );
        assert_eq!(store.latest_timestamp_across(&["new-device"]).unwrap(), None);
        assert_eq!(store.latest_timestamp_across::<&str>(&[]).unwrap(), None);
    }

    #[test]
    fn test_global_latest_timestamp() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many(vec![reading("a", 100), reading("b", 200)])
            .unwrap();
        assert_eq!(store.global_latest_timestamp().unwrap(), Some(200));
    }

    #[test]
    fn test_device_summaries() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many(vec![
                Reading::new("s2", "b", 300, 0.0, 0.0),
                Reading::new("s1", "a", 0, 0.0, 0.0),
                Reading::new("s1", "a", 600, 0.0, 0.0),
            ])
            .unwrap();

        let summaries = store.device_summaries().unwrap();
        assert_eq!(
            summaries,
            vec![
                DeviceSummary {
                    device_id: "a".to_string(),
                    site_id: "s1".to_string(),
                    count: 2,
                    first_timestamp: 0,
                    last_timestamp: 600,
                },
                DeviceSummary {
                    device_id: "b".to_string(),
                    site_id: "s2".to_string(),
                    count: 1,
                    first_timestamp: 300,
                    last_timestamp: 300,
                },
            ]
        );
    }

    #[test]
    fn test_query_readings_window_and_order() {
        let mut store = Store::open_in_memory().unwrap();
        store
            .upsert_many((0..10).map(|i| reading("a", i * 100)))
            .unwrap();
        store.upsert_many(vec![reading("b", 300)]).unwrap();

        let rows = store
            .query_readings(&ReadingQuery::new().device("a").since(200).until(500).oldest_first())
            .unwrap();
        let stamps: Vec<i64> = rows.iter().map(|r| r.timestamp).collect();
        assert_eq!(stamps, vec![200, 300, 400]);

        let newest = store.query_readings(&ReadingQuery::new().limit(1)).unwrap();
        assert_eq!(newest[0].timestamp, 900);
    }
}
