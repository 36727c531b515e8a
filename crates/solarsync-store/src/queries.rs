//! Query builder for stored readings.
//!
//! # Example
//!
//! ```
//! use solarsync_store::{ReadingQuery, Store};
//!
//! let store = Store::open_in_memory()?;
//!
//! // One day of a single meter, in chronological order
//! let query = ReadingQuery::new()
//!     .device("meter-a")
//!     .since(1_704_067_200)
//!     .until(1_704_153_600)
//!     .oldest_first();
//!
//! let readings = store.query_readings(&query)?;
//! assert!(readings.is_empty());
//! # Ok::<(), solarsync_store::Error>(())
//! ```

/// Fluent query builder for [`Store::query_readings`](crate::Store::query_readings).
///
/// Time bounds form the half-open window `[since, until)`. By default results
/// are ordered newest first.
#[derive(Debug, Default, Clone)]
pub struct ReadingQuery {
    /// Filter by device ID.
    pub device_id: Option<String>,
    /// Filter by site ID.
    pub site_id: Option<String>,
    /// Inclusive lower bound (unix seconds).
    pub since: Option<i64>,
    /// Exclusive upper bound (unix seconds).
    pub until: Option<i64>,
    /// Maximum number of results.
    pub limit: Option<u32>,
    /// Order by timestamp descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create a new query: all devices, no bounds, no limit, newest first.
    pub fn new() -> Self {
        Self {
            newest_first: true,
            ..Default::default()
        }
    }

    /// Only include readings from the specified device.
    pub fn device(mut self, device_id: &str) -> Self {
        self.device_id = Some(device_id.to_string());
        self
    }

    /// Only include readings from the specified site.
    pub fn site(mut self, site_id: &str) -> Self {
        self.site_id = Some(site_id.to_string());
        self
    }

    /// Readings at or after `timestamp`.
    pub fn since(mut self, timestamp: i64) -> Self {
        self.since = Some(timestamp);
        self
    }

    /// Readings strictly before `timestamp`.
    pub fn until(mut self, timestamp: i64) -> Self {
        self.until = Some(timestamp);
        self
    }

    /// Limit the maximum number of results returned.
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Order results chronologically.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Build the SQL WHERE clause and parameters.
    pub(crate) fn build_where(&self) -> (String, Vec<Box<dyn rusqlite::ToSql>>) {
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(ref device_id) = self.device_id {
            conditions.push("device_id = ?");
            params.push(Box::new(device_id.clone()));
        }

        if let Some(ref site_id) = self.site_id {
            conditions.push("site_id = ?");
            params.push(Box::new(site_id.clone()));
        }

        if let Some(since) = self.since {
            conditions.push("timestamp >= ?");
            params.push(Box::new(since));
        }

        if let Some(until) = self.until {
            conditions.push("timestamp < ?");
            params.push(Box::new(until));
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        (where_clause, params)
    }

    /// Build the full SQL query.
    pub(crate) fn build_sql(&self) -> String {
        let (where_clause, _) = self.build_where();
        let order = if self.newest_first { "DESC" } else { "ASC" };

        let mut sql = format!(
            "SELECT site_id, device_id, timestamp, energy_exported_wh, energy_imported_wh \
             FROM readings {} ORDER BY timestamp {}, device_id ASC",
            where_clause, order
        );

        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        sql
    }
}
