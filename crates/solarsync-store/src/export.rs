//! Long-to-wide pivot of stored readings into CSV.
//!
//! The store keeps one row per `(device, timestamp)`. An export produces one
//! row per timestamp with an exported/imported column pair per device:
//!
//! ```text
//! timestamp,Heat pump (a)_exported,Heat pump (a)_imported,b_exported,b_imported
//! 2024-01-01 00:00:00,5,1,3,0.5
//! 2024-01-01 00:05:00,4.5,1,,
//! ```
//!
//! Two passes run inside one read transaction: the first collects the
//! distinct devices in the window to fix the columns, the second walks rows
//! ordered by timestamp and folds each run of equal timestamps into one
//! [`ExportRow`]. Devices without a sample at a timestamp get empty cells.

use std::collections::BTreeMap;
use std::io::Write;
use std::iter::Peekable;

use tracing::{debug, warn};

use crate::error::Result;
use crate::queries::ReadingQuery;
use crate::store::Store;

/// Column layout of one export, fixed before any row is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportHeader {
    columns: BTreeMap<String, usize>,
    labels: Vec<String>,
}

impl ExportHeader {
    /// Build the layout for `device_ids`, in the order given.
    ///
    /// A device with a non-empty entry in `names` is labelled
    /// `"<name> (<id>)"`, any other by its id.
    pub fn new<I>(device_ids: I, names: &BTreeMap<String, String>) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut columns = BTreeMap::new();
        let mut labels = Vec::new();

        for id in device_ids {
            if columns.contains_key(&id) {
                continue;
            }
            let label = match names.get(&id).filter(|n| !n.is_empty()) {
                Some(name) => format!("{} ({})", name, id),
                None => id.clone(),
            };
            columns.insert(id, labels.len());
            labels.push(label);
        }

        Self { columns, labels }
    }

    /// Number of devices (column pairs).
    pub fn device_count(&self) -> usize {
        self.labels.len()
    }

    /// Column pair index of `device_id`.
    pub fn index_of(&self, device_id: &str) -> Option<usize> {
        self.columns.get(device_id).copied()
    }

    /// The header record: `timestamp` then two columns per device.
    pub fn record(&self) -> Vec<String> {
        let mut record = Vec::with_capacity(1 + 2 * self.labels.len());
        record.push("timestamp".to_string());
        for label in &self.labels {
            record.push(format!("{}_exported", label));
            record.push(format!("{}_imported", label));
        }
        record
    }
}

/// One stored row as read by the pivot pass.
#[derive(Debug, Clone, PartialEq)]
pub struct LongRow {
    pub timestamp: i64,
    pub device_id: String,
    pub exported_wh: f64,
    pub imported_wh: f64,
}

/// One output row: a timestamp and an optional value pair per device.
#[derive(Debug, Clone, PartialEq)]
pub struct ExportRow {
    pub timestamp: i64,
    pub cells: Vec<Option<(f64, f64)>>,
}

impl ExportRow {
    /// Render as CSV fields; missing values become empty strings.
    pub fn to_record(&self, format_timestamp: &dyn Fn(i64) -> String) -> Vec<String> {
        let mut record = Vec::with_capacity(1 + 2 * self.cells.len());
        record.push(format_timestamp(self.timestamp));
        for cell in &self.cells {
            match cell {
                Some((exported, imported)) => {
                    record.push(exported.to_string());
                    record.push(imported.to_string());
                }
                None => {
                    record.push(String::new());
                    record.push(String::new());
                }
            }
        }
        record
    }
}

/// Iterator adaptor folding timestamp-ordered [`LongRow`]s into [`ExportRow`]s.
///
/// The input must be sorted by timestamp. A device missing from the header
/// is skipped. An input error is yielded after the row being built.
pub struct PivotRows<'h, I: Iterator> {
    rows: Peekable<I>,
    header: &'h ExportHeader,
}

impl<'h, I, E> PivotRows<'h, I>
where
    I: Iterator<Item = std::result::Result<LongRow, E>>,
{
    /// Pivot `rows` into the layout of `header`.
    pub fn new(rows: I, header: &'h ExportHeader) -> Self {
        Self {
            rows: rows.peekable(),
            header,
        }
    }

    fn place(&self, row: &mut ExportRow, long: LongRow) {
        match self.header.index_of(&long.device_id) {
            Some(index) => row.cells[index] = Some((long.exported_wh, long.imported_wh)),
            None => warn!("Device {} not in export header, skipping", long.device_id),
        }
    }
}

impl<I, E> Iterator for PivotRows<'_, I>
where
    I: Iterator<Item = std::result::Result<LongRow, E>>,
{
    type Item = std::result::Result<ExportRow, E>;

    fn next(&mut self) -> Option<Self::Item> {
        let first = match self.rows.next()? {
            Ok(row) => row,
            Err(e) => return Some(Err(e)),
        };

        let mut row = ExportRow {
            timestamp: first.timestamp,
            cells: vec![None; self.header.device_count()],
        };
        self.place(&mut row, first);

        while let Some(Ok(next)) = self.rows.peek() {
            if next.timestamp != row.timestamp {
                break;
            }
            if let Some(Ok(next)) = self.rows.next() {
                self.place(&mut row, next);
            }
        }

        Some(Ok(row))
    }
}

impl Store {
    /// Write the readings in `[from, to)` as a wide CSV table.
    ///
    /// `names` maps device ids to display names for the header;
    /// `format_timestamp` renders the first column. Rows are written as they
    /// are produced. Returns the number of data rows written (excluding the
    /// header).
    pub fn export_csv<W: Write>(
        &self,
        from: Option<i64>,
        to: Option<i64>,
        names: &BTreeMap<String, String>,
        format_timestamp: &dyn Fn(i64) -> String,
        writer: W,
    ) -> Result<usize> {
        let mut query = ReadingQuery::new();
        query.since = from;
        query.until = to;
        let (where_clause, params) = query.build_where();
        let params_ref: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        // Both passes see the same snapshot.
        let tx = self.conn.unchecked_transaction()?;

        let device_ids = {
            let sql = format!(
                "SELECT DISTINCT device_id FROM readings {} ORDER BY device_id",
                where_clause
            );
            let mut stmt = tx.prepare(&sql)?;
            stmt.query_map(params_ref.as_slice(), |row| row.get::<_, String>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?
        };
        let header = ExportHeader::new(device_ids, names);
        debug!("Export header has {} device(s)", header.device_count());

        let mut csv = csv::Writer::from_writer(writer);
        csv.write_record(header.record())?;

        let sql = format!(
            "SELECT timestamp, device_id, energy_exported_wh, energy_imported_wh
             FROM readings {} ORDER BY timestamp, device_id",
            where_clause
        );
        let mut stmt = tx.prepare(&sql)?;
        let long_rows = stmt.query_map(params_ref.as_slice(), |row| {
            Ok(LongRow {
                timestamp: row.get(0)?,
                device_id: row.get(1)?,
                exported_wh: row.get(2)?,
                imported_wh: row.get(3)?,
            })
        })?;

        let mut written = 0;
        for row in PivotRows::new(long_rows, &header) {
            csv.write_record(row?.to_record(format_timestamp))?;
            written += 1;
        }
        csv.flush()?;

        debug!("Exported {} rows", written);
        Ok(written)
    }
}
