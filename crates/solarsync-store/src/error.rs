//! Error types for solarsync-store.

use std::path::PathBuf;

/// Result type for solarsync-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in solarsync-store.
///
/// Nothing here is retried; a failed batch is rolled back and the error is
/// handed to the caller.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Failed to create database directory.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDirectory {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to encode an export row.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
