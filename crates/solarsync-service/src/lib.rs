//! Sync engine, configuration and HTTP API for solarsync.
//!
//! This crate ties the upstream client and the local store together:
//! - Synchronizes sub-meter readings incrementally into the local database
//! - Optionally repeats the sync in the background on a fixed interval
//! - Exposes a small REST API for updates, CSV exports and the error log
//! - Provides the configuration, logging and time handling shared with the CLI
//!
//! # REST API Endpoints
//!
//! - `GET /` - Overview with the latest entry and export links
//! - `GET /api/health` - Service health check
//! - `GET|POST /api/update` - Run a sync (`from`, `to`, `period`)
//! - `GET /api/export` - Download CSV (`from`, `to`, `period`, `offline`)
//! - `GET /api/latest` - Newest stored timestamp (`verbose`)
//! - `GET /api/logs` - Error log
//!
//! # Configuration
//!
//! The configuration is read from `$SOLARSYNC_CONFIG` or
//! `~/.config/solarsync/config.toml`:
//!
//! ```toml
//! [api]
//! url = "https://cloud.solar-manager.ch"
//! email = "user@example.com"
//! password = "secret"
//! site_ids = ["0123456789ABCDEF"]
//! resolution = 300
//! request_timeout_secs = 60
//!
//! [storage]
//! path = "~/.local/share/solarsync/db.sqlite"
//!
//! [logging]
//! error_log = "~/.local/share/solarsync/errors.log"
//!
//! [server]
//! bind = "127.0.0.1:8080"
//! sync_interval_secs = 3600
//! ```

pub mod api;
pub mod config;
pub mod logging;
pub mod scheduler;
pub mod state;
pub mod sync;
pub mod timefmt;

pub use config::{
    ApiConfig, Config, ConfigError, LoggingConfig, ServerConfig, StorageConfig, ValidationError,
    default_config_path,
};
pub use scheduler::Scheduler;
pub use state::AppState;
pub use sync::{SyncEngine, SyncError, SyncReport, resume_point};
pub use timefmt::{Period, TimeParseError};
