//! Application state shared across handlers.
//!
//! The SQLite connection is not shareable between threads, so the store sits
//! behind an async mutex. A sync holds the lock for its whole duration, which
//! also keeps two syncs from running at once; exports and other reads wait
//! until it finishes.

use std::sync::Arc;

use time::OffsetDateTime;
use tokio::sync::Mutex;

use solarsync_core::MeteringApi;
use solarsync_store::Store;

use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// The data store.
    pub store: Mutex<Store>,
    /// Configuration, fixed for the lifetime of the server.
    pub config: Config,
    /// Upstream API used by `/api/update` and for export header names.
    pub api: Arc<dyn MeteringApi>,
    /// When the server started.
    pub started_at: OffsetDateTime,
}

impl AppState {
    /// Create new application state.
    pub fn new(store: Store, config: Config, api: Arc<dyn MeteringApi>) -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(store),
            config,
            api,
            started_at: OffsetDateTime::now_utc(),
        })
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("started_at", &self.started_at)
            .finish_non_exhaustive()
    }
}
