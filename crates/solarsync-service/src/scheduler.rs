//! Background sync on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info, warn};

use crate::state::AppState;
use crate::sync::{SyncEngine, SyncError, SyncReport};

/// Failures logged as warnings before the scheduler reports an error.
const QUIET_FAILURES: u32 = 3;

/// Runs a resuming sync every `server.sync_interval_secs`.
pub struct Scheduler {
    state: Arc<AppState>,
}

impl Scheduler {
    /// Create a new scheduler.
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }

    /// Spawn the sync loop. Returns `None` when the interval is 0.
    pub fn start(&self) -> Option<JoinHandle<()>> {
        let secs = self.state.config.server.sync_interval_secs;
        if secs == 0 {
            info!("Background sync disabled");
            return None;
        }

        info!("Starting background sync every {}s", secs);
        let state = Arc::clone(&self.state);
        Some(tokio::spawn(run(state, Duration::from_secs(secs))))
    }
}

async fn run(state: Arc<AppState>, period: Duration) {
    let mut timer = interval(period);
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut consecutive_failures = 0u32;

    loop {
        timer.tick().await;

        match sync_once(&state).await {
            Ok(report) => {
                consecutive_failures = 0;
                debug!(
                    "Background sync stored {} new reading(s)",
                    report.inserted
                );
            }
            Err(e) => {
                consecutive_failures += 1;
                if consecutive_failures <= QUIET_FAILURES {
                    warn!(
                        "Background sync failed: {} (attempt {})",
                        e, consecutive_failures
                    );
                } else {
                    error!(
                        "Background sync failed {} times in a row: {}",
                        consecutive_failures, e
                    );
                }
            }
        }
    }
}

/// One resuming sync up to now, holding the store for its duration.
pub async fn sync_once(state: &AppState) -> Result<SyncReport, SyncError> {
    let to = OffsetDateTime::now_utc().unix_timestamp();
    let mut store = state.store.lock().await;
    SyncEngine::new(state.api.as_ref(), &state.config.api)
        .sync(&mut store, None, to)
        .await
}
