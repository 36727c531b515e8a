//! Update command: fetch new readings into the local database.

use std::time::Duration;

use anyhow::{Context, Result};
use tracing::info;

use solarsync_core::HttpClient;
use solarsync_service::timefmt::local_rfc3339;
use solarsync_service::{Config, SyncEngine};
use solarsync_store::Store;

use crate::cli::WindowArgs;
use crate::util::now;

pub async fn cmd_update(window: &WindowArgs, config: &Config, quiet: bool) -> Result<()> {
    config.validate_upstream()?;
    let (from, to) = window.resolve(now())?;

    let mut store = Store::open(&config.storage.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.storage.path.display()
        )
    })?;
    let client = HttpClient::new(&config.api).context("Failed to create API client")?;

    if !quiet {
        println!(
            "Fetching data from {} to {}",
            from.map_or_else(|| "last stored reading".to_string(), local_rfc3339),
            local_rfc3339(to)
        );
    }

    let report = SyncEngine::new(&client, &config.api)
        .sync(&mut store, from, to)
        .await
        .context("Update failed")?;

    info!(
        "Synced {} device(s) in {} batch(es)",
        report.devices, report.batches
    );

    if !quiet {
        let elapsed = Duration::from_millis(report.elapsed_ms);
        println!(
            "Done: {} reading(s) fetched, {} new, {} device(s), took {:.1}s",
            report.fetched,
            report.inserted,
            report.devices,
            elapsed.as_secs_f64()
        );
        if report.resumed {
            println!("Resumed from {}", local_rfc3339(report.from));
        }
    }

    Ok(())
}
