//! Latest command: show how far the local database reaches.

use anyhow::{Context, Result};

use solarsync_service::Config;
use solarsync_service::api::LatestResponse;
use solarsync_service::timefmt::{local_naive, local_rfc3339};
use solarsync_store::Store;

pub fn cmd_latest(config: &Config, json: bool, devices: bool) -> Result<()> {
    config.validate_offline()?;
    let store = Store::open(&config.storage.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.storage.path.display()
        )
    })?;

    let timestamp = store.global_latest_timestamp()?;
    let summaries = if devices {
        Some(store.device_summaries()?)
    } else {
        None
    };

    if json {
        let response = LatestResponse {
            latest: timestamp.map(local_rfc3339),
            timestamp,
            devices: summaries,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        return Ok(());
    }

    match timestamp {
        Some(ts) => println!("Latest reading: {}", local_rfc3339(ts)),
        None => println!("No data available yet. Update local database first."),
    }

    for summary in summaries.iter().flatten() {
        println!(
            "  {} ({}): {} reading(s), {} to {}",
            summary.device_id,
            summary.site_id,
            summary.count,
            local_naive(summary.first_timestamp),
            local_naive(summary.last_timestamp)
        );
    }

    Ok(())
}
