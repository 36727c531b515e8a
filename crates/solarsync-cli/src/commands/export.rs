//! Export command: write stored readings as a CSV table.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::debug;

use solarsync_core::{DeviceCatalog, HttpClient};
use solarsync_service::Config;
use solarsync_service::timefmt::{export_filename, local_naive};
use solarsync_store::Store;

use crate::cli::ExportArgs;
use crate::util::now;

pub async fn cmd_export(args: &ExportArgs, config: &Config, quiet: bool) -> Result<()> {
    if args.offline {
        config.validate_offline()?;
    } else {
        config.validate_upstream()?;
    }
    let (from, to) = args.window.resolve(now())?;

    let names = if args.offline {
        BTreeMap::new()
    } else {
        let client = HttpClient::new(&config.api).context("Failed to create API client")?;
        DeviceCatalog::new(&client, &config.api)
            .resolve_active_devices()
            .await
            .context("Failed to resolve device names")?
    };
    debug!("Resolved {} device name(s)", names.len());

    let store = Store::open(&config.storage.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.storage.path.display()
        )
    })?;

    let target = args
        .output
        .clone()
        .unwrap_or_else(|| PathBuf::from(export_filename(from, to)));

    if target == Path::new("-") {
        let stdout = io::stdout();
        let mut writer = stdout.lock();
        store.export_csv(from, Some(to), &names, &local_naive, &mut writer)?;
        writer.flush()?;
        return Ok(());
    }

    let file = File::create(&target)
        .with_context(|| format!("Failed to create {}", target.display()))?;
    let mut writer = BufWriter::new(file);
    let rows = store
        .export_csv(from, Some(to), &names, &local_naive, &mut writer)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    writer
        .flush()
        .with_context(|| format!("Failed to write {}", target.display()))?;

    if !quiet {
        println!("Exported {} row(s) to {}", rows, target.display());
    }
    Ok(())
}
