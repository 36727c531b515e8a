//! Logs command: print the persistent error log.

use anyhow::{Context, Result};

use solarsync_service::Config;
use solarsync_service::logging::read_error_log;

pub fn cmd_logs(config: &Config, quiet: bool) -> Result<()> {
    let path = config.error_log_path();
    let content = read_error_log(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    if content.is_empty() {
        if !quiet {
            eprintln!("No errors logged ({})", path.display());
        }
        return Ok(());
    }

    print!("{}", content);
    Ok(())
}
