//! Shared helpers for commands.

use anyhow::Result;
use time::OffsetDateTime;
use tracing_subscriber::filter::LevelFilter;

use solarsync_service::Config;

use crate::cli::Cli;

/// Current time as unix seconds.
pub fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Console log level for the global flags.
pub fn log_level(verbose: bool, quiet: bool) -> LevelFilter {
    if quiet {
        LevelFilter::WARN
    } else if verbose {
        LevelFilter::DEBUG
    } else {
        LevelFilter::INFO
    }
}

/// Load the configuration file and apply command-line overrides.
pub fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load_or_default(cli.config.as_deref())?;
    if let Some(path) = &cli.database {
        config.storage.path = path.clone();
    }
    Ok(config)
}
