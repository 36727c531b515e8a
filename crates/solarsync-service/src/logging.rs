//! Tracing setup shared by the service and the CLI.
//!
//! Events go to stderr, filtered by `RUST_LOG` or the given default level.
//! Error-level events are additionally appended, without colors, to the
//! error log file so failures of unattended runs can be inspected later.

use std::fs::{File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::Subscriber;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, fmt};

/// Crates whose events the default filter lets through.
const CRATES: &[&str] = &[
    "solarsync",
    "solarsync_core",
    "solarsync_service",
    "solarsync_store",
    "solarsync_types",
];

/// Logging setup errors.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to open error log {path}: {source}")]
    OpenErrorLog { path: PathBuf, source: io::Error },
    #[error("Failed to install log subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Filter used when `RUST_LOG` is unset: `level` for our crates, `warn`
/// for everything else.
pub fn default_filter(level: LevelFilter) -> EnvFilter {
    let directives = std::iter::once("warn".to_string())
        .chain(CRATES.iter().map(|c| format!("{}={}", c, level)))
        .collect::<Vec<_>>()
        .join(",");
    EnvFilter::new(directives)
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `level`. With `error_log`, ERROR events
/// are also appended to that file; its parent directory is created.
pub fn init(level: LevelFilter, error_log: Option<&Path>) -> Result<(), LoggingError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter(level));
    let file = error_log.map(open_error_log).transpose()?;

    subscriber(filter, file).try_init()?;
    Ok(())
}

fn subscriber(filter: EnvFilter, error_log: Option<File>) -> impl Subscriber + Send + Sync {
    let console = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_filter(filter);

    let errors = error_log.map(|file| {
        fmt::layer()
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .with_target(false)
            .with_filter(LevelFilter::ERROR)
    });

    tracing_subscriber::registry().with(console).with(errors)
}

fn open_error_log(path: &Path) -> Result<File, LoggingError> {
    let open_err = |source| LoggingError::OpenErrorLog {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(open_err)?;
    }

    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(open_err)
}

/// Contents of the error log; a log that was never written reads as empty.
pub fn read_error_log(path: &Path) -> io::Result<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => Ok(content),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(String::new()),
        Err(e) => Err(e),
    }
}
