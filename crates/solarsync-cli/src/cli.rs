//! CLI argument definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use solarsync_service::Period;
use solarsync_service::timefmt::{TimeParseError, resolve_window};

#[derive(Debug, Parser)]
#[command(name = "solarsync")]
#[command(
    author,
    version,
    about = "Sync Solar Manager smart-meter data into SQLite and export it as CSV",
    long_about = None
)]
pub struct Cli {
    /// Path to the configuration file, or use SOLARSYNC_CONFIG env var
    #[arg(short, long, global = true, env = "SOLARSYNC_CONFIG")]
    pub config: Option<PathBuf>,

    /// Database path (overrides config)
    #[arg(short, long, global = true)]
    pub database: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Fetch new readings from the Solar Manager API into the local database
    Update(WindowArgs),

    /// Export stored readings as a CSV table
    Export(ExportArgs),

    /// Show the newest stored timestamp
    Latest {
        /// Output as JSON
        #[arg(long)]
        json: bool,

        /// Include per-device counts and ranges
        #[arg(long)]
        devices: bool,
    },

    /// Print the error log
    Logs,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Time window shared by `update` and `export`.
///
/// Timestamps are local time unless they carry an offset: RFC 3339,
/// `YYYY-MM-DDTHH:MM[:SS]` or a bare `YYYY-MM-DD`.
#[derive(Debug, Clone, Default, Args)]
pub struct WindowArgs {
    /// Start of the window (inclusive)
    #[arg(short, long)]
    pub from: Option<String>,

    /// End of the window (exclusive, defaults to now)
    #[arg(short, long)]
    pub to: Option<String>,

    /// Named calendar range; explicit --from/--to override its bounds
    #[arg(short, long)]
    pub period: Option<Period>,
}

impl WindowArgs {
    /// Resolve to `(from, to)` unix seconds, with `to` defaulting to `now`.
    pub fn resolve(&self, now: i64) -> Result<(Option<i64>, i64), TimeParseError> {
        let (from, to) = resolve_window(self.from.as_deref(), self.to.as_deref(), self.period)?;
        Ok((from, to.unwrap_or(now)))
    }
}

#[derive(Debug, Clone, Args)]
pub struct ExportArgs {
    #[command(flatten)]
    pub window: WindowArgs,

    /// Output file, or `-` for stdout (defaults to smart_meter_data_<from>-<to>.csv)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Use device ids as column names instead of asking the API for names
    #[arg(long)]
    pub offline: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_update_with_window() {
        let cli = Cli::try_parse_from([
            "solarsync",
            "update",
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-02T00:00",
        ])
        .unwrap();

        match cli.command {
            Commands::Update(window) => {
                assert_eq!(window.from.as_deref(), Some("2024-01-01"));
                assert_eq!(window.to.as_deref(), Some("2024-01-02T00:00"));
                assert!(window.period.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_period() {
        let cli = Cli::try_parse_from(["solarsync", "export", "--period", "last-month"]).unwrap();
        match cli.command {
            Commands::Export(args) => assert_eq!(args.window.period, Some(Period::LastMonth)),
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["solarsync", "export", "--period", "fortnight"]).is_err());
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "solarsync",
            "latest",
            "--json",
            "-q",
            "--database",
            "/tmp/db.sqlite",
        ])
        .unwrap();

        assert!(cli.quiet);
        assert_eq!(cli.database, Some(PathBuf::from("/tmp/db.sqlite")));
        assert!(matches!(
            cli.command,
            Commands::Latest {
                json: true,
                devices: false
            }
        ));
    }

    #[test]
    fn test_verbose_conflicts_with_quiet() {
        assert!(Cli::try_parse_from(["solarsync", "-v", "-q", "logs"]).is_err());
    }

    #[test]
    fn test_export_output_and_offline() {
        let cli =
            Cli::try_parse_from(["solarsync", "export", "-o", "-", "--offline"]).unwrap();
        match cli.command {
            Commands::Export(args) => {
                assert_eq!(args.output, Some(PathBuf::from("-")));
                assert!(args.offline);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_window_resolve_defaults_to_now() {
        let window = WindowArgs::default();
        assert_eq!(window.resolve(1_700_000_000).unwrap(), (None, 1_700_000_000));
    }

    #[test]
    fn test_window_resolve_rejects_garbage() {
        let window = WindowArgs {
            from: Some("yesterday".to_string()),
            ..Default::default()
        };
        assert!(window.resolve(0).is_err());
    }
}
