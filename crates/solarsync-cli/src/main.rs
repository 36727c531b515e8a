//! solarsync - keep a local copy of Solar Manager smart-meter data and
//! export it as CSV.

mod cli;
mod commands;
mod util;

use std::io;
use std::process::ExitCode;

use anyhow::Result;
use clap::{CommandFactory, Parser};
use tracing::error;

use solarsync_service::{Config, logging};

use cli::{Cli, Commands};
use commands::{cmd_export, cmd_latest, cmd_logs, cmd_update};
use util::{load_config, log_level};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    human_panic::setup_panic!();

    let cli = Cli::parse();

    // Handle completions command early (before config and tracing init)
    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "solarsync", &mut io::stdout());
        return ExitCode::SUCCESS;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = logging::init(
        log_level(cli.verbose, cli.quiet),
        Some(&config.error_log_path()),
    ) {
        eprintln!("Error: {}", e);
        return ExitCode::FAILURE;
    }

    match run(&cli, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            // Goes to the console and to the error log
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli, config: &Config) -> Result<()> {
    match &cli.command {
        Commands::Update(window) => cmd_update(window, config, cli.quiet).await,
        Commands::Export(args) => cmd_export(args, config, cli.quiet).await,
        Commands::Latest { json, devices } => cmd_latest(config, *json, *devices),
        Commands::Logs => cmd_logs(config, cli.quiet),
        Commands::Completions { .. } => unreachable!("handled before config is loaded"),
    }
}
