//! solarsync service - HTTP API with optional background sync.
//!
//! Run with: `cargo run -p solarsync-service`

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::filter::LevelFilter;

use solarsync_core::HttpClient;
use solarsync_service::{AppState, Config, Scheduler, api, logging};
use solarsync_store::Store;

/// solarsync service - HTTP API for syncing and exporting Solar Manager data.
#[derive(Parser, Debug)]
#[command(name = "solarsync-service")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config).
    #[arg(short, long)]
    bind: Option<String>,

    /// Database path (overrides config).
    #[arg(short, long)]
    database: Option<PathBuf>,

    /// Disable the background sync even if an interval is configured.
    #[arg(long)]
    no_sync: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load_or_default(args.config.as_deref())?;

    // Override config with CLI args
    if let Some(bind) = args.bind {
        config.server.bind = bind;
    }
    if let Some(db_path) = args.database {
        config.storage.path = db_path;
    }
    if args.no_sync {
        config.server.sync_interval_secs = 0;
    }

    logging::init(LevelFilter::INFO, Some(&config.error_log_path()))?;
    config.validate()?;

    info!("Opening database at {:?}", config.storage.path);
    let store = Store::open(&config.storage.path)?;
    let client = HttpClient::new(&config.api)?;
    let addr: SocketAddr = config.server.bind.parse()?;

    let state = AppState::new(store, config, Arc::new(client));
    let _scheduler = Scheduler::new(Arc::clone(&state)).start();

    let app = Router::new()
        .merge(api::router())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state);

    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
