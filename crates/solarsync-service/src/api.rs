//! REST API endpoints for the solarsync service.
//!
//! | Route | Purpose |
//! |---|---|
//! | `GET /` | Overview with the latest entry and links to common exports |
//! | `GET /api/health` | Liveness check |
//! | `GET, POST /api/update` | Run a sync, respond with the [`SyncReport`] |
//! | `GET /api/export` | Download a CSV of the stored readings |
//! | `GET /api/latest` | Newest stored timestamp |
//! | `GET /api/logs` | The error log as plain text |
//!
//! `update` and `export` accept `from`, `to` (RFC 3339, local
//! `YYYY-MM-DDTHH:MM[:SS]` or `YYYY-MM-DD`) and `period`. `to` is exclusive
//! and defaults to now.
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Bad query
//! parameters are 400, upstream failures 502, store failures 500. Server-side
//! failures are logged at error level, which puts them in the error log.
//! An export streams its body, so a store failure after the headers are
//! sent aborts the body instead.

use std::collections::BTreeMap;
use std::io::{self, Write};
use std::sync::Arc;

use axum::{
    Json, Router,
    body::Body,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use futures::stream;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tokio::sync::mpsc;
use tracing::{debug, error};

use solarsync_core::DeviceCatalog;
use solarsync_store::DeviceSummary;

use crate::logging::read_error_log;
use crate::state::AppState;
use crate::sync::{SyncEngine, SyncError, SyncReport};
use crate::timefmt::{Period, TimeParseError, export_filename, local_naive, resolve_window};

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(index))
        .route("/api/health", get(health))
        .route("/api/update", get(update).post(update))
        .route("/api/export", get(export))
        .route("/api/latest", get(latest))
        .route("/api/logs", get(logs))
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// A canned request for one named period.
#[derive(Debug, Serialize)]
pub struct PeriodLink {
    pub period: Period,
    pub href: String,
}

/// Overview response.
#[derive(Debug, Serialize)]
pub struct IndexResponse {
    pub name: &'static str,
    pub version: &'static str,
    /// Sampling interval in seconds.
    pub resolution: u32,
    /// Newest stored timestamp, RFC 3339 in UTC.
    pub latest: Option<String>,
    pub update: &'static str,
    pub exports: Vec<PeriodLink>,
    pub logs: &'static str,
}

async fn index(State(state): State<Arc<AppState>>) -> Result<Json<IndexResponse>, AppError> {
    let latest = state.store.lock().await.global_latest_timestamp()?;

    Ok(Json(IndexResponse {
        name: "solarsync",
        version: env!("CARGO_PKG_VERSION"),
        resolution: state.config.api.resolution.as_secs(),
        latest: latest.map(utc_rfc3339),
        update: "/api/update",
        exports: Period::ALL
            .into_iter()
            .map(|period| PeriodLink {
                period,
                href: format!("/api/export?period={}", period),
            })
            .collect(),
        logs: "/api/logs",
    }))
}

/// Query parameters selecting a time window.
#[derive(Debug, Default, Deserialize)]
pub struct WindowQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub period: Option<Period>,
}

impl WindowQuery {
    fn resolve(&self) -> Result<(Option<i64>, i64), AppError> {
        resolve_or_now(self.from.as_deref(), self.to.as_deref(), self.period)
    }
}

fn resolve_or_now(
    from: Option<&str>,
    to: Option<&str>,
    period: Option<Period>,
) -> Result<(Option<i64>, i64), AppError> {
    let (from, to) = resolve_window(from, to, period)?;
    Ok((from, to.unwrap_or_else(now)))
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Run a sync over the requested window.
///
/// Without `from` the sync resumes where the stored data ends.
async fn update(
    State(state): State<Arc<AppState>>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<SyncReport>, AppError> {
    let (from, to) = query.resolve()?;

    let mut store = state.store.lock().await;
    let report = SyncEngine::new(state.api.as_ref(), &state.config.api)
        .sync(&mut store, from, to)
        .await?;

    Ok(Json(report))
}

/// Export query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct ExportQuery {
    pub from: Option<String>,
    pub to: Option<String>,
    pub period: Option<Period>,
    /// Skip device name lookup; headers then use bare device ids.
    #[serde(default)]
    pub offline: bool,
}

/// Download the readings in `[from, to)` as CSV.
async fn export(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExportQuery>,
) -> Result<Response, AppError> {
    let (from, to) = resolve_or_now(query.from.as_deref(), query.to.as_deref(), query.period)?;

    let names = if query.offline {
        BTreeMap::new()
    } else {
        DeviceCatalog::new(state.api.as_ref(), &state.config.api)
            .resolve_active_devices()
            .await
            .map_err(AppError::Upstream)?
    };

    let (tx, rx) = mpsc::channel(EXPORT_CHANNEL_CHUNKS);
    let export_state = Arc::clone(&state);
    tokio::task::spawn_blocking(move || {
        let store = export_state.store.blocking_lock();
        let mut writer = ChunkWriter::new(tx.clone());
        let result = store
            .export_csv(from, Some(to), &names, &local_naive, &mut writer)
            .map_err(io::Error::other)
            .and_then(|rows| writer.flush().map(|()| rows));
        match result {
            Ok(rows) => debug!("Streamed {} export row(s)", rows),
            // The client went away
            Err(e) if tx.is_closed() => debug!("Export cancelled: {}", e),
            Err(e) => {
                error!("Export failed: {}", e);
                let _ = tx.blocking_send(Err(e));
            }
        }
    });

    let body = Body::from_stream(stream::unfold(rx, |mut rx| async move {
        rx.recv().await.map(|chunk| (chunk, rx))
    }));

    let disposition = format!("attachment; filename=\"{}\"", export_filename(from, to));
    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

/// Chunks buffered between the export thread and the response body.
const EXPORT_CHANNEL_CHUNKS: usize = 4;
/// Bytes collected before a chunk is handed to the body.
const EXPORT_CHUNK_SIZE: usize = 8 * 1024;

/// `Write` adapter that forwards CSV output to a response body in chunks.
///
/// Runs on a blocking thread; a send only fails once the receiver is gone.
struct ChunkWriter {
    tx: mpsc::Sender<io::Result<Vec<u8>>>,
    buf: Vec<u8>,
}

impl ChunkWriter {
    fn new(tx: mpsc::Sender<io::Result<Vec<u8>>>) -> Self {
        Self {
            tx,
            buf: Vec::with_capacity(EXPORT_CHUNK_SIZE),
        }
    }

    fn send(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(EXPORT_CHUNK_SIZE));
        self.tx
            .blocking_send(Ok(chunk))
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
    }
}

impl Write for ChunkWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= EXPORT_CHUNK_SIZE {
            self.send()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.send()
    }
}

/// Query parameters for `/api/latest`.
#[derive(Debug, Default, Deserialize)]
pub struct LatestQuery {
    /// Include per-device summaries.
    #[serde(default)]
    pub verbose: bool,
}

/// Latest stored timestamp.
#[derive(Debug, Serialize, Deserialize)]
pub struct LatestResponse {
    /// RFC 3339, `null` when the store is empty.
    pub latest: Option<String>,
    /// The same instant as unix seconds.
    pub timestamp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub devices: Option<Vec<DeviceSummary>>,
}

async fn latest(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LatestQuery>,
) -> Result<Json<LatestResponse>, AppError> {
    let store = state.store.lock().await;
    let timestamp = store.global_latest_timestamp()?;
    let devices = if query.verbose {
        Some(store.device_summaries()?)
    } else {
        None
    };

    Ok(Json(LatestResponse {
        latest: timestamp.map(utc_rfc3339),
        timestamp,
        devices,
    }))
}

/// The error log as plain text.
async fn logs(State(state): State<Arc<AppState>>) -> Result<Response, AppError> {
    let path = state.config.error_log_path();
    let content = read_error_log(&path).map_err(|e| {
        AppError::Internal(format!("Failed to read {}: {}", path.display(), e))
    })?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        content,
    )
        .into_response())
}

fn utc_rfc3339(timestamp: i64) -> String {
    OffsetDateTime::from_unix_timestamp(timestamp)
        .ok()
        .and_then(|dt| dt.format(&Rfc3339).ok())
        .unwrap_or_else(|| timestamp.to_string())
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    BadRequest(String),
    Upstream(solarsync_core::Error),
    Store(solarsync_store::Error),
    Internal(String),
}

impl From<solarsync_store::Error> for AppError {
    fn from(e: solarsync_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<TimeParseError> for AppError {
    fn from(e: TimeParseError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

impl From<SyncError> for AppError {
    fn from(e: SyncError) -> Self {
        match e {
            SyncError::Upstream(e) => AppError::Upstream(e),
            SyncError::Store(e) => AppError::Store(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        if status.is_server_error() {
            error!("{}", message);
        }

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
