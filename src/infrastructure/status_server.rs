//! Status server for quick exports, built on axum.
//!
//! Routes:
//! - `GET /status` current job snapshot
//! - `POST /export` start a background quick export
//! - `GET /recent` last finished exports
//! - `GET /download/{file}` fetch a file from the quick-export directory

use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::export_service::ExportService;
use crate::application::job_tracker::JobTracker;
use crate::application::quick_export::{lookback_cutoff, run_tracked_quick_export, QuickExportRequest};
use crate::application::scheduler::Sleeper;
use crate::application::stream::HistoryApi;
use crate::domain::{AppError, JobStatus, RecentExport, Result};

/// Shared state for request handlers.
pub struct ServerState<A, S> {
    pub export: Arc<ExportService<A, S>>,
    pub tracker: JobTracker,
    pub quick_dir: Arc<PathBuf>,
}

impl<A, S> Clone for ServerState<A, S> {
    fn clone(&self) -> Self {
        Self {
            export: Arc::clone(&self.export),
            tracker: self.tracker.clone(),
            quick_dir: Arc::clone(&self.quick_dir),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ExportBody {
    #[serde(default)]
    pub chat_url: Option<String>,
    #[serde(default = "default_hours")]
    pub hours: u32,
    #[serde(default = "default_clean")]
    pub clean: bool,
}

const fn default_hours() -> u32 {
    1
}

const fn default_clean() -> bool {
    true
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct StartedResponse {
    status: &'static str,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
        .into_response()
}

/// Build the router.
pub fn router<A, S>(state: ServerState<A, S>) -> Router
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    Router::new()
        .route("/status", get(get_status::<A, S>))
        .route("/export", post(start_export::<A, S>))
        .route("/recent", get(get_recent::<A, S>))
        .route("/download/{file}", get(download::<A, S>))
        .with_state(state)
}

async fn get_status<A, S>(State(state): State<ServerState<A, S>>) -> Json<JobStatus>
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    Json(state.tracker.snapshot())
}

async fn get_recent<A, S>(State(state): State<ServerState<A, S>>) -> Json<Vec<RecentExport>>
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    Json(state.tracker.recent())
}

async fn start_export<A, S>(
    State(state): State<ServerState<A, S>>,
    Json(body): Json<ExportBody>,
) -> Response
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    let Some(chat_url) = body.chat_url.filter(|url| !url.trim().is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Chat URL required");
    };
    if body.hours == 0 {
        return error_response(StatusCode::BAD_REQUEST, "hours must be at least 1");
    }
    if lookback_cutoff(chrono::Utc::now(), body.hours).is_err() {
        return error_response(StatusCode::BAD_REQUEST, "hours is out of range");
    }

    if let Err(e) = state.tracker.try_start("Starting export...") {
        return error_response(StatusCode::CONFLICT, e.to_string());
    }

    let request = QuickExportRequest {
        locator: chat_url,
        hours: body.hours,
        clean: body.clean,
    };
    tracing::info!(chat = %request.locator, hours = request.hours, "Export requested");

    let tracker = state.tracker.clone();
    spawn_supervised(tracker, async move {
        run_tracked_quick_export(&state.export, &state.tracker, &state.quick_dir, &request).await;
    });

    (StatusCode::ACCEPTED, Json(StartedResponse { status: "started" })).into_response()
}

/// Runs `job` in its own task and marks the tracker failed if it panics.
fn spawn_supervised<F>(tracker: JobTracker, job: F) -> JoinHandle<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = tokio::spawn(job).await {
            tracing::error!(error = %e, "Export task aborted");
            tracker.fail(format!("Export task aborted: {e}"));
        }
    })
}

/// Only bare file names inside the quick-export directory are served.
fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty()
        && !name.contains(['/', '\\'])
        && name != "."
        && name != ".."
}

async fn download<A, S>(
    State(state): State<ServerState<A, S>>,
    Path(file): Path<String>,
) -> Response
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    if !is_safe_file_name(&file) {
        return error_response(StatusCode::BAD_REQUEST, "Invalid file name");
    }

    let path = state.quick_dir.join(&file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let content_type = if file.ends_with(".txt") {
                "text/plain; charset=utf-8"
            } else {
                "application/x-ndjson"
            };
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, content_type.to_string()),
                    (
                        header::CONTENT_DISPOSITION,
                        format!("attachment; filename=\"{file}\""),
                    ),
                ],
                bytes,
            )
                .into_response()
        }
        Err(_) => error_response(StatusCode::NOT_FOUND, "File not found"),
    }
}

/// Serve until `shutdown` is cancelled.
///
/// # Errors
/// Returns error if the port cannot be bound or the server fails.
pub async fn serve<A, S>(state: ServerState<A, S>, port: u16, shutdown: CancellationToken) -> Result<()>
where
    A: HistoryApi + 'static,
    S: Sleeper + 'static,
{
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::io(format!("Failed to bind status server to {addr}"), e))?;

    tracing::info!("Status server listening on http://{addr}");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| AppError::io("Status server error", e))
}

/// Cancels the returned token on Ctrl+C.
#[must_use]
pub fn install_signal_handler() -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received Ctrl+C, shutting down");
        }
        trigger.cancel();
    });

    token
}
