//! HTTP status and control surface.
//!
//! `GET /status` returns the [`StatusReport`], `POST /control` accepts a
//! `cmd` form field and `GET /logs/:filename` downloads an audit log. The
//! routes only read snapshots and flip control flags, so they stay
//! responsive whatever phase the job is in.

use std::future::Future;
use std::io;

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::audit_log;
use crate::control::Command;
use crate::engine::JobEngine;
use crate::status::StatusReport;

pub fn router(engine: JobEngine) -> Router {
    Router::new()
        .route("/status", get(status))
        .route("/control", post(control))
        .route("/logs/:filename", get(download_log))
        .with_state(engine)
}

/// Serve until `shutdown` resolves. Independent of the job's lifetime, so
/// the final status and the audit log stay reachable after the run ends.
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "status server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

async fn status(State(engine): State<JobEngine>) -> Json<StatusReport> {
    Json(engine.status())
}

#[derive(Debug, Deserialize)]
struct ControlForm {
    #[serde(default)]
    cmd: String,
}

async fn control(State(engine): State<JobEngine>, Form(form): Form<ControlForm>) -> &'static str {
    match Command::parse(&form.cmd) {
        Some(command) => engine.signal(command),
        None => warn!(cmd = %form.cmd, "ignoring unknown control command"),
    }
    "ok"
}

async fn download_log(State(engine): State<JobEngine>, Path(filename): Path<String>) -> Response {
    match audit_log::read(&engine.config().log_dir, &filename) {
        Ok(bytes) => (
            [
                (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{filename}\""),
                ),
            ],
            bytes,
        )
            .into_response(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => StatusCode::NOT_FOUND.into_response(),
        Err(e) => {
            warn!(%filename, error = %e, "cannot read audit log");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
