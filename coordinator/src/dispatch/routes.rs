//! Axum HTTP routes for the dispatch endpoint.
//!
//! ```text
//! GET  /   poll:   204 (no work) or 200 + {"id", "text", ...nulls}
//! POST /   report: 204 on acceptance, 400 on a malformed snapshot
//! ```

use super::service::CommandDispatcher;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use fanout_shared::codec::{CodecError, MAX_MESSAGE_SIZE};
use std::future::Future;
use thiserror::Error;
use tokio::net::TcpListener;
use tracing::warn;

/// Errors surfaced to workers as HTTP responses
#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Invalid report: {0}")]
    Codec(#[from] CodecError),
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        warn!(error = %self, "rejecting report");
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

// ─── Route builder ───────────────────────────────────────────────

pub fn build_router(dispatcher: CommandDispatcher) -> Router {
    Router::new()
        .route("/", get(poll).post(report))
        .layer(DefaultBodyLimit::max(MAX_MESSAGE_SIZE))
        .with_state(dispatcher)
}

// ─── Handlers ────────────────────────────────────────────────────

async fn poll(State(dispatcher): State<CommandDispatcher>) -> Response {
    match dispatcher.poll().await {
        Some(assignment) => (StatusCode::OK, Json(assignment)).into_response(),
        None => StatusCode::NO_CONTENT.into_response(),
    }
}

async fn report(
    State(dispatcher): State<CommandDispatcher>,
    body: Bytes,
) -> Result<StatusCode, DispatchError> {
    dispatcher.report(&body).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ─── Server startup ──────────────────────────────────────────────

/// Serve the dispatch endpoint on `listener` until `shutdown` resolves
pub async fn serve<F>(
    listener: TcpListener,
    dispatcher: CommandDispatcher,
    shutdown: F,
) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, build_router(dispatcher))
        .with_graceful_shutdown(shutdown)
        .await
}
