//! HTTP surface: the per-job WebSocket route and a liveness ping.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use tokio::net::TcpListener;

use super::session::{serve_connection, SessionContext};
use crate::channel::websocket::from_websocket;
use crate::core::error::{AppError, Result};
use crate::core::models::{JobId, Response as Reply};

pub fn router(ctx: SessionContext) -> Router {
    Router::new()
        .route("/api/ping", get(ping))
        .route("/api/web/verifier/{job_id}/ws", get(verifier_ws))
        .with_state(ctx)
}

async fn ping() -> Json<Reply> {
    Json(Reply::Success("pong".to_string()))
}

async fn verifier_ws(
    ws: WebSocketUpgrade,
    Path(job_id): Path<JobId>,
    State(ctx): State<SessionContext>,
) -> Response {
    ws.on_upgrade(move |socket| async move {
        tracing::debug!(target: "session", "[job {}] socket connected", job_id);
        let channel = from_websocket(socket);
        // Errors are logged inside; they only end this connection.
        let _ = serve_connection(channel, job_id, ctx).await;
    })
}

/// Binds `ctx.config.bind_address` and serves until the process exits.
pub async fn serve(ctx: SessionContext) -> Result<()> {
    let addr = ctx.config.bind_address.clone();
    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::Initialization(format!("Failed to bind {}: {}", addr, e)))?;
    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, router(ctx)).await?;
    Ok(())
}
