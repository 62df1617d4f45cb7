use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    routing::get,
    Json, Router,
};
use futures_util::StreamExt;
use tower_http::services::ServeDir;
use tracing::{error, instrument};

use crate::server::health::HealthReport;
use crate::server::ServerState;

/// Builds the HTTP surface of one serving session.
///
/// - `GET /events`: live-reload event stream
/// - `GET /health`: connection count and served directory
/// - `GET /metrics`: Prometheus text format
/// - everything else: static files from the workspace
pub fn router(state: Arc<ServerState>) -> Router {
    let static_files = ServeDir::new(&state.workspace);

    Router::new()
        .route("/events", get(handle_events))
        .route("/health", get(handle_health))
        .route("/metrics", get(handle_metrics))
        .fallback_service(static_files)
        .with_state(state)
}

/// Subscribes the caller to reload notifications.
///
/// The stream opens with `data: connected` and carries `data: reload` on each
/// broadcast until the client goes away or the session stops.
#[instrument(skip(state))]
async fn handle_events(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    let events = state
        .clients
        .subscribe()
        .map(|message| Ok::<Event, Infallible>(Event::from(message)));

    let sse = Sse::new(events).keep_alive(KeepAlive::new().interval(state.config.keep_alive()));

    (
        [
            (header::CACHE_CONTROL, "no-cache"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        sse,
    )
}

async fn handle_health(State(state): State<Arc<ServerState>>) -> Json<HealthReport> {
    Json(HealthReport::ok(
        state.clients.len(),
        Some(state.workspace.clone()),
    ))
}

async fn handle_metrics(State(state): State<Arc<ServerState>>) -> Response {
    match state.metrics.expose_metrics(state.clients.len()) {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            text,
        )
            .into_response(),
        Err(e) => {
            error!("[HTTP] Failed to encode metrics: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
