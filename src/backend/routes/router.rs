/**
 * Router Configuration
 *
 * This module provides the main router creation function that combines all
 * route configurations into a single Axum router.
 *
 * # Layers
 *
 * - `TraceLayer` traces every request
 * - `CorsLayer` allows browser clients on other origins
 * - `DefaultBodyLimit` caps request bodies at the media upload limit
 */

use axum::{extract::DefaultBodyLimit, routing::get, Json, Router};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::backend::realtime::ws_handler;
use crate::backend::routes::api_routes::configure_api_routes;
use crate::backend::server::state::AppState;

/// Slack over the media limit for query strings and headers
const BODY_LIMIT_SLACK: usize = 64 * 1024;

/// Create the Axum router with all routes configured
///
/// - `GET /health` - Liveness and storage backend kind
/// - `GET /ws` - Real-time channel for an authenticated device
/// - `/api/...` - See [`configure_api_routes`]
pub fn create_router(app_state: AppState) -> Router<()> {
    let body_limit = app_state.config.media.max_upload_bytes + BODY_LIMIT_SLACK;
    let backend_kind = app_state.backend.kind();

    let router = Router::new()
        .route(
            "/health",
            get(move || async move { Json(json!({ "status": "ok", "storage": backend_kind })) }),
        )
        .route("/ws", get(ws_handler));

    let router = configure_api_routes(router);

    router
        .fallback(|| async { (axum::http::StatusCode::NOT_FOUND, "404 Not Found") })
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}
