/**
 * Server Initialization
 *
 * Builds the application state and router.
 *
 * # Initialization Process
 *
 * 1. Select the storage backend (Postgres or in-memory fallback)
 * 2. Wire the components into `AppState`
 * 3. Create the router with all routes and middleware
 */

use axum::Router;

use crate::backend::error::BackendError;
use crate::backend::routes::router::create_router;
use crate::backend::server::config::load_backend;
use crate::backend::server::state::AppState;
use crate::backend::storage::Backend;
use crate::shared::AppConfig;

/// Create and configure the Axum application
pub async fn create_app(config: AppConfig) -> Result<Router, BackendError> {
    tracing::info!("[STARTUP] Initializing xfchat backend server");

    let backend = load_backend(&config).await;
    tracing::info!("[STARTUP] Storage backend: {}", backend.kind());

    let state = AppState::new(config, backend)?;
    Ok(create_router(state))
}

/// Router and state over a fresh in-memory backend
pub fn create_memory_app(config: AppConfig) -> Result<(Router, AppState), BackendError> {
    let state = AppState::new(config, Backend::memory())?;
    Ok((create_router(state.clone()), state))
}
