//! Session listing and remote device revocation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthSession;
use crate::backend::server::state::AppState;
use crate::shared::messaging::ListSessionsResponse;

/// GET /api/auth/sessions
pub async fn list_sessions(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<ListSessionsResponse>, BackendError> {
    let sessions = state
        .sessions
        .list_sessions(auth.user_id, &auth.device_id)
        .await?;
    Ok(Json(ListSessionsResponse { sessions }))
}

/// DELETE /api/auth/sessions/{device_id}
///
/// Logs another device (or this one) out. Unknown devices are a no-op.
pub async fn revoke_device(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(device_id): Path<String>,
) -> Result<StatusCode, BackendError> {
    if let Some(session) = state.sessions.revoke_session(auth.user_id, &device_id).await? {
        state.events.close_sessions(auth.user_id, &[session]).await;
        tracing::info!("[Auth] user {} revoked device {}", auth.user_id, device_id);
    }
    Ok(StatusCode::NO_CONTENT)
}
