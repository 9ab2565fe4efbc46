/**
 * Logout Handler
 *
 * POST /api/auth/logout. Removes the calling device's session, or every
 * session of the user with `{"all": true}`, and closes the matching live
 * connections.
 *
 * Logout is idempotent: a token that expired or whose session was already
 * revoked still gets `200` with an empty `revoked` list. Only a live session
 * may sign out every device.
 */
use axum::{
    body::Bytes,
    extract::State,
    response::Json,
};

use crate::backend::auth::handlers::types::{LogoutRequest, LogoutResponse};
use crate::backend::error::BackendError;
use crate::backend::middleware::TokenIdentity;
use crate::backend::server::state::AppState;
use crate::shared::SharedError;

pub async fn logout(
    State(state): State<AppState>,
    identity: TokenIdentity,
    body: Bytes,
) -> Result<Json<LogoutResponse>, BackendError> {
    let request: LogoutRequest = if body.is_empty() {
        LogoutRequest::default()
    } else {
        serde_json::from_slice(&body).map_err(SharedError::from)?
    };

    let live = state
        .sessions
        .is_valid_session(identity.user_id, &identity.device_id)
        .await?;

    let revoked = if !live {
        tracing::debug!(
            "[Auth] logout for already revoked device {} of user {}",
            identity.device_id,
            identity.user_id
        );
        Vec::new()
    } else if request.all {
        state.sessions.revoke_all_sessions(identity.user_id).await?
    } else {
        state
            .sessions
            .revoke_session(identity.user_id, &identity.device_id)
            .await?
            .into_iter()
            .collect()
    };
    state.events.close_sessions(identity.user_id, &revoked).await;

    tracing::info!(
        "[Auth] user {} logged out {} device(s)",
        identity.user_id,
        revoked.len()
    );
    Ok(Json(LogoutResponse {
        revoked: revoked.into_iter().map(|s| s.device_id).collect(),
    }))
}
