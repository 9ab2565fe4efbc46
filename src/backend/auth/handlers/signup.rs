/**
 * Signup Handler
 *
 * POST /api/auth/signup. Registration does not log the user in; the client
 * follows up with a login so the new device gets a session.
 *
 * # Validation
 *
 * - Username must be 3-30 chars, start with a letter
 * - Password must be at least 8 characters long
 * - Username must be unique (`409 Conflict` otherwise)
 */

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::Json,
};

use crate::backend::auth::handlers::types::{SignupRequest, SignupResponse};
use crate::backend::auth::users::UserProfile;
use crate::backend::error::BackendError;
use crate::backend::server::state::AppState;

pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<SignupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<SignupResponse>), BackendError> {
    let Json(request) = payload?;
    tracing::info!("[Auth] signup request for username: {}", request.username);

    let account = state
        .users
        .create_user(request.username.trim(), &request.password)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(SignupResponse {
            user: UserProfile::from(&account),
        }),
    ))
}
