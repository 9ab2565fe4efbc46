/**
 * Authentication Extractor
 *
 * This module resolves the caller of every authenticated route. It extracts
 * the bearer token, verifies it, and then confirms with the Session Registry
 * that the token's device session is still live.
 *
 * A well-formed token whose session is gone yields
 * `Unauthorized(SessionRevoked)`, which clients treat as "logged out
 * remotely" rather than "never authenticated".
 *
 * Logout uses the weaker [`TokenIdentity`] instead, which only checks the
 * signature.
 */

use axum::{
    extract::{FromRequestParts, Query},
    http::{
        header::{AUTHORIZATION, UPGRADE},
        request::Parts,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::backend::error::{BackendError, UnauthorizedReason};
use crate::backend::server::state::AppState;

/// The authenticated `(user, device)` pair behind a request
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthSession {
    pub user_id: Uuid,
    pub device_id: String,
}

/// The `(user, device)` pair named by a correctly signed token.
///
/// Neither expiry nor session liveness is checked. Only logout takes this,
/// so a device can always sign out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TokenIdentity {
    pub user_id: Uuid,
    pub device_id: String,
}

#[derive(Debug, Deserialize)]
struct TokenQuery {
    token: Option<String>,
}

/// Bearer token from the `Authorization` header.
///
/// WebSocket upgrades may pass it as a `token` query parameter instead,
/// since browsers cannot set headers on the upgrade request.
fn bearer_token(parts: &Parts) -> Option<String> {
    if let Some(value) = parts.headers.get(AUTHORIZATION).and_then(|h| h.to_str().ok()) {
        return value.strip_prefix("Bearer ").map(|t| t.trim().to_string());
    }

    let is_upgrade = parts
        .headers
        .get(UPGRADE)
        .and_then(|h| h.to_str().ok())
        .map(|v| v.eq_ignore_ascii_case("websocket"))
        .unwrap_or(false);
    if !is_upgrade {
        return None;
    }

    Query::<TokenQuery>::try_from_uri(&parts.uri)
        .ok()
        .and_then(|Query(q)| q.token)
}

/// Verify a token and check that its session is still live
pub async fn authenticate(state: &AppState, token: &str) -> Result<AuthSession, BackendError> {
    let claims = state.tokens.verify(token)?;
    let user_id = claims.user_id()?;

    if !state.sessions.is_valid_session(user_id, &claims.device_id).await? {
        tracing::info!(
            "[Auth] rejected revoked session {} for user {}",
            claims.device_id,
            user_id
        );
        return Err(BackendError::unauthorized(UnauthorizedReason::SessionRevoked));
    }

    Ok(AuthSession {
        user_id,
        device_id: claims.device_id,
    })
}

impl FromRequestParts<AppState> for AuthSession {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts).ok_or_else(|| {
            tracing::debug!("[Auth] missing bearer token for {}", parts.uri.path());
            BackendError::unauthorized(UnauthorizedReason::MissingToken)
        })?;
        authenticate(state, &token).await
    }
}

impl FromRequestParts<AppState> for TokenIdentity {
    type Rejection = BackendError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = bearer_token(parts)
            .ok_or_else(|| BackendError::unauthorized(UnauthorizedReason::MissingToken))?;
        let claims = state.tokens.verify_ignoring_expiry(&token)?;
        Ok(Self {
            user_id: claims.user_id()?,
            device_id: claims.device_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(builder: axum::http::request::Builder) -> Parts {
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_bearer_from_header() {
        let parts = parts(Request::builder().uri("/api/groups").header(AUTHORIZATION, "Bearer abc"));
        assert_eq!(bearer_token(&parts).as_deref(), Some("abc"));
    }

    #[test]
    fn test_non_bearer_header_is_ignored() {
        let parts = parts(Request::builder().uri("/api/groups").header(AUTHORIZATION, "Basic abc"));
        assert_eq!(bearer_token(&parts), None);
    }

    #[test]
    fn test_query_token_only_for_upgrades() {
        let plain = parts(Request::builder().uri("/ws?token=abc"));
        assert_eq!(bearer_token(&plain), None);

        let upgrade = parts(Request::builder().uri("/ws?token=abc").header(UPGRADE, "websocket"));
        assert_eq!(bearer_token(&upgrade).as_deref(), Some("abc"));
    }
}
