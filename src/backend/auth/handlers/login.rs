/**
 * Login Handler
 *
 * POST /api/auth/login.
 *
 * # Authentication Process
 *
 * 1. Verify username and password (bcrypt)
 * 2. Refuse suspended accounts
 * 3. Create a device session, evicting the oldest one at the cap
 * 4. Close the live connections of evicted devices
 * 5. Issue a JWT bound to the new device
 *
 * Unknown users and wrong passwords get the same `401 bad_credentials`.
 */
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header::USER_AGENT, HeaderMap},
    response::Json,
};

use crate::backend::auth::handlers::types::{AuthResponse, LoginRequest};
use crate::backend::auth::users::UserProfile;
use crate::backend::error::{BackendError, UnauthorizedReason};
use crate::backend::server::state::AppState;
use crate::shared::messaging::DeviceMeta;

/// Body fields win; headers fill the gaps
fn device_meta(request: &LoginRequest, headers: &HeaderMap) -> DeviceMeta {
    let forwarded_for = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());
    let user_agent = headers
        .get(USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    DeviceMeta {
        ip_address: request.ip_address.clone().or(forwarded_for),
        device_type: request.device_type.clone().or(user_agent),
    }
}

pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<AuthResponse>, BackendError> {
    let Json(request) = payload?;
    tracing::info!("[Auth] login request for: {}", request.username);

    let account = state
        .users
        .verify_credentials(request.username.trim(), &request.password)
        .await?
        .ok_or_else(|| BackendError::unauthorized(UnauthorizedReason::BadCredentials))?;

    if account.is_suspended {
        tracing::warn!("[Auth] suspended user {} tried to log in", account.id);
        return Err(BackendError::forbidden("Account is suspended"));
    }

    let meta = device_meta(&request, &headers);
    let created = state.sessions.create_session(account.id, meta).await?;
    if !created.evicted.is_empty() {
        state.events.close_sessions(account.id, &created.evicted).await;
    }

    let token = state.tokens.issue(account.id, &created.session.device_id)?;

    tracing::info!(
        "[Auth] user {} logged in on device {}",
        account.username,
        created.session.device_id
    );
    Ok(Json(AuthResponse {
        token,
        device_id: created.session.device_id,
        user: UserProfile::from(&account),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn request(ip: Option<&str>, device: Option<&str>) -> LoginRequest {
        LoginRequest {
            username: "alice".into(),
            password: "password123".into(),
            ip_address: ip.map(str::to_string),
            device_type: device.map(str::to_string),
        }
    }

    #[test]
    fn test_device_meta_prefers_body() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("10.0.0.1, 10.0.0.2"));
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8"));

        let meta = device_meta(&request(Some("1.2.3.4"), None), &headers);
        assert_eq!(meta.ip_address.as_deref(), Some("1.2.3.4"));
        assert_eq!(meta.device_type.as_deref(), Some("curl/8"));

        let meta = device_meta(&request(None, Some("ios")), &headers);
        assert_eq!(meta.ip_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(meta.device_type.as_deref(), Some("ios"));
    }

    #[test]
    fn test_device_meta_without_headers() {
        let meta = device_meta(&request(None, None), &HeaderMap::new());
        assert_eq!(meta, DeviceMeta::default());
    }
}
