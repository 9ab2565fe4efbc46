/**
 * Backend Error Types
 *
 * This module defines the error taxonomy shared by every backend component.
 *
 * # Error Categories
 *
 * ## Unauthorized
 *
 * The caller has no usable session. The `reason` separates "never
 * authenticated" from "session revoked remotely": clients must force a
 * logout on the latter.
 *
 * ## Forbidden / NotFound
 *
 * The session is valid but the target is out of reach: a group with
 * messaging disabled, a message someone else sent, a deleted group.
 *
 * ## InvalidInput
 *
 * Validation errors from the shared module, surfaced without retry.
 *
 * ## Conflict / Upstream
 *
 * Storage conflicts, failed writes and collaborator failures. Writes are
 * never retried internally; the caller retries explicitly.
 */

use axum::http::StatusCode;
use thiserror::Error;

use crate::shared::SharedError;

/// Why a request was not authenticated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnauthorizedReason {
    MissingToken,
    InvalidToken,
    TokenExpired,
    /// The token is well formed but its device session no longer exists
    SessionRevoked,
    BadCredentials,
}

impl UnauthorizedReason {
    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            Self::MissingToken => "missing_token",
            Self::InvalidToken => "invalid_token",
            Self::TokenExpired => "token_expired",
            Self::SessionRevoked => "session_revoked",
            Self::BadCredentials => "bad_credentials",
        }
    }

    pub fn describe(&self) -> &'static str {
        match self {
            Self::MissingToken => "Authentication required",
            Self::InvalidToken => "Invalid token",
            Self::TokenExpired => "Token expired",
            Self::SessionRevoked => "Session was revoked; please log in again",
            Self::BadCredentials => "Invalid username or password",
        }
    }
}

/// Backend error taxonomy
///
/// # Usage
///
/// ```rust
/// use xfchat::backend::error::{BackendError, UnauthorizedReason};
///
/// let err = BackendError::unauthorized(UnauthorizedReason::SessionRevoked);
/// assert!(err.forces_logout());
/// ```
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Unauthorized: {}", .reason.describe())]
    Unauthorized { reason: UnauthorizedReason },

    #[error("Forbidden: {message}")]
    Forbidden { message: String },

    #[error("Not found: {message}")]
    NotFound { message: String },

    /// Validation error (from shared module)
    #[error(transparent)]
    InvalidInput(#[from] SharedError),

    #[error("Conflict: {message}")]
    Conflict { message: String },

    /// A collaborator (storage write, object storage, token issuer) failed
    #[error("Upstream error: {message}")]
    Upstream { message: String },
}

impl BackendError {
    pub fn unauthorized(reason: UnauthorizedReason) -> Self {
        Self::Unauthorized { reason }
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound {
            message: message.into(),
        }
    }

    /// Shorthand for a field validation failure
    pub fn invalid(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidInput(SharedError::validation(field, message))
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream {
            message: message.into(),
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            Self::Forbidden { .. } => StatusCode::FORBIDDEN,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::InvalidInput(_) => StatusCode::BAD_REQUEST,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Upstream { .. } => StatusCode::BAD_GATEWAY,
        }
    }

    /// Stable machine-readable code for the response body
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorized { reason } => reason.code(),
            Self::Forbidden { .. } => "forbidden",
            Self::NotFound { .. } => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict { .. } => "conflict",
            Self::Upstream { .. } => "upstream",
        }
    }

    /// Get the error message
    pub fn message(&self) -> String {
        match self {
            Self::Unauthorized { reason } => reason.describe().to_string(),
            Self::Forbidden { message }
            | Self::NotFound { message }
            | Self::Conflict { message }
            | Self::Upstream { message } => message.clone(),
            Self::InvalidInput(err) => err.to_string(),
        }
    }

    /// Whether the client must drop its credentials
    pub fn forces_logout(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized {
                reason: UnauthorizedReason::SessionRevoked
            }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_mapping() {
        assert_eq!(
            BackendError::unauthorized(UnauthorizedReason::MissingToken).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(BackendError::forbidden("no").status_code(), StatusCode::FORBIDDEN);
        assert_eq!(BackendError::not_found("gone").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(BackendError::invalid("content", "empty").status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(BackendError::conflict("dup").status_code(), StatusCode::CONFLICT);
        assert_eq!(BackendError::upstream("s3").status_code(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_from_shared_error() {
        let backend_error: BackendError = SharedError::validation("field", "message").into();
        assert!(matches!(backend_error, BackendError::InvalidInput(_)));
        assert_eq!(backend_error.code(), "invalid_input");
    }

    #[test]
    fn test_only_revoked_sessions_force_logout() {
        assert!(BackendError::unauthorized(UnauthorizedReason::SessionRevoked).forces_logout());
        assert!(!BackendError::unauthorized(UnauthorizedReason::TokenExpired).forces_logout());
        assert!(!BackendError::forbidden("x").forces_logout());
    }

    #[test]
    fn test_error_message() {
        let error = BackendError::not_found("Message not found");
        assert_eq!(error.message(), "Message not found");
        assert!(error.to_string().contains("Message not found"));
    }
}
