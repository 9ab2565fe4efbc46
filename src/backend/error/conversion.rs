/**
 * Error Conversion
 *
 * This module provides conversion implementations for backend errors,
 * allowing them to be converted to HTTP responses and built from lower
 * layer errors.
 *
 * # Response Format
 *
 * Error responses are returned as JSON with the following structure:
 * ```json
 * {
 *   "error": "Error message",
 *   "code": "forbidden",
 *   "status": 403
 * }
 * ```
 *
 * A revoked session additionally carries `"forceLogout": true`.
 */

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};

use crate::backend::error::types::BackendError;
use crate::backend::storage::StorageError;

impl IntoResponse for BackendError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::warn!("[Error] {}", self);
        }

        let mut body = serde_json::json!({
            "error": self.message(),
            "code": self.code(),
            "status": status.as_u16(),
        });
        if self.forces_logout() {
            body["forceLogout"] = serde_json::Value::Bool(true);
        }

        (status, Json(body)).into_response()
    }
}

impl From<StorageError> for BackendError {
    /// Storage failures reaching a handler are never retried here
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => BackendError::not_found(format!("{} not found", what)),
            StorageError::Conflict(what) => BackendError::conflict(what),
            StorageError::Transient(detail) => {
                tracing::warn!("[Storage] transient failure surfaced to caller: {}", detail);
                BackendError::upstream("storage temporarily unavailable")
            }
            StorageError::Database(detail) => {
                tracing::error!("[Storage] database error: {}", detail);
                BackendError::upstream("storage")
            }
        }
    }
}

impl From<axum::extract::rejection::JsonRejection> for BackendError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        BackendError::invalid("body", rejection.body_text())
    }
}
