//! Media HTTP Handlers
//!
//! Both endpoints take the raw file as the request body and its name in the
//! query string. The body limit is applied by the router.

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthSession;
use crate::backend::server::state::AppState;
use crate::shared::messaging::{MessageType, MessageView, SendMessageRequest};

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub file_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MediaMessageQuery {
    pub target: Uuid,
    #[serde(default)]
    pub is_group: bool,
    #[serde(default)]
    pub content: String,
    pub message_type: Option<MessageType>,
    pub file_name: Option<String>,
    pub reply_to: Option<Uuid>,
}

fn content_type(headers: &HeaderMap) -> String {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string()
}

/// Message type implied by a MIME type
fn infer_message_type(content_type: &str) -> MessageType {
    match content_type.split('/').next() {
        Some("image") => MessageType::Image,
        Some("video") => MessageType::Video,
        Some("audio") => MessageType::Audio,
        _ => MessageType::File,
    }
}

/// POST /api/media
pub async fn upload_media(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<Value>), BackendError> {
    let file_name = query.file_name.unwrap_or_else(|| "upload".to_string());
    let url = state
        .media
        .upload(&file_name, &content_type(&headers), body)
        .await?;
    tracing::debug!("[Media] {} uploaded {}", auth.user_id, url);
    Ok((StatusCode::CREATED, Json(json!({ "url": url }))))
}

/// POST /api/messages/media
///
/// Uploads the body, then sends a message pointing at it. A failed send
/// deletes the uploaded object again.
pub async fn send_media_message(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<MediaMessageQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<MessageView>), BackendError> {
    let mime = content_type(&headers);
    let file_name = query.file_name.unwrap_or_else(|| "upload".to_string());
    let url = state.media.upload(&file_name, &mime, body).await?;

    let request = SendMessageRequest {
        target: query.target,
        is_group: query.is_group,
        content: query.content,
        message_type: query.message_type.unwrap_or_else(|| infer_message_type(&mime)),
        media_url: Some(url.clone()),
        reply_to: query.reply_to,
    };

    match state
        .chat
        .send_message(auth.user_id, Some(&auth.device_id), request)
        .await
    {
        Ok(view) => Ok((StatusCode::CREATED, Json(view))),
        Err(err) => {
            if let Err(cleanup) = state.media.delete(&url).await {
                tracing::warn!("[Media] could not remove orphaned upload {}: {}", url, cleanup);
            }
            Err(err)
        }
    }
}
