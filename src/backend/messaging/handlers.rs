//! Messaging HTTP Handlers
//!
//! Thin adapters from HTTP to [`ChatService`](super::service::ChatService).
//! Every handler runs as the authenticated `(user, device)` pair.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthSession;
use crate::backend::server::state::AppState;
use crate::shared::messaging::{
    Container, DeleteMessageQuery, MessagePage, MessageView, PageQuery, SearchQuery, SendMessageRequest,
};

/// POST /api/messages
pub async fn send_message(
    State(state): State<AppState>,
    auth: AuthSession,
    payload: Result<Json<SendMessageRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MessageView>), BackendError> {
    let Json(request) = payload?;
    let view = state
        .chat
        .send_message(auth.user_id, Some(&auth.device_id), request)
        .await?;
    Ok((StatusCode::CREATED, Json(view)))
}

/// PATCH /api/messages/{id}/seen
pub async fn mark_seen(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(message_id): Path<Uuid>,
) -> Result<Json<Value>, BackendError> {
    let outcome = state.chat.mark_seen(auth.user_id, message_id).await?;
    Ok(Json(json!({
        "messageId": message_id,
        "status": "read",
        "changed": outcome.changed(),
    })))
}

/// DELETE /api/messages/{id}?for_everyone=
pub async fn delete_message(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(message_id): Path<Uuid>,
    Query(query): Query<DeleteMessageQuery>,
) -> Result<StatusCode, BackendError> {
    state
        .chat
        .delete_message(auth.user_id, message_id, query.for_everyone)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/messages/search
pub async fn search_messages(
    State(state): State<AppState>,
    auth: AuthSession,
    Query(query): Query<SearchQuery>,
) -> Result<Json<Value>, BackendError> {
    let messages = state.chat.search_messages(auth.user_id, query).await?;
    Ok(Json(json!({ "messages": messages })))
}

/// GET /api/conversations/{id}/messages
pub async fn conversation_messages(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(conversation_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagePage>, BackendError> {
    let page = state
        .chat
        .fetch_page(auth.user_id, Container::Direct(conversation_id), query)
        .await?;
    Ok(Json(page))
}

/// GET /api/groups/{id}/messages
pub async fn group_messages(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<Uuid>,
    Query(query): Query<PageQuery>,
) -> Result<Json<MessagePage>, BackendError> {
    let page = state
        .chat
        .fetch_page(auth.user_id, Container::Group(group_id), query)
        .await?;
    Ok(Json(page))
}
