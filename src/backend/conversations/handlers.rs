//! Conversation HTTP Handlers

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthSession;
use crate::backend::server::state::AppState;
use crate::shared::messaging::{Conversation, ListConversationsResponse, OpenConversationRequest};

/// GET /api/conversations
pub async fn list_conversations(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<ListConversationsResponse>, BackendError> {
    let conversations = state.chat.list_conversations(auth.user_id).await?;
    Ok(Json(ListConversationsResponse { conversations }))
}

/// POST /api/conversations
///
/// Returns the existing conversation with the other user, or a new empty one.
pub async fn open_conversation(
    State(state): State<AppState>,
    auth: AuthSession,
    payload: Result<Json<OpenConversationRequest>, JsonRejection>,
) -> Result<Json<Conversation>, BackendError> {
    let Json(request) = payload?;
    let conversation = state
        .chat
        .open_conversation(auth.user_id, request.other_user_id)
        .await?;
    Ok(Json(conversation))
}

/// DELETE /api/conversations/{other_user_id}
pub async fn delete_conversation(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(other_user_id): Path<Uuid>,
) -> Result<StatusCode, BackendError> {
    state.chat.delete_conversation(auth.user_id, other_user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
