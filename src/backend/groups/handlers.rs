//! Group HTTP Handlers
//!
//! Admin checks happen in the Group Store; these handlers only map the
//! request onto the matching `ChatService` call.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::middleware::AuthSession;
use crate::backend::server::state::AppState;
use crate::shared::messaging::{
    AddMembersRequest, CreateGroupRequest, Group, GroupSettingsRequest, ListGroupsResponse,
};

/// GET /api/groups
pub async fn list_groups(
    State(state): State<AppState>,
    auth: AuthSession,
) -> Result<Json<ListGroupsResponse>, BackendError> {
    let groups = state.chat.list_groups(auth.user_id).await?;
    Ok(Json(ListGroupsResponse { groups }))
}

/// POST /api/groups
pub async fn create_group(
    State(state): State<AppState>,
    auth: AuthSession,
    payload: Result<Json<CreateGroupRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Group>), BackendError> {
    let Json(request) = payload?;
    let group = state
        .chat
        .create_group(auth.user_id, &request.name, &request.member_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(group)))
}

/// POST /api/groups/{id}/members
pub async fn add_members(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<Uuid>,
    payload: Result<Json<AddMembersRequest>, JsonRejection>,
) -> Result<Json<Group>, BackendError> {
    let Json(request) = payload?;
    let group = state
        .chat
        .add_group_members(group_id, auth.user_id, &request.member_ids)
        .await?;
    Ok(Json(group))
}

/// DELETE /api/groups/{id}/members/{user_id}
pub async fn remove_member(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Group>, BackendError> {
    let group = state
        .chat
        .remove_group_member(group_id, auth.user_id, user_id)
        .await?;
    Ok(Json(group))
}

/// POST /api/groups/{id}/admins/{user_id}
pub async fn promote_admin(
    State(state): State<AppState>,
    auth: AuthSession,
    Path((group_id, user_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Group>, BackendError> {
    let group = state
        .chat
        .promote_group_admin(group_id, auth.user_id, user_id)
        .await?;
    Ok(Json(group))
}

/// PATCH /api/groups/{id}/settings
pub async fn update_settings(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<Uuid>,
    payload: Result<Json<GroupSettingsRequest>, JsonRejection>,
) -> Result<Json<Group>, BackendError> {
    let Json(request) = payload?;
    let group = state
        .chat
        .set_group_messaging(group_id, auth.user_id, request.can_send_messages)
        .await?;
    Ok(Json(group))
}

/// POST /api/groups/{id}/leave
pub async fn leave_group(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, BackendError> {
    state.chat.leave_group(group_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/groups/{id}
pub async fn delete_group(
    State(state): State<AppState>,
    auth: AuthSession,
    Path(group_id): Path<Uuid>,
) -> Result<StatusCode, BackendError> {
    state.chat.delete_group(group_id, auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
