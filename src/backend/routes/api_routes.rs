/**
 * API Routes
 *
 * ## Authentication
 * - `POST /api/auth/signup`, `POST /api/auth/login`, `POST /api/auth/logout`
 * - `GET /api/auth/sessions`, `DELETE /api/auth/sessions/{device_id}`
 *
 * ## Conversations
 * - `GET|POST /api/conversations`, `DELETE /api/conversations/{other_user_id}`
 * - `GET /api/conversations/{id}/messages`
 *
 * ## Groups
 * - `GET|POST /api/groups`, `DELETE /api/groups/{id}`
 * - `GET /api/groups/{id}/messages`
 * - `POST /api/groups/{id}/members`, `DELETE /api/groups/{id}/members/{user_id}`
 * - `POST /api/groups/{id}/admins/{user_id}`, `PATCH /api/groups/{id}/settings`
 * - `POST /api/groups/{id}/leave`
 *
 * ## Messages and media
 * - `POST /api/messages`, `POST /api/messages/media`, `GET /api/messages/search`
 * - `PATCH /api/messages/{id}/seen`, `DELETE /api/messages/{id}`
 * - `POST /api/media`
 *
 * Everything except signup and login requires a bearer token whose session
 * is still live.
 */

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::backend::auth::handlers::{list_sessions, login, logout, revoke_device, signup};
use crate::backend::conversations::handlers as conversations;
use crate::backend::groups::handlers as groups;
use crate::backend::media::handlers as media;
use crate::backend::messaging::handlers as messaging;
use crate::backend::server::state::AppState;

/// Configure API routes
pub fn configure_api_routes(router: Router<AppState>) -> Router<AppState> {
    router
        // Authentication endpoints
        .route("/api/auth/signup", post(signup))
        .route("/api/auth/login", post(login))
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/sessions", get(list_sessions))
        .route("/api/auth/sessions/{device_id}", delete(revoke_device))
        // Conversations
        .route(
            "/api/conversations",
            get(conversations::list_conversations).post(conversations::open_conversation),
        )
        .route(
            "/api/conversations/{id}",
            delete(conversations::delete_conversation),
        )
        .route(
            "/api/conversations/{id}/messages",
            get(messaging::conversation_messages),
        )
        // Groups
        .route("/api/groups", get(groups::list_groups).post(groups::create_group))
        .route("/api/groups/{id}", delete(groups::delete_group))
        .route("/api/groups/{id}/messages", get(messaging::group_messages))
        .route("/api/groups/{id}/members", post(groups::add_members))
        .route(
            "/api/groups/{id}/members/{user_id}",
            delete(groups::remove_member),
        )
        .route("/api/groups/{id}/admins/{user_id}", post(groups::promote_admin))
        .route("/api/groups/{id}/settings", patch(groups::update_settings))
        .route("/api/groups/{id}/leave", post(groups::leave_group))
        // Messages
        .route("/api/messages", post(messaging::send_message))
        .route("/api/messages/media", post(media::send_media_message))
        .route("/api/messages/search", get(messaging::search_messages))
        .route("/api/messages/{id}/seen", patch(messaging::mark_seen))
        .route("/api/messages/{id}", delete(messaging::delete_message))
        // Media
        .route("/api/media", post(media::upload_media))
}
