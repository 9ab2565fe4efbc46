/**
 * Application State Management
 *
 * This module defines the application state shared by every handler.
 *
 * # Architecture
 *
 * `AppState` holds one instance of each component:
 * - User Directory, Session Registry and token issuer
 * - Conversation, Group and Message stores over one storage `Backend`
 * - Presence Registry and Event Router for live connections
 * - `ChatService`, which orchestrates the above for messaging operations
 * - Media client for the object store
 *
 * Every component is cheap to clone; clones share the same underlying
 * tables, pool and connection map.
 */

use chrono::Duration;
use std::sync::Arc;

use crate::backend::auth::tokens::TokenIssuer;
use crate::backend::auth::users::UserDirectory;
use crate::backend::conversations::ConversationStore;
use crate::backend::error::BackendError;
use crate::backend::groups::GroupStore;
use crate::backend::media::MediaClient;
use crate::backend::messaging::{ChatService, MessageStore};
use crate::backend::realtime::{EventRouter, PresenceRegistry};
use crate::backend::sessions::SessionRegistry;
use crate::backend::storage::Backend;
use crate::shared::AppConfig;

#[derive(Clone, Debug)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub backend: Backend,
    pub users: UserDirectory,
    pub sessions: SessionRegistry,
    pub tokens: TokenIssuer,
    pub conversations: ConversationStore,
    pub groups: GroupStore,
    pub messages: MessageStore,
    pub presence: PresenceRegistry,
    pub events: EventRouter,
    pub chat: ChatService,
    pub media: MediaClient,
}

impl AppState {
    /// Wire every component over one storage backend
    pub fn new(config: AppConfig, backend: Backend) -> Result<Self, BackendError> {
        config
            .validate()
            .map_err(|e| BackendError::invalid("config", e.to_string()))?;

        let users = UserDirectory::new(backend.clone(), config.bcrypt_cost);
        let sessions = SessionRegistry::new(backend.clone());
        let tokens = TokenIssuer::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours));
        let conversations = ConversationStore::new(backend.clone());
        let groups = GroupStore::new(backend.clone(), conversations.clone());
        let messages = MessageStore::new(backend.clone());
        let presence = PresenceRegistry::new();
        let events = EventRouter::new(presence.clone(), conversations.clone());
        let chat = ChatService::new(
            users.clone(),
            sessions.clone(),
            conversations.clone(),
            groups.clone(),
            messages.clone(),
            events.clone(),
            config.default_page_size,
            config.max_page_size,
        );
        let media = MediaClient::new(config.media.clone());

        Ok(Self {
            config: Arc::new(config),
            backend,
            users,
            sessions,
            tokens,
            conversations,
            groups,
            messages,
            presence,
            events,
            chat,
            media,
        })
    }
}
