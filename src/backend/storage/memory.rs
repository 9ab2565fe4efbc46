/**
 * In-Memory Tables
 *
 * The memory backend mirrors the Postgres schema as plain collections behind
 * `tokio` locks. Component stores own the query logic; this module only
 * holds the tables and a few helpers that keep indexes consistent.
 *
 * # Locking
 *
 * - Each user record has its own mutex, so session-list mutations serialize
 *   per user without blocking other users.
 * - When both `messages` and `statuses` are needed, `messages` is locked
 *   first.
 */
use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, RwLock};
use uuid::Uuid;

use crate::backend::auth::users::UserAccount;
use crate::backend::sessions::bounded::SessionList;
use crate::shared::messaging::{Container, Conversation, DeliveryStatus, Group, Message, StatusEntry};

/// A user account with its device sessions
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub account: UserAccount,
    pub sessions: SessionList,
}

#[derive(Default)]
pub struct UserTable {
    pub by_id: HashMap<Uuid, Arc<Mutex<UserRecord>>>,
    pub by_username: HashMap<String, Uuid>,
}

#[derive(Default)]
pub struct ConversationTable {
    pub by_id: HashMap<Uuid, Conversation>,
    /// Unique index on the ordered participant pair
    pub by_pair: HashMap<(Uuid, Uuid), Uuid>,
}

#[derive(Default)]
pub struct MessageTable {
    /// Messages are stored with an empty `status`; see [`StatusArena`]
    pub by_id: HashMap<Uuid, Message>,
    /// Message ids per container in insertion order
    pub by_container: HashMap<Container, Vec<Uuid>>,
}

impl MessageTable {
    pub fn insert(&mut self, container: Container, mut message: Message) {
        message.status.clear();
        self.by_container.entry(container).or_default().push(message.id);
        self.by_id.insert(message.id, message);
    }

    pub fn remove(&mut self, message_id: Uuid) -> Option<Message> {
        let message = self.by_id.remove(&message_id)?;
        if let Some(container) = message.container() {
            if let Some(ids) = self.by_container.get_mut(&container) {
                ids.retain(|id| *id != message_id);
            }
        }
        Some(message)
    }

    /// Messages of one container, newest first
    pub fn newest_first(&self, container: Container) -> Vec<&Message> {
        let mut messages: Vec<&Message> = self
            .by_container
            .get(&container)
            .map(|ids| ids.iter().filter_map(|id| self.by_id.get(id)).collect())
            .unwrap_or_default();
        // Stable sort keeps insertion order for equal timestamps; reverse below
        messages.sort_by_key(|m| m.timestamp);
        messages.reverse();
        messages
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusRow {
    pub status: DeliveryStatus,
    pub updated_at: DateTime<Utc>,
}

/// Per-recipient status rows keyed by `(message_id, user_id)`
#[derive(Default)]
pub struct StatusArena {
    pub rows: HashMap<(Uuid, Uuid), StatusRow>,
    /// Recipient order per message
    pub recipients: HashMap<Uuid, Vec<Uuid>>,
}

impl StatusArena {
    pub fn insert_for(&mut self, message_id: Uuid, entries: &[StatusEntry]) {
        let order = entries.iter().map(|e| e.user_id).collect();
        for entry in entries {
            self.rows.insert(
                (message_id, entry.user_id),
                StatusRow {
                    status: entry.status,
                    updated_at: entry.timestamp,
                },
            );
        }
        self.recipients.insert(message_id, order);
    }

    pub fn remove_message(&mut self, message_id: Uuid) {
        if let Some(users) = self.recipients.remove(&message_id) {
            for user_id in users {
                self.rows.remove(&(message_id, user_id));
            }
        }
    }

    /// Status list for one message, in recipient order
    pub fn materialize(&self, message_id: Uuid) -> Vec<StatusEntry> {
        self.recipients
            .get(&message_id)
            .map(|users| {
                users
                    .iter()
                    .filter_map(|user_id| {
                        self.rows.get(&(message_id, *user_id)).map(|row| StatusEntry {
                            user_id: *user_id,
                            status: row.status,
                            timestamp: row.updated_at,
                        })
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Clone `message` with its status list filled in
    pub fn attach(&self, message: &Message) -> Message {
        let mut full = message.clone();
        full.status = self.materialize(message.id);
        full
    }
}

/// All in-memory tables
#[derive(Default)]
pub struct MemoryDb {
    pub users: RwLock<UserTable>,
    pub conversations: RwLock<ConversationTable>,
    pub groups: RwLock<HashMap<Uuid, Group>>,
    pub messages: RwLock<MessageTable>,
    pub statuses: RwLock<StatusArena>,
}

impl MemoryDb {
    /// Per-user record handle, if the user exists
    pub async fn user(&self, user_id: Uuid) -> Option<Arc<Mutex<UserRecord>>> {
        self.users.read().await.by_id.get(&user_id).cloned()
    }
}
