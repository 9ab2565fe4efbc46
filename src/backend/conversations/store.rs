/**
 * Conversation Store
 *
 * Owns direct conversations. A conversation is keyed by its unordered
 * participant pair, which the storage layer keeps unique, so concurrent
 * `find_or_create_direct` calls for the same pair converge on one record.
 *
 * The latest-message pointer moves with a single conditional update: the
 * newest timestamp wins, and the receiver of the new message is removed from
 * `deleted_by` so the conversation reappears for them.
 */
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::storage::{read_with_retry, Backend, StorageError};
use crate::shared::messaging::{pair_key, Conversation};

#[derive(Clone, Debug)]
pub struct ConversationStore {
    backend: Backend,
}

const SELECT_COLUMNS: &str =
    "id, user_low, user_high, latest_message_id, latest_message_at, deleted_by, created_at";

fn conversation_from_row(row: &sqlx::postgres::PgRow) -> Conversation {
    Conversation {
        id: row.get("id"),
        participants: [row.get("user_low"), row.get("user_high")],
        latest_message_id: row.get("latest_message_id"),
        latest_message_at: row.get("latest_message_at"),
        deleted_by: row.get("deleted_by"),
        created_at: row.get("created_at"),
    }
}

impl ConversationStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Find the conversation for an unordered pair, creating it if absent
    pub async fn find_or_create_direct(&self, user_a: Uuid, user_b: Uuid) -> Result<Conversation, BackendError> {
        if user_a == user_b {
            return Err(BackendError::invalid("target", "Cannot open a conversation with yourself"));
        }
        let pair = pair_key(user_a, user_b);

        match &self.backend {
            Backend::Memory(db) => {
                let mut table = db.conversations.write().await;
                if let Some(existing) = table.by_pair.get(&pair).and_then(|id| table.by_id.get(id)) {
                    return Ok(existing.clone());
                }
                let conversation = Conversation::new_direct(user_a, user_b);
                table.by_pair.insert(pair, conversation.id);
                table.by_id.insert(conversation.id, conversation.clone());
                tracing::debug!("[Conversations] created {} for {:?}", conversation.id, pair);
                Ok(conversation)
            }
            Backend::Postgres(pool) => {
                let candidate = Conversation::new_direct(user_a, user_b);
                let inserted = sqlx::query(
                    r#"
                    INSERT INTO conversations (id, user_low, user_high, deleted_by, created_at)
                    VALUES ($1, $2, $3, '{}', $4)
                    ON CONFLICT (user_low, user_high) DO NOTHING
                    "#,
                )
                .bind(candidate.id)
                .bind(pair.0)
                .bind(pair.1)
                .bind(candidate.created_at)
                .execute(pool)
                .await
                .map_err(StorageError::from)?;
                if inserted.rows_affected() == 1 {
                    tracing::debug!("[Conversations] created {} for {:?}", candidate.id, pair);
                }

                let found = read_with_retry("conversation", || pg_find_pair(pool, pair)).await?;
                found.ok_or_else(|| BackendError::upstream("conversation vanished after upsert"))
            }
        }
    }

    /// Existing conversation for a pair, if any
    pub async fn find_direct(&self, user_a: Uuid, user_b: Uuid) -> Result<Option<Conversation>, BackendError> {
        let pair = pair_key(user_a, user_b);
        let found = match &self.backend {
            Backend::Memory(db) => {
                let table = db.conversations.read().await;
                table
                    .by_pair
                    .get(&pair)
                    .and_then(|id| table.by_id.get(id))
                    .cloned()
            }
            Backend::Postgres(pool) => read_with_retry("conversation", || pg_find_pair(pool, pair)).await?,
        };
        Ok(found)
    }

    pub async fn get(&self, conversation_id: Uuid) -> Result<Option<Conversation>, BackendError> {
        let found = match &self.backend {
            Backend::Memory(db) => db.conversations.read().await.by_id.get(&conversation_id).cloned(),
            Backend::Postgres(pool) => {
                read_with_retry("conversation", || async move {
                    let sql = format!("SELECT {} FROM conversations WHERE id = $1", SELECT_COLUMNS);
                    let row = sqlx::query(&sql).bind(conversation_id).fetch_optional(pool).await?;
                    Ok::<_, StorageError>(row.as_ref().map(conversation_from_row))
                })
                .await?
            }
        };
        Ok(found)
    }

    /// Whether the two users already share a direct conversation
    pub async fn shares_conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<bool, BackendError> {
        Ok(self.find_direct(user_a, user_b).await?.is_some())
    }

    /// Point the conversation at a new message and un-hide it for `receiver`.
    ///
    /// The pointer only moves forward in time; an older message arriving late
    /// leaves it untouched.
    pub async fn record_new_message(
        &self,
        conversation_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
        receiver: Uuid,
    ) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut table = db.conversations.write().await;
                let conversation = table
                    .by_id
                    .get_mut(&conversation_id)
                    .ok_or(StorageError::NotFound("conversation"))?;
                conversation.advance_latest(message_id, at);
                conversation.deleted_by.retain(|id| *id != receiver);
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    UPDATE conversations
                    SET latest_message_id = CASE
                            WHEN latest_message_at IS NULL OR latest_message_at <= $3 THEN $2
                            ELSE latest_message_id END,
                        latest_message_at = CASE
                            WHEN latest_message_at IS NULL OR latest_message_at <= $3 THEN $3
                            ELSE latest_message_at END,
                        deleted_by = array_remove(deleted_by, $4)
                    WHERE id = $1
                    "#,
                )
                .bind(conversation_id)
                .bind(message_id)
                .bind(at)
                .bind(receiver)
                .execute(pool)
                .await
                .map_err(StorageError::from)?;
                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound("conversation").into());
                }
            }
        }
        Ok(())
    }

    /// Hide the conversation for one user; messages are untouched
    pub async fn soft_delete(&self, conversation_id: Uuid, user_id: Uuid) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut table = db.conversations.write().await;
                let conversation = table
                    .by_id
                    .get_mut(&conversation_id)
                    .ok_or(StorageError::NotFound("conversation"))?;
                if !conversation.deleted_by.contains(&user_id) {
                    conversation.deleted_by.push(user_id);
                }
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    UPDATE conversations
                    SET deleted_by = CASE
                        WHEN $2 = ANY(deleted_by) THEN deleted_by
                        ELSE array_append(deleted_by, $2) END
                    WHERE id = $1
                    "#,
                )
                .bind(conversation_id)
                .bind(user_id)
                .execute(pool)
                .await
                .map_err(StorageError::from)?;
                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound("conversation").into());
                }
            }
        }
        tracing::debug!("[Conversations] {} hidden for user {}", conversation_id, user_id);
        Ok(())
    }

    /// Conversations visible to `user_id`, most recently active first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, BackendError> {
        let mut conversations = self.all_for_user(user_id).await?;
        conversations.retain(|c| c.is_visible_to(user_id));
        Ok(conversations)
    }

    /// Everyone `user_id` shares a conversation with, hidden ones included
    pub async fn partners_of(&self, user_id: Uuid) -> Result<Vec<Uuid>, BackendError> {
        Ok(self
            .all_for_user(user_id)
            .await?
            .iter()
            .filter_map(|c| c.other_participant(user_id))
            .collect())
    }

    async fn all_for_user(&self, user_id: Uuid) -> Result<Vec<Conversation>, BackendError> {
        let mut conversations = match &self.backend {
            Backend::Memory(db) => db
                .conversations
                .read()
                .await
                .by_id
                .values()
                .filter(|c| c.has_participant(user_id))
                .cloned()
                .collect::<Vec<_>>(),
            Backend::Postgres(pool) => {
                read_with_retry("conversations", || async move {
                    let sql = format!(
                        "SELECT {} FROM conversations WHERE user_low = $1 OR user_high = $1",
                        SELECT_COLUMNS
                    );
                    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
                    Ok::<_, StorageError>(rows.iter().map(conversation_from_row).collect::<Vec<_>>())
                })
                .await?
            }
        };
        conversations.sort_by(|a, b| {
            b.latest_message_at
                .cmp(&a.latest_message_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(conversations)
    }
}

async fn pg_find_pair(pool: &PgPool, pair: (Uuid, Uuid)) -> Result<Option<Conversation>, StorageError> {
    let sql = format!(
        "SELECT {} FROM conversations WHERE user_low = $1 AND user_high = $2",
        SELECT_COLUMNS
    );
    let row = sqlx::query(&sql)
        .bind(pair.0)
        .bind(pair.1)
        .fetch_optional(pool)
        .await?;
    Ok(row.as_ref().map(conversation_from_row))
}
