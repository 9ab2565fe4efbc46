/**
 * Message Store
 *
 * Persists messages and their per-recipient status rows. Statuses live in a
 * separate table keyed by `(message_id, user_id)`, so marking one recipient
 * touches one row regardless of group size. The `status` list on a returned
 * `Message` is assembled from those rows in recipient order.
 *
 * # Atomicity
 *
 * `insert` writes the message and all of its status rows together (one
 * transaction, or one critical section in memory). `apply_status` locks the
 * single status row it changes.
 */
use std::collections::HashMap;

use chrono::Utc;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::messaging::status::{transition, Transition};
use crate::backend::storage::{read_with_retry, Backend, StorageError};
use crate::shared::messaging::{Container, DeliveryStatus, Message, MessageType, StatusEntry};

#[derive(Clone, Debug)]
pub struct MessageStore {
    backend: Backend,
}

const SELECT_COLUMNS: &str = "id, sender_id, receiver_id, conversation_id, group_id, is_group, content, \
     message_type, media_url, reply_to_message_id, deleted_by, is_deleted, encrypted, created_at";

fn container_column(container: Container) -> &'static str {
    match container {
        Container::Direct(_) => "conversation_id",
        Container::Group(_) => "group_id",
    }
}

fn message_from_row(row: &sqlx::postgres::PgRow) -> Message {
    let message_type: String = row.get("message_type");
    Message {
        id: row.get("id"),
        sender: row.get("sender_id"),
        receiver: row.get("receiver_id"),
        conversation_id: row.get("conversation_id"),
        group_id: row.get("group_id"),
        is_group: row.get("is_group"),
        content: row.get("content"),
        message_type: MessageType::parse(&message_type).unwrap_or_default(),
        media_url: row.get("media_url"),
        reply_to_message_id: row.get("reply_to_message_id"),
        status: Vec::new(),
        deleted_by: row.get("deleted_by"),
        is_deleted: row.get("is_deleted"),
        encrypted: row.get("encrypted"),
        timestamp: row.get("created_at"),
    }
}

/// Escape `%`, `_` and `\` for a `LIKE` pattern
fn like_pattern(query: &str) -> String {
    let mut escaped = String::with_capacity(query.len() + 2);
    escaped.push('%');
    for c in query.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

impl MessageStore {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Persist a message together with its status rows
    pub async fn insert(&self, message: &Message) -> Result<(), BackendError> {
        let container = message
            .container()
            .ok_or_else(|| BackendError::invalid("container", "Message has no container"))?;

        match &self.backend {
            Backend::Memory(db) => {
                let mut messages = db.messages.write().await;
                let mut statuses = db.statuses.write().await;
                if messages.by_id.contains_key(&message.id) {
                    return Err(BackendError::conflict("Duplicate message id"));
                }
                statuses.insert_for(message.id, &message.status);
                messages.insert(container, message.clone());
            }
            Backend::Postgres(pool) => pg_insert(pool, message).await?,
        }
        Ok(())
    }

    /// Remove a message that could not be fully recorded
    pub async fn purge(&self, message_id: Uuid) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut messages = db.messages.write().await;
                let mut statuses = db.statuses.write().await;
                messages.remove(message_id);
                statuses.remove_message(message_id);
            }
            Backend::Postgres(pool) => {
                sqlx::query("DELETE FROM messages WHERE id = $1")
                    .bind(message_id)
                    .execute(pool)
                    .await
                    .map_err(StorageError::from)?;
            }
        }
        Ok(())
    }

    pub async fn get(&self, message_id: Uuid) -> Result<Option<Message>, BackendError> {
        let found = match &self.backend {
            Backend::Memory(db) => {
                let messages = db.messages.read().await;
                let statuses = db.statuses.read().await;
                messages.by_id.get(&message_id).map(|m| statuses.attach(m))
            }
            Backend::Postgres(pool) => read_with_retry("message", || pg_get(pool, message_id)).await?,
        };
        Ok(found)
    }

    /// One page of messages visible to `viewer`, newest first, plus the total
    /// number of visible messages. `page` is 1-based.
    pub async fn page(
        &self,
        container: Container,
        viewer: Uuid,
        page: u32,
        page_size: u32,
    ) -> Result<(Vec<Message>, u64), BackendError> {
        let offset = (page.saturating_sub(1) as usize) * page_size as usize;

        let result = match &self.backend {
            Backend::Memory(db) => {
                let messages = db.messages.read().await;
                let statuses = db.statuses.read().await;
                let visible: Vec<&Message> = messages
                    .newest_first(container)
                    .into_iter()
                    .filter(|m| m.is_visible_to(viewer))
                    .collect();
                let total = visible.len() as u64;
                let items = visible
                    .into_iter()
                    .skip(offset)
                    .take(page_size as usize)
                    .map(|m| statuses.attach(m))
                    .collect();
                (items, total)
            }
            Backend::Postgres(pool) => {
                read_with_retry("message page", || {
                    pg_page(pool, container, viewer, page_size as i64, offset as i64)
                })
                .await?
            }
        };
        Ok(result)
    }

    /// Case-insensitive substring search over visible messages, newest first
    pub async fn search(
        &self,
        container: Container,
        viewer: Uuid,
        query: &str,
        limit: u32,
    ) -> Result<Vec<Message>, BackendError> {
        let found = match &self.backend {
            Backend::Memory(db) => {
                let needle = query.to_lowercase();
                let messages = db.messages.read().await;
                let statuses = db.statuses.read().await;
                messages
                    .newest_first(container)
                    .into_iter()
                    .filter(|m| m.is_visible_to(viewer) && m.content.to_lowercase().contains(&needle))
                    .take(limit as usize)
                    .map(|m| statuses.attach(m))
                    .collect()
            }
            Backend::Postgres(pool) => {
                let pattern = like_pattern(query);
                read_with_retry("message search", || {
                    pg_search(pool, container, viewer, &pattern, limit as i64)
                })
                .await?
            }
        };
        Ok(found)
    }

    /// Hide a message for one user. Idempotent.
    pub async fn delete_for_user(&self, message_id: Uuid, user_id: Uuid) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut messages = db.messages.write().await;
                let message = messages
                    .by_id
                    .get_mut(&message_id)
                    .ok_or(StorageError::NotFound("message"))?;
                if !message.deleted_by.contains(&user_id) {
                    message.deleted_by.push(user_id);
                }
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    UPDATE messages
                    SET deleted_by = CASE
                        WHEN $2 = ANY(deleted_by) THEN deleted_by
                        ELSE array_append(deleted_by, $2) END
                    WHERE id = $1
                    "#,
                )
                .bind(message_id)
                .bind(user_id)
                .execute(pool)
                .await
                .map_err(StorageError::from)?;
                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound("message").into());
                }
            }
        }
        Ok(())
    }

    /// Set the global tombstone. Returns `false` if it was already set.
    pub async fn delete_for_everyone(&self, message_id: Uuid) -> Result<bool, BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut messages = db.messages.write().await;
                let message = messages
                    .by_id
                    .get_mut(&message_id)
                    .ok_or(StorageError::NotFound("message"))?;
                let changed = !message.is_deleted;
                message.is_deleted = true;
                Ok(changed)
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query("UPDATE messages SET is_deleted = TRUE WHERE id = $1 AND is_deleted = FALSE")
                    .bind(message_id)
                    .execute(pool)
                    .await
                    .map_err(StorageError::from)?;
                Ok(result.rows_affected() == 1)
            }
        }
    }

    /// Move one recipient's status toward `target`.
    ///
    /// Returns `None` when the user has no status entry for the message.
    pub async fn apply_status(
        &self,
        message_id: Uuid,
        user_id: Uuid,
        target: DeliveryStatus,
    ) -> Result<Option<Transition>, BackendError> {
        let now = Utc::now();
        match &self.backend {
            Backend::Memory(db) => {
                let mut statuses = db.statuses.write().await;
                let Some(row) = statuses.rows.get_mut(&(message_id, user_id)) else {
                    return Ok(None);
                };
                let step = transition(row.status, target);
                if let Transition::Advanced { to, .. } = step {
                    row.status = to;
                    row.updated_at = now;
                }
                Ok(Some(step))
            }
            Backend::Postgres(pool) => Ok(pg_apply_status(pool, message_id, user_id, target, now).await?),
        }
    }
}

async fn pg_insert(pool: &PgPool, message: &Message) -> Result<(), StorageError> {
    let mut tx: Transaction<'_, Postgres> = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO messages (id, sender_id, receiver_id, conversation_id, group_id, is_group, content,
                              message_type, media_url, reply_to_message_id, deleted_by, is_deleted,
                              encrypted, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
        "#,
    )
    .bind(message.id)
    .bind(message.sender)
    .bind(message.receiver)
    .bind(message.conversation_id)
    .bind(message.group_id)
    .bind(message.is_group)
    .bind(&message.content)
    .bind(message.message_type.as_str())
    .bind(&message.media_url)
    .bind(message.reply_to_message_id)
    .bind(&message.deleted_by)
    .bind(message.is_deleted)
    .bind(message.encrypted)
    .bind(message.timestamp)
    .execute(&mut *tx)
    .await?;

    if !message.status.is_empty() {
        let users: Vec<Uuid> = message.status.iter().map(|e| e.user_id).collect();
        let positions: Vec<i32> = (0..message.status.len() as i32).collect();
        let states: Vec<&str> = message.status.iter().map(|e| e.status.as_str()).collect();
        sqlx::query(
            r#"
            INSERT INTO message_status (message_id, user_id, position, status, updated_at)
            SELECT $1, u.user_id, u.position, u.status, $5
            FROM UNNEST($2::UUID[], $3::INT[], $4::TEXT[]) AS u(user_id, position, status)
            "#,
        )
        .bind(message.id)
        .bind(&users)
        .bind(&positions)
        .bind(&states)
        .bind(message.timestamp)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(())
}

async fn pg_statuses(pool: &PgPool, ids: &[Uuid]) -> Result<HashMap<Uuid, Vec<StatusEntry>>, StorageError> {
    let rows = sqlx::query(
        r#"
        SELECT message_id, user_id, status, updated_at
        FROM message_status
        WHERE message_id = ANY($1)
        ORDER BY message_id, position
        "#,
    )
    .bind(ids)
    .fetch_all(pool)
    .await?;

    let mut by_message: HashMap<Uuid, Vec<StatusEntry>> = HashMap::new();
    for row in rows {
        let status: String = row.get("status");
        by_message
            .entry(row.get("message_id"))
            .or_default()
            .push(StatusEntry {
                user_id: row.get("user_id"),
                status: DeliveryStatus::parse(&status).unwrap_or(DeliveryStatus::Sent),
                timestamp: row.get("updated_at"),
            });
    }
    Ok(by_message)
}

async fn pg_with_statuses(pool: &PgPool, mut messages: Vec<Message>) -> Result<Vec<Message>, StorageError> {
    let ids: Vec<Uuid> = messages.iter().map(|m| m.id).collect();
    let mut statuses = pg_statuses(pool, &ids).await?;
    for message in &mut messages {
        message.status = statuses.remove(&message.id).unwrap_or_default();
    }
    Ok(messages)
}

async fn pg_get(pool: &PgPool, message_id: Uuid) -> Result<Option<Message>, StorageError> {
    let sql = format!("SELECT {} FROM messages WHERE id = $1", SELECT_COLUMNS);
    let row = sqlx::query(&sql).bind(message_id).fetch_optional(pool).await?;
    match row {
        Some(row) => Ok(pg_with_statuses(pool, vec![message_from_row(&row)]).await?.pop()),
        None => Ok(None),
    }
}

async fn pg_page(
    pool: &PgPool,
    container: Container,
    viewer: Uuid,
    limit: i64,
    offset: i64,
) -> Result<(Vec<Message>, u64), StorageError> {
    let filter = format!(
        "{} = $1 AND is_deleted = FALSE AND NOT ($2 = ANY(deleted_by))",
        container_column(container)
    );

    let total: i64 = sqlx::query(&format!("SELECT COUNT(*) AS total FROM messages WHERE {}", filter))
        .bind(container.id())
        .bind(viewer)
        .fetch_one(pool)
        .await?
        .get("total");

    let sql = format!(
        "SELECT {} FROM messages WHERE {} ORDER BY created_at DESC, id DESC LIMIT $3 OFFSET $4",
        SELECT_COLUMNS, filter
    );
    let rows = sqlx::query(&sql)
        .bind(container.id())
        .bind(viewer)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await?;

    let messages = pg_with_statuses(pool, rows.iter().map(message_from_row).collect()).await?;
    Ok((messages, total.max(0) as u64))
}

async fn pg_search(
    pool: &PgPool,
    container: Container,
    viewer: Uuid,
    pattern: &str,
    limit: i64,
) -> Result<Vec<Message>, StorageError> {
    let sql = format!(
        "SELECT {} FROM messages \
         WHERE {} = $1 AND is_deleted = FALSE AND NOT ($2 = ANY(deleted_by)) \
         AND content ILIKE $3 ESCAPE '\\' \
         ORDER BY created_at DESC, id DESC LIMIT $4",
        SELECT_COLUMNS,
        container_column(container)
    );
    let rows = sqlx::query(&sql)
        .bind(container.id())
        .bind(viewer)
        .bind(pattern)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    pg_with_statuses(pool, rows.iter().map(message_from_row).collect()).await
}

async fn pg_apply_status(
    pool: &PgPool,
    message_id: Uuid,
    user_id: Uuid,
    target: DeliveryStatus,
    now: chrono::DateTime<Utc>,
) -> Result<Option<Transition>, StorageError> {
    let mut tx = pool.begin().await?;
    let row = sqlx::query(
        "SELECT status FROM message_status WHERE message_id = $1 AND user_id = $2 FOR UPDATE",
    )
    .bind(message_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(row) = row else {
        return Ok(None);
    };
    let current: String = row.get("status");
    let current = DeliveryStatus::parse(&current).unwrap_or(DeliveryStatus::Sent);
    let step = transition(current, target);

    if let Transition::Advanced { to, .. } = step {
        sqlx::query(
            "UPDATE message_status SET status = $3, updated_at = $4 WHERE message_id = $1 AND user_id = $2",
        )
        .bind(message_id)
        .bind(user_id)
        .bind(to.as_str())
        .bind(now)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await?;
    Ok(Some(step))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;

    fn direct(conversation_id: Uuid, sender: Uuid, receiver: Uuid, content: &str, offset: i64) -> Message {
        let at = Utc::now() + Duration::milliseconds(offset);
        Message {
            id: Uuid::new_v4(),
            sender,
            receiver: Some(receiver),
            conversation_id: Some(conversation_id),
            group_id: None,
            is_group: false,
            content: content.into(),
            message_type: MessageType::Text,
            media_url: None,
            reply_to_message_id: None,
            status: vec![StatusEntry::sent(receiver, at)],
            deleted_by: Vec::new(),
            is_deleted: false,
            encrypted: true,
            timestamp: at,
        }
    }

    #[test]
    fn test_like_pattern_escapes() {
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[tokio::test]
    async fn test_insert_and_get_materializes_status() {
        let store = MessageStore::new(Backend::memory());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let message = direct(Uuid::new_v4(), a, b, "hi", 0);
        store.insert(&message).await.unwrap();

        let stored = store.get(message.id).await.unwrap().unwrap();
        assert_eq!(stored.status.len(), 1);
        assert_eq!(stored.status[0].user_id, b);
        assert_eq!(stored.status[0].status, DeliveryStatus::Sent);

        assert_matches!(store.insert(&message).await, Err(BackendError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_page_newest_first_and_hides_deleted() {
        let store = MessageStore::new(Backend::memory());
        let conversation_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut ids = Vec::new();
        for i in 0..5 {
            let message = direct(conversation_id, a, b, &format!("m{}", i), i * 10);
            ids.push(message.id);
            store.insert(&message).await.unwrap();
        }
        store.delete_for_user(ids[4], b).await.unwrap();
        store.delete_for_everyone(ids[3]).await.unwrap();

        let container = Container::Direct(conversation_id);
        let (page, total) = store.page(container, b, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(page.iter().map(|m| m.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let (page, _) = store.page(container, a, 1, 10).await.unwrap();
        assert_eq!(page.len(), 4);
        assert_eq!(page[0].id, ids[4]);
    }

    #[tokio::test]
    async fn test_apply_status_forward_only() {
        let store = MessageStore::new(Backend::memory());
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let message = direct(Uuid::new_v4(), a, b, "hi", 0);
        store.insert(&message).await.unwrap();

        assert_matches!(
            store.apply_status(message.id, b, DeliveryStatus::Delivered).await.unwrap(),
            Some(Transition::Advanced { to: DeliveryStatus::Delivered, .. })
        );
        assert_matches!(
            store.apply_status(message.id, b, DeliveryStatus::Read).await.unwrap(),
            Some(Transition::Advanced { from: DeliveryStatus::Delivered, to: DeliveryStatus::Read })
        );
        assert_matches!(
            store.apply_status(message.id, b, DeliveryStatus::Sent).await.unwrap(),
            Some(Transition::Unchanged(DeliveryStatus::Read))
        );
        assert_eq!(store.apply_status(message.id, a, DeliveryStatus::Read).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_delete_for_everyone_reports_change() {
        let store = MessageStore::new(Backend::memory());
        let message = direct(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "hi", 0);
        store.insert(&message).await.unwrap();

        assert!(store.delete_for_everyone(message.id).await.unwrap());
        assert!(!store.delete_for_everyone(message.id).await.unwrap());
        // Content is kept
        assert_eq!(store.get(message.id).await.unwrap().unwrap().content, "hi");
    }

    #[tokio::test]
    async fn test_search_is_case_insensitive() {
        let store = MessageStore::new(Backend::memory());
        let conversation_id = Uuid::new_v4();
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        store.insert(&direct(conversation_id, a, b, "Lunch at noon?", 0)).await.unwrap();
        store.insert(&direct(conversation_id, b, a, "sure", 10)).await.unwrap();

        let found = store
            .search(Container::Direct(conversation_id), a, "LUNCH", 10)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].content, "Lunch at noon?");
    }

    #[tokio::test]
    async fn test_purge_removes_status_rows() {
        let backend = Backend::memory();
        let store = MessageStore::new(backend.clone());
        let message = direct(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), "hi", 0);
        store.insert(&message).await.unwrap();
        store.purge(message.id).await.unwrap();

        assert!(store.get(message.id).await.unwrap().is_none());
        if let Backend::Memory(db) = backend {
            assert!(db.statuses.read().await.rows.is_empty());
        }
    }
}
