/**
 * Group Store
 *
 * Owns groups and their membership rules. Every membership change runs as a
 * read-modify-write under a lock on the group (the table write lock in
 * memory, `SELECT ... FOR UPDATE` in Postgres) so concurrent admin actions
 * cannot leave a live group without an admin.
 *
 * Adding someone to a group requires that they already share a direct
 * conversation with the acting user.
 */
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::conversations::ConversationStore;
use crate::backend::error::BackendError;
use crate::backend::storage::{read_with_retry, Backend, StorageError};
use crate::shared::messaging::Group;

const MAX_GROUP_NAME: usize = 100;

const SELECT_COLUMNS: &str = "id, name, admin_ids, member_ids, can_send_messages, is_deleted, \
     latest_message_id, latest_message_at, created_at";

fn group_from_row(row: &sqlx::postgres::PgRow) -> Group {
    Group {
        id: row.get("id"),
        name: row.get("name"),
        admin_ids: row.get("admin_ids"),
        member_ids: row.get("member_ids"),
        can_send_messages: row.get("can_send_messages"),
        is_deleted: row.get("is_deleted"),
        latest_message_id: row.get("latest_message_id"),
        latest_message_at: row.get("latest_message_at"),
        created_at: row.get("created_at"),
    }
}

fn require_admin(group: &Group, user_id: Uuid) -> Result<(), BackendError> {
    if group.is_admin(user_id) {
        Ok(())
    } else {
        Err(BackendError::forbidden("Only group admins can do that"))
    }
}

#[derive(Clone, Debug)]
pub struct GroupStore {
    backend: Backend,
    conversations: ConversationStore,
}

impl GroupStore {
    pub fn new(backend: Backend, conversations: ConversationStore) -> Self {
        Self { backend, conversations }
    }

    /// Create a group with `creator` as its only admin
    pub async fn create(&self, name: &str, creator: Uuid, member_ids: &[Uuid]) -> Result<Group, BackendError> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_GROUP_NAME {
            return Err(BackendError::invalid("name", "Group name must be 1-100 characters"));
        }
        if member_ids.iter().all(|id| *id == creator) {
            return Err(BackendError::invalid("memberIds", "A group needs at least one other member"));
        }
        self.require_relationships(creator, member_ids).await?;

        let group = Group::new(name.to_string(), creator, member_ids);
        match &self.backend {
            Backend::Memory(db) => {
                db.groups.write().await.insert(group.id, group.clone());
            }
            Backend::Postgres(pool) => pg_insert(pool, &group).await?,
        }

        tracing::info!(
            "[Groups] {} created '{}' with {} member(s)",
            creator,
            group.name,
            group.member_ids.len()
        );
        Ok(group)
    }

    pub async fn get(&self, group_id: Uuid) -> Result<Option<Group>, BackendError> {
        let found = match &self.backend {
            Backend::Memory(db) => db.groups.read().await.get(&group_id).cloned(),
            Backend::Postgres(pool) => read_with_retry("group", || pg_get(pool, group_id)).await?,
        };
        Ok(found)
    }

    /// A group that exists and is not deleted
    pub async fn require(&self, group_id: Uuid) -> Result<Group, BackendError> {
        match self.get(group_id).await? {
            Some(group) if !group.is_deleted => Ok(group),
            _ => Err(BackendError::not_found("Group not found")),
        }
    }

    pub async fn can_post(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, BackendError> {
        Ok(self
            .get(group_id)
            .await?
            .is_some_and(|group| group.can_post(user_id)))
    }

    pub async fn is_authorized_viewer(&self, group_id: Uuid, user_id: Uuid) -> Result<bool, BackendError> {
        Ok(self
            .get(group_id)
            .await?
            .is_some_and(|group| group.is_authorized_viewer(user_id)))
    }

    pub async fn add_members(
        &self,
        group_id: Uuid,
        admin_id: Uuid,
        member_ids: &[Uuid],
    ) -> Result<Group, BackendError> {
        if member_ids.is_empty() {
            return Err(BackendError::invalid("memberIds", "No members to add"));
        }
        self.require_relationships(admin_id, member_ids).await?;

        let group = self
            .mutate(group_id, |group| {
                require_admin(group, admin_id)?;
                for id in member_ids {
                    if !group.member_ids.contains(id) {
                        group.member_ids.push(*id);
                    }
                }
                Ok(())
            })
            .await?;
        tracing::info!("[Groups] {} added {} member(s) to {}", admin_id, member_ids.len(), group_id);
        Ok(group)
    }

    /// Remove a member; an admin loses admin rights with membership
    pub async fn remove_member(&self, group_id: Uuid, admin_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        let group = self
            .mutate(group_id, |group| {
                require_admin(group, admin_id)?;
                if !group.is_member(user_id) {
                    return Err(BackendError::not_found("User is not a member of this group"));
                }
                if group.admin_ids == [user_id] {
                    return Err(BackendError::forbidden("The last admin cannot be removed"));
                }
                group.member_ids.retain(|id| *id != user_id);
                group.admin_ids.retain(|id| *id != user_id);
                Ok(())
            })
            .await?;
        tracing::info!("[Groups] {} removed {} from {}", admin_id, user_id, group_id);
        Ok(group)
    }

    pub async fn promote_admin(&self, group_id: Uuid, admin_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        self.mutate(group_id, |group| {
            require_admin(group, admin_id)?;
            if !group.is_member(user_id) {
                return Err(BackendError::not_found("User is not a member of this group"));
            }
            if !group.admin_ids.contains(&user_id) {
                group.admin_ids.push(user_id);
            }
            Ok(())
        })
        .await
    }

    pub async fn set_messaging_permission(
        &self,
        group_id: Uuid,
        admin_id: Uuid,
        can_send_messages: bool,
    ) -> Result<Group, BackendError> {
        self.mutate(group_id, |group| {
            require_admin(group, admin_id)?;
            group.can_send_messages = can_send_messages;
            Ok(())
        })
        .await
    }

    /// Leave a group.
    ///
    /// When the last admin leaves, the earliest remaining member is promoted;
    /// when nobody remains the group is deleted.
    pub async fn leave_group(&self, group_id: Uuid, user_id: Uuid) -> Result<Group, BackendError> {
        let group = self
            .mutate(group_id, |group| {
                if !group.is_member(user_id) {
                    return Err(BackendError::not_found("You are not a member of this group"));
                }
                group.member_ids.retain(|id| *id != user_id);
                group.admin_ids.retain(|id| *id != user_id);
                if group.admin_ids.is_empty() {
                    match group.member_ids.first() {
                        Some(next) => group.admin_ids.push(*next),
                        None => group.is_deleted = true,
                    }
                }
                Ok(())
            })
            .await?;
        tracing::info!("[Groups] {} left {}", user_id, group_id);
        Ok(group)
    }

    pub async fn delete_group(&self, group_id: Uuid, admin_id: Uuid) -> Result<Group, BackendError> {
        let group = self
            .mutate(group_id, |group| {
                require_admin(group, admin_id)?;
                group.is_deleted = true;
                Ok(())
            })
            .await?;
        tracing::info!("[Groups] {} deleted {}", admin_id, group_id);
        Ok(group)
    }

    /// Live groups the user belongs to, most recently active first
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<Group>, BackendError> {
        let mut groups = match &self.backend {
            Backend::Memory(db) => db
                .groups
                .read()
                .await
                .values()
                .filter(|g| g.is_authorized_viewer(user_id))
                .cloned()
                .collect::<Vec<_>>(),
            Backend::Postgres(pool) => {
                read_with_retry("groups", || async move {
                    let sql = format!(
                        "SELECT {} FROM groups \
                         WHERE is_deleted = FALSE AND ($1 = ANY(member_ids) OR $1 = ANY(admin_ids))",
                        SELECT_COLUMNS
                    );
                    let rows = sqlx::query(&sql).bind(user_id).fetch_all(pool).await?;
                    Ok::<_, StorageError>(rows.iter().map(group_from_row).collect::<Vec<_>>())
                })
                .await?
            }
        };
        groups.sort_by(|a, b| {
            b.latest_message_at
                .cmp(&a.latest_message_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        Ok(groups)
    }

    /// Move the latest-message pointer; the newest timestamp wins
    pub async fn record_new_message(
        &self,
        group_id: Uuid,
        message_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let mut groups = db.groups.write().await;
                let group = groups.get_mut(&group_id).ok_or(StorageError::NotFound("group"))?;
                group.advance_latest(message_id, at);
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query(
                    r#"
                    UPDATE groups
                    SET latest_message_id = CASE
                            WHEN latest_message_at IS NULL OR latest_message_at <= $3 THEN $2
                            ELSE latest_message_id END,
                        latest_message_at = CASE
                            WHEN latest_message_at IS NULL OR latest_message_at <= $3 THEN $3
                            ELSE latest_message_at END
                    WHERE id = $1
                    "#,
                )
                .bind(group_id)
                .bind(message_id)
                .bind(at)
                .execute(pool)
                .await
                .map_err(StorageError::from)?;
                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound("group").into());
                }
            }
        }
        Ok(())
    }

    /// Every new member must already share a direct conversation with `actor`
    async fn require_relationships(&self, actor: Uuid, member_ids: &[Uuid]) -> Result<(), BackendError> {
        for member in member_ids.iter().filter(|id| **id != actor) {
            if !self.conversations.shares_conversation(actor, *member).await? {
                tracing::warn!("[Groups] {} tried to add {} without a conversation", actor, member);
                return Err(BackendError::forbidden(
                    "You can only add users you already have a conversation with",
                ));
            }
        }
        Ok(())
    }

    /// Apply `change` to a live group under its lock and persist the result
    async fn mutate<F>(&self, group_id: Uuid, change: F) -> Result<Group, BackendError>
    where
        F: FnOnce(&mut Group) -> Result<(), BackendError>,
    {
        match &self.backend {
            Backend::Memory(db) => {
                let mut groups = db.groups.write().await;
                let stored = groups
                    .get_mut(&group_id)
                    .filter(|g| !g.is_deleted)
                    .ok_or_else(|| BackendError::not_found("Group not found"))?;
                let mut updated = stored.clone();
                change(&mut updated)?;
                *stored = updated.clone();
                Ok(updated)
            }
            Backend::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(StorageError::from)?;
                let sql = format!("SELECT {} FROM groups WHERE id = $1 FOR UPDATE", SELECT_COLUMNS);
                let row = sqlx::query(&sql)
                    .bind(group_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .map_err(StorageError::from)?;
                let mut group = row
                    .as_ref()
                    .map(group_from_row)
                    .filter(|g| !g.is_deleted)
                    .ok_or_else(|| BackendError::not_found("Group not found"))?;

                change(&mut group)?;

                sqlx::query(
                    r#"
                    UPDATE groups
                    SET name = $2, admin_ids = $3, member_ids = $4, can_send_messages = $5, is_deleted = $6
                    WHERE id = $1
                    "#,
                )
                .bind(group.id)
                .bind(&group.name)
                .bind(&group.admin_ids)
                .bind(&group.member_ids)
                .bind(group.can_send_messages)
                .bind(group.is_deleted)
                .execute(&mut *tx)
                .await
                .map_err(StorageError::from)?;
                tx.commit().await.map_err(StorageError::from)?;
                Ok(group)
            }
        }
    }
}

async fn pg_get(pool: &PgPool, group_id: Uuid) -> Result<Option<Group>, StorageError> {
    let sql = format!("SELECT {} FROM groups WHERE id = $1", SELECT_COLUMNS);
    let row = sqlx::query(&sql).bind(group_id).fetch_optional(pool).await?;
    Ok(row.as_ref().map(group_from_row))
}

async fn pg_insert(pool: &PgPool, group: &Group) -> Result<(), StorageError> {
    sqlx::query(
        r#"
        INSERT INTO groups (id, name, admin_ids, member_ids, can_send_messages, is_deleted, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#,
    )
    .bind(group.id)
    .bind(&group.name)
    .bind(&group.admin_ids)
    .bind(&group.member_ids)
    .bind(group.can_send_messages)
    .bind(group.is_deleted)
    .bind(group.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    struct Fixture {
        groups: GroupStore,
        conversations: ConversationStore,
        admin: Uuid,
        friends: Vec<Uuid>,
    }

    async fn fixture() -> Fixture {
        let backend = Backend::memory();
        let conversations = ConversationStore::new(backend.clone());
        let admin = Uuid::new_v4();
        let friends: Vec<Uuid> = (0..3).map(|_| Uuid::new_v4()).collect();
        for friend in &friends {
            conversations.find_or_create_direct(admin, *friend).await.unwrap();
        }
        Fixture {
            groups: GroupStore::new(backend, conversations.clone()),
            conversations,
            admin,
            friends,
        }
    }

    #[tokio::test]
    async fn test_create_requires_existing_conversation() {
        let f = fixture().await;
        let stranger = Uuid::new_v4();

        assert_matches!(
            f.groups.create("team", f.admin, &[f.friends[0], stranger]).await,
            Err(BackendError::Forbidden { .. })
        );
        assert_matches!(
            f.groups.create("team", f.admin, &[]).await,
            Err(BackendError::InvalidInput(_))
        );

        let group = f.groups.create("team", f.admin, &f.friends).await.unwrap();
        assert_eq!(group.admin_ids, vec![f.admin]);
        assert_eq!(group.member_ids.len(), 4);
    }

    #[tokio::test]
    async fn test_posting_permission() {
        let f = fixture().await;
        let group = f.groups.create("team", f.admin, &f.friends).await.unwrap();
        f.groups
            .set_messaging_permission(group.id, f.admin, false)
            .await
            .unwrap();

        assert!(!f.groups.can_post(group.id, f.friends[0]).await.unwrap());
        assert!(f.groups.can_post(group.id, f.admin).await.unwrap());
        assert_matches!(
            f.groups.set_messaging_permission(group.id, f.friends[0], true).await,
            Err(BackendError::Forbidden { .. })
        );
    }

    #[tokio::test]
    async fn test_last_admin_cannot_be_removed() {
        let f = fixture().await;
        let group = f.groups.create("team", f.admin, &f.friends).await.unwrap();

        assert_matches!(
            f.groups.remove_member(group.id, f.admin, f.admin).await,
            Err(BackendError::Forbidden { .. })
        );

        f.groups.promote_admin(group.id, f.admin, f.friends[0]).await.unwrap();
        let updated = f.groups.remove_member(group.id, f.friends[0], f.admin).await.unwrap();
        assert_eq!(updated.admin_ids, vec![f.friends[0]]);
        assert!(!updated.is_member(f.admin));
    }

    #[tokio::test]
    async fn test_leave_promotes_earliest_member() {
        let f = fixture().await;
        let group = f.groups.create("team", f.admin, &f.friends).await.unwrap();

        let after = f.groups.leave_group(group.id, f.admin).await.unwrap();
        assert_eq!(after.admin_ids, vec![f.friends[0]]);
        assert!(!after.is_deleted);
    }

    #[tokio::test]
    async fn test_last_member_leaving_deletes_group() {
        let f = fixture().await;
        let group = f.groups.create("pair", f.admin, &f.friends[..1]).await.unwrap();

        f.groups.leave_group(group.id, f.friends[0]).await.unwrap();
        let after = f.groups.leave_group(group.id, f.admin).await.unwrap();
        assert!(after.is_deleted);
        assert!(!f.groups.is_authorized_viewer(group.id, f.admin).await.unwrap());
        assert_matches!(f.groups.require(group.id).await, Err(BackendError::NotFound { .. }));
    }

    #[tokio::test]
    async fn test_add_members_checks_acting_admin_relationships() {
        let f = fixture().await;
        let group = f.groups.create("team", f.admin, &f.friends[..1]).await.unwrap();
        let newcomer = Uuid::new_v4();

        assert_matches!(
            f.groups.add_members(group.id, f.admin, &[newcomer]).await,
            Err(BackendError::Forbidden { .. })
        );

        f.conversations.find_or_create_direct(f.admin, newcomer).await.unwrap();
        let updated = f.groups.add_members(group.id, f.admin, &[newcomer]).await.unwrap();
        assert!(updated.is_member(newcomer));
    }

    #[tokio::test]
    async fn test_list_and_pointer() {
        let f = fixture().await;
        let older = f.groups.create("older", f.admin, &f.friends[..1]).await.unwrap();
        let newer = f.groups.create("newer", f.admin, &f.friends[..1]).await.unwrap();

        f.groups
            .record_new_message(older.id, Uuid::new_v4(), Utc::now())
            .await
            .unwrap();
        let listed = f.groups.list_for_user(f.friends[0]).await.unwrap();
        assert_eq!(listed.iter().map(|g| g.id).collect::<Vec<_>>(), vec![older.id, newer.id]);
        assert!(f.groups.list_for_user(f.friends[2]).await.unwrap().is_empty());
    }
}
