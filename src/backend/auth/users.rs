/**
 * User Directory
 *
 * This module owns user accounts: creation with a bcrypt password hash,
 * lookups by id and username, credential checks, and the suspension flag.
 * Session lists belong to the Session Registry.
 */

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::sessions::bounded::SessionList;
use crate::backend::storage::memory::UserRecord;
use crate::backend::storage::{read_with_retry, Backend, StorageError};

/// A stored user account
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAccount {
    pub id: Uuid,
    /// Unique, 3-30 chars, starts with a letter
    pub username: String,
    /// Hashed password (bcrypt)
    pub password_hash: String,
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
}

/// Public view of a user
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: Uuid,
    pub username: String,
    pub is_suspended: bool,
    pub created_at: DateTime<Utc>,
}

impl From<&UserAccount> for UserProfile {
    fn from(account: &UserAccount) -> Self {
        Self {
            id: account.id,
            username: account.username.clone(),
            is_suspended: account.is_suspended,
            created_at: account.created_at,
        }
    }
}

/// Validate username format
///
/// Usernames must be:
/// - 3-30 characters long
/// - Contain only alphanumeric characters and underscores
/// - Start with a letter
pub fn is_valid_username(username: &str) -> bool {
    if username.len() < 3 || username.len() > 30 {
        return false;
    }

    let mut chars = username.chars();

    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() => {}
        _ => return false,
    }

    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[derive(Clone, Debug)]
pub struct UserDirectory {
    backend: Backend,
    bcrypt_cost: u32,
}

impl UserDirectory {
    pub fn new(backend: Backend, bcrypt_cost: u32) -> Self {
        Self { backend, bcrypt_cost }
    }

    /// Create a user; the username must be unused
    pub async fn create_user(&self, username: &str, password: &str) -> Result<UserAccount, BackendError> {
        if !is_valid_username(username) {
            return Err(BackendError::invalid(
                "username",
                "Username must be 3-30 chars, start with a letter, and contain only letters, numbers, and underscores",
            ));
        }
        if password.len() < 8 {
            return Err(BackendError::invalid("password", "Password must be at least 8 characters"));
        }

        let password_hash = bcrypt::hash(password, self.bcrypt_cost).map_err(|e| {
            tracing::error!("[Auth] failed to hash password: {:?}", e);
            BackendError::upstream("password hashing failed")
        })?;

        let account = UserAccount {
            id: Uuid::new_v4(),
            username: username.to_string(),
            password_hash,
            is_suspended: false,
            created_at: Utc::now(),
        };

        match &self.backend {
            Backend::Memory(db) => {
                let mut users = db.users.write().await;
                if users.by_username.contains_key(username) {
                    return Err(BackendError::conflict("Username already taken"));
                }
                users.by_username.insert(account.username.clone(), account.id);
                users.by_id.insert(
                    account.id,
                    Arc::new(Mutex::new(UserRecord {
                        account: account.clone(),
                        sessions: SessionList::default(),
                    })),
                );
            }
            Backend::Postgres(pool) => {
                sqlx::query(
                    r#"
                    INSERT INTO users (id, username, password_hash, is_suspended, created_at)
                    VALUES ($1, $2, $3, FALSE, $4)
                    "#,
                )
                .bind(account.id)
                .bind(&account.username)
                .bind(&account.password_hash)
                .bind(account.created_at)
                .execute(pool)
                .await
                .map_err(|e| match StorageError::from(e) {
                    StorageError::Conflict(_) => BackendError::conflict("Username already taken"),
                    other => other.into(),
                })?;
            }
        }

        tracing::info!("[Auth] created user {} ({})", account.username, account.id);
        Ok(account)
    }

    pub async fn get(&self, user_id: Uuid) -> Result<Option<UserAccount>, BackendError> {
        let account = match &self.backend {
            Backend::Memory(db) => match db.user(user_id).await {
                Some(record) => Some(record.lock().await.account.clone()),
                None => None,
            },
            Backend::Postgres(pool) => {
                read_with_retry("user", || pg_fetch(pool, "id", UserKey::Id(user_id))).await?
            }
        };
        Ok(account)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<UserAccount>, BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let id = db.users.read().await.by_username.get(username).copied();
                match id {
                    Some(id) => self.get(id).await,
                    None => Ok(None),
                }
            }
            Backend::Postgres(pool) => Ok(read_with_retry("user", || {
                pg_fetch(pool, "username", UserKey::Name(username))
            })
            .await?),
        }
    }

    /// Fetch a user that must exist
    pub async fn require(&self, user_id: Uuid) -> Result<UserAccount, BackendError> {
        self.get(user_id)
            .await?
            .ok_or_else(|| BackendError::not_found("User not found"))
    }

    /// Check a password against the stored hash.
    ///
    /// Returns `None` for an unknown user or a wrong password.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<UserAccount>, BackendError> {
        let Some(account) = self.get_by_username(username).await? else {
            tracing::warn!("[Auth] login for unknown user: {}", username);
            return Ok(None);
        };

        let valid = bcrypt::verify(password, &account.password_hash).map_err(|e| {
            tracing::error!("[Auth] password verification error: {:?}", e);
            BackendError::upstream("password verification failed")
        })?;

        if valid {
            Ok(Some(account))
        } else {
            tracing::warn!("[Auth] invalid password for user: {}", username);
            Ok(None)
        }
    }

    pub async fn set_suspended(&self, user_id: Uuid, suspended: bool) -> Result<(), BackendError> {
        match &self.backend {
            Backend::Memory(db) => {
                let record = db.user(user_id).await.ok_or(StorageError::NotFound("user"))?;
                record.lock().await.account.is_suspended = suspended;
            }
            Backend::Postgres(pool) => {
                let result = sqlx::query("UPDATE users SET is_suspended = $1 WHERE id = $2")
                    .bind(suspended)
                    .bind(user_id)
                    .execute(pool)
                    .await
                    .map_err(StorageError::from)?;
                if result.rows_affected() == 0 {
                    return Err(StorageError::NotFound("user").into());
                }
            }
        }
        tracing::info!("[Auth] user {} suspended = {}", user_id, suspended);
        Ok(())
    }
}

enum UserKey<'a> {
    Id(Uuid),
    Name(&'a str),
}

async fn pg_fetch(pool: &PgPool, column: &str, key: UserKey<'_>) -> Result<Option<UserAccount>, StorageError> {
    let sql = format!(
        "SELECT id, username, password_hash, is_suspended, created_at FROM users WHERE {} = $1",
        column
    );
    let query = sqlx::query(&sql);
    let query = match key {
        UserKey::Id(id) => query.bind(id),
        UserKey::Name(name) => query.bind(name.to_string()),
    };
    let row = query.fetch_optional(pool).await?;

    Ok(row.map(|r| UserAccount {
        id: r.get("id"),
        username: r.get("username"),
        password_hash: r.get("password_hash"),
        is_suspended: r.get("is_suspended"),
        created_at: r.get("created_at"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn directory() -> UserDirectory {
        UserDirectory::new(Backend::memory(), 4)
    }

    #[test]
    fn test_username_rules() {
        assert!(is_valid_username("alice_01"));
        assert!(!is_valid_username("al"));
        assert!(!is_valid_username("1alice"));
        assert!(!is_valid_username("alice!"));
    }

    #[tokio::test]
    async fn test_create_and_lookup() {
        let users = directory();
        let created = users.create_user("alice", "password123").await.unwrap();
        assert_ne!(created.password_hash, "password123");

        let by_name = users.get_by_username("alice").await.unwrap().unwrap();
        assert_eq!(by_name.id, created.id);
        assert_eq!(users.require(created.id).await.unwrap().username, "alice");
    }

    #[tokio::test]
    async fn test_duplicate_username_conflicts() {
        let users = directory();
        users.create_user("alice", "password123").await.unwrap();
        assert_matches!(
            users.create_user("alice", "password456").await,
            Err(BackendError::Conflict { .. })
        );
    }

    #[tokio::test]
    async fn test_short_password_rejected() {
        assert_matches!(
            directory().create_user("alice", "short").await,
            Err(BackendError::InvalidInput(_))
        );
    }

    #[tokio::test]
    async fn test_verify_credentials() {
        let users = directory();
        users.create_user("alice", "password123").await.unwrap();

        assert!(users.verify_credentials("alice", "password123").await.unwrap().is_some());
        assert!(users.verify_credentials("alice", "wrong-pass").await.unwrap().is_none());
        assert!(users.verify_credentials("nobody", "password123").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_suspended() {
        let users = directory();
        let alice = users.create_user("alice", "password123").await.unwrap();
        users.set_suspended(alice.id, true).await.unwrap();
        assert!(users.require(alice.id).await.unwrap().is_suspended);

        assert_matches!(
            users.set_suspended(Uuid::new_v4(), true).await,
            Err(BackendError::NotFound { .. })
        );
    }
}
