/**
 * Session Registry
 *
 * Owns the bounded list of device sessions for each user. Every mutation of
 * one user's list is serialized: the memory backend holds that user's mutex,
 * Postgres locks the user row with `SELECT ... FOR UPDATE` inside a
 * transaction. The capacity rule itself lives in [`SessionList`].
 *
 * # Failure Semantics
 *
 * A missing user is `NotFound`. Revoking a session that does not exist is a
 * no-op so logout stays idempotent.
 */
use chrono::Utc;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::backend::error::BackendError;
use crate::backend::sessions::bounded::SessionList;
use crate::backend::storage::{read_with_retry, Backend, StorageError};
use crate::shared::messaging::{DeviceMeta, Session, SessionView};

/// Result of a successful login on one device
#[derive(Debug, Clone)]
pub struct CreatedSession {
    pub session: Session,
    /// Sessions pushed out to make room, oldest first
    pub evicted: Vec<Session>,
}

#[derive(Clone, Debug)]
pub struct SessionRegistry {
    backend: Backend,
}

impl SessionRegistry {
    pub fn new(backend: Backend) -> Self {
        Self { backend }
    }

    /// Start a session on a new device, evicting the oldest when full
    pub async fn create_session(
        &self,
        user_id: Uuid,
        meta: DeviceMeta,
    ) -> Result<CreatedSession, BackendError> {
        let device_id = Uuid::new_v4().to_string();

        // `login_at` is stamped under the user lock so list order matches commit order
        let (session, evicted) = match &self.backend {
            Backend::Memory(db) => {
                let record = db
                    .user(user_id)
                    .await
                    .ok_or(StorageError::NotFound("user"))?;
                let mut record = record.lock().await;
                let session = Session::new(device_id, Utc::now(), meta);
                let evicted = record.sessions.insert(session.clone());
                (session, evicted)
            }
            Backend::Postgres(pool) => pg_create(pool, user_id, device_id, meta).await?,
        };

        for old in &evicted {
            tracing::info!(
                "[Sessions] evicted device {} for user {} (session cap reached)",
                old.device_id,
                user_id
            );
        }
        tracing::debug!("[Sessions] created device {} for user {}", session.device_id, user_id);

        Ok(CreatedSession { session, evicted })
    }

    /// Remove one session; returns it if it existed
    pub async fn revoke_session(
        &self,
        user_id: Uuid,
        device_id: &str,
    ) -> Result<Option<Session>, BackendError> {
        let removed = match &self.backend {
            Backend::Memory(db) => {
                let record = db
                    .user(user_id)
                    .await
                    .ok_or(StorageError::NotFound("user"))?;
                let mut record = record.lock().await;
                record.sessions.remove(device_id)
            }
            Backend::Postgres(pool) => pg_revoke(pool, user_id, Some(device_id))
                .await?
                .into_iter()
                .next(),
        };

        if removed.is_some() {
            tracing::info!("[Sessions] revoked device {} for user {}", device_id, user_id);
        }
        Ok(removed)
    }

    /// Remove every session of the user; returns what was removed
    pub async fn revoke_all_sessions(&self, user_id: Uuid) -> Result<Vec<Session>, BackendError> {
        let removed = match &self.backend {
            Backend::Memory(db) => {
                let record = db
                    .user(user_id)
                    .await
                    .ok_or(StorageError::NotFound("user"))?;
                let mut record = record.lock().await;
                record.sessions.clear()
            }
            Backend::Postgres(pool) => pg_revoke(pool, user_id, None).await?,
        };

        tracing::info!("[Sessions] revoked {} session(s) for user {}", removed.len(), user_id);
        Ok(removed)
    }

    /// Sessions oldest first, flagged against the requesting device
    pub async fn list_sessions(
        &self,
        user_id: Uuid,
        current_device_id: &str,
    ) -> Result<Vec<SessionView>, BackendError> {
        let sessions = self.load(user_id).await?;
        Ok(sessions
            .iter()
            .map(|session| SessionView {
                is_current: session.device_id == current_device_id,
                session: session.clone(),
            })
            .collect())
    }

    /// Whether `device_id` is still a live session of `user_id`.
    ///
    /// An unknown user simply has no valid sessions.
    pub async fn is_valid_session(&self, user_id: Uuid, device_id: &str) -> Result<bool, BackendError> {
        match self.load(user_id).await {
            Ok(sessions) => Ok(sessions.contains(device_id)),
            Err(BackendError::NotFound { .. }) => Ok(false),
            Err(err) => Err(err),
        }
    }

    async fn load(&self, user_id: Uuid) -> Result<SessionList, BackendError> {
        let list = match &self.backend {
            Backend::Memory(db) => {
                let record = db
                    .user(user_id)
                    .await
                    .ok_or(StorageError::NotFound("user"))?;
                let record = record.lock().await;
                record.sessions.clone()
            }
            Backend::Postgres(pool) => {
                read_with_retry("sessions", || pg_load(pool, user_id)).await?
            }
        };
        Ok(list)
    }
}

fn session_from_row(row: &sqlx::postgres::PgRow) -> Session {
    Session {
        device_id: row.get("device_id"),
        login_at: row.get("login_at"),
        ip_address: row.get("ip_address"),
        device_type: row.get("device_type"),
    }
}

async fn pg_user_exists<'e, E>(executor: E, user_id: Uuid, lock: bool) -> Result<(), StorageError>
where
    E: sqlx::PgExecutor<'e>,
{
    let sql = if lock {
        "SELECT id FROM users WHERE id = $1 FOR UPDATE"
    } else {
        "SELECT id FROM users WHERE id = $1"
    };
    sqlx::query(sql)
        .bind(user_id)
        .fetch_optional(executor)
        .await?
        .map(|_| ())
        .ok_or(StorageError::NotFound("user"))
}

async fn pg_load(pool: &PgPool, user_id: Uuid) -> Result<SessionList, StorageError> {
    pg_user_exists(pool, user_id, false).await?;
    let rows = sqlx::query(
        r#"
        SELECT device_id, login_at, ip_address, device_type
        FROM sessions
        WHERE user_id = $1
        ORDER BY login_at, seq
        "#,
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    Ok(SessionList::from_sessions(rows.iter().map(session_from_row)))
}

async fn pg_create(
    pool: &PgPool,
    user_id: Uuid,
    device_id: String,
    meta: DeviceMeta,
) -> Result<(Session, Vec<Session>), StorageError> {
    let mut tx = pool.begin().await?;
    pg_user_exists(&mut *tx, user_id, true).await?;
    let session = Session::new(device_id, Utc::now(), meta);

    let rows = sqlx::query(
        r#"
        SELECT device_id, login_at, ip_address, device_type
        FROM sessions
        WHERE user_id = $1
        ORDER BY login_at, seq
        "#,
    )
    .bind(user_id)
    .fetch_all(&mut *tx)
    .await?;

    let mut list = SessionList::from_sessions(rows.iter().map(session_from_row));
    let evicted = list.insert(session.clone());

    if !evicted.is_empty() {
        let ids: Vec<String> = evicted.iter().map(|s| s.device_id.clone()).collect();
        sqlx::query("DELETE FROM sessions WHERE user_id = $1 AND device_id = ANY($2)")
            .bind(user_id)
            .bind(&ids)
            .execute(&mut *tx)
            .await?;
    }

    sqlx::query(
        r#"
        INSERT INTO sessions (device_id, user_id, login_at, ip_address, device_type)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(&session.device_id)
    .bind(user_id)
    .bind(session.login_at)
    .bind(&session.ip_address)
    .bind(&session.device_type)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok((session, evicted))
}

/// Delete one device (or all when `device_id` is `None`) under the user lock
async fn pg_revoke(
    pool: &PgPool,
    user_id: Uuid,
    device_id: Option<&str>,
) -> Result<Vec<Session>, StorageError> {
    let mut tx = pool.begin().await?;
    pg_user_exists(&mut *tx, user_id, true).await?;

    let rows = sqlx::query(
        r#"
        DELETE FROM sessions
        WHERE user_id = $1 AND ($2::TEXT IS NULL OR device_id = $2)
        RETURNING device_id, login_at, ip_address, device_type
        "#,
    )
    .bind(user_id)
    .bind(device_id)
    .fetch_all(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(rows.iter().map(session_from_row).collect())
}
