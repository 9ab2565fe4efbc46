//! Storage Module
//!
//! This module selects the storage backend shared by every component store
//! (sessions, users, conversations, groups, messages) and defines the errors
//! those stores report.
//!
//! # Backends
//!
//! - **`Memory`** - In-process tables guarded by `tokio` locks. Used when
//!   `DATABASE_URL` is not set, when the database is unreachable, and in tests.
//! - **`Postgres`** - `sqlx` connection pool; schema lives in `migrations/`.
//!
//! Component stores hold a cloned `Backend` and dispatch with
//! `match &self.backend`.
//!
//! # Error Policy
//!
//! Idempotent reads go through [`retry::read_with_retry`], which retries a
//! transient failure once. Writes never do; their errors surface to the
//! caller as `Upstream`.

use std::sync::Arc;

use sqlx::PgPool;
use thiserror::Error;

/// In-memory tables
pub mod memory;

/// Read retry helper
pub mod retry;

pub use memory::MemoryDb;
pub use retry::read_with_retry;

/// Storage backend shared by all component stores
#[derive(Clone)]
pub enum Backend {
    Memory(Arc<MemoryDb>),
    Postgres(PgPool),
}

impl Backend {
    /// Fresh, empty in-memory backend
    pub fn memory() -> Self {
        Backend::Memory(Arc::new(MemoryDb::default()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Backend::Memory(_) => "memory",
            Backend::Postgres(_) => "postgres",
        }
    }
}

impl std::fmt::Debug for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Backend").field(&self.kind()).finish()
    }
}

/// Errors reported by the storage layer
#[derive(Debug, Error)]
pub enum StorageError {
    /// Timeout or lost connection; safe to retry for idempotent reads
    #[error("transient storage failure: {0}")]
    Transient(String),

    /// A unique constraint rejected the write
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("{0} not found")]
    NotFound(&'static str),

    #[error("database error: {0}")]
    Database(String),
}

impl StorageError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StorageError::Transient(_))
    }
}

impl From<sqlx::Error> for StorageError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed => StorageError::Transient(err.to_string()),
            sqlx::Error::RowNotFound => StorageError::NotFound("row"),
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                StorageError::Conflict(db_err.message().to_string())
            }
            _ => StorageError::Database(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sqlx_error_classification() {
        assert!(StorageError::from(sqlx::Error::PoolTimedOut).is_transient());
        assert!(StorageError::from(sqlx::Error::PoolClosed).is_transient());
        assert!(matches!(
            StorageError::from(sqlx::Error::RowNotFound),
            StorageError::NotFound(_)
        ));
        assert!(matches!(
            StorageError::from(sqlx::Error::Protocol("bad frame".into())),
            StorageError::Database(_)
        ));
    }

    #[test]
    fn test_memory_backend_kind() {
        assert_eq!(Backend::memory().kind(), "memory");
    }
}
