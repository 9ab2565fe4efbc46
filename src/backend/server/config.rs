/**
 * Storage Backend Selection
 *
 * Picks the storage backend at startup from `AppConfig::database_url`.
 *
 * # Error Handling
 *
 * A missing or unreachable database is logged and the server falls back to
 * the in-memory backend, so a development instance always starts.
 * Migration failures are logged; the schema may already be current.
 */

use sqlx::postgres::PgPoolOptions;

use crate::backend::storage::Backend;
use crate::shared::AppConfig;

/// Connect to Postgres and run migrations, or fall back to memory
pub async fn load_backend(config: &AppConfig) -> Backend {
    let Some(database_url) = config.database_url.as_deref() else {
        tracing::warn!("[STARTUP] DATABASE_URL not set. Using in-memory storage.");
        return Backend::memory();
    };

    tracing::info!("[STARTUP] Connecting to database...");

    let pool = match PgPoolOptions::new()
        .max_connections(10)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(database_url)
        .await
    {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("[STARTUP] Failed to create database connection pool: {:?}", e);
            tracing::warn!("[STARTUP] Falling back to in-memory storage.");
            return Backend::memory();
        }
    };

    tracing::info!("[STARTUP] Running database migrations...");
    match sqlx::migrate!().run(&pool).await {
        Ok(_) => tracing::info!("[STARTUP] Database migrations completed successfully"),
        Err(e) => {
            tracing::error!("[STARTUP] Failed to run database migrations: {}", e);
            tracing::warn!("[STARTUP] Continuing; the database might not be up to date");
        }
    }

    Backend::Postgres(pool)
}
