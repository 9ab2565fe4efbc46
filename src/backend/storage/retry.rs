/**
 * Read Retry
 *
 * Idempotent reads are retried exactly once when the storage layer reports a
 * transient failure (timeout, connection loss). Writes must not use this:
 * retrying a write could duplicate a message.
 */
use std::future::Future;

use super::StorageError;

/// Run `op`, retrying once if the first attempt fails transiently
pub async fn read_with_retry<T, F, Fut>(what: &str, mut op: F) -> Result<T, StorageError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    match op().await {
        Err(err) if err.is_transient() => {
            tracing::warn!("[Storage] transient failure reading {}, retrying once: {}", what, err);
            op().await
        }
        other => other,
    }
}
