//! Bounded retry for transient storage failures.
//!
//! Connection drops and busy databases are retried with linear backoff;
//! constraint violations surface immediately.

use std::future::Future;
use std::time::Duration;

use shiryo_core::RepositoryError;

/// Attempts per operation, including the first.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay; attempt N waits N times this.
const BASE_DELAY: Duration = Duration::from_millis(500);

/// Run `op` up to three times, backing off linearly between retryable
/// failures.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, RepositoryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepositoryError>>,
{
    let mut last_error = None;
    for attempt in 1..=MAX_ATTEMPTS {
        if attempt > 1 {
            tokio::time::sleep(BASE_DELAY * (attempt - 1)).await;
        }
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < MAX_ATTEMPTS => {
                tracing::warn!(
                    op = op_name,
                    attempt,
                    error = %err,
                    "storage operation failed, retrying"
                );
                last_error = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    // Unreachable in practice: the loop always returns on the last attempt.
    Err(last_error.unwrap_or_else(|| RepositoryError::Storage("retry loop exhausted".into())))
}

/// Map a `sqlx` error onto the port's error taxonomy.
pub(crate) fn map_sqlx_error(err: sqlx::Error) -> RepositoryError {
    match &err {
        sqlx::Error::RowNotFound => RepositoryError::NotFound(err.to_string()),
        sqlx::Error::Database(db) if db.is_unique_violation() || db.is_foreign_key_violation() => {
            RepositoryError::Constraint(err.to_string())
        }
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            RepositoryError::Serialization(err.to_string())
        }
        _ => RepositoryError::Storage(err.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn returns_first_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, RepositoryError>(42)
        })
        .await
        .unwrap();
        assert_eq!(result, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_transient_errors() {
        let calls = AtomicU32::new(0);
        let result = with_retry("test", || async {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            if n < 2 {
                Err(RepositoryError::Storage("connection reset".into()))
            } else {
                Ok(7)
            }
        })
        .await
        .unwrap();
        assert_eq!(result, 7);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn constraint_errors_are_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Constraint("unique".into()))
        })
        .await;
        assert!(matches!(result, Err(RepositoryError::Constraint(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_three_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry("test", || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(RepositoryError::Storage("down".into()))
        })
        .await;
        assert!(matches!(result, Err(RepositoryError::Storage(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
