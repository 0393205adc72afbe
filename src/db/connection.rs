use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::{info, warn};

use crate::db::errors::{DatabaseError, Result};

/// Errors that may be resolved by replaying the failed operation
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for DatabaseError {
    fn is_retryable(&self) -> bool {
        DatabaseError::is_retryable(self)
    }
}

/// Append `sslmode` to a connection URL unless the URL already carries one
pub fn with_sslmode(database_url: &str, sslmode: &str) -> String {
    if database_url.contains("sslmode=") {
        return database_url.to_string();
    }
    let separator = if database_url.contains('?') { "&" } else { "?" };
    format!("{}{}sslmode={}", database_url, separator, sslmode)
}

/// Create the connection pool shared by every request.
///
/// Connections are validated on checkout, so a handle that went stale
/// between invocations is replaced instead of handed to a request.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Creating database connection pool");

    // Keep pool size low - RDS Proxy handles actual pooling
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .min_connections(0)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(10))
        .max_lifetime(Duration::from_secs(300))
        .test_before_acquire(true)
        .connect_lazy(database_url)
        .map_err(|e| DatabaseError::ConnectionError(format!("Failed to create pool: {}", e)))?;

    info!("Database connection pool created");
    Ok(pool)
}

/// Apply the embedded schema migrations
pub async fn run_migrations(pool: &PgPool) -> Result<()> {
    info!("Running database migrations");
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Execute an operation, replaying it on retryable errors with
/// exponential backoff. The last error is returned once attempts run out.
pub async fn with_retry<F, Fut, T, E>(max_attempts: u8, mut operation: F) -> std::result::Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = std::result::Result<T, E>>,
    E: Retryable + std::fmt::Display,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt: u8 = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) if e.is_retryable() && attempt < max_attempts => {
                warn!(
                    attempt = attempt,
                    max_attempts = max_attempts,
                    error = %e,
                    "Retryable error occurred, retrying..."
                );

                // Exponential backoff with jitter, capped at 1 second
                let delay_ms = (50 * 2_u64.pow(attempt as u32 - 1)).min(1000)
                    + rand::random::<u64>() % 50;

                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::errors::{EMAIL_UNIQUE, LEGACY_FOLIO_UNIQUE};
    use std::sync::atomic::{AtomicU32, Ordering};

    fn legacy_conflict() -> DatabaseError {
        DatabaseError::UniqueViolation {
            constraint: LEGACY_FOLIO_UNIQUE.to_string(),
        }
    }

    #[tokio::test]
    async fn test_retry_logic() {
        let calls = AtomicU32::new(0);

        let result = with_retry(3, || {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(legacy_conflict())
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_returns_last_error_when_exhausted() {
        let calls = AtomicU32::new(0);

        let result: std::result::Result<(), DatabaseError> = with_retry(2, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(legacy_conflict()) }
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(
            result.unwrap_err().violated_constraint(),
            Some(LEGACY_FOLIO_UNIQUE)
        );
    }

    #[tokio::test]
    async fn test_non_retryable_error_fails_fast() {
        let calls = AtomicU32::new(0);

        let result: std::result::Result<(), DatabaseError> = with_retry(5, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(DatabaseError::UniqueViolation {
                    constraint: EMAIL_UNIQUE.to_string(),
                })
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_sslmode_appended_once() {
        assert_eq!(
            with_sslmode("postgres://u:p@db/app", "require"),
            "postgres://u:p@db/app?sslmode=require"
        );
        assert_eq!(
            with_sslmode("postgres://u:p@db/app?connect_timeout=5", "disable"),
            "postgres://u:p@db/app?connect_timeout=5&sslmode=disable"
        );
        assert_eq!(
            with_sslmode("postgres://db/app?sslmode=verify-full", "require"),
            "postgres://db/app?sslmode=verify-full"
        );
    }
}
