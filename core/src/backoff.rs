use crate::error::{Error, Result};
use backoff::backoff::Backoff;
use backoff::exponential::ExponentialBackoff;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

pub fn create_backoff(base_delay_ms: u64) -> ExponentialBackoff<backoff::SystemClock> {
    ExponentialBackoff {
        current_interval: Duration::from_millis(base_delay_ms),
        initial_interval: Duration::from_millis(base_delay_ms),
        randomization_factor: 0.5,
        multiplier: 2.0,
        max_interval: Duration::from_secs(30),
        // Attempts are bounded by max_retries, not by wall time
        max_elapsed_time: None,
        ..ExponentialBackoff::default()
    }
}

/// Runs `operation` until it succeeds, fails with a non-retryable error,
/// or has been attempted `max_retries` times.
pub async fn retry_with_backoff<F, Fut, T>(
    operation: F,
    max_retries: u32,
    base_delay_ms: u64,
    operation_name: &str,
) -> Result<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut backoff = create_backoff(base_delay_ms);
    let mut attempts = 0;

    loop {
        attempts += 1;

        match operation().await {
            Ok(result) => {
                if attempts > 1 {
                    debug!(
                        operation = operation_name,
                        attempts,
                        "Operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) if !e.is_retryable() => {
                return Err(e);
            }
            Err(e) => {
                if attempts >= max_retries {
                    warn!(
                        operation = operation_name,
                        attempts,
                        error = %e,
                        "Operation failed after max retries"
                    );
                    return Err(e);
                }

                let Some(duration) = backoff.next_backoff() else {
                    return Err(Error::Internal(format!(
                        "{operation_name}: backoff exhausted after {attempts} attempts: {e}"
                    )));
                };

                warn!(
                    operation = operation_name,
                    attempt = attempts,
                    retry_after_ms = duration.as_millis(),
                    error = %e,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(duration).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn retries_transient_errors_until_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result = retry_with_backoff(
            move || async move {
                if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(Error::Database(sqlx::Error::PoolTimedOut))
                } else {
                    Ok(42)
                }
            },
            5,
            1,
            "test",
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn stops_at_max_retries() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_with_backoff(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Database(sqlx::Error::PoolTimedOut))
            },
            3,
            1,
            "test",
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn does_not_retry_permanent_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let result: Result<()> = retry_with_backoff(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Database(sqlx::Error::ColumnNotFound("asin".into())))
            },
            3,
            1,
            "test",
        )
        .await;

        assert!(matches!(result, Err(Error::Database(sqlx::Error::ColumnNotFound(_)))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
