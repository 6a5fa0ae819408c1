use std::{future::Future, time::Duration};

use tokio::time::sleep;
use tracing::warn;

use crate::dao::storage::{StorageError, StorageResult};

const MAX_DELAY: Duration = Duration::from_secs(2);

/// Backoff policy for store calls that are safe to repeat.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, the first call included.
    pub attempts: u32,
    /// Delay before the second attempt; doubles afterwards.
    pub initial_delay: Duration,
}

impl RetryPolicy {
    /// Policy with at least one attempt.
    pub fn new(attempts: u32, initial_delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            initial_delay,
        }
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or attempts run out.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, step: &'static str, mut call: F) -> StorageResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, StorageError>>,
{
    let mut delay = policy.initial_delay;
    let mut attempt = 1;

    loop {
        match call().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() && attempt < policy.attempts => {
                warn!(step, attempt, error = %err, "store call failed; retrying");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn unavailable() -> StorageError {
        StorageError::unavailable("down".into(), std::io::Error::other("refused"))
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::from_millis(1));

        let result = with_retry(policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move { if n < 2 { Err(unavailable()) } else { Ok(n) } }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn corrupted_values_are_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::from_millis(1));

        let result: StorageResult<()> = with_retry(policy, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(StorageError::corrupted("k", "bad json")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
