// Bounded timeouts for datastore calls, with a single retry for reads

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use super::store::{StoreError, StoreResult};

/// Pause before the retry of a failed read
const READ_RETRY_DELAY: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub timeout: Duration,
    pub read_retries: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            read_retries: 1,
        }
    }
}

impl RetryPolicy {
    pub fn with_timeout_ms(timeout_ms: u64) -> Self {
        Self {
            timeout: Duration::from_millis(timeout_ms),
            ..Self::default()
        }
    }
}

/// Run an idempotent read, retrying transient failures
pub async fn run_read<T, F, Fut>(policy: &RetryPolicy, operation: &str, mut op: F) -> StoreResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = StoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let result = match tokio::time::timeout(policy.timeout, op()).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Timeout),
        };

        match result {
            Err(e) if e.is_transient() && attempt < policy.read_retries => {
                attempt += 1;
                warn!(operation, attempt, error = %e, "Transient datastore failure, retrying read");
                tokio::time::sleep(READ_RETRY_DELAY).await;
            },
            other => return other,
        }
    }
}

/// Run a write under the timeout. Writes are never retried.
pub async fn run_write<T, Fut>(policy: &RetryPolicy, operation: &str, fut: Fut) -> StoreResult<T>
where
    Fut: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(policy.timeout, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!(operation, "Datastore write timed out");
            Err(StoreError::Timeout)
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_read_retries_transient_once() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result = run_read(&policy, "test", || async move {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(StoreError::ConnectionLost("reset".into()))
            } else {
                Ok(7)
            }
        })
        .await;

        assert_eq!(result, Ok(7));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_gives_up_after_retry_budget() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result: StoreResult<()> = run_read(&policy, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Timeout)
        })
        .await;

        assert_eq!(result, Err(StoreError::Timeout));
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_read_does_not_retry_permanent_errors() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let policy = RetryPolicy::default();

        let result: StoreResult<()> = run_read(&policy, "test", || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(StoreError::Database("bad query".into()))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_times_out_without_retry() {
        let policy = RetryPolicy::with_timeout_ms(100);

        let result: StoreResult<()> = run_write(&policy, "slow", async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok(())
        })
        .await;

        assert_eq!(result, Err(StoreError::Timeout));
    }
}
