use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Retry ceiling and backoff base for provider calls.
///
/// Both knobs are configuration, not contract: the spec of this engine only
/// requires bounded retries with exponential backoff.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts per provider, including the first.
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Exponential doubling from the base delay, capped at 30s.
    fn backoff(&self, attempt: u32) -> Duration {
        const CAP: Duration = Duration::from_secs(30);
        self.base_delay
            .checked_mul(1u32 << attempt.min(10))
            .map_or(CAP, |d| d.min(CAP))
    }
}

/// Run `operation` until it succeeds or the attempt ceiling is exhausted.
/// Every provider error is treated as transient here; structural errors come
/// from the manifest and never pass through this path.
pub async fn with_retry<F, Fut, T>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> anyhow::Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_error = None;

    for attempt in 0..policy.max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                if attempt + 1 < policy.max_attempts {
                    warn!(
                        "retryable error in {} (attempt {}/{}): {e:#}",
                        operation_name,
                        attempt + 1,
                        policy.max_attempts,
                    );
                    tokio::time::sleep(policy.backoff(attempt)).await;
                }
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow::anyhow!("{operation_name}: no attempts made")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn quick() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn success_on_first_attempt() {
        let result = with_retry(&quick(), "op", || async { Ok::<_, anyhow::Error>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn success_after_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let result = with_retry(&quick(), "op", move || {
            let c = Arc::clone(&c);
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    anyhow::bail!("transient")
                }
                Ok(7)
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn ceiling_exhausted() {
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        let result: anyhow::Result<()> = with_retry(&quick(), "op", move || {
            let c = Arc::clone(&c);
            async move {
                c.fetch_add(1, Ordering::SeqCst);
                anyhow::bail!("always down")
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 99,
            base_delay: Duration::from_millis(100),
        };
        assert_eq!(policy.backoff(0), Duration::from_millis(100));
        assert_eq!(policy.backoff(1), Duration::from_millis(200));
        assert_eq!(policy.backoff(2), Duration::from_millis(400));
        assert_eq!(policy.backoff(60), Duration::from_secs(30));
    }

    #[test]
    fn backoff_caps_on_overflowing_base_delay() {
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::MAX,
        };
        assert_eq!(policy.backoff(0), Duration::from_secs(30));
        assert_eq!(policy.backoff(5), Duration::from_secs(30));
    }
}
