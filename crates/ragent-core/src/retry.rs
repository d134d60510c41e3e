//! ABOUTME: Retry/timeout wrapper for external collaborator calls
//! ABOUTME: Exponential backoff with cooperative cancellation (spec.md §5)

use crate::cache::{RetryLogEntry, RetryTelemetryLog};
use crate::error::{CoreError, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Retry/backoff parameters for one class of external call.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub per_call_timeout_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 4_000,
            per_call_timeout_ms: 15_000,
        }
    }
}

impl RetryPolicy {
    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = self.base_delay_ms.saturating_mul(1u64 << attempt.min(10));
        Duration::from_millis(exp.min(self.max_delay_ms))
    }
}

/// Runs `op` under `policy`, retrying retryable errors with exponential
/// backoff, honoring `cancel`, and logging each retry to `log`.
pub async fn with_retry<T, F, Fut>(
    collaborator: &str,
    policy: RetryPolicy,
    cancel: &CancellationToken,
    log: &Arc<RetryTelemetryLog>,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        if cancel.is_cancelled() {
            return Err(CoreError::Cancelled);
        }

        let call = tokio::time::timeout(
            Duration::from_millis(policy.per_call_timeout_ms),
            op(),
        );

        let outcome = tokio::select! {
            result = call => result.map_err(|_| CoreError::Upstream {
                collaborator: collaborator.to_string(),
                message: "timeout".to_string(),
            }).and_then(|inner| inner),
            _ = cancel.cancelled() => Err(CoreError::Cancelled),
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(CoreError::Cancelled) => return Err(CoreError::Cancelled),
            Err(err) => {
                let message = err.to_string();
                let retryable = CoreError::is_retryable(&message);
                log.record(RetryLogEntry {
                    collaborator: collaborator.to_string(),
                    attempt,
                    message: message.clone(),
                });
                attempt += 1;
                if !retryable || attempt >= policy.max_attempts {
                    return Err(CoreError::Upstream {
                        collaborator: collaborator.to_string(),
                        message,
                    });
                }
                warn!(collaborator, attempt, "retrying after transient failure");
                tokio::select! {
                    _ = tokio::time::sleep(policy.delay_for_attempt(attempt)) => {}
                    _ = cancel.cancelled() => return Err(CoreError::Cancelled),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let log = RetryTelemetryLog::new(8);
        let cancel = CancellationToken::new();
        let result: Result<u32> = with_retry(
            "retriever",
            RetryPolicy::default(),
            &cancel,
            &log,
            || async { Ok(42u32) },
        )
        .await;
        assert_eq!(result.unwrap(), 42);
        assert!(log.snapshot().is_empty());
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let log = RetryTelemetryLog::new(8);
        let cancel = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
            per_call_timeout_ms: 1000,
        };
        let result: Result<u32> = with_retry("retriever", policy, &cancel, &log, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(CoreError::Upstream {
                        collaborator: "retriever".into(),
                        message: "timeout".into(),
                    })
                } else {
                    Ok(7u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 7);
        assert_eq!(log.snapshot().len(), 2);
    }

    #[tokio::test]
    async fn gives_up_on_non_retryable_error() {
        let log = RetryTelemetryLog::new(8);
        let cancel = CancellationToken::new();
        let result: Result<u32> = with_retry(
            "retriever",
            RetryPolicy::default(),
            &cancel,
            &log,
            || async {
                Err(CoreError::Upstream {
                    collaborator: "retriever".into(),
                    message: "auth failure".into(),
                })
            },
        )
        .await;
        assert!(result.is_err());
        assert_eq!(log.snapshot().len(), 1);
    }

    #[tokio::test]
    async fn honors_cancellation() {
        let log = RetryTelemetryLog::new(8);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result: Result<u32> = with_retry(
            "retriever",
            RetryPolicy::default(),
            &cancel,
            &log,
            || async { Ok(1u32) },
        )
        .await;
        assert!(matches!(result, Err(CoreError::Cancelled)));
    }
}
