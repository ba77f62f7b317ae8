use std::future::Future;
use std::time::Duration;

use crate::errors::TrigWatchResult;

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts after the first one.
    pub max_retries: u32,
    /// Pause before retry `n` is `pause * n`.
    pub pause: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, pause: Duration) -> Self {
        Self { max_retries, pause }
    }

    pub fn once() -> Self {
        Self { max_retries: 0, pause: Duration::ZERO }
    }
}

/// Runs `op` until it succeeds, returns a non-transient error, or the retry
/// budget is spent. The last error is returned on exhaustion.
pub async fn with_retries<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> TrigWatchResult<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = TrigWatchResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    call = label,
                    error = %e,
                    retry = attempt,
                    max_retries = policy.max_retries,
                    "call failed, retrying"
                );
                if !policy.pause.is_zero() {
                    tokio::time::sleep(policy.pause * attempt).await;
                }
            }
            Err(e) => return Err(e),
        }
    }
}
