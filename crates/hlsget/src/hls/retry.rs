// HLS Retry Utility: fixed-interval retry loop shared by segment fetching.

use crate::hls::HlsDownloaderError;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts, the first one included. Never below 1.
    pub max_attempts: u32,
    /// Pause between two attempts. Constant across attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            delay,
        }
    }
}

/// Result of a single attempt, used by the caller to signal retryability.
pub enum RetryAction<T> {
    Success(T),
    /// Transient failure; the next attempt runs after the delay.
    Retry(HlsDownloaderError),
    /// Permanent failure; no further attempts.
    Fail(HlsDownloaderError),
}

/// Execute an async operation until it succeeds, fails permanently, or runs
/// out of attempts.
///
/// `operation` receives the 0-indexed attempt number. Running out of
/// attempts yields [`HlsDownloaderError::Exhausted`] naming `url`.
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryPolicy,
    url: &str,
    mut operation: F,
) -> Result<T, HlsDownloaderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = RetryAction<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = String::new();

    for attempt in 0..max_attempts {
        match operation(attempt).await {
            RetryAction::Success(value) => return Ok(value),
            RetryAction::Fail(err) => return Err(err),
            RetryAction::Retry(err) => {
                last_error = err.to_string();
                if attempt + 1 >= max_attempts {
                    break;
                }
                warn!(
                    url,
                    attempt = attempt + 1,
                    max = max_attempts,
                    delay_ms = policy.delay.as_millis() as u64,
                    error = %err,
                    "Retrying after failed attempt"
                );
                tokio::time::sleep(policy.delay).await;
            }
        }
    }

    Err(HlsDownloaderError::Exhausted {
        url: url.to_string(),
        attempts: max_attempts,
        last_error,
    })
}
