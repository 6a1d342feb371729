//! Bounded retry with exponential backoff for provider calls.
//!
//! Every external call (embedding, completion) goes through [`with_retry`].
//! Each attempt is bounded by the policy's timeout; failed attempts are
//! retried up to `max_retries` times with delays of `base_delay`,
//! `2 × base_delay`, `4 × base_delay`, ... (exponent capped at 5).
//! Errors wrapped with [`permanent`] (e.g. HTTP 4xx other than 429) fail
//! immediately. Exhaustion surfaces as [`Error::ProviderUnavailable`].

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Per-call retry settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound for a single attempt; `None` waits indefinitely.
    pub timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
            timeout: Some(Duration::from_secs(60)),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, timeout: Option<Duration>) -> Self {
        Self {
            max_retries,
            timeout,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(5);
        self.base_delay * (1u32 << exp)
    }
}

/// Marks a provider error as not worth retrying.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct Permanent(pub anyhow::Error);

/// Wrap an error so [`with_retry`] gives up immediately.
pub fn permanent(err: impl Into<anyhow::Error>) -> anyhow::Error {
    anyhow::Error::new(Permanent(err.into()))
}

pub fn is_permanent(err: &anyhow::Error) -> bool {
    err.downcast_ref::<Permanent>().is_some()
}

/// Run `op` under `policy`, mapping final failure to [`Error::ProviderUnavailable`].
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, provider: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
{
    let mut last_err: Option<anyhow::Error> = None;

    for attempt in 0..=policy.max_retries {
        if attempt > 0 {
            let delay = policy.backoff(attempt);
            debug!(provider, attempt, ?delay, "retrying provider call");
            tokio::time::sleep(delay).await;
        }

        let outcome = match policy.timeout {
            Some(limit) => match tokio::time::timeout(limit, op()).await {
                Ok(res) => res,
                Err(_) => Err(anyhow::anyhow!("timed out after {:?}", limit)),
            },
            None => op().await,
        };

        match outcome {
            Ok(value) => return Ok(value),
            Err(e) if is_permanent(&e) => {
                warn!(provider, error = %e, "provider call failed permanently");
                return Err(Error::ProviderUnavailable {
                    provider: provider.to_string(),
                    message: e.to_string(),
                });
            }
            Err(e) => {
                warn!(provider, attempt, error = %e, "provider call failed");
                last_err = Some(e);
            }
        }
    }

    Err(Error::ProviderUnavailable {
        provider: provider.to_string(),
        message: last_err
            .map(|e| e.to_string())
            .unwrap_or_else(|| "failed after retries".to_string()),
    })
}
