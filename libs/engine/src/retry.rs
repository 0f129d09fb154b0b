//! Bounded retry with per-call-site error classification.
//!
//! The classifier is injected because retryability is a property of the
//! call site, not of the error type: the same remote error is transient
//! for one operation and fatal for another. Exhausting the attempt budget
//! returns [`Error::RetriesExhausted`] wrapping the final failure, never
//! the raw last error alone.

use std::future::Future;
use std::time::Duration;

use tracing::debug;

use crate::cancel::{cancelled, CancelSignal};
use crate::error::Error;

/// Retry policy for a single remote operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,

    /// Fixed sleep between attempts.
    pub interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            interval: Duration::from_secs(10),
        }
    }
}

/// Run `action` until it succeeds, fails non-retryably, or exhausts the
/// attempt budget. Sleeps `config.interval` between attempts; the sleep
/// aborts promptly when `cancel` fires.
///
/// `context` names the operation for logs and the cancellation error.
pub async fn retry<T, F, Fut>(
    config: &RetryConfig,
    context: &str,
    cancel: &mut CancelSignal,
    is_retryable: impl Fn(&Error) -> bool,
    mut action: F,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 0u32;

    loop {
        if *cancel.borrow() {
            return Err(Error::Cancelled {
                context: context.to_string(),
            });
        }

        attempt += 1;
        let err = match action().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !is_retryable(&err) {
            return Err(err);
        }
        if attempt >= max_attempts {
            return Err(Error::RetriesExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        debug!(
            context,
            attempt,
            max_attempts,
            interval_secs = config.interval.as_secs(),
            error = %err,
            "retryable failure, sleeping before next attempt"
        );

        tokio::select! {
            _ = tokio::time::sleep(config.interval) => {}
            _ = cancelled(cancel) => {
                return Err(Error::Cancelled {
                    context: context.to_string(),
                });
            }
        }
    }
}
