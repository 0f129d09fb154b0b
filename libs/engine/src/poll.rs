//! Readiness polling: drive repeated status reads until a target state.
//!
//! The remote system provisions asynchronously, so after a mutation lands
//! the resource passes through pending statuses before settling. The
//! poller partitions raw status strings into `pending` (keep polling) and
//! `target` (done); anything else is fatal immediately rather than polled
//! forever.
//!
//! Transport failures inside `fetch` are fatal here. If a call site wants
//! transport-level retries it wraps them inside its own fetch closure;
//! the poller does not blur transport retry with convergence retry.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::{cancelled, CancelSignal};
use crate::error::Error;

/// Status sets and timing for one readiness wait.
#[derive(Debug, Clone)]
pub struct PollSpec {
    /// Statuses that mean "keep polling".
    pub pending: &'static [&'static str],

    /// Statuses that mean the resource is ready.
    pub target: &'static [&'static str],

    /// Give up after this long in a pending status.
    pub timeout: Duration,

    /// Delay between consecutive status reads.
    pub poll_interval: Duration,

    /// Grace period before the first read; remote status is commonly
    /// meaningless right after a mutation is acknowledged.
    pub initial_delay: Duration,
}

impl PollSpec {
    pub fn is_pending(&self, status: &str) -> bool {
        self.pending.contains(&status)
    }

    pub fn is_target(&self, status: &str) -> bool {
        self.target.contains(&status)
    }
}

/// Implemented by adapter observed-state types so the engine can read the
/// remote id and raw status string.
pub trait Observed {
    /// Remote resource id.
    fn id(&self) -> &str;

    /// Raw remote status string.
    fn status(&self) -> &str;
}

/// Poll `fetch` until the resource reaches a target status.
///
/// Terminates with:
/// - `Ok(state)` on the first observation in a target status
/// - [`Error::Timeout`] once `spec.timeout` elapses while still pending
/// - [`Error::UnexpectedStatus`] immediately on a status outside both sets
/// - [`Error::Cancelled`] promptly when `cancel` fires
/// - the fetch error itself when a status read fails
pub async fn wait_until_ready<S, F, Fut>(
    resource_id: &str,
    spec: &PollSpec,
    cancel: &mut CancelSignal,
    mut fetch: F,
) -> Result<S, Error>
where
    S: Observed,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<S, Error>>,
{
    if *cancel.borrow() {
        return Err(Error::Cancelled {
            context: resource_id.to_string(),
        });
    }

    debug!(
        resource_id,
        timeout_secs = spec.timeout.as_secs(),
        interval_secs = spec.poll_interval.as_secs(),
        "waiting for resource to become ready"
    );

    if !spec.initial_delay.is_zero() {
        tokio::select! {
            _ = tokio::time::sleep(spec.initial_delay) => {}
            _ = cancelled(cancel) => {
                return Err(Error::Cancelled {
                    context: resource_id.to_string(),
                });
            }
        }
    }

    let started = Instant::now();
    loop {
        let state = fetch().await?;
        let status = state.status();

        if spec.is_target(status) {
            info!(resource_id, status, "resource ready");
            return Ok(state);
        }
        if !spec.is_pending(status) {
            warn!(resource_id, status, "resource entered unexpected status");
            return Err(Error::UnexpectedStatus {
                resource: resource_id.to_string(),
                status: status.to_string(),
            });
        }

        let elapsed = started.elapsed();
        if elapsed >= spec.timeout {
            warn!(resource_id, status, elapsed_secs = elapsed.as_secs(), "readiness wait timed out");
            return Err(Error::Timeout {
                resource: resource_id.to_string(),
                elapsed,
                last_status: status.to_string(),
            });
        }

        debug!(resource_id, status, "resource still pending");
        tokio::select! {
            _ = tokio::time::sleep(spec.poll_interval) => {}
            _ = cancelled(cancel) => {
                return Err(Error::Cancelled {
                    context: resource_id.to_string(),
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    use crate::cancel;

    #[derive(Debug)]
    struct TestState {
        id: String,
        status: String,
    }

    impl Observed for TestState {
        fn id(&self) -> &str {
            &self.id
        }

        fn status(&self) -> &str {
            &self.status
        }
    }

    fn state(status: &str) -> TestState {
        TestState {
            id: "res_01".to_string(),
            status: status.to_string(),
        }
    }

    fn spec() -> PollSpec {
        PollSpec {
            pending: &["CREATING", "STARTING"],
            target: &["RUNNING"],
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
            initial_delay: Duration::from_secs(5),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_after_pending_then_target() {
        let fetches = AtomicU32::new(0);
        let mut cancel = cancel::never();

        // Pending three times, then running: exactly four fetches.
        let result = wait_until_ready("res_01", &spec(), &mut cancel, || {
            let n = fetches.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 3 {
                    Ok(state("CREATING"))
                } else {
                    Ok(state("RUNNING"))
                }
            }
        })
        .await;

        assert_eq!(result.unwrap().status, "RUNNING");
        assert_eq!(fetches.load(Ordering::SeqCst), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_target_fetches_once() {
        let fetches = AtomicU32::new(0);
        let mut cancel = cancel::never();

        let result = wait_until_ready("res_01", &spec(), &mut cancel, || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(state("RUNNING")) }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_while_pending() {
        let fetches = AtomicU32::new(0);
        let mut cancel = cancel::never();
        let spec = spec();

        let result = wait_until_ready("res_01", &spec, &mut cancel, || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(state("STARTING")) }
        })
        .await;

        match result {
            Err(Error::Timeout { last_status, .. }) => {
                assert_eq!(last_status, "STARTING");
            }
            other => panic!("expected Timeout, got {other:?}"),
        }

        // At most timeout / poll_interval + 1 reads.
        let max_fetches =
            (spec.timeout.as_secs() / spec.poll_interval.as_secs() + 1) as u32;
        assert!(fetches.load(Ordering::SeqCst) <= max_fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unexpected_status_is_fatal_immediately() {
        let fetches = AtomicU32::new(0);
        let mut cancel = cancel::never();

        let result = wait_until_ready("res_01", &spec(), &mut cancel, || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(state("DEGRADED")) }
        })
        .await;

        match result {
            Err(Error::UnexpectedStatus { status, .. }) => assert_eq!(status, "DEGRADED"),
            other => panic!("expected UnexpectedStatus, got {other:?}"),
        }
        assert_eq!(fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_fetch_error_is_fatal() {
        let mut cancel = cancel::never();

        let result: Result<TestState, _> =
            wait_until_ready("res_01", &spec(), &mut cancel, || async {
                Err(Error::Transport {
                    operation: "getComputeService".to_string(),
                    detail: "connection refused".to_string(),
                })
            })
            .await;

        assert!(matches!(result, Err(Error::Transport { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_initial_delay() {
        let fetches = AtomicU32::new(0);
        let (tx, mut rx) = cancel::channel();
        tx.send(true).unwrap();

        let result = wait_until_ready("res_01", &spec(), &mut rx, || {
            fetches.fetch_add(1, Ordering::SeqCst);
            async { Ok(state("RUNNING")) }
        })
        .await;

        assert!(matches!(result, Err(Error::Cancelled { .. })));
        assert_eq!(fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_mid_wait_is_not_a_timeout() {
        let (tx, mut rx) = cancel::channel();

        let handle = tokio::spawn(async move {
            wait_until_ready("res_01", &spec(), &mut rx, || async {
                Ok(state("CREATING"))
            })
            .await
        });

        tokio::task::yield_now().await;
        tx.send(true).unwrap();

        let result = handle.await.unwrap();
        match result {
            Err(Error::Cancelled { .. }) => {}
            other => panic!("expected Cancelled, got {other:?}"),
        }
    }
}
