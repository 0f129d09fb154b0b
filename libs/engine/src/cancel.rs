//! Cancellation plumbing shared by the poll and retry loops.
//!
//! The engine's only suspension points are the readiness poll loop and
//! the retry backoff sleep. Both `select!` against a watch channel so a
//! caller-supplied shutdown signal aborts the wait promptly.

use tokio::sync::watch;

/// Caller-supplied cancel signal. Flipping the sender to `true` aborts
/// in-flight polls and retries.
pub type CancelSignal = watch::Receiver<bool>;

/// Create a cancel channel. The sender side belongs to the caller.
pub fn channel() -> (watch::Sender<bool>, CancelSignal) {
    watch::channel(false)
}

/// A signal that never fires, for callers without a cancellation source.
pub fn never() -> CancelSignal {
    let (_tx, rx) = watch::channel(false);
    rx
}

/// Resolve once the signal flips to `true`. A dropped sender counts as
/// never-cancelled, not as cancellation.
pub(crate) async fn cancelled(signal: &mut CancelSignal) {
    loop {
        if *signal.borrow() {
            return;
        }
        if signal.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
