//! Reconciliation engine for asynchronous cloud resources.
//!
//! Remote provisioning is asynchronous, eventually consistent, and only
//! partially mutable: one desired-configuration change may take several
//! ordered remote operations, each of which can take minutes to converge
//! and any of which can fail partway. This crate is the one place that
//! handles the resulting judgment calls:
//!
//! - [`planner::PlanBuilder`] turns a desired-vs-observed diff into an
//!   ordered operation plan (gate-then-mutate, detach-before-attach,
//!   deterministic field order).
//! - [`poll::wait_until_ready`] drives repeated status reads until a
//!   target status, a timeout, an unexpected status, or cancellation.
//! - [`retry::retry`] wraps a single operation in bounded retry with a
//!   per-call-site error classifier.
//! - [`coordinator::Coordinator`] orchestrates create / update / delete,
//!   including the compensating delete after a failed creation.
//!
//! Resource-type adapters implement [`coordinator::ResourceAdapter`] and
//! stay out of the orchestration business entirely.
//!
//! # Invariants
//!
//! - Plans are pure and deterministic functions of (desired, observed);
//!   an empty plan means the two already match.
//! - Operations in one plan execute strictly in order, one at a time.
//! - No failure is ever downgraded to a log line; every path returns a
//!   value the caller can branch on, and a failed compensation is always
//!   reported together with the primary failure.
//! - At-most-one in-flight reconciliation per resource id, enforced by
//!   the caller.

pub mod cancel;
pub mod coordinator;
pub mod error;
pub mod op;
pub mod planner;
pub mod poll;
pub mod retry;
pub mod testing;
pub mod transport;

pub use cancel::CancelSignal;
pub use coordinator::{Coordinator, ReconcileResult, ResourceAdapter};
pub use error::{Compensation, Error, ReconcileError};
pub use op::{OperationPlan, RemoteOp};
pub use planner::PlanBuilder;
pub use poll::{wait_until_ready, Observed, PollSpec};
pub use retry::{retry, RetryConfig};
pub use transport::{OperationError, Transport};
