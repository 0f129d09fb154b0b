//! Error types for the reconciliation engine.
//!
//! Lower-level components (planner, poller, retry executor) return plain
//! [`Error`] values without interpreting business meaning. The coordinator
//! is the only place that decides compensation policy, and it reports
//! terminal failures through [`ReconcileError`] so callers always learn
//! which operations applied and whether cleanup ran.

use std::time::Duration;

use thiserror::Error;

use crate::transport::OperationError;

/// Errors produced while reconciling a single resource.
#[derive(Debug, Error)]
pub enum Error {
    /// Desired spec violates an immutability or mutual-exclusion
    /// constraint. Detected before any remote call; never retried.
    #[error("validation failed for {resource}: {reason}")]
    Validation { resource: String, reason: String },

    /// The remote call layer failed (network, auth, malformed wire data).
    #[error("transport error calling {operation}: {detail}")]
    Transport { operation: String, detail: String },

    /// The remote system executed the call but returned logical errors.
    #[error("operation {operation} rejected: {}", join_messages(.errors))]
    Remote {
        operation: String,
        errors: Vec<OperationError>,
    },

    /// A response arrived, but not in the shape the adapter expects.
    #[error("malformed response to {operation}: {detail}")]
    MalformedResponse { operation: String, detail: String },

    /// Readiness polling exceeded its deadline while the resource was
    /// still in a pending status.
    #[error("timeout after {elapsed:?} waiting for {resource} (last status {last_status:?})")]
    Timeout {
        resource: String,
        elapsed: Duration,
        last_status: String,
    },

    /// Readiness polling observed a status outside both the pending and
    /// target sets. Fatal: polling forever on an unknown status is never
    /// correct.
    #[error("unexpected status {status:?} for {resource}")]
    UnexpectedStatus { resource: String, status: String },

    /// The caller's cancel signal fired. Distinct from [`Error::Timeout`];
    /// cancellation never triggers compensation.
    #[error("cancelled during {context}")]
    Cancelled { context: String },

    /// Retries exhausted without success. Wraps the final failure so
    /// callers can tell transient-exhausted apart from a single permanent
    /// failure.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Get the standardized reason code for this error.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Error::Validation { .. } => "validation_failed",
            Error::Transport { .. } => "transport_error",
            Error::Remote { .. } => "remote_operation_error",
            Error::MalformedResponse { .. } => "malformed_response",
            Error::Timeout { .. } => "timeout",
            Error::UnexpectedStatus { .. } => "unexpected_status",
            Error::Cancelled { .. } => "cancelled",
            Error::RetriesExhausted { .. } => "retries_exhausted",
        }
    }

    /// Returns true if this error came from the caller's cancel signal.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled { .. })
    }
}

fn join_messages(errors: &[OperationError]) -> String {
    errors
        .iter()
        .map(|e| e.message.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Outcome of the compensating delete issued after a failed creation.
#[derive(Debug)]
pub enum Compensation {
    /// No compensation was warranted (nothing remote existed yet, or the
    /// pass was cancelled).
    NotAttempted,

    /// The partially created resource was deleted.
    Succeeded,

    /// The compensating delete itself failed. The remote resource is
    /// orphaned and requires manual cleanup.
    Failed(Box<Error>),
}

/// Terminal failure of one reconciliation pass.
///
/// `applied` lists the operation names that completed before the failure,
/// in execution order, so the caller's stored state can reflect reality
/// (there is no remote multi-op transaction to roll back).
#[derive(Debug)]
pub struct ReconcileError {
    pub resource: String,
    pub applied: Vec<String>,
    pub compensation: Compensation,
    pub source: Error,
}

impl ReconcileError {
    /// Returns true if a compensating delete failed and the remote
    /// resource must be cleaned up by hand.
    pub fn needs_manual_cleanup(&self) -> bool {
        matches!(self.compensation, Compensation::Failed(_))
    }
}

impl std::fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "reconciling {} failed: {}", self.resource, self.source)?;
        if !self.applied.is_empty() {
            write!(f, " (applied: {})", self.applied.join(", "))?;
        }
        match &self.compensation {
            Compensation::NotAttempted => Ok(()),
            Compensation::Succeeded => write!(f, "; partially created resource was deleted"),
            Compensation::Failed(err) => write!(
                f,
                "; compensating delete also failed: {err}; manual cleanup required"
            ),
        }
    }
}

impl std::error::Error for ReconcileError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.source)
    }
}
