//! Top-level reconciliation orchestration.
//!
//! One coordinator call is one reconciliation pass for one resource:
//!
//! - [`Coordinator::create`] issues the create call, applies the residual
//!   plan, waits for readiness, and compensates (deletes the partially
//!   created resource) when anything after creation fails.
//! - [`Coordinator::update`] validates immutability before any remote
//!   call, executes the plan strictly in order, and re-polls readiness.
//!   There is no rollback; partial progress is reported as-is.
//! - [`Coordinator::delete`] is idempotent and, for resource types with
//!   known transient delete blockers, retried.
//!
//! Callers must serialize passes for the same resource id. The engine
//! assumes at-most-one in-flight reconciliation per id and takes no lock
//! of its own.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::cancel::CancelSignal;
use crate::error::{Compensation, Error, ReconcileError};
use crate::op::{OperationPlan, RemoteOp};
use crate::poll::{wait_until_ready, Observed, PollSpec};
use crate::retry::{retry, RetryConfig};
use crate::transport::Transport;

/// Result of one reconciliation pass.
pub type ReconcileResult<S> = Result<S, ReconcileError>;

/// Per-resource-type behavior the coordinator is generic over.
///
/// An adapter owns the schema knowledge for one resource type: how to
/// diff it, which remote operations exist for it, which statuses mean
/// what, and which failures are transient on delete. The engine supplies
/// everything else.
pub trait ResourceAdapter: Send + Sync {
    /// Desired configuration, already parsed and validated for shape.
    type Spec: Send + Sync;

    /// Last known remote representation.
    type State: Observed + Send + Sync;

    /// The resource type's atomic operation set.
    type Op: RemoteOp;

    /// Resource kind tag for logs and error context.
    fn kind(&self) -> &'static str;

    /// Reject changes to immutable fields. Runs before any remote call so
    /// an invalid update never partially mutates the resource.
    fn validate_update(&self, desired: &Self::Spec, observed: &Self::State) -> Result<(), Error>;

    /// Diff desired against observed into an ordered plan. Must be pure
    /// and must return an empty plan when nothing differs.
    fn plan(&self, desired: &Self::Spec, observed: &Self::State) -> OperationPlan<Self::Op>;

    /// The initial create call for a resource that does not exist yet.
    fn create_op(&self, desired: &Self::Spec) -> Self::Op;

    /// The delete call for an existing resource.
    fn delete_op(&self, resource_id: &str) -> Self::Op;

    /// The status read used by readiness polling.
    fn fetch_op(&self, resource_id: &str) -> Self::Op;

    /// Decode a transport response into observed state.
    fn parse_state(&self, operation: &str, data: &Value) -> Result<Self::State, Error>;

    /// Poll spec for a freshly created resource.
    fn create_poll(&self) -> PollSpec;

    /// Poll spec after a non-empty update plan.
    fn update_poll(&self) -> PollSpec;

    /// Retry policy for deletes blocked by transient dependent state.
    /// `None` means a single attempt.
    fn delete_retry(&self) -> Option<(RetryConfig, fn(&Error) -> bool)> {
        None
    }

    /// Whether a delete failure means the resource is already gone.
    fn is_not_found(&self, err: &Error) -> bool {
        match err {
            Error::Remote { errors, .. } => errors.iter().any(|e| {
                e.code.as_deref() == Some("NOT_FOUND")
                    || e.message.to_ascii_lowercase().contains("not found")
            }),
            _ => false,
        }
    }
}

/// Drives create / update / delete passes for one resource type.
pub struct Coordinator<T, A> {
    transport: Arc<T>,
    adapter: A,
}

impl<T, A> Coordinator<T, A>
where
    T: Transport,
    A: ResourceAdapter,
{
    pub fn new(transport: Arc<T>, adapter: A) -> Self {
        Self { transport, adapter }
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// Create the resource and drive it to readiness.
    ///
    /// Any failure after the remote resource exists triggers a
    /// compensating delete; if that delete also fails, the returned error
    /// carries both failures and is flagged for manual cleanup.
    /// Cancellation aborts without compensation.
    pub async fn create(
        &self,
        desired: &A::Spec,
        cancel: &mut CancelSignal,
    ) -> ReconcileResult<A::State> {
        let kind = self.adapter.kind();
        let create = self.adapter.create_op(desired);
        let create_name = create.operation_name();
        info!(kind, operation = create_name, "creating resource");

        // Nothing remote exists yet; a failure here needs no compensation.
        let data = match self.execute(&create).await {
            Ok(data) => data,
            Err(err) => return Err(self.bare_failure(kind.to_string(), vec![], err)),
        };
        let mut applied = vec![create_name.to_string()];

        let created = match self.adapter.parse_state(create_name, &data) {
            Ok(state) => state,
            // The resource may exist remotely, but without a decodable id
            // there is nothing to aim a compensating delete at.
            Err(err) => return Err(self.bare_failure(kind.to_string(), applied, err)),
        };
        let id = created.id().to_string();

        // Fields the create call cannot express land as a residual plan
        // against the just-created state (e.g. a connector is created
        // disabled and enabled last).
        let plan = self.adapter.plan(desired, &created);
        debug!(kind, resource_id = %id, residual_ops = plan.len(), "created, applying residual configuration");
        for op in plan.iter() {
            if let Err(err) = self.execute(op).await {
                return Err(self.compensate(&id, applied, err).await);
            }
            applied.push(op.operation_name().to_string());
        }

        let spec = self.adapter.create_poll();
        match wait_until_ready(&id, &spec, cancel, || self.fetch_state(&id)).await {
            Ok(state) => {
                info!(kind, resource_id = %id, "resource created and ready");
                Ok(state)
            }
            Err(err) => Err(self.compensate(&id, applied, err).await),
        }
    }

    /// Converge an existing resource toward the desired spec.
    ///
    /// Executes the plan strictly in order; a mid-plan failure reports
    /// exactly which operations applied, with no rollback (the remote
    /// system has no multi-op transaction to build one on).
    pub async fn update(
        &self,
        desired: &A::Spec,
        observed: &A::State,
        cancel: &mut CancelSignal,
    ) -> ReconcileResult<A::State> {
        let kind = self.adapter.kind();
        let id = observed.id().to_string();

        // Fail fast: no remote call happens for an invalid update.
        if let Err(err) = self.adapter.validate_update(desired, observed) {
            return Err(self.bare_failure(id, vec![], err));
        }

        let plan = self.adapter.plan(desired, observed);
        if plan.is_empty() {
            debug!(kind, resource_id = %id, "desired state matches observed, nothing to do");
            return match self.fetch_state(&id).await {
                Ok(state) => Ok(state),
                Err(err) => Err(self.bare_failure(id, vec![], err)),
            };
        }

        info!(kind, resource_id = %id, ops = plan.len(), "applying update plan");
        let mut applied = Vec::with_capacity(plan.len());
        for op in plan.iter() {
            if let Err(err) = self.execute(op).await {
                warn!(
                    kind,
                    resource_id = %id,
                    operation = op.operation_name(),
                    applied = applied.len(),
                    error = %err,
                    "update plan failed partway"
                );
                return Err(self.bare_failure(id, applied, err));
            }
            applied.push(op.operation_name().to_string());
        }

        let spec = self.adapter.update_poll();
        match wait_until_ready(&id, &spec, cancel, || self.fetch_state(&id)).await {
            Ok(state) => {
                info!(kind, resource_id = %id, "update applied and resource ready");
                Ok(state)
            }
            Err(err) => Err(self.bare_failure(id, applied, err)),
        }
    }

    /// Delete the resource. A remote "not found" counts as success so
    /// deletes are idempotent.
    pub async fn delete(&self, resource_id: &str, cancel: &mut CancelSignal) -> Result<(), Error> {
        let kind = self.adapter.kind();
        let op = self.adapter.delete_op(resource_id);
        info!(kind, resource_id, operation = op.operation_name(), "deleting resource");

        let result = match self.adapter.delete_retry() {
            Some((config, is_retryable)) => {
                retry(&config, op.operation_name(), cancel, is_retryable, || {
                    self.execute(&op)
                })
                .await
            }
            None => self.execute(&op).await,
        };

        match result {
            Ok(_) => Ok(()),
            Err(err) if self.adapter.is_not_found(&err) => {
                debug!(kind, resource_id, "resource already gone");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    async fn execute(&self, op: &A::Op) -> Result<Value, Error> {
        debug!(operation = op.operation_name(), "executing remote operation");
        self.transport.call(op.operation_name(), op.variables()).await
    }

    async fn fetch_state(&self, resource_id: &str) -> Result<A::State, Error> {
        let op = self.adapter.fetch_op(resource_id);
        let data = self.execute(&op).await?;
        self.adapter.parse_state(op.operation_name(), &data)
    }

    /// Wrap a failure that warrants no compensation.
    fn bare_failure(&self, resource: String, applied: Vec<String>, source: Error) -> ReconcileError {
        ReconcileError {
            resource,
            applied,
            compensation: Compensation::NotAttempted,
            source,
        }
    }

    /// Delete the partially created resource after a failed create.
    ///
    /// Cancellation is the caller's decision point, not ours: a cancelled
    /// pass is reported without touching the remote resource.
    async fn compensate(
        &self,
        resource_id: &str,
        applied: Vec<String>,
        primary: Error,
    ) -> ReconcileError {
        if primary.is_cancelled() {
            return self.bare_failure(resource_id.to_string(), applied, primary);
        }

        warn!(
            resource_id,
            error = %primary,
            "create failed after resource existed, deleting partially created resource"
        );

        let op = self.adapter.delete_op(resource_id);
        let compensation = match self.execute(&op).await {
            Ok(_) => Compensation::Succeeded,
            Err(err) if self.adapter.is_not_found(&err) => Compensation::Succeeded,
            Err(err) => {
                error!(
                    resource_id,
                    primary = %primary,
                    compensation = %err,
                    "compensating delete failed, manual cleanup required"
                );
                Compensation::Failed(Box::new(err))
            }
        };

        ReconcileError {
            resource: resource_id.to_string(),
            applied,
            compensation,
            source: primary,
        }
    }
}
