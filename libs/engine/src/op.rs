//! Atomic remote operations and ordered plans.

use serde_json::Value;

/// One atomic remote mutation (or read), ready to hand to a
/// [`crate::transport::Transport`].
///
/// Adapters model their operation set as an enum implementing this trait,
/// so every call site serializes the same way instead of assembling
/// ad-hoc variable maps.
pub trait RemoteOp: std::fmt::Debug + Send + Sync {
    /// Remote operation name, as accepted by the transport.
    fn operation_name(&self) -> &'static str;

    /// Variables for the call.
    fn variables(&self) -> Value;
}

/// An ordered sequence of operations for one reconciliation pass.
///
/// Order is a first-class invariant: the coordinator executes operations
/// strictly in this order, each awaited to completion before the next
/// begins, because later operations may depend on the effects of earlier
/// ones.
#[derive(Debug, Clone, PartialEq)]
pub struct OperationPlan<Op> {
    ops: Vec<Op>,
}

impl<Op> OperationPlan<Op> {
    /// A plan with nothing to do. Reconciling a resource whose observed
    /// state already matches the desired spec produces this.
    pub fn empty() -> Self {
        Self { ops: Vec::new() }
    }

    pub(crate) fn from_ops(ops: Vec<Op>) -> Self {
        Self { ops }
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Op> {
        self.ops.iter()
    }

    pub fn as_slice(&self) -> &[Op] {
        &self.ops
    }
}

impl<Op> IntoIterator for OperationPlan<Op> {
    type Item = Op;
    type IntoIter = std::vec::IntoIter<Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.into_iter()
    }
}

impl<'a, Op> IntoIterator for &'a OperationPlan<Op> {
    type Item = &'a Op;
    type IntoIter = std::slice::Iter<'a, Op>;

    fn into_iter(self) -> Self::IntoIter {
        self.ops.iter()
    }
}
