//! Plan construction: field diffs and ordering rules.
//!
//! [`PlanBuilder`] turns a desired-vs-observed comparison into an ordered
//! [`OperationPlan`]. Ordering rules:
//!
//! - **Gate-then-mutate**: when any mutation is present and the resource
//!   is currently enabled, a disable operation runs first; a desired
//!   enable always runs last. The remote system rejects edits while the
//!   resource is active, and rejects an enable that lands before the
//!   edits do.
//! - **Detach-before-attach**: a reference field moving from one non-null
//!   value to another emits the detach of the old value before the attach
//!   of the new one.
//! - Everything else keeps the order in which the builder methods were
//!   called (declaration order of fields), so plans are deterministic and
//!   reproducible for the same input.
//!
//! The builder never touches the remote system and never mutates its
//! inputs; a plan is a pure function of (desired, observed).

use crate::op::OperationPlan;

struct GateRule<Op> {
    observed_enabled: bool,
    desired_enabled: Option<bool>,
    disable: Op,
    enable: Op,
}

/// Assembles an ordered operation plan from field-level diffs.
pub struct PlanBuilder<Op> {
    ops: Vec<Op>,
    gate: Option<GateRule<Op>>,
}

impl<Op> PlanBuilder<Op> {
    pub fn new() -> Self {
        Self {
            ops: Vec::new(),
            gate: None,
        }
    }

    /// Emit an operation when the desired value is set and differs from
    /// the observed value. An unset desired value means "leave the remote
    /// field alone". Passing `None` for `observed` models a write-only
    /// field (e.g. credentials the remote never echoes back): a set
    /// desired value always emits.
    pub fn field<T: PartialEq + ?Sized>(
        &mut self,
        desired: Option<&T>,
        observed: Option<&T>,
        op: impl FnOnce(&T) -> Op,
    ) -> &mut Self {
        if let Some(want) = desired {
            if observed != Some(want) {
                self.ops.push(op(want));
            }
        }
        self
    }

    /// Diff a reference field with detach-before-attach semantics.
    ///
    /// Unlike [`PlanBuilder::field`], a `None` desired value here is an
    /// explicit null: the old reference is detached and nothing replaces
    /// it.
    pub fn reference<T: PartialEq + ?Sized>(
        &mut self,
        desired: Option<&T>,
        observed: Option<&T>,
        detach: impl FnOnce(&T) -> Op,
        attach: impl FnOnce(&T) -> Op,
    ) -> &mut Self {
        match (observed, desired) {
            (Some(old), Some(new)) if old != new => {
                self.ops.push(detach(old));
                self.ops.push(attach(new));
            }
            (Some(old), None) => {
                self.ops.push(detach(old));
            }
            (None, Some(new)) => {
                self.ops.push(attach(new));
            }
            _ => {}
        }
        self
    }

    /// Register the gate-then-mutate rule for a resource with an enabled
    /// flag. `desired_enabled == None` preserves the observed flag: the
    /// resource is still disabled around edits and restored afterwards.
    ///
    /// May be called at any point; placement in the plan is decided at
    /// [`PlanBuilder::build`] time.
    pub fn gate(
        &mut self,
        observed_enabled: bool,
        desired_enabled: Option<bool>,
        disable: impl FnOnce() -> Op,
        enable: impl FnOnce() -> Op,
    ) -> &mut Self {
        self.gate = Some(GateRule {
            observed_enabled,
            desired_enabled,
            disable: disable(),
            enable: enable(),
        });
        self
    }

    /// Assemble the final plan: optional disable, mutations in declaration
    /// order, optional enable last.
    pub fn build(self) -> OperationPlan<Op> {
        let Self { ops, gate } = self;

        let Some(gate) = gate else {
            return OperationPlan::from_ops(ops);
        };

        let has_edits = !ops.is_empty();
        let want_enabled = gate.desired_enabled.unwrap_or(gate.observed_enabled);
        let need_disable = gate.observed_enabled && (has_edits || !want_enabled);
        let need_enable = want_enabled && (has_edits || !gate.observed_enabled);

        let mut out = Vec::with_capacity(ops.len() + 2);
        if need_disable {
            out.push(gate.disable);
        }
        out.extend(ops);
        if need_enable {
            out.push(gate.enable);
        }
        OperationPlan::from_ops(out)
    }
}

impl<Op> Default for PlanBuilder<Op> {
    fn default() -> Self {
        Self::new()
    }
}
