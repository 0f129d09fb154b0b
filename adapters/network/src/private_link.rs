//! Private link adapter.
//!
//! A private link binds a virtual network to a tenant's own cloud
//! account. The remote side rejects deletion while consumer bindings are
//! still attached; bindings drain asynchronously, so deletes are retried
//! on that specific rejection.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use strato_engine::{
    Error, Observed, OperationPlan, PlanBuilder, PollSpec, RemoteOp, ResourceAdapter, RetryConfig,
};

/// Desired configuration for one private link.
#[derive(Debug, Clone)]
pub struct PrivateLinkSpec {
    /// Create-only; a link cannot move between networks.
    pub network_id: String,
    /// Cloud account principals allowed to connect.
    pub allowed_principals: Vec<String>,
}

/// Last known remote representation of a private link.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrivateLinkState {
    pub id: String,
    pub network_id: String,
    pub status: String,
    pub allowed_principals: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl Observed for PrivateLinkState {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Atomic remote operations on a private link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrivateLinkOp {
    Create {
        network_id: String,
        allowed_principals: Vec<String>,
    },
    SetAllowedPrincipals {
        id: String,
        allowed_principals: Vec<String>,
    },
    Delete {
        id: String,
    },
    Get {
        id: String,
    },
}

impl RemoteOp for PrivateLinkOp {
    fn operation_name(&self) -> &'static str {
        match self {
            PrivateLinkOp::Create { .. } => "createPrivateLink",
            PrivateLinkOp::SetAllowedPrincipals { .. } => "setPrivateLinkAllowedPrincipals",
            PrivateLinkOp::Delete { .. } => "deletePrivateLink",
            PrivateLinkOp::Get { .. } => "getPrivateLink",
        }
    }

    fn variables(&self) -> Value {
        match self {
            PrivateLinkOp::Create {
                network_id,
                allowed_principals,
            } => json!({
                "networkId": network_id,
                "allowedPrincipals": allowed_principals,
            }),
            PrivateLinkOp::SetAllowedPrincipals {
                id,
                allowed_principals,
            } => json!({
                "id": id,
                "allowedPrincipals": allowed_principals,
            }),
            PrivateLinkOp::Delete { id } | PrivateLinkOp::Get { id } => json!({"id": id}),
        }
    }
}

/// Whether a delete failure is the transient "bindings still attached"
/// rejection.
///
/// The remote API exposes no structured code for this condition, so this
/// matches on the message text. The wording is not guaranteed stable by
/// the remote side; if it changes, only this function needs to follow.
pub fn private_link_delete_blocked(err: &Error) -> bool {
    match err {
        Error::Remote { errors, .. } => errors
            .iter()
            .any(|e| e.message.to_ascii_lowercase().contains("dependent binding")),
        _ => false,
    }
}

/// Adapter wiring private links into the engine.
pub struct PrivateLinkAdapter;

impl ResourceAdapter for PrivateLinkAdapter {
    type Spec = PrivateLinkSpec;
    type State = PrivateLinkState;
    type Op = PrivateLinkOp;

    fn kind(&self) -> &'static str {
        "private_link"
    }

    fn validate_update(
        &self,
        desired: &PrivateLinkSpec,
        observed: &PrivateLinkState,
    ) -> Result<(), Error> {
        if desired.network_id != observed.network_id {
            return Err(Error::Validation {
                resource: observed.id.clone(),
                reason: format!(
                    "a private link cannot move between networks (remote {:?}, desired {:?})",
                    observed.network_id, desired.network_id
                ),
            });
        }
        Ok(())
    }

    fn plan(
        &self,
        desired: &PrivateLinkSpec,
        observed: &PrivateLinkState,
    ) -> OperationPlan<PrivateLinkOp> {
        let id = &observed.id;
        let mut b = PlanBuilder::new();
        b.field(
            Some(&desired.allowed_principals),
            Some(&observed.allowed_principals),
            |principals| PrivateLinkOp::SetAllowedPrincipals {
                id: id.clone(),
                allowed_principals: principals.clone(),
            },
        );
        b.build()
    }

    fn create_op(&self, desired: &PrivateLinkSpec) -> PrivateLinkOp {
        PrivateLinkOp::Create {
            network_id: desired.network_id.clone(),
            allowed_principals: desired.allowed_principals.clone(),
        }
    }

    fn delete_op(&self, resource_id: &str) -> PrivateLinkOp {
        PrivateLinkOp::Delete {
            id: resource_id.to_string(),
        }
    }

    fn fetch_op(&self, resource_id: &str) -> PrivateLinkOp {
        PrivateLinkOp::Get {
            id: resource_id.to_string(),
        }
    }

    fn parse_state(&self, operation: &str, data: &Value) -> Result<PrivateLinkState, Error> {
        serde_json::from_value(data.clone()).map_err(|e| Error::MalformedResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    fn create_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["REQUESTED", "PROVISIONING"],
            target: &["AVAILABLE"],
            timeout: std::time::Duration::from_secs(20 * 60),
            poll_interval: std::time::Duration::from_secs(20),
            initial_delay: std::time::Duration::from_secs(5),
        }
    }

    fn update_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["UPDATING"],
            target: &["AVAILABLE"],
            timeout: std::time::Duration::from_secs(10 * 60),
            poll_interval: std::time::Duration::from_secs(10),
            initial_delay: std::time::Duration::ZERO,
        }
    }

    fn delete_retry(&self) -> Option<(RetryConfig, fn(&Error) -> bool)> {
        Some((
            RetryConfig {
                max_attempts: 6,
                interval: std::time::Duration::from_secs(10),
            },
            private_link_delete_blocked,
        ))
    }
}
