//! Compute service adapter.
//!
//! A compute service is the priciest resource the engine manages: sized,
//! replicated, optionally attached to one virtual network, and slow to
//! provision. Post-creation mutability:
//!
//! - name, size, replica count: mutable, one operation each
//! - network attachment: mutable, but only via detach + attach
//! - region: immutable, rejected before any remote call

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use strato_engine::{
    Error, Observed, OperationPlan, PlanBuilder, PollSpec, RemoteOp, ResourceAdapter,
};

/// Desired configuration for one compute service.
///
/// Unset optional fields leave the remote value alone, except
/// `network_id`, where `None` is an explicit "no network".
#[derive(Debug, Clone)]
pub struct ComputeServiceSpec {
    pub name: String,
    pub size: Option<String>,
    pub replicas: Option<u32>,
    pub network_id: Option<String>,
    /// Create-only; changing it post-creation is a validation error.
    pub region: Option<String>,
}

/// Last known remote representation of a compute service.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComputeServiceState {
    pub id: String,
    pub name: String,
    pub status: String,
    pub size: String,
    pub replicas: u32,
    #[serde(default)]
    pub network_id: Option<String>,
    pub region: String,
    pub created_at: DateTime<Utc>,
}

impl Observed for ComputeServiceState {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Atomic remote operations on a compute service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ComputeOp {
    Create {
        name: String,
        size: Option<String>,
        replicas: Option<u32>,
        region: Option<String>,
        network_id: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    Resize {
        id: String,
        size: String,
    },
    SetReplicaCount {
        id: String,
        replicas: u32,
    },
    AttachNetwork {
        id: String,
        network_id: String,
    },
    DetachNetwork {
        id: String,
        network_id: String,
    },
    Delete {
        id: String,
    },
    Get {
        id: String,
    },
}

impl RemoteOp for ComputeOp {
    fn operation_name(&self) -> &'static str {
        match self {
            ComputeOp::Create { .. } => "createComputeService",
            ComputeOp::Rename { .. } => "renameComputeService",
            ComputeOp::Resize { .. } => "resizeComputeService",
            ComputeOp::SetReplicaCount { .. } => "setComputeServiceReplicaCount",
            ComputeOp::AttachNetwork { .. } => "attachComputeServiceNetwork",
            ComputeOp::DetachNetwork { .. } => "detachComputeServiceNetwork",
            ComputeOp::Delete { .. } => "deleteComputeService",
            ComputeOp::Get { .. } => "getComputeService",
        }
    }

    fn variables(&self) -> Value {
        match self {
            ComputeOp::Create {
                name,
                size,
                replicas,
                region,
                network_id,
            } => json!({
                "name": name,
                "size": size,
                "replicas": replicas,
                "region": region,
                "networkId": network_id,
            }),
            ComputeOp::Rename { id, name } => json!({"id": id, "name": name}),
            ComputeOp::Resize { id, size } => json!({"id": id, "size": size}),
            ComputeOp::SetReplicaCount { id, replicas } => {
                json!({"id": id, "replicas": replicas})
            }
            ComputeOp::AttachNetwork { id, network_id } => {
                json!({"id": id, "networkId": network_id})
            }
            ComputeOp::DetachNetwork { id, network_id } => {
                json!({"id": id, "networkId": network_id})
            }
            ComputeOp::Delete { id } | ComputeOp::Get { id } => json!({"id": id}),
        }
    }
}

/// Adapter wiring compute services into the engine.
pub struct ComputeAdapter;

impl ResourceAdapter for ComputeAdapter {
    type Spec = ComputeServiceSpec;
    type State = ComputeServiceState;
    type Op = ComputeOp;

    fn kind(&self) -> &'static str {
        "compute_service"
    }

    fn validate_update(
        &self,
        desired: &ComputeServiceSpec,
        observed: &ComputeServiceState,
    ) -> Result<(), Error> {
        if let Some(region) = &desired.region {
            if *region != observed.region {
                return Err(Error::Validation {
                    resource: observed.id.clone(),
                    reason: format!(
                        "region is immutable after creation (remote {:?}, desired {:?})",
                        observed.region, region
                    ),
                });
            }
        }
        Ok(())
    }

    fn plan(
        &self,
        desired: &ComputeServiceSpec,
        observed: &ComputeServiceState,
    ) -> OperationPlan<ComputeOp> {
        let id = &observed.id;
        let mut b = PlanBuilder::new();
        b.field(
            Some(desired.name.as_str()),
            Some(observed.name.as_str()),
            |name| ComputeOp::Rename {
                id: id.clone(),
                name: name.to_string(),
            },
        );
        b.field(
            desired.size.as_deref(),
            Some(observed.size.as_str()),
            |size| ComputeOp::Resize {
                id: id.clone(),
                size: size.to_string(),
            },
        );
        b.field(
            desired.replicas.as_ref(),
            Some(&observed.replicas),
            |replicas| ComputeOp::SetReplicaCount {
                id: id.clone(),
                replicas: *replicas,
            },
        );
        b.reference(
            desired.network_id.as_deref(),
            observed.network_id.as_deref(),
            |old| ComputeOp::DetachNetwork {
                id: id.clone(),
                network_id: old.to_string(),
            },
            |new| ComputeOp::AttachNetwork {
                id: id.clone(),
                network_id: new.to_string(),
            },
        );
        b.build()
    }

    fn create_op(&self, desired: &ComputeServiceSpec) -> ComputeOp {
        ComputeOp::Create {
            name: desired.name.clone(),
            size: desired.size.clone(),
            replicas: desired.replicas,
            region: desired.region.clone(),
            network_id: desired.network_id.clone(),
        }
    }

    fn delete_op(&self, resource_id: &str) -> ComputeOp {
        ComputeOp::Delete {
            id: resource_id.to_string(),
        }
    }

    fn fetch_op(&self, resource_id: &str) -> ComputeOp {
        ComputeOp::Get {
            id: resource_id.to_string(),
        }
    }

    fn parse_state(&self, operation: &str, data: &Value) -> Result<ComputeServiceState, Error> {
        serde_json::from_value(data.clone()).map_err(|e| Error::MalformedResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    fn create_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["REQUESTED", "PROVISIONING", "STARTING"],
            target: &["RUNNING"],
            timeout: std::time::Duration::from_secs(30 * 60),
            poll_interval: std::time::Duration::from_secs(30),
            initial_delay: std::time::Duration::from_secs(10),
        }
    }

    fn update_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["RESIZING", "STARTING", "UPDATING"],
            target: &["RUNNING"],
            timeout: std::time::Duration::from_secs(15 * 60),
            poll_interval: std::time::Duration::from_secs(15),
            initial_delay: std::time::Duration::ZERO,
        }
    }
}
