//! Virtual network adapter.
//!
//! The endpoint identity of a network (hostname, listening port, region)
//! is fixed at creation; only the display name and description can change
//! afterwards. Attempts to change a fixed field fail before any remote
//! call is issued.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use strato_engine::{
    Error, Observed, OperationPlan, PlanBuilder, PollSpec, RemoteOp, ResourceAdapter,
};

/// Desired configuration for one virtual network.
#[derive(Debug, Clone)]
pub struct VirtualNetworkSpec {
    pub name: String,
    pub description: Option<String>,
    /// Create-only.
    pub hostname: Option<String>,
    /// Create-only.
    pub port: Option<u16>,
    /// Create-only.
    pub region: Option<String>,
}

/// Last known remote representation of a virtual network.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkState {
    pub id: String,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub description: Option<String>,
    pub hostname: String,
    pub port: u16,
    pub region: String,
    pub created_at: DateTime<Utc>,
}

impl Observed for VirtualNetworkState {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Atomic remote operations on a virtual network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VirtualNetworkOp {
    Create {
        name: String,
        description: Option<String>,
        hostname: Option<String>,
        port: Option<u16>,
        region: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    SetDescription {
        id: String,
        description: String,
    },
    Delete {
        id: String,
    },
    Get {
        id: String,
    },
}

impl RemoteOp for VirtualNetworkOp {
    fn operation_name(&self) -> &'static str {
        match self {
            VirtualNetworkOp::Create { .. } => "createVirtualNetwork",
            VirtualNetworkOp::Rename { .. } => "renameVirtualNetwork",
            VirtualNetworkOp::SetDescription { .. } => "setVirtualNetworkDescription",
            VirtualNetworkOp::Delete { .. } => "deleteVirtualNetwork",
            VirtualNetworkOp::Get { .. } => "getVirtualNetwork",
        }
    }

    fn variables(&self) -> Value {
        match self {
            VirtualNetworkOp::Create {
                name,
                description,
                hostname,
                port,
                region,
            } => json!({
                "name": name,
                "description": description,
                "hostname": hostname,
                "port": port,
                "region": region,
            }),
            VirtualNetworkOp::Rename { id, name } => json!({"id": id, "name": name}),
            VirtualNetworkOp::SetDescription { id, description } => {
                json!({"id": id, "description": description})
            }
            VirtualNetworkOp::Delete { id } | VirtualNetworkOp::Get { id } => json!({"id": id}),
        }
    }
}

/// Adapter wiring virtual networks into the engine.
pub struct VirtualNetworkAdapter;

impl VirtualNetworkAdapter {
    fn immutable_violation(
        observed_id: &str,
        field: &str,
        remote: &dyn std::fmt::Debug,
        desired: &dyn std::fmt::Debug,
    ) -> Error {
        Error::Validation {
            resource: observed_id.to_string(),
            reason: format!(
                "{field} is immutable after creation (remote {remote:?}, desired {desired:?})"
            ),
        }
    }
}

impl ResourceAdapter for VirtualNetworkAdapter {
    type Spec = VirtualNetworkSpec;
    type State = VirtualNetworkState;
    type Op = VirtualNetworkOp;

    fn kind(&self) -> &'static str {
        "virtual_network"
    }

    fn validate_update(
        &self,
        desired: &VirtualNetworkSpec,
        observed: &VirtualNetworkState,
    ) -> Result<(), Error> {
        if let Some(hostname) = &desired.hostname {
            if *hostname != observed.hostname {
                return Err(Self::immutable_violation(
                    &observed.id,
                    "hostname",
                    &observed.hostname,
                    hostname,
                ));
            }
        }
        if let Some(port) = desired.port {
            if port != observed.port {
                return Err(Self::immutable_violation(
                    &observed.id,
                    "port",
                    &observed.port,
                    &port,
                ));
            }
        }
        if let Some(region) = &desired.region {
            if *region != observed.region {
                return Err(Self::immutable_violation(
                    &observed.id,
                    "region",
                    &observed.region,
                    region,
                ));
            }
        }
        Ok(())
    }

    fn plan(
        &self,
        desired: &VirtualNetworkSpec,
        observed: &VirtualNetworkState,
    ) -> OperationPlan<VirtualNetworkOp> {
        let id = &observed.id;
        let mut b = PlanBuilder::new();
        b.field(
            Some(desired.name.as_str()),
            Some(observed.name.as_str()),
            |name| VirtualNetworkOp::Rename {
                id: id.clone(),
                name: name.to_string(),
            },
        );
        b.field(
            desired.description.as_deref(),
            observed.description.as_deref(),
            |description| VirtualNetworkOp::SetDescription {
                id: id.clone(),
                description: description.to_string(),
            },
        );
        b.build()
    }

    fn create_op(&self, desired: &VirtualNetworkSpec) -> VirtualNetworkOp {
        VirtualNetworkOp::Create {
            name: desired.name.clone(),
            description: desired.description.clone(),
            hostname: desired.hostname.clone(),
            port: desired.port,
            region: desired.region.clone(),
        }
    }

    fn delete_op(&self, resource_id: &str) -> VirtualNetworkOp {
        VirtualNetworkOp::Delete {
            id: resource_id.to_string(),
        }
    }

    fn fetch_op(&self, resource_id: &str) -> VirtualNetworkOp {
        VirtualNetworkOp::Get {
            id: resource_id.to_string(),
        }
    }

    fn parse_state(&self, operation: &str, data: &Value) -> Result<VirtualNetworkState, Error> {
        serde_json::from_value(data.clone()).map_err(|e| Error::MalformedResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    fn create_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["PENDING", "CONFIGURING"],
            target: &["READY"],
            timeout: std::time::Duration::from_secs(20 * 60),
            poll_interval: std::time::Duration::from_secs(20),
            initial_delay: std::time::Duration::from_secs(5),
        }
    }

    fn update_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["CONFIGURING"],
            target: &["READY"],
            timeout: std::time::Duration::from_secs(10 * 60),
            poll_interval: std::time::Duration::from_secs(10),
            initial_delay: std::time::Duration::ZERO,
        }
    }
}
