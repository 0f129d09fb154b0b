//! Data connector adapter.
//!
//! A connector periodically syncs files from an object-storage bucket
//! into the platform. The remote API rejects configuration edits while a
//! connector is enabled, and rejects an enable that lands before the
//! edits do, so every plan with edits wraps them in the gate:
//! `setConnectorEnabled(false)` first, `setConnectorEnabled(true)` last.
//!
//! Credentials are write-only on the remote side (status reads never echo
//! them back), so they are pushed whenever the desired spec carries them
//! rather than diffed.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Value};

use strato_engine::{
    Error, Observed, OperationPlan, PlanBuilder, PollSpec, RemoteOp, ResourceAdapter,
};

/// Object-storage credentials for a connector's source bucket.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectorCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl std::fmt::Debug for ConnectorCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorCredentials")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<redacted>")
            .finish()
    }
}

/// Desired configuration for one connector.
///
/// Unset optional fields leave the remote value alone. `enabled == None`
/// preserves the observed flag (the connector is still disabled around
/// edits and restored afterwards).
#[derive(Debug, Clone)]
pub struct ConnectorSpec {
    pub name: String,
    pub enabled: Option<bool>,
    pub bucket: Option<String>,
    pub pattern: Option<String>,
    pub frequency_minutes: Option<u32>,
    /// Pushed whenever set; the remote never echoes credentials back.
    pub credentials: Option<ConnectorCredentials>,
    /// Connector-type-specific mapping document.
    pub definition: Option<Value>,
    /// Create-only; changing it post-creation is a validation error.
    pub connector_type: Option<String>,
}

/// Last known remote representation of a connector.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectorState {
    pub id: String,
    pub name: String,
    pub status: String,
    pub enabled: bool,
    pub bucket: String,
    pub pattern: String,
    pub frequency_minutes: u32,
    #[serde(default)]
    pub definition: Option<Value>,
    pub connector_type: String,
    pub created_at: DateTime<Utc>,
}

impl Observed for ConnectorState {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

/// Atomic remote operations on a connector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorOp {
    Create {
        name: String,
        bucket: Option<String>,
        pattern: Option<String>,
        frequency_minutes: Option<u32>,
        definition: Option<Value>,
        connector_type: Option<String>,
    },
    Rename {
        id: String,
        name: String,
    },
    SetBucket {
        id: String,
        bucket: String,
    },
    SetFilePattern {
        id: String,
        pattern: String,
    },
    SetSyncFrequency {
        id: String,
        frequency_minutes: u32,
    },
    SetCredentials {
        id: String,
        access_key: String,
        secret_key: String,
    },
    SetDefinition {
        id: String,
        definition: Value,
    },
    SetEnabled {
        id: String,
        enabled: bool,
    },
    Delete {
        id: String,
    },
    Get {
        id: String,
    },
}

impl RemoteOp for ConnectorOp {
    fn operation_name(&self) -> &'static str {
        match self {
            ConnectorOp::Create { .. } => "createConnector",
            ConnectorOp::Rename { .. } => "renameConnector",
            ConnectorOp::SetBucket { .. } => "setConnectorBucket",
            ConnectorOp::SetFilePattern { .. } => "setConnectorFilePattern",
            ConnectorOp::SetSyncFrequency { .. } => "setConnectorSyncFrequency",
            ConnectorOp::SetCredentials { .. } => "setConnectorCredentials",
            ConnectorOp::SetDefinition { .. } => "setConnectorDefinition",
            ConnectorOp::SetEnabled { .. } => "setConnectorEnabled",
            ConnectorOp::Delete { .. } => "deleteConnector",
            ConnectorOp::Get { .. } => "getConnector",
        }
    }

    fn variables(&self) -> Value {
        match self {
            ConnectorOp::Create {
                name,
                bucket,
                pattern,
                frequency_minutes,
                definition,
                connector_type,
            } => json!({
                "name": name,
                "bucket": bucket,
                "pattern": pattern,
                "frequencyMinutes": frequency_minutes,
                "definition": definition,
                "connectorType": connector_type,
            }),
            ConnectorOp::Rename { id, name } => json!({"id": id, "name": name}),
            ConnectorOp::SetBucket { id, bucket } => json!({"id": id, "bucket": bucket}),
            ConnectorOp::SetFilePattern { id, pattern } => {
                json!({"id": id, "pattern": pattern})
            }
            ConnectorOp::SetSyncFrequency {
                id,
                frequency_minutes,
            } => json!({"id": id, "frequencyMinutes": frequency_minutes}),
            ConnectorOp::SetCredentials {
                id,
                access_key,
                secret_key,
            } => json!({"id": id, "accessKey": access_key, "secretKey": secret_key}),
            ConnectorOp::SetDefinition { id, definition } => {
                json!({"id": id, "definition": definition})
            }
            ConnectorOp::SetEnabled { id, enabled } => {
                json!({"id": id, "enabled": enabled})
            }
            ConnectorOp::Delete { id } | ConnectorOp::Get { id } => json!({"id": id}),
        }
    }
}

/// Adapter wiring connectors into the engine.
///
/// Connectors are created disabled; the residual plan after creation
/// pushes the remaining configuration and the enable lands last.
pub struct ConnectorAdapter;

impl ResourceAdapter for ConnectorAdapter {
    type Spec = ConnectorSpec;
    type State = ConnectorState;
    type Op = ConnectorOp;

    fn kind(&self) -> &'static str {
        "connector"
    }

    fn validate_update(
        &self,
        desired: &ConnectorSpec,
        observed: &ConnectorState,
    ) -> Result<(), Error> {
        if let Some(connector_type) = &desired.connector_type {
            if *connector_type != observed.connector_type {
                return Err(Error::Validation {
                    resource: observed.id.clone(),
                    reason: format!(
                        "connector type is immutable after creation (remote {:?}, desired {:?})",
                        observed.connector_type, connector_type
                    ),
                });
            }
        }
        Ok(())
    }

    fn plan(&self, desired: &ConnectorSpec, observed: &ConnectorState) -> OperationPlan<ConnectorOp> {
        let id = &observed.id;
        let mut b = PlanBuilder::new();
        b.field(
            Some(desired.name.as_str()),
            Some(observed.name.as_str()),
            |name| ConnectorOp::Rename {
                id: id.clone(),
                name: name.to_string(),
            },
        );
        b.field(
            desired.bucket.as_deref(),
            Some(observed.bucket.as_str()),
            |bucket| ConnectorOp::SetBucket {
                id: id.clone(),
                bucket: bucket.to_string(),
            },
        );
        b.field(
            desired.pattern.as_deref(),
            Some(observed.pattern.as_str()),
            |pattern| ConnectorOp::SetFilePattern {
                id: id.clone(),
                pattern: pattern.to_string(),
            },
        );
        b.field(
            desired.frequency_minutes.as_ref(),
            Some(&observed.frequency_minutes),
            |frequency_minutes| ConnectorOp::SetSyncFrequency {
                id: id.clone(),
                frequency_minutes: *frequency_minutes,
            },
        );
        // Status reads never echo credentials, so there is no observed
        // value to compare against: a set desired value always emits.
        b.field(desired.credentials.as_ref(), None, |creds| {
            ConnectorOp::SetCredentials {
                id: id.clone(),
                access_key: creds.access_key.clone(),
                secret_key: creds.secret_key.clone(),
            }
        });
        b.field(
            desired.definition.as_ref(),
            observed.definition.as_ref(),
            |definition| ConnectorOp::SetDefinition {
                id: id.clone(),
                definition: definition.clone(),
            },
        );
        b.gate(
            observed.enabled,
            desired.enabled,
            || ConnectorOp::SetEnabled {
                id: id.clone(),
                enabled: false,
            },
            || ConnectorOp::SetEnabled {
                id: id.clone(),
                enabled: true,
            },
        );
        b.build()
    }

    fn create_op(&self, desired: &ConnectorSpec) -> ConnectorOp {
        // Connectors come up disabled; the residual plan enables them
        // once configuration (including credentials) has landed.
        ConnectorOp::Create {
            name: desired.name.clone(),
            bucket: desired.bucket.clone(),
            pattern: desired.pattern.clone(),
            frequency_minutes: desired.frequency_minutes,
            definition: desired.definition.clone(),
            connector_type: desired.connector_type.clone(),
        }
    }

    fn delete_op(&self, resource_id: &str) -> ConnectorOp {
        ConnectorOp::Delete {
            id: resource_id.to_string(),
        }
    }

    fn fetch_op(&self, resource_id: &str) -> ConnectorOp {
        ConnectorOp::Get {
            id: resource_id.to_string(),
        }
    }

    fn parse_state(&self, operation: &str, data: &Value) -> Result<ConnectorState, Error> {
        serde_json::from_value(data.clone()).map_err(|e| Error::MalformedResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    fn create_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["CREATING", "CONFIGURING"],
            target: &["CONNECTED"],
            timeout: std::time::Duration::from_secs(10 * 60),
            poll_interval: std::time::Duration::from_secs(15),
            initial_delay: std::time::Duration::from_secs(5),
        }
    }

    fn update_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["CONFIGURING", "SYNCING"],
            target: &["CONNECTED"],
            timeout: std::time::Duration::from_secs(10 * 60),
            poll_interval: std::time::Duration::from_secs(15),
            initial_delay: std::time::Duration::ZERO,
        }
    }
}
