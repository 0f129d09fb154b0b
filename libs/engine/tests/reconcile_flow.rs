//! Integration tests for the coordinator against a scripted transport.
//!
//! Uses a minimal inline adapter for a fictional "cache cluster" resource
//! so the flows under test are the engine's, not any real adapter's:
//! create with readiness polling, compensation after a failed create,
//! partial update reporting, and idempotent delete.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use strato_engine::cancel;
use strato_engine::testing::ScriptedTransport;
use strato_engine::{
    Compensation, Coordinator, Error, Observed, OperationPlan, PlanBuilder, PollSpec, RemoteOp,
    ResourceAdapter, RetryConfig,
};

#[derive(Debug, Clone)]
struct CacheSpec {
    name: String,
    size_gb: Option<u32>,
    profile: Option<String>,
}

#[derive(Debug, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheState {
    id: String,
    name: String,
    status: String,
    size_gb: u32,
    profile: String,
}

impl Observed for CacheState {
    fn id(&self) -> &str {
        &self.id
    }

    fn status(&self) -> &str {
        &self.status
    }
}

#[derive(Debug)]
enum CacheOp {
    Create { name: String, size_gb: Option<u32> },
    Rename { id: String, name: String },
    Resize { id: String, size_gb: u32 },
    Delete { id: String },
    Get { id: String },
}

impl RemoteOp for CacheOp {
    fn operation_name(&self) -> &'static str {
        match self {
            CacheOp::Create { .. } => "createCache",
            CacheOp::Rename { .. } => "renameCache",
            CacheOp::Resize { .. } => "resizeCache",
            CacheOp::Delete { .. } => "deleteCache",
            CacheOp::Get { .. } => "getCache",
        }
    }

    fn variables(&self) -> Value {
        match self {
            CacheOp::Create { name, size_gb } => json!({"name": name, "sizeGb": size_gb}),
            CacheOp::Rename { id, name } => json!({"id": id, "name": name}),
            CacheOp::Resize { id, size_gb } => json!({"id": id, "sizeGb": size_gb}),
            CacheOp::Delete { id } | CacheOp::Get { id } => json!({"id": id}),
        }
    }
}

struct CacheAdapter;

impl ResourceAdapter for CacheAdapter {
    type Spec = CacheSpec;
    type State = CacheState;
    type Op = CacheOp;

    fn kind(&self) -> &'static str {
        "cache_cluster"
    }

    fn validate_update(&self, desired: &CacheSpec, observed: &CacheState) -> Result<(), Error> {
        if let Some(profile) = &desired.profile {
            if *profile != observed.profile {
                return Err(Error::Validation {
                    resource: observed.id.clone(),
                    reason: "profile is immutable after creation".to_string(),
                });
            }
        }
        Ok(())
    }

    fn plan(&self, desired: &CacheSpec, observed: &CacheState) -> OperationPlan<CacheOp> {
        let id = &observed.id;
        let mut b = PlanBuilder::new();
        b.field(Some(desired.name.as_str()), Some(observed.name.as_str()), |n| {
            CacheOp::Rename {
                id: id.clone(),
                name: n.to_string(),
            }
        });
        b.field(desired.size_gb.as_ref(), Some(&observed.size_gb), |s| {
            CacheOp::Resize {
                id: id.clone(),
                size_gb: *s,
            }
        });
        b.build()
    }

    fn create_op(&self, desired: &CacheSpec) -> CacheOp {
        CacheOp::Create {
            name: desired.name.clone(),
            size_gb: desired.size_gb,
        }
    }

    fn delete_op(&self, resource_id: &str) -> CacheOp {
        CacheOp::Delete {
            id: resource_id.to_string(),
        }
    }

    fn fetch_op(&self, resource_id: &str) -> CacheOp {
        CacheOp::Get {
            id: resource_id.to_string(),
        }
    }

    fn parse_state(&self, operation: &str, data: &Value) -> Result<CacheState, Error> {
        serde_json::from_value(data.clone()).map_err(|e| Error::MalformedResponse {
            operation: operation.to_string(),
            detail: e.to_string(),
        })
    }

    fn create_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["CREATING"],
            target: &["RUNNING"],
            timeout: Duration::from_secs(300),
            poll_interval: Duration::from_secs(10),
            initial_delay: Duration::from_secs(5),
        }
    }

    fn update_poll(&self) -> PollSpec {
        PollSpec {
            pending: &["RESIZING"],
            target: &["RUNNING"],
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(5),
            initial_delay: Duration::ZERO,
        }
    }

    fn delete_retry(&self) -> Option<(RetryConfig, fn(&Error) -> bool)> {
        fn blocked(err: &Error) -> bool {
            matches!(err, Error::Remote { errors, .. }
                if errors.iter().any(|e| e.message.contains("in use")))
        }
        Some((
            RetryConfig {
                max_attempts: 3,
                interval: Duration::from_secs(10),
            },
            blocked,
        ))
    }
}

fn cache_json(id: &str, name: &str, status: &str, size_gb: u32) -> Value {
    json!({
        "id": id,
        "name": name,
        "status": status,
        "sizeGb": size_gb,
        "profile": "standard",
    })
}

fn coordinator(transport: Arc<ScriptedTransport>) -> Coordinator<ScriptedTransport, CacheAdapter> {
    Coordinator::new(transport, CacheAdapter)
}

fn spec(name: &str, size_gb: Option<u32>) -> CacheSpec {
    CacheSpec {
        name: name.to_string(),
        size_gb,
        profile: None,
    }
}

#[tokio::test(start_paused = true)]
async fn test_create_polls_until_ready() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("createCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond("getCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond("getCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond("getCache", cache_json("cache_01", "sessions", "RUNNING", 8));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    let state = coord
        .create(&spec("sessions", Some(8)), &mut cancel)
        .await
        .unwrap();

    assert_eq!(state.id, "cache_01");
    assert_eq!(state.status, "RUNNING");
    assert_eq!(
        transport.operations(),
        vec!["createCache", "getCache", "getCache", "getCache"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_triggers_compensating_delete() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("createCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond_forever("getCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond("deleteCache", json!({"deleted": true}));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    let err = coord
        .create(&spec("sessions", Some(8)), &mut cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, Error::Timeout { .. }));
    assert!(matches!(err.compensation, Compensation::Succeeded));
    assert!(!err.needs_manual_cleanup());
    assert_eq!(transport.count("deleteCache"), 1);
}

#[tokio::test(start_paused = true)]
async fn test_failed_compensation_reports_both_errors() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("createCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond_forever("getCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.fail(
        "deleteCache",
        Error::Transport {
            operation: "deleteCache".to_string(),
            detail: "connection reset".to_string(),
        },
    );

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    let err = coord
        .create(&spec("sessions", Some(8)), &mut cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, Error::Timeout { .. }));
    assert!(err.needs_manual_cleanup());
    let rendered = err.to_string();
    assert!(rendered.contains("timeout"));
    assert!(rendered.contains("connection reset"));
}

#[tokio::test(start_paused = true)]
async fn test_create_unexpected_status_is_compensated() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("createCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond("getCache", cache_json("cache_01", "sessions", "FAILED", 8));
    transport.respond("deleteCache", json!({"deleted": true}));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    let err = coord
        .create(&spec("sessions", Some(8)), &mut cancel)
        .await
        .unwrap_err();

    assert!(matches!(err.source, Error::UnexpectedStatus { .. }));
    assert!(matches!(err.compensation, Compensation::Succeeded));
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_create_is_not_compensated() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("createCache", cache_json("cache_01", "sessions", "CREATING", 8));
    transport.respond_forever("getCache", cache_json("cache_01", "sessions", "CREATING", 8));

    let coord = coordinator(Arc::clone(&transport));
    let (tx, mut cancel) = cancel::channel();

    let desired = spec("sessions", Some(8));
    let create = coord.create(&desired, &mut cancel);
    tokio::pin!(create);

    // Let the create call land, then cancel during the poll wait.
    let err = tokio::select! {
        res = &mut create => res.unwrap_err(),
        _ = async {
            tokio::time::sleep(Duration::from_secs(20)).await;
            tx.send(true).unwrap();
            std::future::pending::<()>().await;
        } => unreachable!(),
    };

    assert!(err.source.is_cancelled());
    assert!(matches!(err.compensation, Compensation::NotAttempted));
    assert_eq!(transport.count("deleteCache"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_noop_only_refetches() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("getCache", cache_json("cache_01", "sessions", "RUNNING", 8));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();
    let observed: CacheState =
        serde_json::from_value(cache_json("cache_01", "sessions", "RUNNING", 8)).unwrap();

    let state = coord
        .update(&spec("sessions", Some(8)), &observed, &mut cancel)
        .await
        .unwrap();

    assert_eq!(state.status, "RUNNING");
    assert_eq!(transport.operations(), vec!["getCache"]);
}

#[tokio::test(start_paused = true)]
async fn test_update_partial_failure_reports_applied_ops() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("renameCache", json!({"renamed": true}));
    transport.reject("resizeCache", "size not available in region", None);

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();
    let observed: CacheState =
        serde_json::from_value(cache_json("cache_01", "sessions", "RUNNING", 8)).unwrap();

    let err = coord
        .update(&spec("events", Some(64)), &observed, &mut cancel)
        .await
        .unwrap_err();

    // Rename landed, resize did not; nothing is rolled back.
    assert_eq!(err.applied, vec!["renameCache"]);
    assert!(matches!(err.source, Error::Remote { .. }));
    assert!(matches!(err.compensation, Compensation::NotAttempted));
    assert_eq!(transport.count("deleteCache"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_update_immutable_field_fails_before_any_call() {
    let transport = Arc::new(ScriptedTransport::new());
    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();
    let observed: CacheState =
        serde_json::from_value(cache_json("cache_01", "sessions", "RUNNING", 8)).unwrap();

    let desired = CacheSpec {
        name: "sessions".to_string(),
        size_gb: Some(64),
        profile: Some("memory-optimized".to_string()),
    };
    let err = coord.update(&desired, &observed, &mut cancel).await.unwrap_err();

    assert!(matches!(err.source, Error::Validation { .. }));
    assert!(transport.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_update_polls_after_last_op() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.respond("resizeCache", json!({"resizing": true}));
    transport.respond("getCache", cache_json("cache_01", "sessions", "RESIZING", 64));
    transport.respond("getCache", cache_json("cache_01", "sessions", "RUNNING", 64));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();
    let observed: CacheState =
        serde_json::from_value(cache_json("cache_01", "sessions", "RUNNING", 8)).unwrap();

    let state = coord
        .update(&spec("sessions", Some(64)), &observed, &mut cancel)
        .await
        .unwrap();

    assert_eq!(state.size_gb, 64);
    assert_eq!(
        transport.operations(),
        vec!["resizeCache", "getCache", "getCache"]
    );
}

#[tokio::test(start_paused = true)]
async fn test_delete_retries_while_blocked() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reject("deleteCache", "cache is in use by 2 clients", None);
    transport.reject("deleteCache", "cache is in use by 1 client", None);
    transport.respond("deleteCache", json!({"deleted": true}));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    coord.delete("cache_01", &mut cancel).await.unwrap();
    assert_eq!(transport.count("deleteCache"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_exhaustion_is_distinguishable() {
    let transport = Arc::new(ScriptedTransport::new());
    for _ in 0..3 {
        transport.reject("deleteCache", "cache is in use by 2 clients", None);
    }

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    let err = coord.delete("cache_01", &mut cancel).await.unwrap_err();
    assert!(matches!(err, Error::RetriesExhausted { attempts: 3, .. }));
    assert_eq!(transport.count("deleteCache"), 3);
}

#[tokio::test(start_paused = true)]
async fn test_delete_not_found_is_success() {
    let transport = Arc::new(ScriptedTransport::new());
    transport.reject("deleteCache", "cache not found", Some("NOT_FOUND"));

    let coord = coordinator(Arc::clone(&transport));
    let mut cancel = cancel::never();

    coord.delete("cache_01", &mut cancel).await.unwrap();
}
