//! HTTP implementation of the engine's [`Transport`] interface.
//!
//! Operations are posted as `POST {base_url}/ops/{operation}` with the
//! variables as the JSON body. The remote answers every executed call
//! with a `{data, errors}` envelope; a non-empty `errors` array means the
//! call ran but was rejected. Each request carries a fresh `x-request-id`
//! so failures can be correlated with remote-side logs.
//!
//! The client carries no ambient state: base URL and token are explicit
//! constructor input, never process globals.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;
use ulid::Ulid;

use strato_engine::{Error, OperationError, Transport};

/// Connection settings for the remote API.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Remote API base URL, without a trailing slash.
    pub base_url: String,

    /// Bearer token for an already-authorized caller. Acquiring the
    /// token is someone else's job.
    pub token: String,

    /// Per-request timeout.
    pub timeout: Duration,
}

impl TransportConfig {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: token.into(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Response envelope for an executed operation.
#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    data: Value,
    #[serde(default)]
    errors: Vec<OperationError>,
}

/// HTTP client for the remote API.
pub struct HttpTransport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl HttpTransport {
    /// Build a transport from config. Fails only if the TLS backend
    /// cannot initialize.
    pub fn new(config: TransportConfig) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::Transport {
                operation: "client_init".to_string(),
                detail: e.to_string(),
            })?;

        Ok(Self { client, config })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, operation: &str, variables: Value) -> Result<Value, Error> {
        let url = format!("{}/ops/{}", self.config.base_url, operation);
        let request_id = Ulid::new().to_string();
        debug!(operation, request_id = %request_id, "calling remote operation");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.token)
            .header("x-request-id", &request_id)
            .json(&variables)
            .send()
            .await
            .map_err(|e| Error::Transport {
                operation: operation.to_string(),
                detail: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Transport {
                operation: operation.to_string(),
                detail: format!("{status}: {body}"),
            });
        }

        let envelope: Envelope =
            response.json().await.map_err(|e| Error::MalformedResponse {
                operation: operation.to_string(),
                detail: e.to_string(),
            })?;

        if !envelope.errors.is_empty() {
            debug!(
                operation,
                request_id = %request_id,
                error_count = envelope.errors.len(),
                "remote rejected operation"
            );
            return Err(Error::Remote {
                operation: operation.to_string(),
                errors: envelope.errors,
            });
        }

        Ok(envelope.data)
    }
}
