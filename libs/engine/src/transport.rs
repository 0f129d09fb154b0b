//! Remote call interface.
//!
//! The engine never talks to the remote system directly. Every mutation
//! and every status read goes through [`Transport`], which resolves a
//! named operation plus its variables into response data. A scripted fake
//! lives in [`crate::testing`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::error::Error;

/// A logical error returned by the remote system for an executed call.
///
/// `code` is optional because the remote API does not return structured
/// codes for every failure; classifiers that need to recognize a specific
/// condition may have to fall back to the message text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct OperationError {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// Executes named remote operations.
///
/// Implementations map `(operation, variables)` onto the wire and decode
/// the response envelope:
/// - wire-level failure -> [`Error::Transport`]
/// - executed but rejected -> [`Error::Remote`] with the operation errors
/// - success -> the response data
#[async_trait]
pub trait Transport: Send + Sync {
    /// Execute one named remote operation.
    async fn call(&self, operation: &str, variables: Value) -> Result<Value, Error>;
}
