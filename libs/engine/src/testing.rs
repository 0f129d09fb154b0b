//! Scripted transport fake for engine and adapter tests.
//!
//! Responses are queued per operation name and consumed in order; every
//! call is recorded so tests can assert exact operation sequences (the
//! ordering invariants live in the recorded call list, not in timing).

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Error;
use crate::transport::{OperationError, Transport};

/// One recorded transport call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub operation: String,
    pub variables: Value,
}

#[derive(Default)]
struct Script {
    queued: HashMap<String, VecDeque<Result<Value, Error>>>,
    /// Sticky responses used when an operation's queue is empty. Handy
    /// for status reads polled an unknown number of times.
    sticky: HashMap<String, Value>,
}

/// In-memory [`Transport`] driven by a prepared script.
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<Script>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful response for the next call to `operation`.
    pub fn respond(&self, operation: &str, data: Value) -> &Self {
        self.push(operation, Ok(data));
        self
    }

    /// Queue a failure for the next call to `operation`.
    pub fn fail(&self, operation: &str, err: Error) -> &Self {
        self.push(operation, Err(err));
        self
    }

    /// Queue a remote rejection with a single message, optionally coded.
    pub fn reject(&self, operation: &str, message: &str, code: Option<&str>) -> &Self {
        self.push(
            operation,
            Err(Error::Remote {
                operation: operation.to_string(),
                errors: vec![OperationError {
                    message: message.to_string(),
                    code: code.map(str::to_string),
                }],
            }),
        );
        self
    }

    /// Respond with `data` whenever `operation`'s queue is empty.
    pub fn respond_forever(&self, operation: &str, data: Value) -> &Self {
        self.script
            .lock()
            .unwrap()
            .sticky
            .insert(operation.to_string(), data);
        self
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Operation names in call order.
    pub fn operations(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .map(|c| c.operation.clone())
            .collect()
    }

    /// Number of calls made to a single operation.
    pub fn count(&self, operation: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.operation == operation)
            .count()
    }

    fn push(&self, operation: &str, outcome: Result<Value, Error>) {
        self.script
            .lock()
            .unwrap()
            .queued
            .entry(operation.to_string())
            .or_default()
            .push_back(outcome);
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn call(&self, operation: &str, variables: Value) -> Result<Value, Error> {
        self.calls.lock().unwrap().push(RecordedCall {
            operation: operation.to_string(),
            variables,
        });

        let mut script = self.script.lock().unwrap();
        if let Some(queue) = script.queued.get_mut(operation) {
            if let Some(outcome) = queue.pop_front() {
                return outcome;
            }
        }
        if let Some(data) = script.sticky.get(operation) {
            return Ok(data.clone());
        }

        Err(Error::Transport {
            operation: operation.to_string(),
            detail: "no scripted response".to_string(),
        })
    }
}
