//! `MockNode` — a test double for `ExecutableNode`.
//!
//! Useful in unit and integration tests where a real node implementation is
//! either unavailable or irrelevant.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};

use crate::scope::ExecutionContext;
use crate::{ExecutableNode, NodeError, NodeOutcome};

/// Behaviour injected into `MockNode` at construction time.
pub enum MockBehaviour {
    /// Return a specific JSON value.
    ReturnValue(Value),
    /// Suspend as `waiting`, carrying the given ticket payload.
    Wait(Value),
    /// Fail with a retryable error (`timeout` kind).
    FailRetryable(String),
    /// Fail with a fatal error (`internal` kind).
    FailFatal(String),
}

/// A mock node that records every call it receives and returns a
/// programmer-specified result.
pub struct MockNode {
    /// Label used in test assertions.
    pub name: String,
    /// What the node will do when `execute` is called.
    pub behaviour: MockBehaviour,
    /// All inputs seen by this node (in call order).
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl MockNode {
    /// Create a mock that always succeeds with the given value.
    pub fn returning(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), behaviour: MockBehaviour::ReturnValue(value), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Create a mock that suspends as `waiting`.
    pub fn waiting(name: impl Into<String>, value: Value) -> Self {
        Self { name: name.into(), behaviour: MockBehaviour::Wait(value), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Create a mock that always fails fatally.
    pub fn failing_fatal(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { name: name.into(), behaviour: MockBehaviour::FailFatal(msg.into()), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Create a mock that always fails with a retryable error.
    pub fn failing_retryable(name: impl Into<String>, msg: impl Into<String>) -> Self {
        Self { name: name.into(), behaviour: MockBehaviour::FailRetryable(msg.into()), calls: Arc::new(Mutex::new(Vec::new())) }
    }

    /// Number of times this node has been executed.
    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ExecutableNode for MockNode {
    async fn execute(&self, _node_id: &str, config: &Value, _ctx: &ExecutionContext) -> NodeOutcome {
        self.calls.lock().unwrap().push(config.clone());

        match &self.behaviour {
            MockBehaviour::ReturnValue(v) => {
                // Merge the incoming config with the node's own output field so
                // tests can trace the data flowing through the pipeline.
                let mut out = json!({ "node": self.name });
                if let (Some(out_obj), Some(v_obj)) = (out.as_object_mut(), v.as_object()) {
                    for (k, val) in v_obj {
                        out_obj.insert(k.clone(), val.clone());
                    }
                }
                NodeOutcome::success(out)
            }
            MockBehaviour::Wait(v) => NodeOutcome::waiting(v.clone()),
            MockBehaviour::FailRetryable(msg) => NodeOutcome::failed(NodeError::timeout(msg.clone())),
            MockBehaviour::FailFatal(msg) => NodeOutcome::failed(NodeError::internal(msg.clone())),
        }
    }
}
