//! The `ExecutableNode` trait — the contract every node kind must fulfil.

use async_trait::async_trait;
use serde_json::Value;

use crate::model::NodeStatus;
use crate::scope::ExecutionContext;
use crate::NodeError;

/// The outcome of a single execution attempt, before the scheduler layers
/// on timestamps/duration/retry-count to produce a persisted
/// [`crate::model::NodeResult`].
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    pub status: NodeStatus,
    pub output: Value,
    pub error: Option<NodeError>,
}

impl NodeOutcome {
    pub fn success(output: Value) -> Self {
        Self { status: NodeStatus::Success, output, error: None }
    }

    pub fn waiting(output: Value) -> Self {
        Self { status: NodeStatus::Waiting, output, error: None }
    }

    pub fn failed(error: NodeError) -> Self {
        Self { status: NodeStatus::Failed, output: Value::Null, error: Some(error) }
    }

    /// A failure that still carries an inspectable output — used by `http`
    /// for non-2xx responses (spec §4.5: "reported as `failed` with the
    /// same output populated").
    pub fn failed_with_output(error: NodeError, output: Value) -> Self {
        Self { status: NodeStatus::Failed, output, error: Some(error) }
    }
}

/// The core node trait. All built-in node kinds implement this; the
/// `nodes::registry` dispatches to an instance by [`crate::registry::NodeKind`].
#[async_trait]
pub trait ExecutableNode: Send + Sync {
    /// Execute the node.
    ///
    /// `config` is this node's *unresolved* configuration — each executor
    /// is responsible for running the variable resolver (`nodes::resolver`)
    /// over the fields it cares about, since not every field should be
    /// resolved the same way (e.g. `script`'s `code` is never
    /// variable-substituted, only its bindings are).
    async fn execute(&self, node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome;
}
