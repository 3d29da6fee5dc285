//! Result and retry-policy types shared between every node implementation
//! and the engine's scheduler.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::NodeError;

/// Status of a single node's most recent execution attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Success,
    Failed,
    Waiting,
}

/// The persisted, queryable record of a node's execution.
///
/// Append-only once written for a node in an execution, except for
/// `retry_count`, which the scheduler bumps in place while retries are
/// still in flight (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeResult {
    pub node_id: String,
    pub status: NodeStatus,
    pub output: serde_json::Value,
    pub error_message: Option<String>,
    pub stack_trace: Option<String>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub retry_count: u32,
}

impl NodeResult {
    pub fn success(node_id: impl Into<String>, output: serde_json::Value, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, retry_count: u32) -> Self {
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Success,
            output,
            error_message: None,
            stack_trace: None,
            started_at,
            finished_at: Some(finished_at),
            duration_ms,
            retry_count,
        }
    }

    pub fn waiting(node_id: impl Into<String>, output: serde_json::Value, started_at: DateTime<Utc>) -> Self {
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Waiting,
            output,
            error_message: None,
            stack_trace: None,
            started_at,
            finished_at: None,
            duration_ms: 0,
            retry_count: 0,
        }
    }

    pub fn failed(node_id: impl Into<String>, error: &NodeError, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, retry_count: u32) -> Self {
        Self::failed_with_output(node_id, error, serde_json::Value::Null, started_at, finished_at, retry_count)
    }

    /// A failed result that still carries an inspectable output — spec
    /// §4.5: a non-2xx `http` response is `failed` "with the same output
    /// populated (so downstream inspection is possible)".
    pub fn failed_with_output(node_id: impl Into<String>, error: &NodeError, output: serde_json::Value, started_at: DateTime<Utc>, finished_at: DateTime<Utc>, retry_count: u32) -> Self {
        let duration_ms = (finished_at - started_at).num_milliseconds().max(0) as u64;
        Self {
            node_id: node_id.into(),
            status: NodeStatus::Failed,
            output,
            error_message: Some(error.message.clone()),
            stack_trace: error.stack_trace.clone(),
            started_at,
            finished_at: Some(finished_at),
            duration_ms,
            retry_count,
        }
    }

    /// View used by the variable resolver when a template path's first
    /// segment names this node: `{{nodeId.output.field}}` navigates into
    /// the value this returns.
    pub fn as_scope_value(&self) -> serde_json::Value {
        serde_json::json!({
            "status": self.status,
            "output": self.output,
        })
    }
}

/// Retry policy attached to a node definition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    #[serde(default = "default_backoff_factor")]
    pub backoff_factor: f64,
}

fn default_backoff_base_ms() -> u64 {
    100
}

fn default_backoff_factor() -> f64 {
    2.0
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { max_attempts: 0, backoff_base_ms: default_backoff_base_ms(), backoff_factor: default_backoff_factor() }
    }
}

impl RetryPolicy {
    /// Delay before the given (1-indexed) retry attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> std::time::Duration {
        let millis = (self.backoff_base_ms as f64) * self.backoff_factor.powi(attempt.saturating_sub(1) as i32);
        std::time::Duration::from_millis(millis.round() as u64)
    }
}
