//! Core domain models for the workflow engine (spec §3).
//!
//! These types are the source of truth for what a workflow looks like in
//! memory and how it is persisted as the JSONB `definition` column of the
//! `workflows` table.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use nodes::{NodeKind, RetryPolicy};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// NodeDefinition
// ---------------------------------------------------------------------------

/// A single step in the workflow graph (spec §3, ingress format in §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeDefinition {
    /// Unique identifier within this workflow (referenced by edges).
    pub id: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Maps to a registered [`nodes::ExecutableNode`] implementation.
    #[serde(rename = "type")]
    pub kind: NodeKind,
    /// Kind-specific configuration passed to the node at execution time.
    #[serde(default)]
    pub config: serde_json::Value,
    /// Explicit per-node timeout in milliseconds. Overridden by a `timeout`
    /// key inside `config` (spec §4.5's timeout source priority).
    #[serde(default)]
    pub timeout: Option<u64>,
    /// Retry policy. Absent means no retries (`max_attempts: 0`).
    #[serde(default)]
    pub retry: Option<RetryPolicy>,
}

impl NodeDefinition {
    /// Timeout source priority (spec §4.5): node config `timeout` key, then
    /// the node's explicit `timeout` field, then the caller-supplied engine
    /// default.
    pub fn effective_timeout_ms(&self, engine_default_ms: u64) -> u64 {
        self.config
            .get("timeout")
            .and_then(serde_json::Value::as_u64)
            .or(self.timeout)
            .unwrap_or(engine_default_ms)
    }
}

// ---------------------------------------------------------------------------
// Edge
// ---------------------------------------------------------------------------

/// Directed edge from one node to another (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(rename = "sourceNodeId")]
    pub source_node_id: String,
    #[serde(rename = "targetNodeId")]
    pub target_node_id: String,
    /// Boolean expression (spec §4.3 grammar) gating traversal of this edge.
    /// Absent/blank means unconditional.
    #[serde(default)]
    pub condition: Option<String>,
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

/// A complete workflow definition (spec §3, ingress format in §6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: Uuid,
    pub name: String,
    #[serde(default)]
    pub version: Option<String>,
    #[serde(rename = "tenantId", default)]
    pub tenant_id: Option<String>,
    pub nodes: Vec<NodeDefinition>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(rename = "globalVariables", default)]
    pub global_variables: serde_json::Map<String, serde_json::Value>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
}

impl Workflow {
    /// Convenience constructor for testing.
    pub fn new(name: impl Into<String>, nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            version: None,
            tenant_id: None,
            nodes,
            edges,
            global_variables: serde_json::Map::new(),
            created_at: Utc::now(),
        }
    }

    pub fn node(&self, id: &str) -> Option<&NodeDefinition> {
        self.nodes.iter().find(|n| n.id == id)
    }
}

// ---------------------------------------------------------------------------
// ExecutionStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of a running workflow instance (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    Waiting,
    Completed,
    Failed,
    Cancelled,
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Waiting => "waiting",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for ExecutionStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(Self::Running),
            "waiting" => Ok(Self::Waiting),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            other => Err(format!("unknown execution status: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// CheckpointSnapshot — in-memory form; `db::models::CheckpointRow` is the
// persisted form `engine::checkpoint` serializes this into.
// ---------------------------------------------------------------------------

/// A durable snapshot sufficient to reconstruct the scheduler's state for an
/// execution (spec §3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointSnapshot {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    /// Remaining in-degree per node at the moment this snapshot was taken.
    pub in_degree: HashMap<String, u32>,
    pub completed: HashSet<String>,
    pub status: ExecutionStatus,
    pub taken_at: DateTime<Utc>,
}
