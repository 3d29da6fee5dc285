//! Engine-level error types (spec §7).

use thiserror::Error;

/// Errors produced by the workflow engine (validation, scheduling, recovery).
#[derive(Debug, Error, Clone)]
pub enum EngineError {
    // ------ Validation errors (C1, spec §4.1) ------
    /// Two or more nodes share the same id.
    #[error("duplicate node id: '{0}'")]
    DuplicateNodeId(String),

    /// An edge references a node id that doesn't exist in the workflow.
    #[error("edge references unknown node '{node_id}' ({side} side)")]
    UnknownNodeReference { node_id: String, side: &'static str },

    /// More than one edge exists for the same (source, target) pair.
    #[error("duplicate edge from '{source}' to '{target}'")]
    DuplicateEdge { source: String, target: String },

    /// Topological reduction stalled with nodes remaining — at least one
    /// node named here participates in a cycle.
    #[error("workflow graph contains a cycle involving: {involved:?}")]
    CycleDetected { involved: Vec<String> },

    /// A node (in a multi-node workflow) is not the endpoint of any edge.
    #[error("node '{0}' is not connected to the rest of the workflow")]
    NotConnected(String),

    /// A kind-specific required configuration key is missing.
    #[error("node '{node_id}' is missing required config field '{field}'")]
    MissingConfig { node_id: String, field: &'static str },

    // ------ Execution errors (spec §7) ------
    /// A node failed with a non-retryable error, or exhausted its retries.
    #[error("node '{node_id}' failed: {message}")]
    NodeFailed { node_id: String, message: String },

    /// A security violation (expression or sandbox reaching a denied
    /// capability) poisons the whole execution — never retried.
    #[error("security violation in node '{node_id}': {message}")]
    SecurityViolation { node_id: String, message: String },

    /// Programmer-visible errors: dispatcher missing an executor for a
    /// declared kind, checkpoint write failed, etc. Terminal; never swallowed.
    #[error("internal engine error: {0}")]
    Internal(String),

    /// No execution exists with the given id, or it has no checkpoint.
    #[error("execution '{0}' not found or has no checkpoint")]
    ExecutionNotFound(uuid::Uuid),

    /// Resume was attempted against a ticket that doesn't name a
    /// currently-waiting node in the given execution.
    #[error("wait ticket '{0}' is not a pending suspension")]
    UnknownWaitTicket(String),

    /// Persistence error from the db crate.
    #[error("database error: {0}")]
    Database(String),
}

impl From<db::DbError> for EngineError {
    fn from(e: db::DbError) -> Self {
        EngineError::Database(e.to_string())
    }
}

impl From<nodes::NodeError> for EngineError {
    fn from(e: nodes::NodeError) -> Self {
        match e.kind() {
            nodes::ErrorKind::SecurityViolation => {
                EngineError::SecurityViolation { node_id: String::new(), message: e.message }
            }
            nodes::ErrorKind::Internal => EngineError::Internal(e.message),
            _ => EngineError::NodeFailed { node_id: String::new(), message: e.message },
        }
    }
}
