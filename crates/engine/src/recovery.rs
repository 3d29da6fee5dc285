//! Recovery Planner (C8) — spec §4.8.
//!
//! Pure reconstruction of scheduler state from the last durable checkpoint.
//! Crash recovery never re-derives state by re-running nodes: it trusts the
//! checkpoint row entirely, which is why [`CheckpointWriter::node_finish`]
//! must be durable before the scheduler acts on it (spec §4.7).

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::dag::ValidatedGraph;
use crate::models::ExecutionStatus;
use crate::EngineError;

/// Reconstructed scheduler state for resuming an execution after a crash,
/// or for serving a resume/status query.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryPlan {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub tenant_id: Option<String>,
    pub status: ExecutionStatus,
    pub in_degree: HashMap<String, u32>,
    pub completed: HashSet<String>,
    pub input: serde_json::Value,
    pub error_message: Option<String>,
    /// Raw per-node result envelopes as persisted (status/output_ref/etc.),
    /// keyed by node id. The scheduler hydrates these (including fetching
    /// externalized outputs) rather than this pure-reconstruction type, to
    /// keep `plan()` free of I/O beyond the single checkpoint read.
    pub node_result_envelopes: HashMap<String, serde_json::Value>,
}

impl RecoveryPlan {
    /// Nodes with zero remaining in-degree that have not yet completed —
    /// the set the scheduler re-dispatches on resume (spec §4.8). Computing
    /// this from `graph` rather than persisting it directly keeps the
    /// checkpoint schema minimal and the recomputation trivially pure.
    pub fn ready_set(&self, graph: &ValidatedGraph) -> Vec<String> {
        graph
            .in_degree
            .keys()
            .filter(|id| !self.completed.contains(*id))
            .filter(|id| self.in_degree.get(*id).copied().unwrap_or(0) == 0)
            .cloned()
            .collect()
    }
}

pub struct RecoveryPlanner {
    pool: db::DbPool,
}

impl RecoveryPlanner {
    pub fn new(pool: db::DbPool) -> Self {
        Self { pool }
    }

    /// Reconstruct the [`RecoveryPlan`] for `execution_id` from its last
    /// persisted checkpoint.
    ///
    /// Running this twice against an unchanged checkpoint must yield an
    /// identical plan (idempotence property relied on by resume retries).
    pub async fn plan(&self, execution_id: Uuid) -> Result<RecoveryPlan, EngineError> {
        let row = db::repository::checkpoints::get_checkpoint(&self.pool, execution_id)
            .await
            .map_err(|_| EngineError::ExecutionNotFound(execution_id))?;

        let status: ExecutionStatus = row
            .status
            .parse()
            .map_err(|e: String| EngineError::Internal(format!("corrupt checkpoint status: {e}")))?;

        let in_degree: HashMap<String, u32> = serde_json::from_value(row.in_degree)
            .map_err(|e| EngineError::Internal(format!("corrupt checkpoint in_degree: {e}")))?;

        let completed_vec: Vec<String> = serde_json::from_value(row.completed)
            .map_err(|e| EngineError::Internal(format!("corrupt checkpoint completed set: {e}")))?;

        let node_result_envelopes: HashMap<String, serde_json::Value> = match row.node_results {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            _ => HashMap::new(),
        };

        Ok(RecoveryPlan {
            execution_id,
            workflow_id: row.workflow_id,
            tenant_id: row.tenant_id,
            status,
            in_degree,
            completed: completed_vec.into_iter().collect(),
            input: row.input,
            error_message: row.error_message,
            node_result_envelopes,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recovery_plan_equality_is_structural() {
        let a = RecoveryPlan {
            execution_id: Uuid::nil(),
            workflow_id: Uuid::nil(),
            tenant_id: None,
            status: ExecutionStatus::Running,
            in_degree: HashMap::from([("b".to_string(), 1)]),
            completed: HashSet::from(["a".to_string()]),
            input: serde_json::json!({}),
            error_message: None,
            node_result_envelopes: HashMap::new(),
        };
        let b = a.clone();
        assert_eq!(a, b);
    }

    #[test]
    fn ready_set_excludes_completed_and_nonzero_indegree() {
        let graph = ValidatedGraph { in_degree: HashMap::from([("a".into(), 0), ("b".into(), 1), ("c".into(), 0)]), outgoing: HashMap::new(), incoming: HashMap::new() };
        let plan = RecoveryPlan {
            execution_id: Uuid::nil(),
            workflow_id: Uuid::nil(),
            tenant_id: None,
            status: ExecutionStatus::Running,
            in_degree: HashMap::from([("a".to_string(), 0), ("b".to_string(), 1), ("c".to_string(), 0)]),
            completed: HashSet::from(["a".to_string()]),
            input: serde_json::json!({}),
            error_message: None,
            node_result_envelopes: HashMap::new(),
        };
        assert_eq!(plan.ready_set(&graph), vec!["c".to_string()]);
    }
}
