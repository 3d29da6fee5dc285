//! Checkpoint Writer (C7) — spec §4.7.
//!
//! Every method is a durable write the scheduler `.await`s before the
//! caller proceeds; the ordering guarantee in spec §4.7/§5 ("a downstream
//! node MUST NOT be scheduled until the checkpoint reflecting its
//! predecessor's completion is durable") is enforced entirely by the
//! scheduler awaiting [`CheckpointWriter::node_finish`] before touching
//! successor in-degree state — this trait only has to make each call
//! durable once it returns.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use db::external::ExternalStore;
use nodes::NodeResult;
use uuid::Uuid;

use crate::models::{ExecutionStatus, Workflow};
use crate::EngineError;

/// Contract: `startExecution`, `nodeStart`, `nodeFinish`, `finishExecution`
/// (spec §4.7). Implementations own the persistence details (Postgres via
/// the `db` crate in production; an in-memory double in tests).
#[async_trait]
pub trait CheckpointWriter: Send + Sync {
    async fn start_execution(&self, workflow: &Workflow, execution_id: Uuid, tenant_id: Option<&str>, input: &serde_json::Value) -> Result<(), EngineError>;

    async fn node_start(&self, execution_id: Uuid, node_id: &str, input_snapshot: &serde_json::Value) -> Result<(), EngineError>;

    /// Persists the completion record and an updated checkpoint: the
    /// in-degree snapshot, completed-node set, and the node's result
    /// (externalized above the inline threshold — see `db::external`).
    async fn node_finish(&self, execution_id: Uuid, node_id: &str, result: &NodeResult, in_degree_snapshot: &HashMap<String, u32>, completed: &[String]) -> Result<(), EngineError>;

    async fn finish_execution(&self, execution_id: Uuid, status: ExecutionStatus, error_message: Option<&str>) -> Result<(), EngineError>;
}

/// `db`-backed implementation. Outputs at or above
/// `db::external::INLINE_THRESHOLD_BYTES` are externalized to `external`
/// rather than stored inline in the checkpoint row (spec §6).
pub struct DbCheckpointWriter {
    pool: db::DbPool,
    external: Arc<dyn ExternalStore>,
}

impl DbCheckpointWriter {
    pub fn new(pool: db::DbPool, external: Arc<dyn ExternalStore>) -> Self {
        Self { pool, external }
    }
}

#[async_trait]
impl CheckpointWriter for DbCheckpointWriter {
    async fn start_execution(&self, workflow: &Workflow, execution_id: Uuid, tenant_id: Option<&str>, input: &serde_json::Value) -> Result<(), EngineError> {
        let definition = serde_json::to_value(workflow).map_err(|e| EngineError::Internal(format!("failed to serialize workflow: {e}")))?;
        // A workflow launched straight from a document (`cli run`, a queued
        // job body) may never have gone through the workflows API, so there
        // is no guarantee a `workflows` row exists yet for `workflow.id`.
        // Upsert it here, ahead of `create_execution`, whose
        // `workflow_executions.workflow_id` foreign key requires one.
        db::repository::workflows::upsert_workflow(&self.pool, workflow.id, &workflow.name, definition.clone()).await?;
        db::repository::executions::create_execution(&self.pool, execution_id, workflow.id).await?;
        db::repository::checkpoints::start_execution(&self.pool, execution_id, workflow.id, tenant_id, &definition, input).await?;
        Ok(())
    }

    async fn node_start(&self, execution_id: Uuid, node_id: &str, input_snapshot: &serde_json::Value) -> Result<(), EngineError> {
        db::repository::checkpoints::log_node_start(&self.pool, execution_id, node_id, input_snapshot).await?;
        Ok(())
    }

    async fn node_finish(&self, execution_id: Uuid, node_id: &str, result: &NodeResult, in_degree_snapshot: &HashMap<String, u32>, completed: &[String]) -> Result<(), EngineError> {
        let output_ref = if serde_json::to_vec(&result.output).map(|b| b.len()).unwrap_or(0) >= db::external::INLINE_THRESHOLD_BYTES {
            let digest = db::external::digest_of(&result.output)?;
            self.external.put(&digest, &result.output).await?;
            db::models::NodeResultRef::External { digest }
        } else {
            db::models::NodeResultRef::Inline { value: result.output.clone() }
        };

        let envelope = serde_json::json!({
            "status": result.status,
            "error_message": result.error_message,
            "stack_trace": result.stack_trace,
            "started_at": result.started_at,
            "finished_at": result.finished_at,
            "duration_ms": result.duration_ms,
            "retry_count": result.retry_count,
            "output_ref": output_ref,
        });
        let in_degree_json = serde_json::to_value(in_degree_snapshot).map_err(|e| EngineError::Internal(format!("failed to serialize in-degree snapshot: {e}")))?;
        db::repository::checkpoints::upsert_checkpoint(&self.pool, execution_id, node_id, &envelope, &in_degree_json, completed, Utc::now()).await?;
        Ok(())
    }

    async fn finish_execution(&self, execution_id: Uuid, status: ExecutionStatus, error_message: Option<&str>) -> Result<(), EngineError> {
        db::repository::checkpoints::finish_execution(&self.pool, execution_id, &status.to_string(), error_message).await?;
        let finished = matches!(status, ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled);
        db::repository::executions::update_execution_status(&self.pool, execution_id, &status.to_string(), finished).await?;
        Ok(())
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// In-memory [`CheckpointWriter`] for scheduler tests — grounded on the
    /// teacher's `executor_tests.rs` "mock pool so no real Postgres
    /// connection is required" pattern, generalized to the full C7 contract.
    #[derive(Default)]
    pub struct InMemoryCheckpointWriter {
        pub node_starts: Mutex<Vec<(Uuid, String)>>,
        pub node_finishes: Mutex<Vec<(Uuid, String, NodeResult)>>,
        pub statuses: Mutex<HashMap<Uuid, ExecutionStatus>>,
    }

    impl InMemoryCheckpointWriter {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }

        pub fn status_of(&self, execution_id: Uuid) -> Option<ExecutionStatus> {
            self.statuses.lock().get(&execution_id).copied()
        }
    }

    #[async_trait]
    impl CheckpointWriter for InMemoryCheckpointWriter {
        async fn start_execution(&self, _workflow: &Workflow, execution_id: Uuid, _tenant_id: Option<&str>, _input: &serde_json::Value) -> Result<(), EngineError> {
            self.statuses.lock().insert(execution_id, ExecutionStatus::Running);
            Ok(())
        }

        async fn node_start(&self, execution_id: Uuid, node_id: &str, _input_snapshot: &serde_json::Value) -> Result<(), EngineError> {
            self.node_starts.lock().push((execution_id, node_id.to_string()));
            Ok(())
        }

        async fn node_finish(&self, execution_id: Uuid, node_id: &str, result: &NodeResult, _in_degree_snapshot: &HashMap<String, u32>, _completed: &[String]) -> Result<(), EngineError> {
            self.node_finishes.lock().push((execution_id, node_id.to_string(), result.clone()));
            Ok(())
        }

        async fn finish_execution(&self, execution_id: Uuid, status: ExecutionStatus, _error_message: Option<&str>) -> Result<(), EngineError> {
            self.statuses.lock().insert(execution_id, status);
            Ok(())
        }
    }
}
