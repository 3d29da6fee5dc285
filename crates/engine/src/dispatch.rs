//! Timeout-supervised dispatch to the node registry (spec §4.5).
//!
//! The registry lookup by [`nodes::NodeKind`] is a fixed tagged-enum match,
//! not a class hierarchy (spec Design Notes); this module's only job beyond
//! that lookup is enforcing the node's effective timeout around the call.

use std::time::Duration;

use nodes::{ExecutionContext, NodeKind, NodeOutcome, NodeRegistry, NodeStatus};

use crate::EngineError;

/// Dispatch `node_id` (of kind `kind`) to its registered executor, bounding
/// the call to `timeout_ms`. A timeout produces a failed [`NodeOutcome`]
/// with a message the scheduler's retry policy treats as retryable,
/// mirroring a remote-failure outcome rather than aborting the execution.
pub async fn dispatch(
    registry: &NodeRegistry,
    kind: NodeKind,
    node_id: &str,
    config: &serde_json::Value,
    ctx: &ExecutionContext,
    timeout_ms: u64,
) -> Result<NodeOutcome, EngineError> {
    let executor = registry
        .get(&kind)
        .ok_or_else(|| EngineError::Internal(format!("no executor registered for node kind '{}'", kind.as_str())))?;

    match tokio::time::timeout(Duration::from_millis(timeout_ms), executor.execute(node_id, config, ctx)).await {
        Ok(outcome) => Ok(outcome),
        Err(_elapsed) => Ok(NodeOutcome::failed(nodes::NodeError::timeout(format!(
            "node '{node_id}' exceeded its {timeout_ms}ms timeout"
        )))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use nodes::{default_registry, ExecutableNode};
    use std::sync::Arc;

    struct SlowNode;

    #[async_trait]
    impl ExecutableNode for SlowNode {
        async fn execute(&self, _node_id: &str, _config: &serde_json::Value, _ctx: &ExecutionContext) -> NodeOutcome {
            tokio::time::sleep(Duration::from_millis(200)).await;
            NodeOutcome::success(serde_json::json!({}))
        }
    }

    fn test_ctx() -> ExecutionContext {
        ExecutionContext::new(uuid::Uuid::new_v4(), uuid::Uuid::new_v4(), None, serde_json::json!({}), serde_json::Map::new(), Default::default())
    }

    #[tokio::test]
    async fn timeout_produces_failed_outcome() {
        let mut registry: NodeRegistry = default_registry(reqwest::Client::new(), sandbox::SandboxPool::new(1));
        registry.insert(NodeKind::Log, Arc::new(SlowNode));
        let ctx = test_ctx();
        let outcome = dispatch(&registry, NodeKind::Log, "n1", &serde_json::json!({}), &ctx, 10).await.unwrap();
        assert_eq!(outcome.status, NodeStatus::Failed);
    }

    #[tokio::test]
    async fn missing_executor_is_internal_error() {
        let registry: NodeRegistry = NodeRegistry::new();
        let ctx = test_ctx();
        let result = dispatch(&registry, NodeKind::Http, "n1", &serde_json::json!({}), &ctx, 1000).await;
        assert!(matches!(result, Err(EngineError::Internal(_))));
    }
}
