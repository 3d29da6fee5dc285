//! `script` — delegates to the script sandbox pool (C4).

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::resolver::{resolve_map, ResolveMode};
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};
use crate::NodeError;

const DEFAULT_SCRIPT_TIMEOUT_MS: u64 = 5_000;

pub struct ScriptNode {
    pool: Arc<sandbox::SandboxPool>,
}

impl ScriptNode {
    pub fn new(pool: Arc<sandbox::SandboxPool>) -> Self {
        Self { pool }
    }
}

fn nodes_scope(ctx: &ExecutionContext) -> Value {
    let mut map = serde_json::Map::new();
    for entry in ctx.node_results.iter() {
        map.insert(entry.key().clone(), entry.value().as_scope_value());
    }
    Value::Object(map)
}

#[async_trait]
impl ExecutableNode for ScriptNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let code = match config.get("code").and_then(Value::as_str) {
            Some(c) if !c.trim().is_empty() => c.to_string(),
            _ => return NodeOutcome::failed(NodeError::validation("script node requires non-empty 'code'")),
        };

        let bindings = config.get("bindings").cloned().unwrap_or_else(|| json!({}));
        let resolved_bindings = match resolve_map(&bindings, ctx, ResolveMode::Lenient) {
            Ok(v) => v,
            Err(e) => return NodeOutcome::failed(NodeError::unresolved_variable(e.0)),
        };

        let timeout_ms = config.get("timeout").and_then(Value::as_u64).unwrap_or(DEFAULT_SCRIPT_TIMEOUT_MS);

        let request = sandbox::ScriptRequest {
            code,
            input: resolved_bindings,
            global: Value::Object(ctx.globals.read().clone()),
            system: serde_json::to_value(&ctx.system).unwrap_or(Value::Null),
            nodes: nodes_scope(ctx),
            timeout: Duration::from_millis(timeout_ms),
        };

        match self.pool.execute(request).await {
            Ok(outcome) => NodeOutcome::success(json!({
                "returnValue": outcome.return_value,
                "output": outcome.captured_output,
                "duration": outcome.duration_ms,
            })),
            Err(sandbox::SandboxError::Unavailable) => {
                NodeOutcome::failed(NodeError::resource_limit("script sandbox pool exhausted"))
            }
            Err(sandbox::SandboxError::ResourceLimit(msg)) => NodeOutcome::failed(NodeError::resource_limit(msg)),
            Err(sandbox::SandboxError::Runtime(msg)) => {
                NodeOutcome::failed(NodeError::expression_runtime(msg.clone()).with_stack_trace(msg))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn empty_code_is_validation_failure() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let node = ScriptNode::new(sandbox::SandboxPool::new(1));
        let outcome = node.execute("s", &json!({"code": "   "}), &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind(), crate::ErrorKind::Validation);
    }
}
