//! `log` — emits a message at a caller-selected level. Always succeeds.

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use crate::resolver::{resolve, ResolveMode};
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};

pub struct LogNode;

#[async_trait]
impl ExecutableNode for LogNode {
    async fn execute(&self, node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let level = config.get("level").and_then(Value::as_str).unwrap_or("info");
        let template = config.get("message").and_then(Value::as_str).unwrap_or("");

        let message = match resolve(template, ctx, ResolveMode::Lenient) {
            Ok(Value::String(s)) => s,
            Ok(other) => other.to_string(),
            Err(_) => template.to_string(),
        };

        match level {
            "debug" => debug!(node_id, "{message}"),
            "warn" => warn!(node_id, "{message}"),
            "error" => error!(node_id, "{message}"),
            _ => info!(node_id, "{message}"),
        }

        NodeOutcome::success(json!({}))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn resolves_message_and_always_succeeds() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({"name": "world"}), serde_json::Map::new(), HashMap::new());
        let outcome = LogNode.execute("n", &json!({"level": "warn", "message": "hello {{input.name}}"}), &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Success);
        assert_eq!(outcome.output, json!({}));
    }
}
