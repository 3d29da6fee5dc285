//! `trigger` — the entry node of every workflow.

use async_trait::async_trait;
use serde_json::Value;

use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};

/// Reads its input bindings from the execution's input and from
/// kind-specific metadata (webhook headers/body, cron scheduled time,
/// event payload — carried in the execution's `input`, populated by
/// whichever ingress started the execution) and writes them as its
/// output, tagged with trigger kind. Always succeeds.
pub struct TriggerNode;

#[async_trait]
impl ExecutableNode for TriggerNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let trigger_type = config.get("triggerType").and_then(Value::as_str).unwrap_or("manual").to_string();

        let mut output = serde_json::Map::new();
        output.insert("triggerType".into(), Value::String(trigger_type));
        output.insert("payload".into(), ctx.input.clone());
        NodeOutcome::success(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn always_succeeds_and_tags_trigger_type() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({"foo": 1}), serde_json::Map::new(), HashMap::new());
        let outcome = TriggerNode.execute("t", &json!({"triggerType": "manual"}), &ctx).await;
        assert_eq!(outcome.output["triggerType"], "manual");
        assert_eq!(outcome.output["payload"]["foo"], 1);
    }
}
