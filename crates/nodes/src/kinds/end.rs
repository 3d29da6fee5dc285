//! `end` — terminal node. Always appends an `_metadata` block; by default
//! its output is the mapping from each completed predecessor to its output.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::model::NodeStatus;
use crate::resolver::{resolve_map, ResolveMode};
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};

pub struct EndNode;

fn predecessor_ids(config: &Value) -> Vec<String> {
    config
        .get("_predecessorIds")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

fn metadata(ctx: &ExecutionContext) -> Value {
    let mut success_count = 0u64;
    let mut failed_count = 0u64;
    for entry in ctx.node_results.iter() {
        match entry.status {
            NodeStatus::Success => success_count += 1,
            NodeStatus::Failed => failed_count += 1,
            NodeStatus::Waiting => {}
        }
    }
    json!({
        "executionId": ctx.execution_id,
        "workflowId": ctx.workflow_id,
        "successCount": success_count,
        "failedCount": failed_count,
        "totalNodes": ctx.node_results.len() as u64,
    })
}

#[async_trait]
impl ExecutableNode for EndNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let mut output = if let Some(aggregate) = config.get("aggregateOutputs").and_then(Value::as_object) {
            let mut out = serde_json::Map::with_capacity(aggregate.len());
            for (key, spec) in aggregate {
                let transform = spec.get("transform").cloned().unwrap_or(Value::Null);
                let resolved = resolve_map(&transform, ctx, ResolveMode::Lenient).unwrap_or(Value::Null);
                out.insert(key.clone(), resolved);
            }
            out
        } else {
            let mut out = serde_json::Map::new();
            for id in predecessor_ids(config) {
                if let Some(result) = ctx.node_results.get(&id) {
                    out.insert(id, result.output.clone());
                }
            }
            out
        };

        output.insert("_metadata".into(), metadata(ctx));
        NodeOutcome::success(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeResult;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn default_output_maps_predecessors_and_appends_metadata() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let now = Utc::now();
        ctx.node_results.insert("A".into(), NodeResult::success("A", json!({"x": 1}), now, now, 0));
        let outcome = EndNode.execute("end", &json!({"_predecessorIds": ["A"]}), &ctx).await;
        assert_eq!(outcome.output["A"], json!({"x": 1}));
        assert_eq!(outcome.output["_metadata"]["successCount"], 1);
    }
}
