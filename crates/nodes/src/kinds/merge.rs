//! `merge` — collects predecessor outputs from the execution context.
//!
//! The scheduler resolves which inbound edges were pruned before dispatch
//! and passes the surviving predecessor ids, in source-edge order, as the
//! reserved `_predecessorIds` config key — this node never walks the graph
//! itself.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};
use crate::NodeError;

pub struct MergeNode;

fn predecessor_ids(config: &Value) -> Vec<String> {
    config
        .get("_predecessorIds")
        .and_then(Value::as_array)
        .map(|a| a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default()
}

#[async_trait]
impl ExecutableNode for MergeNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let strategy = config.get("mergeStrategy").and_then(Value::as_str).unwrap_or("all");
        let include = config.get("includeNodeIds").and_then(Value::as_array).map(|a| {
            a.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>()
        });
        let exclude_nulls = config.get("excludeNulls").and_then(Value::as_bool).unwrap_or(true);

        let mut entries: Vec<(String, Value)> = Vec::new();
        for id in predecessor_ids(config) {
            if let Some(allow) = &include {
                if !allow.contains(&id) {
                    continue;
                }
            }
            let Some(result) = ctx.node_results.get(&id) else { continue };
            let output = result.output.clone();
            if exclude_nulls && output.is_null() {
                continue;
            }
            entries.push((id, output));
        }

        let count = entries.len();

        // Open question (spec §9): a merge whose every predecessor branch
        // was pruned succeeds with count=0 by default; `failOnEmpty` opts
        // into the stricter policy some callers expect.
        let fail_on_empty = config.get("failOnEmpty").and_then(Value::as_bool).unwrap_or(false);
        if count == 0 && fail_on_empty {
            return NodeOutcome::failed(NodeError::validation("merge received no surviving predecessor outputs"));
        }

        let output = match strategy {
            "first" => {
                let (node_id, result) = entries.into_iter().next().unwrap_or((String::new(), Value::Null));
                json!({ "nodeId": node_id, "result": result, "count": count })
            }
            "last" => {
                let (node_id, result) = entries.into_iter().last().unwrap_or((String::new(), Value::Null));
                json!({ "nodeId": node_id, "result": result, "count": count })
            }
            "array" => {
                let results: Vec<Value> = entries.into_iter().map(|(node_id, result)| json!({ "nodeId": node_id, "result": result })).collect();
                json!({ "results": results, "count": count })
            }
            _ => {
                let mut merged = serde_json::Map::with_capacity(entries.len());
                let mut node_ids = Vec::with_capacity(entries.len());
                for (node_id, result) in entries {
                    node_ids.push(node_id.clone());
                    merged.insert(node_id, result);
                }
                json!({ "merged": Value::Object(merged), "nodeIds": node_ids, "count": count })
            }
        };

        NodeOutcome::success(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NodeResult;
    use chrono::Utc;
    use std::collections::HashMap;
    use uuid::Uuid;

    fn ctx_with_results(pairs: &[(&str, Value)]) -> ExecutionContext {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let now = Utc::now();
        for (id, output) in pairs {
            ctx.node_results.insert((*id).to_string(), NodeResult::success(*id, output.clone(), now, now, 0));
        }
        ctx
    }

    #[tokio::test]
    async fn all_strategy_collects_every_predecessor() {
        let ctx = ctx_with_results(&[("A", json!({"x": 1})), ("B", json!({"y": 2}))]);
        let config = json!({ "mergeStrategy": "all", "_predecessorIds": ["A", "B"] });
        let outcome = MergeNode.execute("M", &config, &ctx).await;
        assert_eq!(outcome.output, json!({ "merged": {"A": {"x": 1}, "B": {"y": 2}}, "nodeIds": ["A", "B"], "count": 2 }));
    }

    #[tokio::test]
    async fn pruned_predecessor_contributes_nothing() {
        let ctx = ctx_with_results(&[("A", json!({"x": 1}))]);
        let config = json!({ "mergeStrategy": "all", "_predecessorIds": ["A"] });
        let outcome = MergeNode.execute("M", &config, &ctx).await;
        assert_eq!(outcome.output["count"], 1);
    }

    #[tokio::test]
    async fn empty_predecessor_set_succeeds_with_zero_count() {
        let ctx = ctx_with_results(&[]);
        let config = json!({ "mergeStrategy": "all", "_predecessorIds": [] });
        let outcome = MergeNode.execute("M", &config, &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Success);
        assert_eq!(outcome.output["count"], 0);
    }

    #[tokio::test]
    async fn fail_on_empty_opts_into_the_stricter_policy() {
        let ctx = ctx_with_results(&[]);
        let config = json!({ "mergeStrategy": "all", "_predecessorIds": [], "failOnEmpty": true });
        let outcome = MergeNode.execute("M", &config, &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Failed);
    }
}
