//! `if` — evaluates its condition via the expression evaluator (C3).
//!
//! The actual flow split happens through edge conditions in the scheduler;
//! this node just records the evaluated result for downstream inspection.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::expression::evaluate_bool;
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};
use crate::NodeError;

pub struct IfNode;

#[async_trait]
impl ExecutableNode for IfNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let condition = config.get("condition").and_then(Value::as_str).unwrap_or("");

        let result = match evaluate_bool(condition, ctx) {
            Ok(b) => b,
            Err(e) => {
                return NodeOutcome::failed(match e {
                    crate::expression::ExpressionError::Parse(m) => NodeError::expression_parse(m),
                    crate::expression::ExpressionError::Runtime(m) => NodeError::expression_runtime(m),
                    crate::expression::ExpressionError::SecurityViolation(m) => NodeError::security_violation(m),
                })
            }
        };

        let selected = if result {
            config.get("trueValue").and_then(Value::as_str).unwrap_or("true").to_string()
        } else {
            config.get("falseValue").and_then(Value::as_str).unwrap_or("false").to_string()
        };

        NodeOutcome::success(json!({ "result": result, "selected": selected }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn evaluates_condition_and_reports_selected_label() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({"n": 5}), serde_json::Map::new(), HashMap::new());
        let outcome = IfNode.execute("i", &json!({"condition": "input.n > 3", "trueValue": "big"}), &ctx).await;
        assert_eq!(outcome.output, json!({"result": true, "selected": "big"}));
    }

    #[tokio::test]
    async fn security_violation_fails_the_node() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let outcome = IfNode.execute("i", &json!({"condition": "System.exit(0)"}), &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind(), crate::ErrorKind::SecurityViolation);
    }
}
