//! `wait` — records a suspension; the scheduler does not decrement
//! downstream in-degrees until a resume event arrives for the ticket.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::resolver::{resolve_map, ResolveMode};
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};

const DEFAULT_WAIT_TIMEOUT_MS: i64 = 60 * 60 * 1000;

pub struct WaitNode;

#[async_trait]
impl ExecutableNode for WaitNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let resolved = resolve_map(config, ctx, ResolveMode::Lenient).unwrap_or_else(|_| config.clone());

        let timeout_ms = resolved.get("timeout").and_then(Value::as_i64).unwrap_or(DEFAULT_WAIT_TIMEOUT_MS);
        let callback_url = resolved.get("callbackUrl").and_then(Value::as_str).map(str::to_string);
        let callback_data = resolved.get("callbackData").cloned().unwrap_or(Value::Null);

        let wait_ticket = Uuid::new_v4().to_string();
        let timeout_at = Utc::now() + ChronoDuration::milliseconds(timeout_ms);

        let mut output = serde_json::Map::new();
        output.insert("status".into(), Value::String("WAITING".into()));
        output.insert("waitTicket".into(), Value::String(wait_ticket));
        output.insert("timeoutAt".into(), Value::String(timeout_at.to_rfc3339()));
        if let Some(url) = callback_url {
            output.insert("callbackUrl".into(), Value::String(url));
        }
        output.insert("callbackData".into(), callback_data);

        NodeOutcome::waiting(Value::Object(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn produces_a_waiting_outcome_with_a_ticket() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let outcome = WaitNode.execute("w", &json!({}), &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Waiting);
        assert_eq!(outcome.output["status"], "WAITING");
        assert!(outcome.output["waitTicket"].is_string());
    }
}
