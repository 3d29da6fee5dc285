//! `http` — one outbound HTTP request per invocation.

use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::str::FromStr;

use crate::resolver::{resolve_map, ResolveMode};
use crate::scope::ExecutionContext;
use crate::traits::{ExecutableNode, NodeOutcome};
use crate::NodeError;

pub struct HttpNode {
    client: reqwest::Client,
}

impl HttpNode {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

fn headers_to_value(headers: &reqwest::header::HeaderMap) -> Value {
    let mut map = serde_json::Map::new();
    for (name, value) in headers {
        if let Ok(v) = value.to_str() {
            map.entry(name.as_str().to_string()).or_insert_with(|| Value::String(v.to_string()));
        }
    }
    Value::Object(map)
}

#[async_trait]
impl ExecutableNode for HttpNode {
    async fn execute(&self, _node_id: &str, config: &Value, ctx: &ExecutionContext) -> NodeOutcome {
        let resolved = match resolve_map(config, ctx, ResolveMode::Lenient) {
            Ok(v) => v,
            Err(e) => return NodeOutcome::failed(NodeError::unresolved_variable(e.0)),
        };

        let url = match resolved.get("url").and_then(Value::as_str) {
            Some(u) if !u.is_empty() => u.to_string(),
            _ => return NodeOutcome::failed(NodeError::validation("http node requires a non-empty 'url'")),
        };

        let method_str = resolved.get("method").and_then(Value::as_str).unwrap_or("GET");
        let method = match Method::from_str(&method_str.to_uppercase()) {
            Ok(m) => m,
            Err(_) => return NodeOutcome::failed(NodeError::validation(format!("invalid HTTP method: {method_str}"))),
        };

        let mut builder = self.client.request(method, &url);

        if let Some(headers) = resolved.get("headers").and_then(Value::as_object) {
            for (k, v) in headers {
                if let Some(v) = v.as_str() {
                    builder = builder.header(k, v);
                }
            }
        }

        if let Some(body) = resolved.get("body").and_then(Value::as_str) {
            builder = builder.body(body.to_string());
        }

        let response = match builder.send().await {
            Ok(r) => r,
            Err(e) => return NodeOutcome::failed(NodeError::remote_failure(format!("HTTP transport error: {e}"))),
        };

        let status = response.status();
        let headers_json = headers_to_value(response.headers());
        let body_text = match response.text().await {
            Ok(t) => t,
            Err(e) => return NodeOutcome::failed(NodeError::remote_failure(format!("failed to read response body: {e}"))),
        };

        let output = json!({
            "status": status.as_u16(),
            "headers": headers_json,
            "body": body_text,
        });

        if status.is_success() {
            NodeOutcome::success(output)
        } else {
            NodeOutcome::failed_with_output(NodeError::remote_failure(format!("non-2xx response: {}", status.as_u16())), output)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use uuid::Uuid;

    #[tokio::test]
    async fn missing_url_is_validation_failure() {
        let ctx = ExecutionContext::new(Uuid::new_v4(), Uuid::new_v4(), None, json!({}), serde_json::Map::new(), HashMap::new());
        let node = HttpNode::new(reqwest::Client::new());
        let outcome = node.execute("h", &json!({}), &ctx).await;
        assert_eq!(outcome.status, crate::NodeStatus::Failed);
        assert_eq!(outcome.error.unwrap().kind(), crate::ErrorKind::Validation);
    }
}
