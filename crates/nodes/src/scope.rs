//! `ExecutionContext` — the shared, concurrent-safe binding scope every
//! node executor, the resolver, and the expression evaluator read from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde_json::Value;
use uuid::Uuid;

use crate::model::NodeResult;

/// System-scope values exposed under the `system` path prefix (spec §4.2).
#[derive(Debug, Clone, serde::Serialize)]
pub struct SystemScope {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub tenant_id: Option<String>,
    pub started_at: DateTime<Utc>,
}

/// Per-execution shared state. Cheaply `Clone`-able (everything mutable is
/// behind an `Arc`), so every spawned node task gets its own handle onto
/// the same underlying maps — this is the "concurrent map + atomic
/// integers" sharing model spec §5 requires.
#[derive(Clone)]
pub struct ExecutionContext {
    pub execution_id: Uuid,
    pub workflow_id: Uuid,
    pub tenant_id: Option<String>,
    /// Immutable after creation.
    pub input: Value,
    /// Mutable only by design (§9 Open Question: scripts bind it read-only
    /// today; the `RwLock` is what a future write-back channel would use).
    pub globals: Arc<RwLock<serde_json::Map<String, Value>>>,
    /// Populated as nodes finish; read by the resolver/expression
    /// evaluator and by MERGE/END executors.
    pub node_results: Arc<DashMap<String, NodeResult>>,
    pub secrets: Arc<HashMap<String, String>>,
    pub system: SystemScope,
}

impl ExecutionContext {
    pub fn new(
        execution_id: Uuid,
        workflow_id: Uuid,
        tenant_id: Option<String>,
        input: Value,
        globals: serde_json::Map<String, Value>,
        secrets: HashMap<String, String>,
    ) -> Self {
        let started_at = Utc::now();
        Self {
            execution_id,
            workflow_id,
            tenant_id: tenant_id.clone(),
            input,
            globals: Arc::new(RwLock::new(globals)),
            node_results: Arc::new(DashMap::new()),
            secrets: Arc::new(secrets),
            system: SystemScope { execution_id, workflow_id, tenant_id, started_at },
        }
    }

    /// Look up the scope value for a top-level path segment (spec §4.2's
    /// `input` / `global` / `system` / node-id prefixes). Returns `None`
    /// when the scope name is unknown — the resolver treats that as an
    /// unresolved path.
    pub fn scope_value(&self, scope: &str) -> Option<Value> {
        match scope {
            "input" => Some(self.input.clone()),
            "global" => Some(Value::Object(self.globals.read().clone())),
            "system" => serde_json::to_value(&self.system).ok(),
            node_id => self.node_results.get(node_id).map(|r| r.as_scope_value()),
        }
    }
}
