//! Node Executor Registry (C5) — dispatch by node kind.
//!
//! `NodeKind` is a fixed, tagged-enum enumeration rather than a class
//! hierarchy (spec §9 Design Notes): adding a new kind is one variant plus
//! one registration, with no open dispatch surface.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::kinds;
use crate::ExecutableNode;

/// The fixed set of node kinds the engine understands (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Http,
    Log,
    Script,
    If,
    Merge,
    Wait,
    End,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::Trigger => "trigger",
            NodeKind::Http => "http",
            NodeKind::Log => "log",
            NodeKind::Script => "script",
            NodeKind::If => "if",
            NodeKind::Merge => "merge",
            NodeKind::Wait => "wait",
            NodeKind::End => "end",
        }
    }
}

/// Maps [`NodeKind`] to its boxed [`ExecutableNode`] implementation.
pub type NodeRegistry = HashMap<NodeKind, Arc<dyn ExecutableNode>>;

/// Build the registry of built-in node executors.
pub fn default_registry(http_client: reqwest::Client, sandbox_pool: Arc<sandbox::SandboxPool>) -> NodeRegistry {
    let mut registry: NodeRegistry = HashMap::new();
    registry.insert(NodeKind::Trigger, Arc::new(kinds::trigger::TriggerNode));
    registry.insert(NodeKind::Http, Arc::new(kinds::http::HttpNode::new(http_client)));
    registry.insert(NodeKind::Log, Arc::new(kinds::log::LogNode));
    registry.insert(NodeKind::Script, Arc::new(kinds::script::ScriptNode::new(sandbox_pool)));
    registry.insert(NodeKind::If, Arc::new(kinds::if_node::IfNode));
    registry.insert(NodeKind::Merge, Arc::new(kinds::merge::MergeNode));
    registry.insert(NodeKind::Wait, Arc::new(kinds::wait::WaitNode));
    registry.insert(NodeKind::End, Arc::new(kinds::end::EndNode));
    registry
}
