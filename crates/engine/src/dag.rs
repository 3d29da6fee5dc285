//! DAG Model & Validator (C1) — spec §4.1.
//!
//! Validation rules, applied in order: (1) node id uniqueness, (2) edge
//! endpoints resolve to known nodes, (3) acyclicity via iterative
//! Kahn-style reduction, (4) connectivity (every node is the endpoint of
//! at least one edge, except a single-node workflow), (5) kind-specific
//! configuration checks.

use std::collections::{HashMap, HashSet, VecDeque};

use nodes::NodeKind;

use crate::models::{Edge, Workflow};
use crate::EngineError;

/// Immutable in-degree map plus reverse index of outgoing edges, computed
/// once and shared (`Arc<ValidatedGraph>`) for the lifetime of a workflow
/// (spec §4.1).
#[derive(Debug, Clone)]
pub struct ValidatedGraph {
    /// Node id → incoming edge count.
    pub in_degree: HashMap<String, u32>,
    /// Node id → its outgoing edges, in the order declared in the workflow
    /// document (merge/end executors rely on this order for deterministic
    /// predecessor ordering, spec §4.5).
    pub outgoing: HashMap<String, Vec<Edge>>,
    /// Node id → its incoming edges, in declaration order.
    pub incoming: HashMap<String, Vec<Edge>>,
}

impl ValidatedGraph {
    pub fn outgoing_edges(&self, node_id: &str) -> &[Edge] {
        self.outgoing.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn incoming_edges(&self, node_id: &str) -> &[Edge] {
        self.incoming.get(node_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Predecessor node ids for `node_id`, in declared edge order — the
    /// `_predecessorIds` list the scheduler injects into merge/end config.
    pub fn predecessor_ids(&self, node_id: &str) -> Vec<String> {
        self.incoming_edges(node_id).iter().map(|e| e.source_node_id.clone()).collect()
    }
}

fn check_kind_config(node: &crate::models::NodeDefinition) -> Result<(), EngineError> {
    match node.kind {
        NodeKind::Http => {
            let url_ok = node.config.get("url").and_then(serde_json::Value::as_str).map(|u| !u.is_empty()).unwrap_or(false);
            if !url_ok {
                return Err(EngineError::MissingConfig { node_id: node.id.clone(), field: "url" });
            }
        }
        NodeKind::Script => {
            let code_ok = node.config.get("code").and_then(serde_json::Value::as_str).map(|c| !c.trim().is_empty()).unwrap_or(false);
            if !code_ok {
                return Err(EngineError::MissingConfig { node_id: node.id.clone(), field: "code" });
            }
        }
        // `if` requires a `condition` or defaults to true (spec §4.1 rule 5) — not an error either way.
        _ => {}
    }
    Ok(())
}

/// Validate `workflow` and compute its [`ValidatedGraph`].
///
/// # Errors
/// - [`EngineError::DuplicateNodeId`] — two nodes share an id.
/// - [`EngineError::UnknownNodeReference`] — an edge references a missing node.
/// - [`EngineError::DuplicateEdge`] — more than one edge exists for a (source, target) pair.
/// - [`EngineError::CycleDetected`] — the graph is not acyclic.
/// - [`EngineError::NotConnected`] — a node (in a multi-node workflow) is not an endpoint of any edge.
/// - [`EngineError::MissingConfig`] — a kind-specific required config key is absent.
pub fn validate(workflow: &Workflow) -> Result<ValidatedGraph, EngineError> {
    // (1) Node id uniqueness.
    let mut seen_ids: HashSet<&str> = HashSet::new();
    for node in &workflow.nodes {
        if !seen_ids.insert(node.id.as_str()) {
            return Err(EngineError::DuplicateNodeId(node.id.clone()));
        }
    }
    let node_set: HashSet<&str> = workflow.nodes.iter().map(|n| n.id.as_str()).collect();

    // (2) Edge endpoints resolve to known nodes; reject duplicate (source, target) pairs.
    let mut seen_pairs: HashSet<(&str, &str)> = HashSet::new();
    for edge in &workflow.edges {
        if !node_set.contains(edge.source_node_id.as_str()) {
            return Err(EngineError::UnknownNodeReference { node_id: edge.source_node_id.clone(), side: "source" });
        }
        if !node_set.contains(edge.target_node_id.as_str()) {
            return Err(EngineError::UnknownNodeReference { node_id: edge.target_node_id.clone(), side: "target" });
        }
        let pair = (edge.source_node_id.as_str(), edge.target_node_id.as_str());
        if !seen_pairs.insert(pair) {
            return Err(EngineError::DuplicateEdge { source: edge.source_node_id.clone(), target: edge.target_node_id.clone() });
        }
    }

    // (3) Acyclicity via iterative Kahn-style reduction.
    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, u32> = HashMap::new();
    for node in &workflow.nodes {
        adjacency.entry(node.id.as_str()).or_default();
        in_degree.entry(node.id.as_str()).or_insert(0);
    }
    for edge in &workflow.edges {
        adjacency.entry(edge.source_node_id.as_str()).or_default().push(edge.target_node_id.as_str());
        *in_degree.entry(edge.target_node_id.as_str()).or_insert(0) += 1;
    }

    let mut remaining = in_degree.clone();
    let mut queue: VecDeque<&str> = remaining.iter().filter(|(_, &d)| d == 0).map(|(&id, _)| id).collect();
    let mut visited: HashSet<&str> = HashSet::new();
    while let Some(node_id) = queue.pop_front() {
        visited.insert(node_id);
        for &neighbour in adjacency.get(node_id).into_iter().flatten() {
            let deg = remaining.entry(neighbour).or_insert(0);
            *deg = deg.saturating_sub(1);
            if *deg == 0 {
                queue.push_back(neighbour);
            }
        }
    }
    if visited.len() != workflow.nodes.len() {
        let involved: Vec<String> = workflow
            .nodes
            .iter()
            .map(|n| n.id.as_str())
            .filter(|id| !visited.contains(id))
            .map(str::to_string)
            .collect();
        return Err(EngineError::CycleDetected { involved });
    }

    // (4) Connectivity: every node is the endpoint of at least one edge,
    // unless the workflow has exactly one node.
    if workflow.nodes.len() > 1 {
        let mut endpoints: HashSet<&str> = HashSet::new();
        for edge in &workflow.edges {
            endpoints.insert(edge.source_node_id.as_str());
            endpoints.insert(edge.target_node_id.as_str());
        }
        for node in &workflow.nodes {
            if !endpoints.contains(node.id.as_str()) {
                return Err(EngineError::NotConnected(node.id.clone()));
            }
        }
    }

    // (5) Kind-specific configuration checks.
    for node in &workflow.nodes {
        check_kind_config(node)?;
    }

    let mut outgoing: HashMap<String, Vec<Edge>> = HashMap::new();
    let mut incoming: HashMap<String, Vec<Edge>> = HashMap::new();
    for node in &workflow.nodes {
        outgoing.entry(node.id.clone()).or_default();
        incoming.entry(node.id.clone()).or_default();
    }
    for edge in &workflow.edges {
        outgoing.entry(edge.source_node_id.clone()).or_default().push(edge.clone());
        incoming.entry(edge.target_node_id.clone()).or_default().push(edge.clone());
    }

    let in_degree_owned: HashMap<String, u32> = in_degree.into_iter().map(|(k, v)| (k.to_string(), v)).collect();

    Ok(ValidatedGraph { in_degree: in_degree_owned, outgoing, incoming })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NodeDefinition;
    use nodes::NodeKind;
    use serde_json::json;

    fn make_node(id: &str, kind: NodeKind) -> NodeDefinition {
        NodeDefinition { id: id.to_string(), name: id.to_string(), kind, config: json!({}), timeout: None, retry: None }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge { source_node_id: from.into(), target_node_id: to.into(), condition: None }
    }

    fn workflow(nodes: Vec<NodeDefinition>, edges: Vec<Edge>) -> Workflow {
        Workflow::new("test", nodes, edges)
    }

    #[test]
    fn valid_linear_dag_computes_in_degrees() {
        let wf = workflow(
            vec![make_node("a", NodeKind::Trigger), make_node("b", NodeKind::Log), make_node("c", NodeKind::Log)],
            vec![edge("a", "b"), edge("b", "c")],
        );
        let graph = validate(&wf).expect("should be valid");
        assert_eq!(graph.in_degree["a"], 0);
        assert_eq!(graph.in_degree["b"], 1);
        assert_eq!(graph.in_degree["c"], 1);
    }

    #[test]
    fn valid_diamond_dag() {
        let wf = workflow(
            vec![
                make_node("a", NodeKind::Trigger),
                make_node("b", NodeKind::Log),
                make_node("c", NodeKind::Log),
                make_node("d", NodeKind::Merge),
            ],
            vec![edge("a", "b"), edge("a", "c"), edge("b", "d"), edge("c", "d")],
        );
        let graph = validate(&wf).expect("should be valid");
        assert_eq!(graph.in_degree["d"], 2);
        assert_eq!(graph.predecessor_ids("d"), vec!["b", "c"]);
    }

    #[test]
    fn duplicate_node_id_is_rejected() {
        let wf = workflow(vec![make_node("a", NodeKind::Trigger), make_node("a", NodeKind::Log)], vec![]);
        assert!(matches!(validate(&wf), Err(EngineError::DuplicateNodeId(id)) if id == "a"));
    }

    #[test]
    fn edge_referencing_missing_node_is_rejected() {
        let wf = workflow(vec![make_node("a", NodeKind::Trigger)], vec![edge("a", "ghost")]);
        assert!(matches!(validate(&wf), Err(EngineError::UnknownNodeReference { node_id, .. }) if node_id == "ghost"));
    }

    #[test]
    fn duplicate_edge_is_rejected() {
        let wf = workflow(vec![make_node("a", NodeKind::Trigger), make_node("b", NodeKind::Log)], vec![edge("a", "b"), edge("a", "b")]);
        assert!(matches!(validate(&wf), Err(EngineError::DuplicateEdge { .. })));
    }

    #[test]
    fn cycle_is_detected_and_names_involved_nodes() {
        let wf = workflow(
            vec![make_node("a", NodeKind::Trigger), make_node("b", NodeKind::Log), make_node("c", NodeKind::Log)],
            vec![edge("a", "b"), edge("b", "c"), edge("c", "a")],
        );
        match validate(&wf) {
            Err(EngineError::CycleDetected { involved }) => {
                assert_eq!(involved.len(), 3);
            }
            other => panic!("expected CycleDetected, got {other:?}"),
        }
    }

    #[test]
    fn single_node_no_edges_is_valid() {
        let wf = workflow(vec![make_node("solo", NodeKind::Trigger)], vec![]);
        assert!(validate(&wf).is_ok());
    }

    #[test]
    fn disconnected_node_is_rejected_in_multi_node_workflow() {
        let wf = workflow(vec![make_node("a", NodeKind::Trigger), make_node("b", NodeKind::Log)], vec![]);
        assert!(matches!(validate(&wf), Err(EngineError::NotConnected(id)) if id == "b"));
    }

    #[test]
    fn http_node_without_url_is_rejected() {
        let mut node = make_node("h", NodeKind::Http);
        node.config = json!({});
        let wf = workflow(vec![node], vec![]);
        assert!(matches!(validate(&wf), Err(EngineError::MissingConfig { field: "url", .. })));
    }

    #[test]
    fn script_node_without_code_is_rejected() {
        let mut node = make_node("s", NodeKind::Script);
        node.config = json!({});
        let wf = workflow(vec![node], vec![]);
        assert!(matches!(validate(&wf), Err(EngineError::MissingConfig { field: "code", .. })));
    }

    #[test]
    fn if_node_without_condition_defaults_to_true_and_is_not_an_error() {
        let mut node = make_node("i", NodeKind::If);
        node.config = json!({});
        let wf = workflow(vec![node], vec![]);
        assert!(validate(&wf).is_ok());
    }
}
