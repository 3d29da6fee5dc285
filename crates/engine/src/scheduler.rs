//! Scheduler & Dispatcher (C6) — spec §4.6.
//!
//! Replaces a sequential "walk the DAG in topological order" executor with
//! true DAG-concurrent dispatch: every node with satisfied predecessors runs
//! as soon as it's ready, independent branches overlap, and a join node
//! fires the moment its last surviving predecessor lands. The in-degree
//! map and completed-node set are only ever touched by the single task
//! driving an execution's [`JoinSet`] — every other piece of shared state
//! (`ExecutionContext::node_results`, `globals`) is the concurrent-map +
//! atomic sharing model spec §5 describes, used by the node tasks that run
//! alongside the driver.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use chrono::Utc;
use nodes::{expression, ExecutionContext, NodeError, NodeKind, NodeRegistry, NodeResult, NodeStatus, RetryPolicy};
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use uuid::Uuid;

use crate::checkpoint::CheckpointWriter;
use crate::dag::{self, ValidatedGraph};
use crate::dispatch::dispatch;
use crate::models::{ExecutionStatus, NodeDefinition, Workflow};
use crate::recovery::RecoveryPlanner;
use crate::waits::{WaitResumption, WaitTicketStore};
use crate::EngineError;

/// Tunables for a [`Scheduler`] instance (spec §5).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Timeout applied when a node declares none of its own (spec §4.5).
    pub default_node_timeout_ms: u64,
    /// Upper bound on nodes dispatched concurrently for one execution.
    pub max_concurrency: usize,
    /// Retry policy applied when a node declares none of its own.
    pub default_retry: RetryPolicy,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let max_concurrency = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4).max(1) * 4;
        Self { default_node_timeout_ms: 30_000, max_concurrency, default_retry: RetryPolicy::default() }
    }
}

/// What a `launch`/`recover`/`resume_wait` call settles to.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ExecutionOutcome {
    pub execution_id: Uuid,
    pub status: ExecutionStatus,
    pub node_results: HashMap<String, NodeResult>,
}

pub struct Scheduler {
    registry: Arc<NodeRegistry>,
    checkpoint: Arc<dyn CheckpointWriter>,
    wait_store: Arc<dyn WaitTicketStore>,
    external: Arc<dyn db::external::ExternalStore>,
    pool: Option<db::DbPool>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        registry: Arc<NodeRegistry>,
        checkpoint: Arc<dyn CheckpointWriter>,
        wait_store: Arc<dyn WaitTicketStore>,
        external: Arc<dyn db::external::ExternalStore>,
        config: SchedulerConfig,
    ) -> Self {
        Self { registry, checkpoint, wait_store, external, pool: None, config }
    }

    /// Attach a database pool, enabling [`Scheduler::recover`] and
    /// [`Scheduler::resume_wait`], which need to reload the workflow
    /// definition and checkpoint row directly rather than through the
    /// write-oriented [`CheckpointWriter`]/[`WaitTicketStore`] traits.
    pub fn with_pool(mut self, pool: db::DbPool) -> Self {
        self.pool = Some(pool);
        self
    }

    fn pool(&self) -> Result<&db::DbPool, EngineError> {
        self.pool.as_ref().ok_or_else(|| EngineError::Internal("scheduler has no database pool attached (recovery/resume unavailable)".into()))
    }

    /// Wire up a scheduler with the built-in node registry, a Postgres-backed
    /// checkpoint/wait-ticket store, and a filesystem-backed external blob
    /// store rooted at `blob_dir` — the wiring every binary entry point
    /// (`api::serve`, the `queue` worker) needs identically.
    pub fn with_default_nodes(pool: db::DbPool, blob_dir: impl Into<std::path::PathBuf>, config: SchedulerConfig) -> Self {
        let http_client = reqwest::Client::new();
        let sandbox_pool = sandbox::SandboxPool::with_default_size();
        let registry = Arc::new(nodes::default_registry(http_client, sandbox_pool));
        let external: Arc<dyn db::external::ExternalStore> = Arc::new(db::external::FsExternalStore::new(blob_dir));
        let checkpoint: Arc<dyn CheckpointWriter> = Arc::new(crate::checkpoint::DbCheckpointWriter::new(pool.clone(), external.clone()));
        let wait_store: Arc<dyn WaitTicketStore> = Arc::new(crate::waits::DbWaitTicketStore::new(pool.clone()));
        Self::new(registry, checkpoint, wait_store, external, config).with_pool(pool)
    }

    /// Hydrated node results for an execution, for status/history queries
    /// that don't need to drive anything (spec §6's execution-history
    /// surface). Reuses the same envelope-hydration path recovery does.
    pub async fn node_history(&self, execution_id: Uuid) -> Result<ExecutionOutcome, EngineError> {
        let pool = self.pool()?.clone();
        let plan = RecoveryPlanner::new(pool).plan(execution_id).await?;
        let mut node_results = HashMap::with_capacity(plan.node_result_envelopes.len());
        for (node_id, envelope) in &plan.node_result_envelopes {
            node_results.insert(node_id.clone(), self.hydrate_node_result(node_id, envelope).await?);
        }
        Ok(ExecutionOutcome { execution_id, status: plan.status, node_results })
    }

    /// Validate `workflow`, persist the starting checkpoint, and drive it to
    /// completion, a wait suspension, or a terminal failure (spec §4.6 a–d).
    pub async fn launch(&self, workflow: Workflow, execution_id: Uuid, tenant_id: Option<String>, input: Value) -> Result<ExecutionOutcome, EngineError> {
        let graph = dag::validate(&workflow)?;
        let ctx = ExecutionContext::new(execution_id, workflow.id, tenant_id.clone(), input.clone(), workflow.global_variables.clone(), HashMap::new());

        self.checkpoint.start_execution(&workflow, execution_id, tenant_id.as_deref(), &input).await?;

        let in_degree: HashMap<String, AtomicU32> = graph.in_degree.iter().map(|(k, v)| (k.clone(), AtomicU32::new(*v))).collect();
        let ready: Vec<String> = graph.in_degree.iter().filter(|(_, &d)| d == 0).map(|(k, _)| k.clone()).collect();

        self.drive(Arc::new(workflow), Arc::new(graph), ctx, in_degree, HashSet::new(), ready).await
    }

    /// Reconstruct an execution's state from its last durable checkpoint and
    /// resume driving it — crash recovery (spec §4.8). Idempotent: calling
    /// this twice against an unchanged checkpoint re-dispatches the same
    /// ready set both times.
    pub async fn recover(&self, execution_id: Uuid) -> Result<ExecutionOutcome, EngineError> {
        let pool = self.pool()?.clone();
        let plan = RecoveryPlanner::new(pool.clone()).plan(execution_id).await?;
        if matches!(plan.status, ExecutionStatus::Completed | ExecutionStatus::Cancelled) {
            return Err(EngineError::Internal(format!("execution '{execution_id}' is already terminal ({})", plan.status)));
        }

        let workflow_row = db::repository::workflows::get_workflow(&pool, plan.workflow_id).await?;
        let workflow: Workflow = serde_json::from_value(workflow_row.definition).map_err(|e| EngineError::Internal(format!("corrupt workflow definition: {e}")))?;
        let graph = dag::validate(&workflow)?;

        let mut ctx = ExecutionContext::new(execution_id, workflow.id, plan.tenant_id.clone(), plan.input.clone(), workflow.global_variables.clone(), HashMap::new());
        for (node_id, envelope) in &plan.node_result_envelopes {
            let result = self.hydrate_node_result(node_id, envelope).await?;
            ctx.node_results.insert(node_id.clone(), result);
        }

        let in_degree: HashMap<String, AtomicU32> =
            graph.in_degree.iter().map(|(k, v)| (k.clone(), AtomicU32::new(plan.in_degree.get(k).copied().unwrap_or(*v)))).collect();
        let ready = plan.ready_set(&graph);
        let completed = plan.completed.clone();

        self.drive(Arc::new(workflow), Arc::new(graph), ctx, in_degree, completed, ready).await
    }

    /// Resume a suspended `wait` node: idempotent per ticket (spec §4.6). A
    /// second resume of an already-resumed ticket reports the execution's
    /// current status without re-running anything.
    pub async fn resume_wait(&self, ticket: &str, payload: Value) -> Result<ExecutionOutcome, EngineError> {
        let resumption = self.wait_store.resume(ticket, &payload).await?;
        let (execution_id, node_id) = match resumption {
            WaitResumption::First { execution_id, node_id } => (execution_id, node_id),
            WaitResumption::AlreadyResumed { execution_id } => {
                let pool = self.pool()?.clone();
                let plan = RecoveryPlanner::new(pool).plan(execution_id).await?;
                return Ok(ExecutionOutcome { execution_id, status: plan.status, node_results: HashMap::new() });
            }
            WaitResumption::NotFound => return Err(EngineError::UnknownWaitTicket(ticket.to_string())),
        };

        let pool = self.pool()?.clone();
        let plan = RecoveryPlanner::new(pool.clone()).plan(execution_id).await?;
        let workflow_row = db::repository::workflows::get_workflow(&pool, plan.workflow_id).await?;
        let workflow: Workflow = serde_json::from_value(workflow_row.definition).map_err(|e| EngineError::Internal(format!("corrupt workflow definition: {e}")))?;
        let graph = dag::validate(&workflow)?;

        let mut ctx = ExecutionContext::new(execution_id, workflow.id, plan.tenant_id.clone(), plan.input.clone(), workflow.global_variables.clone(), HashMap::new());
        for (nid, envelope) in &plan.node_result_envelopes {
            let result = self.hydrate_node_result(nid, envelope).await?;
            ctx.node_results.insert(nid.clone(), result);
        }

        let in_degree: HashMap<String, AtomicU32> =
            graph.in_degree.iter().map(|(k, v)| (k.clone(), AtomicU32::new(plan.in_degree.get(k).copied().unwrap_or(*v)))).collect();
        let mut completed = plan.completed.clone();

        let waiting_result = ctx.node_results.get(&node_id).map(|r| r.started_at).unwrap_or_else(Utc::now);
        let result = NodeResult::success(node_id.clone(), payload, waiting_result, Utc::now(), 0);
        ctx.node_results.insert(node_id.clone(), result.clone());
        completed.insert(node_id.clone());

        let in_degree_snapshot = snapshot_in_degree(&in_degree);
        let completed_list: Vec<String> = completed.iter().cloned().collect();
        self.checkpoint.node_finish(execution_id, &node_id, &result, &in_degree_snapshot, &completed_list).await?;

        let node_map = node_map_of(&workflow);
        let ready = cascade_from(&graph, &ctx, &completed, &in_degree, &node_map, &node_id);

        self.drive(Arc::new(workflow), Arc::new(graph), ctx, in_degree, completed, ready).await
    }

    async fn hydrate_node_result(&self, node_id: &str, envelope: &Value) -> Result<NodeResult, EngineError> {
        let output_ref: db::models::NodeResultRef = serde_json::from_value(envelope.get("output_ref").cloned().unwrap_or(Value::Null))
            .map_err(|e| EngineError::Internal(format!("corrupt checkpoint envelope for '{node_id}': {e}")))?;
        let output = match output_ref {
            db::models::NodeResultRef::Inline { value } => value,
            db::models::NodeResultRef::External { digest } => self.external.get(&digest).await?,
        };
        let status: NodeStatus = serde_json::from_value(envelope.get("status").cloned().unwrap_or(Value::Null))
            .map_err(|e| EngineError::Internal(format!("corrupt checkpoint status for '{node_id}': {e}")))?;
        let error_message = envelope.get("error_message").and_then(Value::as_str).map(str::to_string);
        let stack_trace = envelope.get("stack_trace").and_then(Value::as_str).map(str::to_string);
        let started_at = envelope
            .get("started_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(Utc::now);
        let finished_at = envelope
            .get("finished_at")
            .and_then(Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc));
        let duration_ms = envelope.get("duration_ms").and_then(Value::as_u64).unwrap_or(0);
        let retry_count = envelope.get("retry_count").and_then(Value::as_u64).unwrap_or(0) as u32;

        Ok(NodeResult { node_id: node_id.to_string(), status, output, error_message, stack_trace, started_at, finished_at, duration_ms, retry_count })
    }

    /// The core driver: spawns `initial_ready`, then processes completions
    /// one at a time, checkpointing each before touching downstream
    /// in-degree state, until no node is in flight (spec §4.6).
    async fn drive(
        &self,
        workflow: Arc<Workflow>,
        graph: Arc<ValidatedGraph>,
        ctx: ExecutionContext,
        in_degree: HashMap<String, AtomicU32>,
        mut completed: HashSet<String>,
        initial_ready: Vec<String>,
    ) -> Result<ExecutionOutcome, EngineError> {
        let node_map = node_map_of(&workflow);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency));
        let cancelled = Arc::new(AtomicBool::new(false));
        let mut set: JoinSet<(String, NodeResult)> = JoinSet::new();

        for node_id in &initial_ready {
            let predecessor_ids = surviving_predecessors(&graph, &ctx, &completed, node_id);
            self.spawn_node(&mut set, &node_map, node_id, &predecessor_ids, &ctx, &semaphore, &cancelled);
        }

        let mut waiting_any = false;

        loop {
            let Some(joined) = set.join_next().await else { break };
            let (node_id, result) = match joined {
                Ok(pair) => pair,
                Err(join_err) => {
                    set.abort_all();
                    let _ = self.checkpoint.finish_execution(ctx.execution_id, ExecutionStatus::Failed, Some(&join_err.to_string())).await;
                    return Err(EngineError::Internal(format!("node task panicked: {join_err}")));
                }
            };

            match result.status {
                NodeStatus::Success => {
                    ctx.node_results.insert(node_id.clone(), result.clone());
                    completed.insert(node_id.clone());
                    let in_degree_snapshot = snapshot_in_degree(&in_degree);
                    let completed_list: Vec<String> = completed.iter().cloned().collect();
                    self.checkpoint.node_finish(ctx.execution_id, &node_id, &result, &in_degree_snapshot, &completed_list).await?;

                    let newly_ready = cascade_from(&graph, &ctx, &completed, &in_degree, &node_map, &node_id);
                    for target in newly_ready {
                        let predecessor_ids = surviving_predecessors(&graph, &ctx, &completed, &target);
                        self.spawn_node(&mut set, &node_map, &target, &predecessor_ids, &ctx, &semaphore, &cancelled);
                    }
                }
                NodeStatus::Waiting => {
                    ctx.node_results.insert(node_id.clone(), result.clone());
                    let in_degree_snapshot = snapshot_in_degree(&in_degree);
                    let completed_list: Vec<String> = completed.iter().cloned().collect();
                    self.checkpoint.node_finish(ctx.execution_id, &node_id, &result, &in_degree_snapshot, &completed_list).await?;

                    let ticket = result.output.get("waitTicket").and_then(Value::as_str).unwrap_or_default();
                    if !ticket.is_empty() {
                        self.wait_store.create_ticket(ctx.execution_id, &node_id, ticket).await?;
                    }
                    waiting_any = true;
                }
                NodeStatus::Failed => {
                    ctx.node_results.insert(node_id.clone(), result.clone());
                    let in_degree_snapshot = snapshot_in_degree(&in_degree);
                    let completed_list: Vec<String> = completed.iter().cloned().collect();
                    self.checkpoint.node_finish(ctx.execution_id, &node_id, &result, &in_degree_snapshot, &completed_list).await?;

                    cancelled.store(true, Ordering::SeqCst);
                    set.abort_all();
                    self.checkpoint.finish_execution(ctx.execution_id, ExecutionStatus::Failed, result.error_message.as_deref()).await?;
                    return Ok(ExecutionOutcome { execution_id: ctx.execution_id, status: ExecutionStatus::Failed, node_results: snapshot_results(&ctx) });
                }
            }
        }

        let status = if waiting_any { ExecutionStatus::Waiting } else { ExecutionStatus::Completed };
        self.checkpoint.finish_execution(ctx.execution_id, status, None).await?;
        Ok(ExecutionOutcome { execution_id: ctx.execution_id, status, node_results: snapshot_results(&ctx) })
    }

    fn spawn_node(
        &self,
        set: &mut JoinSet<(String, NodeResult)>,
        node_map: &HashMap<String, NodeDefinition>,
        node_id: &str,
        predecessor_ids: &[String],
        ctx: &ExecutionContext,
        semaphore: &Arc<Semaphore>,
        cancelled: &Arc<AtomicBool>,
    ) {
        let node_def = node_map[node_id].clone();
        let timeout_ms = node_def.effective_timeout_ms(self.config.default_node_timeout_ms);
        let retry = node_def.retry.clone().unwrap_or_else(|| self.config.default_retry.clone());
        let registry = self.registry.clone();
        let checkpoint = self.checkpoint.clone();
        let semaphore = semaphore.clone();
        let cancelled = cancelled.clone();
        let ctx = ctx.clone();
        let execution_id = ctx.execution_id;
        let config = with_predecessor_ids(&node_def.config, predecessor_ids);

        set.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("scheduler semaphore closed while execution in flight");
            run_node(registry, checkpoint, execution_id, node_def, config, ctx, timeout_ms, retry, cancelled).await
        });
    }
}

/// Inject the scheduler-resolved `_predecessorIds` (spec §4.5) into a copy of
/// `config` — the only way `merge`/`end` learn which inbound edges survived
/// pruning, since those executors never walk the graph themselves. Harmless
/// for every other kind, which simply ignores the extra key.
fn with_predecessor_ids(config: &Value, predecessor_ids: &[String]) -> Value {
    let mut config = config.clone();
    if let Value::Object(map) = &mut config {
        map.insert("_predecessorIds".to_string(), Value::Array(predecessor_ids.iter().cloned().map(Value::String).collect()));
    }
    config
}

fn node_map_of(workflow: &Workflow) -> HashMap<String, NodeDefinition> {
    workflow.nodes.iter().map(|n| (n.id.clone(), n.clone())).collect()
}

fn snapshot_in_degree(in_degree: &HashMap<String, AtomicU32>) -> HashMap<String, u32> {
    in_degree.iter().map(|(k, v)| (k.clone(), v.load(Ordering::SeqCst))).collect()
}

fn snapshot_results(ctx: &ExecutionContext) -> HashMap<String, NodeResult> {
    ctx.node_results.iter().map(|e| (e.key().clone(), e.value().clone())).collect()
}

/// Predecessors of `node_id` that both completed and whose inbound edge
/// condition evaluated true — what merge/end executors receive as
/// `_predecessorIds`, and what decides whether a plain node fires or is
/// skipped (spec §4.1 pruning rule, §4.5).
fn surviving_predecessors(graph: &ValidatedGraph, ctx: &ExecutionContext, completed: &HashSet<String>, node_id: &str) -> Vec<String> {
    graph
        .incoming_edges(node_id)
        .iter()
        .filter(|edge| completed.contains(&edge.source_node_id))
        .filter_map(|edge| {
            let condition = edge.condition.as_deref().unwrap_or("");
            match expression::evaluate_bool(condition, ctx) {
                Ok(true) => Some(edge.source_node_id.clone()),
                Ok(false) => None,
                Err(e) => {
                    tracing::warn!(edge = %format!("{}->{}", edge.source_node_id, node_id), error = %e, "edge condition failed to evaluate; treating as pruned");
                    None
                }
            }
        })
        .collect()
}

/// Decrement in-degree along `source_node`'s outgoing edges, cascading a
/// "skip" through any node whose only surviving inbound edges were pruned,
/// and returning the ids that should actually be dispatched (spec §4.1, §4.6).
///
/// `merge`/`end` nodes always fire once ready, even with zero surviving
/// predecessors (spec §4.5, §9 Open Question — merge succeeds with an empty
/// result rather than failing). Every other kind only fires if at least one
/// inbound edge survived, or it has no inbound edges at all.
fn cascade_from(
    graph: &ValidatedGraph,
    ctx: &ExecutionContext,
    completed: &HashSet<String>,
    in_degree: &HashMap<String, AtomicU32>,
    node_map: &HashMap<String, NodeDefinition>,
    source_node: &str,
) -> Vec<String> {
    let mut ready = Vec::new();
    let mut queue: VecDeque<String> = graph.outgoing_edges(source_node).iter().map(|e| e.target_node_id.clone()).collect();

    while let Some(target) = queue.pop_front() {
        let Some(counter) = in_degree.get(&target) else { continue };
        let prev = counter.fetch_sub(1, Ordering::SeqCst);
        if prev != 1 {
            continue; // not yet zero
        }

        let node_def = &node_map[&target];
        let survivors = surviving_predecessors(graph, ctx, completed, &target);
        let always_runs = matches!(node_def.kind, NodeKind::Merge | NodeKind::End) || graph.incoming_edges(&target).is_empty();

        if always_runs || !survivors.is_empty() {
            ready.push(target);
        } else {
            queue.extend(graph.outgoing_edges(&target).iter().map(|e| e.target_node_id.clone()));
        }
    }

    ready
}

/// Run one node to its terminal attempt, retrying in place per its
/// [`RetryPolicy`] (spec §4.6: "schedule a delayed re-execution... unchanged
/// in-degree state" — the in-degree map is never touched here). `config`
/// carries `_predecessorIds` already injected by the caller for merge/end.
#[allow(clippy::too_many_arguments)]
async fn run_node(
    registry: Arc<NodeRegistry>,
    checkpoint: Arc<dyn CheckpointWriter>,
    execution_id: Uuid,
    node_def: NodeDefinition,
    config: Value,
    ctx: ExecutionContext,
    timeout_ms: u64,
    retry: RetryPolicy,
    cancelled: Arc<AtomicBool>,
) -> (String, NodeResult) {
    let node_id = node_def.id.clone();
    let started_at = Utc::now();
    let mut attempt = 0u32;

    loop {
        if cancelled.load(Ordering::SeqCst) {
            return (node_id.clone(), NodeResult::failed(&node_id, &NodeError::internal("execution cancelled"), started_at, Utc::now(), attempt));
        }

        if let Err(e) = checkpoint.node_start(execution_id, &node_id, &config).await {
            return (node_id.clone(), NodeResult::failed(&node_id, &NodeError::internal(e.to_string()), started_at, Utc::now(), attempt));
        }

        let outcome = dispatch(&registry, node_def.kind, &node_id, &config, &ctx, timeout_ms).await;
        match outcome {
            Err(engine_err) => {
                return (node_id.clone(), NodeResult::failed(&node_id, &NodeError::internal(engine_err.to_string()), started_at, Utc::now(), attempt));
            }
            Ok(outcome) => match outcome.status {
                NodeStatus::Success => {
                    return (node_id.clone(), NodeResult::success(node_id.clone(), outcome.output, started_at, Utc::now(), attempt));
                }
                NodeStatus::Waiting => {
                    return (node_id.clone(), NodeResult::waiting(node_id.clone(), outcome.output, started_at));
                }
                NodeStatus::Failed => {
                    let output = outcome.output;
                    let err = outcome.error.unwrap_or_else(|| NodeError::internal("node reported failure with no error detail"));
                    if err.is_retryable() && attempt < retry.max_attempts {
                        attempt += 1;
                        tokio::time::sleep(retry.delay_for_attempt(attempt)).await;
                        continue;
                    }
                    return (node_id.clone(), NodeResult::failed_with_output(&node_id, &err, output, started_at, Utc::now(), attempt));
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkpoint::test_util::InMemoryCheckpointWriter;
    use crate::models::{Edge, NodeDefinition};
    use crate::waits::test_util::InMemoryWaitTicketStore;
    use nodes::mock::MockNode;
    use serde_json::json;

    fn node(id: &str, kind: NodeKind) -> NodeDefinition {
        NodeDefinition { id: id.to_string(), name: id.to_string(), kind, config: json!({}), timeout: Some(1_000), retry: None }
    }

    fn edge(from: &str, to: &str) -> Edge {
        Edge { source_node_id: from.into(), target_node_id: to.into(), condition: None }
    }

    fn cond_edge(from: &str, to: &str, condition: &str) -> Edge {
        Edge { source_node_id: from.into(), target_node_id: to.into(), condition: Some(condition.into()) }
    }

    struct NoopExternalStore;

    #[async_trait::async_trait]
    impl db::external::ExternalStore for NoopExternalStore {
        async fn put(&self, _digest: &str, _value: &Value) -> Result<(), db::DbError> {
            Ok(())
        }
        async fn get(&self, _digest: &str) -> Result<Value, db::DbError> {
            Ok(Value::Null)
        }
    }

    fn test_scheduler(registry: NodeRegistry) -> (Scheduler, Arc<InMemoryCheckpointWriter>) {
        let checkpoint = InMemoryCheckpointWriter::new();
        let wait_store = InMemoryWaitTicketStore::new();
        let scheduler = Scheduler::new(Arc::new(registry), checkpoint.clone(), wait_store, Arc::new(NoopExternalStore), SchedulerConfig::default());
        (scheduler, checkpoint)
    }

    #[tokio::test]
    async fn linear_chain_runs_in_order_and_completes() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::Log, Arc::new(MockNode::returning("l", json!({}))));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let wf = Workflow::new("linear", vec![node("a", NodeKind::Trigger), node("b", NodeKind::Log), node("c", NodeKind::Log)], vec![edge("a", "b"), edge("b", "c")]);
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.node_results.len(), 3);
    }

    #[tokio::test]
    async fn conditional_branch_prunes_the_false_side() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::If, Arc::new(MockNode::returning("i", json!({}))));
        registry.insert(NodeKind::Log, Arc::new(MockNode::returning("l", json!({}))));
        registry.insert(NodeKind::End, Arc::new(MockNode::returning("e", json!({}))));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let wf = Workflow::new(
            "branch",
            vec![node("t", NodeKind::Trigger), node("i", NodeKind::If), node("a", NodeKind::Log), node("b", NodeKind::Log), node("end", NodeKind::End)],
            vec![edge("t", "i"), cond_edge("i", "a", "true"), cond_edge("i", "b", "false"), edge("a", "end"), edge("b", "end")],
        );
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert!(outcome.node_results.contains_key("a"));
        assert!(!outcome.node_results.contains_key("b"));
        assert!(outcome.node_results.contains_key("end"));
    }

    #[tokio::test]
    async fn merge_waits_for_both_predecessors() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::Log, Arc::new(MockNode::returning("l", json!({}))));
        registry.insert(NodeKind::Merge, Arc::new(MockNode::returning("m", json!({}))));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let wf = Workflow::new(
            "join",
            vec![node("t", NodeKind::Trigger), node("a", NodeKind::Log), node("b", NodeKind::Log), node("m", NodeKind::Merge)],
            vec![edge("t", "a"), edge("t", "b"), edge("a", "m"), edge("b", "m")],
        );
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Completed);
        assert_eq!(outcome.node_results.len(), 4);
    }

    #[tokio::test]
    async fn http_retry_eventually_fails_after_exhausting_attempts() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::Http, Arc::new(MockNode::failing_retryable("h", "boom")));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let mut h = node("h", NodeKind::Http);
        h.retry = Some(RetryPolicy { max_attempts: 2, backoff_base_ms: 1, backoff_factor: 1.0 });
        let wf = Workflow::new("retry", vec![node("t", NodeKind::Trigger), h], vec![edge("t", "h")]);
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Failed);
        let h_result = &outcome.node_results["h"];
        assert_eq!(h_result.status, NodeStatus::Failed);
        assert_eq!(h_result.retry_count, 2);
    }

    #[tokio::test]
    async fn wait_node_suspends_execution() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::Wait, Arc::new(MockNode::waiting("w", json!({"waitTicket": "tix-1"}))));
        let (scheduler, checkpoint) = test_scheduler(registry);

        let wf = Workflow::new("wait", vec![node("t", NodeKind::Trigger), node("w", NodeKind::Wait)], vec![edge("t", "w")]);
        let execution_id = Uuid::new_v4();
        let outcome = scheduler.launch(wf, execution_id, None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Waiting);
        assert_eq!(checkpoint.status_of(execution_id), Some(ExecutionStatus::Waiting));
    }

    #[tokio::test]
    async fn merge_through_the_real_registry_sees_surviving_predecessors() {
        // Exercises the actual `nodes::default_registry` MergeNode/EndNode
        // rather than MockNode, to confirm the scheduler really injects
        // `_predecessorIds` (spec §4.5 example scenario 3: Join).
        let registry = nodes::default_registry(reqwest::Client::new(), sandbox::SandboxPool::new(1));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let wf = Workflow::new(
            "join-real",
            vec![node("t", NodeKind::Trigger), node("a", NodeKind::Trigger), node("b", NodeKind::Trigger), node("m", NodeKind::Merge), node("end", NodeKind::End)],
            vec![edge("t", "a"), edge("t", "b"), edge("a", "m"), edge("b", "m"), edge("m", "end")],
        );
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Completed);
        let merged = &outcome.node_results["m"].output;
        assert_eq!(merged["count"], 2);
        assert!(merged["nodeIds"].as_array().unwrap().contains(&json!("a")));
        assert!(merged["nodeIds"].as_array().unwrap().contains(&json!("b")));

        let end_output = &outcome.node_results["end"].output;
        assert_eq!(end_output["m"]["count"], 2);
    }

    #[tokio::test]
    async fn failure_aborts_downstream_nodes() {
        let mut registry: NodeRegistry = HashMap::new();
        registry.insert(NodeKind::Trigger, Arc::new(MockNode::returning("t", json!({}))));
        registry.insert(NodeKind::Http, Arc::new(MockNode::failing_fatal("h", "nope")));
        registry.insert(NodeKind::Log, Arc::new(MockNode::returning("l", json!({}))));
        let (scheduler, _checkpoint) = test_scheduler(registry);

        let wf = Workflow::new("abort", vec![node("t", NodeKind::Trigger), node("h", NodeKind::Http), node("l", NodeKind::Log)], vec![edge("t", "h"), edge("h", "l")]);
        let outcome = scheduler.launch(wf, Uuid::new_v4(), None, json!({})).await.unwrap();

        assert_eq!(outcome.status, ExecutionStatus::Failed);
        assert!(!outcome.node_results.contains_key("l"));
    }
}
