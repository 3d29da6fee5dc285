use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use uuid::Uuid;

use super::AppState;
use db::repository::{executions as exec_repo, jobs as job_repo, workflows as wf_repo};
use engine::Workflow;
use nodes::NodeKind;

/// Find the workflow whose `trigger`-kind node is configured with the given
/// webhook path. A workflow's webhook trigger is just its `trigger` node's
/// `config.webhookPath` field — there's no separate trigger type registry,
/// since `NodeKind::Trigger` is itself the trigger (spec §3).
fn matches_webhook_path(definition: &Value, path: &str) -> bool {
    let Ok(workflow) = serde_json::from_value::<Workflow>(definition.clone()) else {
        return false;
    };
    workflow
        .nodes
        .iter()
        .filter(|n| n.kind == NodeKind::Trigger)
        .any(|n| n.config.get("webhookPath").and_then(Value::as_str) == Some(path))
}

pub async fn handle_webhook(
    Path(path): Path<String>,
    State(state): State<AppState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), StatusCode> {
    let workflows = match wf_repo::list_workflows(&state.pool).await {
        Ok(wfs) => wfs,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    let Some(wf_row) = workflows.into_iter().find(|w| matches_webhook_path(&w.definition, &path)) else {
        return Err(StatusCode::NOT_FOUND);
    };

    let execution_id = Uuid::new_v4();
    let exec = match exec_repo::create_execution(&state.pool, execution_id, wf_row.id).await {
        Ok(e) => e,
        Err(_) => return Err(StatusCode::INTERNAL_SERVER_ERROR),
    };

    if job_repo::enqueue_job(&state.pool, exec.id, wf_row.id, payload.clone()).await.is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    Ok((StatusCode::ACCEPTED, Json(serde_json::json!({"executionId": exec.id, "message": "webhook accepted"}))))
}
