use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use super::AppState;
use engine::EngineError;

pub async fn history(Path(execution_id): Path<Uuid>, State(state): State<AppState>) -> Result<Json<engine::ExecutionOutcome>, StatusCode> {
    match state.scheduler.node_history(execution_id).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(EngineError::ExecutionNotFound(_)) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
