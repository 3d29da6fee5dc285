use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use super::AppState;
use engine::EngineError;

pub async fn resume(Path(ticket): Path<String>, State(state): State<AppState>, Json(payload): Json<Value>) -> Result<Json<engine::ExecutionOutcome>, StatusCode> {
    match state.scheduler.resume_wait(&ticket, payload).await {
        Ok(outcome) => Ok(Json(outcome)),
        Err(EngineError::UnknownWaitTicket(_)) => Err(StatusCode::NOT_FOUND),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}
