//! Checkpoint repository functions (spec §4.7).
//!
//! One row per execution in `execution_checkpoints`, upserted as the
//! scheduler progresses. `node_results` accumulates as a JSON object keyed
//! by node id; `in_degree` and `completed` are overwritten wholesale on
//! every write since the scheduler always has the full current snapshot.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::CheckpointRow, DbError};

/// Create the checkpoint row for a freshly started execution.
pub async fn start_execution(
    pool: &PgPool,
    execution_id: Uuid,
    workflow_id: Uuid,
    tenant_id: Option<&str>,
    definition: &serde_json::Value,
    input: &serde_json::Value,
) -> Result<(), DbError> {
    let now = Utc::now();
    sqlx::query!(
        r#"
        INSERT INTO execution_checkpoints
            (execution_id, workflow_id, tenant_id, status, in_degree, completed, node_results, input, error_message, started_at, updated_at, finished_at)
        VALUES ($1, $2, $3, 'running', '{}'::jsonb, '[]'::jsonb, '{}'::jsonb, $4, NULL, $5, $5, NULL)
        "#,
        execution_id,
        workflow_id,
        tenant_id,
        input,
        now,
    )
    .execute(pool)
    .await?;

    // `definition` is stored in the workflows table, not duplicated here;
    // referencing it keeps the signature stable if callers later want an
    // execution-time snapshot of the workflow body.
    let _ = definition;

    Ok(())
}

/// Liveness marker recorded when the scheduler dispatches a node. Not load
/// bearing for recovery (the checkpoint's `in_degree`/`completed` snapshot
/// is what recovery reads) but lets operators see a node is in flight.
pub async fn log_node_start(pool: &PgPool, execution_id: Uuid, node_id: &str, _input_snapshot: &serde_json::Value) -> Result<(), DbError> {
    sqlx::query!(
        r#"UPDATE execution_checkpoints SET updated_at = $1 WHERE execution_id = $2"#,
        Utc::now(),
        execution_id,
    )
    .execute(pool)
    .await?;
    let _ = node_id;
    Ok(())
}

/// Durably record a node's completion: merge its result into the
/// `node_results` map and overwrite the in-degree/completed snapshot.
pub async fn upsert_checkpoint(
    pool: &PgPool,
    execution_id: Uuid,
    node_id: &str,
    result: &serde_json::Value,
    in_degree: &serde_json::Value,
    completed: &[String],
    at: DateTime<Utc>,
) -> Result<(), DbError> {
    let completed_json = serde_json::to_value(completed).unwrap_or(serde_json::Value::Array(vec![]));
    sqlx::query!(
        r#"
        UPDATE execution_checkpoints
        SET in_degree = $1,
            completed = $2,
            node_results = jsonb_set(node_results, ARRAY[$3], $4, true),
            updated_at = $5
        WHERE execution_id = $6
        "#,
        in_degree,
        completed_json,
        node_id,
        result,
        at,
        execution_id,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Mark the execution terminal (spec §4.6: Completed/Failed/Cancelled) or
/// transition it to `waiting` when a `wait` node suspends it.
pub async fn finish_execution(pool: &PgPool, execution_id: Uuid, status: &str, error_message: Option<&str>) -> Result<(), DbError> {
    let is_terminal = matches!(status, "completed" | "failed" | "cancelled");
    if is_terminal {
        sqlx::query!(
            r#"UPDATE execution_checkpoints SET status = $1, error_message = $2, finished_at = $3, updated_at = $3 WHERE execution_id = $4"#,
            status,
            error_message,
            Utc::now(),
            execution_id,
        )
        .execute(pool)
        .await?;
    } else {
        sqlx::query!(
            r#"UPDATE execution_checkpoints SET status = $1, error_message = $2, updated_at = $3 WHERE execution_id = $4"#,
            status,
            error_message,
            Utc::now(),
            execution_id,
        )
        .execute(pool)
        .await?;
    }
    Ok(())
}

/// Fetch the current checkpoint for an execution — the entry point for
/// crash recovery (spec §4.8).
pub async fn get_checkpoint(pool: &PgPool, execution_id: Uuid) -> Result<CheckpointRow, DbError> {
    let row = sqlx::query_as!(
        CheckpointRow,
        r#"
        SELECT execution_id, workflow_id, tenant_id, status, in_degree, completed, node_results, input, error_message, started_at, updated_at, finished_at
        FROM execution_checkpoints
        WHERE execution_id = $1
        "#,
        execution_id,
    )
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)?;

    Ok(row)
}
