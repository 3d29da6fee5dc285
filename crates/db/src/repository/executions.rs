//! Execution and node-execution repository functions.

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{DbError, models::WorkflowExecutionRow};

// ---------------------------------------------------------------------------
// workflow_executions
// ---------------------------------------------------------------------------

/// Create a new workflow execution record under a caller-chosen id — the
/// scheduler generates `execution_id` up front so the same id threads
/// through this row, the `execution_checkpoints` row, and the queue job.
///
/// Idempotent on `id`: the API layer creates this row up front (so
/// `job_queue`'s foreign key is satisfiable at enqueue time), and the
/// scheduler calls this again from [`crate::repository::checkpoints::start_execution`]'s
/// caller when it actually launches the run — the second call is a no-op
/// update rather than a conflicting insert.
pub async fn create_execution(
    pool: &PgPool,
    execution_id: Uuid,
    workflow_id: Uuid,
) -> Result<WorkflowExecutionRow, DbError> {
    let now = Utc::now();

    let row = sqlx::query_as!(
        WorkflowExecutionRow,
        r#"
        INSERT INTO workflow_executions (id, workflow_id, status, started_at)
        VALUES ($1, $2, 'running', $3)
        ON CONFLICT (id) DO UPDATE SET workflow_id = EXCLUDED.workflow_id
        RETURNING id, workflow_id, status, started_at, finished_at
        "#,
        execution_id,
        workflow_id,
        now,
    )
    .fetch_one(pool)
    .await?;

    Ok(row)
}

/// Update the `status` (and optionally `finished_at`) of a workflow execution.
pub async fn update_execution_status(
    pool: &PgPool,
    execution_id: Uuid,
    status: &str,
    finished: bool,
) -> Result<(), DbError> {
    if finished {
        sqlx::query!(
            r#"
            UPDATE workflow_executions
            SET status = $1, finished_at = $2
            WHERE id = $3
            "#,
            status,
            Utc::now(),
            execution_id,
        )
        .execute(pool)
        .await?;
    } else {
        sqlx::query!(
            r#"UPDATE workflow_executions SET status = $1 WHERE id = $2"#,
            status,
            execution_id,
        )
        .execute(pool)
        .await?;
    }

    Ok(())
}
