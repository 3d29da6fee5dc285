//! Wait ticket repository functions (spec §4.5, §4.6).
//!
//! A `wait` node suspends execution and issues a ticket; resume is
//! idempotent per ticket — a second resume call for an already-resumed
//! ticket is a no-op success, not an error (spec §4.6).

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use crate::{models::WaitTicketRow, DbError};

pub async fn create_ticket(pool: &PgPool, ticket: &str, execution_id: Uuid, node_id: &str) -> Result<(), DbError> {
    sqlx::query!(
        r#"
        INSERT INTO wait_tickets (ticket, execution_id, node_id, created_at, resumed_at, resume_payload)
        VALUES ($1, $2, $3, $4, NULL, NULL)
        "#,
        ticket,
        execution_id,
        node_id,
        Utc::now(),
    )
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get_ticket(pool: &PgPool, ticket: &str) -> Result<Option<WaitTicketRow>, DbError> {
    let row = sqlx::query_as!(
        WaitTicketRow,
        r#"SELECT ticket, execution_id, node_id, created_at, resumed_at, resume_payload FROM wait_tickets WHERE ticket = $1"#,
        ticket,
    )
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Record a resume. Returns `true` if this call performed the transition
/// (first resume), `false` if the ticket was already resumed.
pub async fn resume_ticket(pool: &PgPool, ticket: &str, payload: &serde_json::Value) -> Result<bool, DbError> {
    let result = sqlx::query!(
        r#"
        UPDATE wait_tickets
        SET resumed_at = $1, resume_payload = $2
        WHERE ticket = $3 AND resumed_at IS NULL
        "#,
        Utc::now(),
        payload,
        ticket,
    )
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}
