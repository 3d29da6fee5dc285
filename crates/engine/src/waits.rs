//! Wait ticket store — the durable half of the `wait` node's suspend/resume
//! cycle (spec §4.5, §4.6). Mirrors the [`crate::checkpoint::CheckpointWriter`]
//! split between a `db`-backed production implementation and an in-memory
//! double for scheduler tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::EngineError;

/// Outcome of a resume attempt against a ticket, distinguishing "this call
/// performed the transition" from "already resumed" so callers can answer
/// duplicate webhook deliveries idempotently (spec §4.6).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WaitResumption {
    First { execution_id: Uuid, node_id: String },
    AlreadyResumed { execution_id: Uuid },
    NotFound,
}

#[async_trait]
pub trait WaitTicketStore: Send + Sync {
    async fn create_ticket(&self, execution_id: Uuid, node_id: &str, ticket: &str) -> Result<(), EngineError>;

    async fn resume(&self, ticket: &str, payload: &serde_json::Value) -> Result<WaitResumption, EngineError>;
}

/// `db`-backed implementation over the `wait_tickets` table.
pub struct DbWaitTicketStore {
    pool: db::DbPool,
}

impl DbWaitTicketStore {
    pub fn new(pool: db::DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl WaitTicketStore for DbWaitTicketStore {
    async fn create_ticket(&self, execution_id: Uuid, node_id: &str, ticket: &str) -> Result<(), EngineError> {
        db::repository::waits::create_ticket(&self.pool, ticket, execution_id, node_id).await?;
        Ok(())
    }

    async fn resume(&self, ticket: &str, payload: &serde_json::Value) -> Result<WaitResumption, EngineError> {
        let first = db::repository::waits::resume_ticket(&self.pool, ticket, payload).await?;
        if first {
            let row = db::repository::waits::get_ticket(&self.pool, ticket)
                .await?
                .ok_or_else(|| EngineError::Internal(format!("wait ticket '{ticket}' vanished after resume")))?;
            return Ok(WaitResumption::First { execution_id: row.execution_id, node_id: row.node_id });
        }
        match db::repository::waits::get_ticket(&self.pool, ticket).await? {
            Some(row) if row.resumed_at.is_some() => Ok(WaitResumption::AlreadyResumed { execution_id: row.execution_id }),
            _ => Ok(WaitResumption::NotFound),
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_util {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::HashMap;
    use std::sync::Arc;

    #[derive(Default)]
    pub struct InMemoryWaitTicketStore {
        tickets: Mutex<HashMap<String, (Uuid, String, bool)>>,
    }

    impl InMemoryWaitTicketStore {
        pub fn new() -> Arc<Self> {
            Arc::new(Self::default())
        }
    }

    #[async_trait]
    impl WaitTicketStore for InMemoryWaitTicketStore {
        async fn create_ticket(&self, execution_id: Uuid, node_id: &str, ticket: &str) -> Result<(), EngineError> {
            self.tickets.lock().insert(ticket.to_string(), (execution_id, node_id.to_string(), false));
            Ok(())
        }

        async fn resume(&self, ticket: &str, _payload: &serde_json::Value) -> Result<WaitResumption, EngineError> {
            let mut tickets = self.tickets.lock();
            let Some(entry) = tickets.get_mut(ticket) else {
                return Ok(WaitResumption::NotFound);
            };
            let (execution_id, node_id, resumed) = entry;
            if *resumed {
                return Ok(WaitResumption::AlreadyResumed { execution_id: *execution_id });
            }
            *resumed = true;
            Ok(WaitResumption::First { execution_id: *execution_id, node_id: node_id.clone() })
        }
    }
}
