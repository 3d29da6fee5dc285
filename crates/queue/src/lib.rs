//! Background worker: polls `job_queue`, and drives each job through the
//! engine's [`Scheduler`] (spec §6's job queue surface).
//!
//! Grounded on the `db::repository::jobs` `SELECT ... FOR UPDATE SKIP
//! LOCKED` polling contract — this crate is the consumer side of that
//! queue, the producer side being the `api` crate's execute/webhook
//! handlers.

use std::sync::Arc;
use std::time::Duration;

use engine::{EngineError, Scheduler};
use tracing::{error, info, warn};

/// How often the worker polls `job_queue` when it finds nothing to do.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Run the worker loop until the process is killed. Never returns under
/// normal operation.
pub async fn run(pool: db::DbPool, scheduler: Arc<Scheduler>, poll_interval: Duration) -> ! {
    info!("worker polling job_queue every {poll_interval:?}");
    loop {
        match db::repository::jobs::fetch_next_job(&pool).await {
            Ok(Some(job)) => {
                if let Err(e) = process_job(&pool, &scheduler, &job).await {
                    error!(job_id = %job.id, error = %e, "job failed");
                }
            }
            Ok(None) => tokio::time::sleep(poll_interval).await,
            Err(e) => {
                warn!(error = %e, "failed to poll job_queue, backing off");
                tokio::time::sleep(poll_interval).await;
            }
        }
    }
}

async fn process_job(pool: &db::DbPool, scheduler: &Scheduler, job: &db::models::JobRow) -> Result<(), EngineError> {
    let workflow_row = db::repository::workflows::get_workflow(pool, job.workflow_id).await?;
    let workflow: engine::Workflow = serde_json::from_value(workflow_row.definition).map_err(|e| EngineError::Internal(format!("corrupt workflow definition: {e}")))?;
    let tenant_id = workflow.tenant_id.clone();

    let result = scheduler.launch(workflow, job.execution_id, tenant_id, job.payload.clone()).await;

    match result {
        Ok(outcome) if outcome.status != engine::ExecutionStatus::Failed => {
            db::repository::jobs::complete_job(pool, job.id).await?;
            Ok(())
        }
        Ok(outcome) => {
            db::repository::jobs::fail_job(pool, job.id, job.max_attempts).await?;
            Err(EngineError::Internal(format!("execution '{}' finished failed", outcome.execution_id)))
        }
        Err(e) => {
            db::repository::jobs::fail_job(pool, job.id, job.max_attempts).await?;
            Err(e)
        }
    }
}
