//! Bounded pool of pre-created sandbox instances (spec §4.4 Threading).
//!
//! Sized to `available_parallelism()` by default, growing lazily up to a
//! hard cap; exhaustion at the cap is reported as `SandboxError::Unavailable`
//! rather than queuing indefinitely.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, Mutex};

use crate::error::SandboxError;
use crate::request::{ScriptOutcome, ScriptRequest};
use crate::sandbox::{limits_with_timeout, SandboxWorker};

const DEFAULT_LEASE_WAIT: Duration = Duration::from_secs(2);

pub struct SandboxPool {
    idle_tx: mpsc::Sender<Arc<SandboxWorker>>,
    idle_rx: Mutex<mpsc::Receiver<Arc<SandboxWorker>>>,
    spawned: AtomicUsize,
    cap: usize,
    lease_wait: Duration,
}

impl SandboxPool {
    /// `cap` is the hard ceiling on concurrently-live sandbox threads.
    pub fn new(cap: usize) -> Arc<Self> {
        let cap = cap.max(1);
        let (idle_tx, idle_rx) = mpsc::channel(cap);
        Arc::new(Self { idle_tx, idle_rx: Mutex::new(idle_rx), spawned: AtomicUsize::new(0), cap, lease_wait: DEFAULT_LEASE_WAIT })
    }

    /// Size the pool at the host's available parallelism, per spec §4.4's
    /// stated default.
    pub fn with_default_size() -> Arc<Self> {
        let cap = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(4);
        Self::new(cap)
    }

    async fn lease(&self) -> Result<Arc<SandboxWorker>, SandboxError> {
        {
            let mut idle = self.idle_rx.lock().await;
            if let Ok(worker) = idle.try_recv() {
                return Ok(worker);
            }
        }

        if self.spawned.fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| if n < self.cap { Some(n + 1) } else { None }).is_ok() {
            return Ok(SandboxWorker::spawn());
        }

        let mut idle = self.idle_rx.lock().await;
        match tokio::time::timeout(self.lease_wait, idle.recv()).await {
            Ok(Some(worker)) => Ok(worker),
            _ => Err(SandboxError::Unavailable),
        }
    }

    async fn release(&self, worker: Arc<SandboxWorker>) {
        let _ = self.idle_tx.send(worker).await;
    }

    pub async fn execute(&self, request: ScriptRequest) -> Result<ScriptOutcome, SandboxError> {
        let worker = self.lease().await?;
        let limits = limits_with_timeout(request.timeout);
        let result = worker.run(request, limits).await;
        self.release(worker).await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(code: &str) -> ScriptRequest {
        ScriptRequest {
            code: code.to_string(),
            input: json!({}),
            global: json!({}),
            system: json!({}),
            nodes: json!({}),
            timeout: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn a_leased_worker_is_returned_to_the_pool_after_use() {
        let pool = SandboxPool::new(1);
        let first = pool.execute(request("return 1;")).await.unwrap();
        assert_eq!(first.return_value, json!(1));
        let second = pool.execute(request("return 2;")).await.unwrap();
        assert_eq!(second.return_value, json!(2));
        assert_eq!(pool.spawned.load(Ordering::SeqCst), 1);
    }
}
