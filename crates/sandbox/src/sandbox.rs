//! A single, thread-confined QuickJS instance.
//!
//! `rquickjs::Context` is `!Send`, so each pooled instance lives on its own
//! dedicated OS thread; callers hand it work over a channel rather than
//! moving the context itself (spec §4.4 Threading / spec §5 Shared
//! resources: "leases are thread-confined").

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use rquickjs::{Context, Runtime};

use crate::error::SandboxError;
use crate::host;
use crate::limits::ResourceLimits;
use crate::request::{ScriptOutcome, ScriptRequest};

pub(crate) struct Job {
    pub request: ScriptRequest,
    pub limits: ResourceLimits,
    pub respond: tokio::sync::oneshot::Sender<Result<ScriptOutcome, SandboxError>>,
}

/// Handle to a worker thread. `tx` is the only thing that crosses thread
/// boundaries; the QuickJS runtime/context never leave the worker thread.
pub(crate) struct SandboxWorker {
    tx: std::sync::mpsc::Sender<Job>,
}

impl SandboxWorker {
    pub fn spawn() -> Arc<Self> {
        let (tx, rx) = std::sync::mpsc::channel::<Job>();
        std::thread::Builder::new()
            .name("script-sandbox".into())
            .spawn(move || worker_loop(rx))
            .expect("failed to spawn sandbox worker thread");
        Arc::new(Self { tx })
    }

    pub async fn run(&self, request: ScriptRequest, limits: ResourceLimits) -> Result<ScriptOutcome, SandboxError> {
        let (respond, recv) = tokio::sync::oneshot::channel();
        self.tx
            .send(Job { request, limits, respond })
            .map_err(|_| SandboxError::Runtime("sandbox worker thread terminated".into()))?;
        recv.await.map_err(|_| SandboxError::Runtime("sandbox worker thread dropped the response channel".into()))?
    }
}

fn worker_loop(rx: std::sync::mpsc::Receiver<Job>) {
    while let Ok(job) = rx.recv() {
        let result = execute_one(job.request, job.limits);
        let _ = job.respond.send(result);
    }
}

fn to_js_literal(value: &serde_json::Value) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".into())
}

fn execute_one(request: ScriptRequest, limits: ResourceLimits) -> Result<ScriptOutcome, SandboxError> {
    let started = Instant::now();

    let runtime = Runtime::new().map_err(|e| SandboxError::Runtime(format!("failed to create runtime: {e}")))?;
    if let Some(bytes) = limits.memory_cap_bytes {
        runtime.set_memory_limit(bytes);
    }

    let deadline = started + limits.wall_clock;
    let statement_cap = limits.statement_cap;
    let statement_count = Arc::new(std::sync::atomic::AtomicU64::new(0));
    let limit_hit = Arc::new(Mutex::new(None::<SandboxError>));

    {
        let statement_count = statement_count.clone();
        let limit_hit = limit_hit.clone();
        runtime.set_interrupt_handler(Some(Box::new(move || {
            if Instant::now() >= deadline {
                *limit_hit.lock().unwrap() = Some(SandboxError::ResourceLimit("wall-clock timeout exceeded".into()));
                return true;
            }
            if let Some(cap) = statement_cap {
                let count = statement_count.fetch_add(1, std::sync::atomic::Ordering::Relaxed) + 1;
                if count > cap {
                    *limit_hit.lock().unwrap() = Some(SandboxError::ResourceLimit("statement count exceeded".into()));
                    return true;
                }
            }
            false
        })));
    }

    let context = Context::full(&runtime).map_err(|e| SandboxError::Runtime(format!("failed to create context: {e}")))?;

    let captured_output = Arc::new(Mutex::new(Vec::new()));

    let eval_result: Result<serde_json::Value, SandboxError> = context.with(|ctx| {
        host::install(&ctx, captured_output.clone()).map_err(|e| SandboxError::Runtime(format!("host setup failed: {e}")))?;

        let globals = ctx.globals();
        let bind = |name: &str, value: &serde_json::Value| -> Result<(), SandboxError> {
            let js_value: rquickjs::Value = ctx
                .eval(format!("({})", to_js_literal(value)))
                .map_err(|e| SandboxError::Runtime(format!("failed to bind {name}: {e}")))?;
            globals.set(name, js_value).map_err(|e| SandboxError::Runtime(format!("failed to set {name}: {e}")))?;
            Ok(())
        };
        bind("__input", &request.input)?;
        bind("__global", &request.global)?;
        bind("__system", &request.system)?;
        bind("nodes", &request.nodes)?;

        let wrapped = format!("(function() {{\n{}\n}})()", request.code);
        let result: rquickjs::Result<rquickjs::Value> = ctx.eval(wrapped);

        match result {
            Ok(value) => {
                if value.is_undefined() {
                    Ok(serde_json::Value::Null)
                } else {
                    let json_str = ctx
                        .json_stringify(value)
                        .map_err(|e| SandboxError::Runtime(format!("failed to serialize return value: {e}")))?;
                    match json_str {
                        Some(s) => {
                            let text = s.to_string().map_err(|e| SandboxError::Runtime(format!("{e}")))?;
                            serde_json::from_str(&text).map_err(|e| SandboxError::Runtime(format!("invalid return value: {e}")))
                        }
                        None => Ok(serde_json::Value::Null),
                    }
                }
            }
            Err(e) => {
                if let Some(hit) = limit_hit.lock().unwrap().take() {
                    Err(hit)
                } else {
                    Err(SandboxError::Runtime(format!("{e}")))
                }
            }
        }
    });

    let duration_ms = started.elapsed().as_millis() as u64;
    let captured = captured_output.lock().unwrap().clone();

    match eval_result {
        Ok(return_value) => Ok(ScriptOutcome { return_value, captured_output: captured, duration_ms, success: true }),
        Err(e) => Err(e),
    }
}

pub fn default_limits() -> ResourceLimits {
    ResourceLimits::default()
}

pub fn limits_with_timeout(timeout: Duration) -> ResourceLimits {
    ResourceLimits { wall_clock: timeout, ..ResourceLimits::default() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request(code: &str) -> ScriptRequest {
        ScriptRequest {
            code: code.to_string(),
            input: json!({ "n": 2 }),
            global: json!({}),
            system: json!({}),
            nodes: json!({}),
            timeout: Duration::from_millis(500),
        }
    }

    #[test]
    fn returns_the_top_level_return_value() {
        let outcome = execute_one(request("return __input.n * 21;"), default_limits()).unwrap();
        assert_eq!(outcome.return_value, json!(42));
        assert!(outcome.success);
    }

    #[test]
    fn log_calls_are_captured() {
        let outcome = execute_one(request("log('hi'); return null;"), default_limits()).unwrap();
        assert_eq!(outcome.captured_output, vec!["hi".to_string()]);
    }

    #[test]
    fn thrown_exceptions_surface_as_runtime_errors() {
        let err = execute_one(request("throw new Error('boom');"), default_limits()).unwrap_err();
        assert!(matches!(err, SandboxError::Runtime(_)));
    }

    #[test]
    fn infinite_loop_is_stopped_by_the_wall_clock_timeout() {
        let limits = limits_with_timeout(Duration::from_millis(50));
        let err = execute_one(request("while (true) {}"), limits).unwrap_err();
        assert!(matches!(err, SandboxError::ResourceLimit(_)));
    }
}
