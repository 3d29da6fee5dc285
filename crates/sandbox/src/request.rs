//! The invocation protocol between a node executor and a leased sandbox
//! instance (spec §4.4).

use std::time::Duration;

use serde_json::Value;

/// A single script invocation. `input`/`global`/`system`/`nodes` become the
/// `__input`/`__global`/`__system`/`nodes` globals visible to the script.
#[derive(Debug, Clone)]
pub struct ScriptRequest {
    pub code: String,
    pub input: Value,
    pub global: Value,
    pub system: Value,
    pub nodes: Value,
    pub timeout: Duration,
}

/// `{ returnValue, capturedOutput, durationMs, success }` per spec §4.4.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    pub return_value: Value,
    pub captured_output: Vec<String>,
    pub duration_ms: u64,
    pub success: bool,
}
