//! Typed error type for the sandbox crate.

use thiserror::Error;

/// Errors a script invocation or a pool lease can fail with (spec §4.4).
#[derive(Debug, Error, Clone)]
pub enum SandboxError {
    /// Pool was empty and at its hard cap when a lease was requested.
    #[error("script sandbox pool exhausted")]
    Unavailable,

    /// A wall-clock, statement-count, or memory bound was exceeded.
    #[error("resource limit exceeded: {0}")]
    ResourceLimit(String),

    /// The script threw, or failed to parse/compile.
    #[error("script runtime error: {0}")]
    Runtime(String),
}
