//! `sandbox` — C4: a pooled, capability-restricted JavaScript runtime for
//! `script` nodes, built on `rquickjs`.
//!
//! QuickJS contexts are thread-confined (`!Send`); see [`sandbox::SandboxWorker`]
//! for how the pool reconciles that with an async-facing `execute` call.

mod error;
mod host;
mod limits;
mod pool;
mod request;
mod sandbox;

pub use error::SandboxError;
pub use limits::ResourceLimits;
pub use pool::SandboxPool;
pub use request::{ScriptOutcome, ScriptRequest};
