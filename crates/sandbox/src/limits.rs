//! Per-invocation resource limits (spec §4.4).

use std::time::Duration;

pub const DEFAULT_WALL_CLOCK_MS: u64 = 5_000;

/// Bounds enforced on a single script invocation. Exceeding any of these
/// raises [`crate::SandboxError::ResourceLimit`].
#[derive(Debug, Clone)]
pub struct ResourceLimits {
    pub wall_clock: Duration,
    pub statement_cap: Option<u64>,
    pub memory_cap_bytes: Option<usize>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            wall_clock: Duration::from_millis(DEFAULT_WALL_CLOCK_MS),
            statement_cap: None,
            memory_cap_bytes: None,
        }
    }
}
