//! Node-level error type.
//!
//! Every variant carries the machine-readable `kind` that the scheduler's
//! retry policy switches on (spec §7). The original scaffold's two-variant
//! `Retryable`/`Fatal` enum collapses into this richer taxonomy;
//! `is_retryable()` is the single predicate the engine consults.

use thiserror::Error;

/// Machine-readable error kind, independent of the human-readable message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    UnresolvedVariable,
    ExpressionParse,
    ExpressionRuntime,
    SecurityViolation,
    ResourceLimit,
    Timeout,
    RemoteFailure,
    Internal,
}

impl ErrorKind {
    /// Whether the scheduler's retry policy should ever re-attempt a node
    /// that failed with this kind.
    pub fn is_retryable_kind(self) -> bool {
        matches!(self, ErrorKind::Timeout | ErrorKind::RemoteFailure)
    }

    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::UnresolvedVariable => "unresolved-variable",
            ErrorKind::ExpressionParse => "expression-parse",
            ErrorKind::ExpressionRuntime => "expression-runtime",
            ErrorKind::SecurityViolation => "security-violation",
            ErrorKind::ResourceLimit => "resource-limit",
            ErrorKind::Timeout => "timeout",
            ErrorKind::RemoteFailure => "remote-failure",
            ErrorKind::Internal => "internal",
        }
    }
}

/// Errors returned by a node's `execute` method.
///
/// The scheduler reads `.kind()` to decide retry behaviour: kinds for
/// which [`ErrorKind::is_retryable_kind`] is true are re-queued with
/// exponential back-off (subject to the node's `RetryPolicy`); all others
/// abort the execution without retry.
#[derive(Debug, Error, Clone)]
#[error("{kind:?}: {message}")]
pub struct NodeError {
    pub kind: ErrorKind,
    pub message: String,
    /// A stack-trace-equivalent, when the failure originated from a
    /// sandboxed script or another source that can produce one.
    pub stack_trace: Option<String>,
}

impl NodeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), stack_trace: None }
    }

    pub fn with_stack_trace(mut self, stack_trace: impl Into<String>) -> Self {
        self.stack_trace = Some(stack_trace.into());
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn unresolved_variable(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnresolvedVariable, format!("unresolved variable: {}", path.into()))
    }

    pub fn expression_parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExpressionParse, message)
    }

    pub fn expression_runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExpressionRuntime, message)
    }

    pub fn security_violation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::SecurityViolation, message)
    }

    pub fn resource_limit(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ResourceLimit, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    pub fn remote_failure(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::RemoteFailure, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable_kind()
    }
}
