//! `engine` crate — core domain models, DAG validation, and the execution engine.

pub mod checkpoint;
pub mod dag;
pub mod dispatch;
pub mod error;
pub mod models;
pub mod recovery;
pub mod scheduler;
pub mod waits;

pub use dag::{validate, ValidatedGraph};
pub use error::EngineError;
pub use models::{Edge, ExecutionStatus, NodeDefinition, Workflow};
pub use scheduler::{ExecutionOutcome, Scheduler, SchedulerConfig};
