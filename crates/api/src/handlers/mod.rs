pub mod executions;
pub mod history;
pub mod resume;
pub mod webhooks;
pub mod workflows;

pub(crate) use crate::AppState;
