//! Built-in `ExecutableNode` implementations, one module per node kind
//! (spec §4.5).

pub mod end;
pub mod http;
pub mod if_node;
pub mod log;
pub mod merge;
pub mod script;
pub mod trigger;
pub mod wait;
