//! Consumers of the change events produced by the pipeline.
//!
//! Sinks receive [`crate::types::ChangeEvent`]s in binlog order and are told about
//! transaction commits and shutdown.

mod base;
pub mod memory;
pub mod stdout;

pub use base::Sink;
