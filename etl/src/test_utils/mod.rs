//! Utilities for testing pipelines without a MySQL server.
//!
//! - [`source`] provides a scripted [`crate::replication::stream::ReplicationSource`] fed by
//!   the test.
//! - [`event`] builds binlog events and rows.
//! - [`test_sink_wrapper`] and [`notifying_store`] record what the pipeline writes and notify
//!   the test when a condition is reached.
//! - [`pipeline`] builds pipelines over a fixed set of test tables.
//! - [`notify`] holds the timed notification used to wait for those conditions.

pub mod event;
pub mod notify;
pub mod notifying_store;
pub mod pipeline;
pub mod source;
pub mod test_sink_wrapper;
