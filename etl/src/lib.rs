//! Change data capture from the MySQL binlog.
//!
//! A [`pipeline::Pipeline`] reads row changes of a master table and its satellite tables
//! from a [`replication::stream::ReplicationSource`], maps them to
//! [`types::ChangeEvent`]s and hands them to a [`sink::Sink`] in binlog order. Progress is
//! saved through a [`checkpoint::CheckpointStore`] on binlog rotations and on shutdown.

pub mod checkpoint;
pub mod concurrency;
pub mod conversions;
pub mod error;
mod macros;
pub mod pipeline;
pub mod replication;
pub mod schema;
pub mod sink;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod types;
pub mod workers;
