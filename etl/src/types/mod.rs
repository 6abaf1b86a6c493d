//! Common types used throughout the replicator.
//!
//! Column values and rows decoded from the binlog, binlog positions, the events yielded by
//! a replication stream, and the change events handed to sinks.

mod cell;
mod change;
mod event;
mod position;
mod row;

pub use cell::*;
pub use change::*;
pub use event::*;
pub use position::*;
pub use row::*;
