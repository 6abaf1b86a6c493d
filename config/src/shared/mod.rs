//! Shared configuration types for the binlog replicator.

mod base;
mod checkpoint;
mod connection;
mod logging;
mod pipeline;
mod replicator;
mod sink;

pub use base::*;
pub use checkpoint::*;
pub use connection::*;
pub use logging::*;
pub use pipeline::*;
pub use replicator::*;
pub use sink::*;
