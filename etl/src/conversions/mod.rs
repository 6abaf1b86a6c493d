//! Conversions from decoded binlog data to the replicator's own types.

pub mod change;
pub mod value;

pub use change::{ChangeEventMapper, TableRole};
