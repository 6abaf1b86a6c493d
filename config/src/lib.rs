//! Configuration types and loading for the binlog replicator.
//!
//! Configuration is read from a single YAML or JSON file and can be overridden through
//! `APP_`-prefixed environment variables.

mod environment;
mod load;
pub mod shared;

pub use environment::*;
pub use load::*;
