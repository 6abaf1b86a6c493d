//! Durable storage of the binlog checkpoint.
//!
//! The checkpoint is read once at startup to decide where streaming resumes, and written
//! on binlog rotations and on graceful shutdown.

mod base;
pub mod file;
pub mod memory;

pub use base::CheckpointStore;
