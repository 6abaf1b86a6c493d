//! Concurrency primitives used to coordinate the pipeline and its apply worker.
//!
//! The [`shutdown`] module carries the graceful shutdown request from the process boundary
//! to the apply loop, which honors it between binlog events. The [`signal`] module holds
//! the underlying watch based signal types.

pub mod shutdown;
pub mod signal;
