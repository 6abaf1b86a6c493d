//! Consumption of the MySQL binlog.
//!
//! - [`stream`] defines the boundary between the apply loop and a binlog source.
//! - [`mysql`] implements it on top of a MySQL replica connection.
//! - [`position`] tracks the stream position and saves checkpoints.
//! - [`apply`] runs the sequential consumption loop.

pub mod apply;
pub mod mysql;
pub mod position;
pub mod stream;
