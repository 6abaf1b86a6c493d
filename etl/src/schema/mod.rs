//! Column metadata of the replicated tables.
//!
//! Binlog row events carry values by position only. Column names and types are looked up
//! in `information_schema` and cached for the lifetime of the stream.

mod cache;
mod columns;

pub use cache::SchemaCache;
pub use columns::{ColumnSchema, TableSchema, get_table_schema};
