use std::fmt;

use crate::types::{BinlogPosition, RowValues};

/// Kind of row mutation carried by a rows event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowKind {
    Insert,
    Update,
    Delete,
}

impl fmt::Display for RowKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKind::Insert => write!(f, "insert"),
            RowKind::Update => write!(f, "update"),
            RowKind::Delete => write!(f, "delete"),
        }
    }
}

/// One row of a rows event.
///
/// Inserts and deletes carry the row values, updates carry the row image before and after
/// the change.
#[derive(Debug, Clone, PartialEq)]
pub enum RawRow {
    Values(RowValues),
    Changed { before: RowValues, after: RowValues },
}

/// Row changes for a single table, as delivered by one binlog rows event.
#[derive(Debug, Clone, PartialEq)]
pub struct RowsEvent {
    pub kind: RowKind,
    pub table: String,
    pub rows: Vec<RawRow>,
}

/// Event yielded by a replication stream.
#[derive(Debug, Clone, PartialEq)]
pub enum BinlogEvent {
    /// The source switched to a new binlog file, the position is where streaming continues.
    Rotation(BinlogPosition),
    /// A transaction was committed.
    TransactionCommit { xid: u64 },
    /// Rows were inserted, updated or deleted in a tracked table.
    Rows(RowsEvent),
}

impl BinlogEvent {
    /// Returns a short name of the event type, used in logs.
    pub fn type_name(&self) -> &'static str {
        match self {
            BinlogEvent::Rotation(_) => "rotation",
            BinlogEvent::TransactionCommit { .. } => "transaction_commit",
            BinlogEvent::Rows(_) => "rows",
        }
    }
}
