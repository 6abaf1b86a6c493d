use crate::types::{
    BinlogEvent, BinlogPosition, Cell, ChangeAction, ChangeEvent, RawRow, RowKind, RowValues,
    RowsEvent,
};

/// Builds row values from column/value pairs.
pub fn row(values: &[(&str, Cell)]) -> RowValues {
    values
        .iter()
        .map(|(column, value)| (*column, value.clone()))
        .collect()
}

pub fn rotation(log_file: &str, log_position: u64) -> BinlogEvent {
    BinlogEvent::Rotation(BinlogPosition::new(log_file, log_position))
}

pub fn commit(xid: u64) -> BinlogEvent {
    BinlogEvent::TransactionCommit { xid }
}

pub fn insert(table: &str, rows: Vec<RowValues>) -> BinlogEvent {
    values_event(RowKind::Insert, table, rows)
}

pub fn delete(table: &str, rows: Vec<RowValues>) -> BinlogEvent {
    values_event(RowKind::Delete, table, rows)
}

pub fn update(table: &str, rows: Vec<(RowValues, RowValues)>) -> BinlogEvent {
    BinlogEvent::Rows(RowsEvent {
        kind: RowKind::Update,
        table: table.to_string(),
        rows: rows
            .into_iter()
            .map(|(before, after)| RawRow::Changed { before, after })
            .collect(),
    })
}

fn values_event(kind: RowKind, table: &str, rows: Vec<RowValues>) -> BinlogEvent {
    BinlogEvent::Rows(RowsEvent {
        kind,
        table: table.to_string(),
        rows: rows.into_iter().map(RawRow::Values).collect(),
    })
}

/// Counts change events with the given action.
pub fn count_actions(events: &[ChangeEvent], action: ChangeAction) -> usize {
    events.iter().filter(|event| event.action == action).count()
}
