use config::shared::PipelineConfig;
use std::collections::HashSet;
use std::fmt;

use crate::bail;
use crate::error::{ErrorKind, EtlResult};
use crate::types::{Cell, ChangeAction, ChangeEvent, RawRow, RowKind, RowValues, RowsEvent};

/// Role of a tracked table, fixed for the lifetime of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableRole {
    /// The first configured table. Its rows are the documents being synchronized.
    Master,
    /// Any other configured table. Its rows enrich an existing master document.
    Satellite,
}

impl fmt::Display for TableRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRole::Master => write!(f, "master"),
            TableRole::Satellite => write!(f, "satellite"),
        }
    }
}

/// Maps binlog row changes to [`ChangeEvent`]s.
///
/// | row kind | master   | satellite                                   |
/// |----------|----------|---------------------------------------------|
/// | insert   | `create` | `update`                                    |
/// | update   | `update` with the after image                          |
/// | delete   | `delete` | `update` nulling all but the identifier     |
///
/// The mapper holds no state between calls.
#[derive(Debug, Clone)]
pub struct ChangeEventMapper {
    master: String,
    satellites: HashSet<String>,
    identifier_column: String,
}

impl ChangeEventMapper {
    /// Creates a mapper for `tables`, whose first entry is the master table.
    pub fn new<T>(tables: &[T], identifier_column: impl Into<String>) -> EtlResult<Self>
    where
        T: AsRef<str>,
    {
        let Some((master, satellites)) = tables.split_first() else {
            bail!(
                ErrorKind::ConfigError,
                "No tables configured",
                "At least the master table must be configured"
            );
        };

        Ok(Self {
            master: master.as_ref().to_string(),
            satellites: satellites
                .iter()
                .map(|table| table.as_ref().to_string())
                .collect(),
            identifier_column: identifier_column.into(),
        })
    }

    pub fn from_config(config: &PipelineConfig) -> EtlResult<Self> {
        Self::new(config.tables.as_slice(), config.identifier_column.clone())
    }

    pub fn master_table(&self) -> &str {
        &self.master
    }

    pub fn identifier_column(&self) -> &str {
        &self.identifier_column
    }

    /// Returns the role of `table`, or [`None`] if the table is not tracked.
    pub fn role(&self, table: &str) -> Option<TableRole> {
        if table == self.master {
            Some(TableRole::Master)
        } else if self.satellites.contains(table) {
            Some(TableRole::Satellite)
        } else {
            None
        }
    }

    /// Maps a single row of a `kind` event on a table with `role`.
    ///
    /// Fails with [`ErrorKind::ProtocolViolation`] when the row shape does not match the
    /// event kind, since guessing a mapping could silently corrupt the downstream data.
    pub fn map(&self, kind: RowKind, role: TableRole, row: RawRow) -> EtlResult<ChangeEvent> {
        let event = match (kind, role, row) {
            (RowKind::Delete, TableRole::Master, RawRow::Values(values)) => {
                ChangeEvent::new(ChangeAction::Delete, values)
            }
            (RowKind::Delete, TableRole::Satellite, RawRow::Values(values)) => {
                ChangeEvent::new(ChangeAction::Update, self.detach_satellite(values))
            }
            (RowKind::Update, _, RawRow::Changed { after, .. }) => {
                ChangeEvent::new(ChangeAction::Update, after)
            }
            (RowKind::Insert, TableRole::Master, RawRow::Values(values)) => {
                ChangeEvent::new(ChangeAction::Create, values)
            }
            (RowKind::Insert, TableRole::Satellite, RawRow::Values(values)) => {
                ChangeEvent::new(ChangeAction::Update, values)
            }
            (kind, role, row) => {
                bail!(
                    ErrorKind::ProtocolViolation,
                    "Unknown row shape in binlog",
                    format!(
                        "A {kind} event on a {role} table carried {}",
                        describe_row_shape(&row)
                    )
                );
            }
        };

        Ok(event)
    }

    /// Maps every row of `event`, preserving the order in which rows were delivered.
    pub fn map_rows(&self, event: RowsEvent) -> EtlResult<Vec<ChangeEvent>> {
        let Some(role) = self.role(&event.table) else {
            bail!(
                ErrorKind::ProtocolViolation,
                "Row event for an untracked table",
                format!(
                    "Received a {} event for table '{}' which is not configured",
                    event.kind, event.table
                )
            );
        };

        event
            .rows
            .into_iter()
            .map(|row| self.map(event.kind, role, row))
            .collect()
    }

    /// Nulls every column of a deleted satellite row except the identifier column.
    fn detach_satellite(&self, values: RowValues) -> RowValues {
        values
            .into_iter()
            .map(|(column, value)| {
                if column == self.identifier_column {
                    (column, value)
                } else {
                    (column, Cell::Null)
                }
            })
            .collect()
    }
}

fn describe_row_shape(row: &RawRow) -> &'static str {
    match row {
        RawRow::Values(_) => "a single row image",
        RawRow::Changed { .. } => "before and after row images",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn mapper() -> ChangeEventMapper {
        ChangeEventMapper::new(&["orders", "order_items"], "order_id").unwrap()
    }

    fn values(pairs: &[(&str, Cell)]) -> RowValues {
        pairs
            .iter()
            .map(|(column, value)| (column.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_roles() {
        let mapper = mapper();

        assert_eq!(mapper.role("orders"), Some(TableRole::Master));
        assert_eq!(mapper.role("order_items"), Some(TableRole::Satellite));
        assert_eq!(mapper.role("customers"), None);
        assert_eq!(mapper.master_table(), "orders");
    }

    #[test]
    fn test_empty_tables_are_rejected() {
        let err = ChangeEventMapper::new::<&str>(&[], "id").unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ConfigError);
    }

    #[test]
    fn test_master_insert_is_create() {
        let row = values(&[("id", Cell::I64(42)), ("status", Cell::from("new"))]);

        let event = mapper()
            .map(RowKind::Insert, TableRole::Master, RawRow::Values(row))
            .unwrap();

        assert_eq!(
            serde_json::to_value(&event).unwrap(),
            json!({"action": "create", "doc": {"id": 42, "status": "new"}})
        );
    }

    #[test]
    fn test_satellite_insert_is_update() {
        let row = values(&[("order_id", Cell::I64(7)), ("sku", Cell::from("X"))]);

        let event = mapper()
            .map(RowKind::Insert, TableRole::Satellite, RawRow::Values(row.clone()))
            .unwrap();

        assert_eq!(event, ChangeEvent::new(ChangeAction::Update, row));
    }

    #[test]
    fn test_master_delete_is_delete() {
        let row = values(&[("id", Cell::I64(42))]);

        let event = mapper()
            .map(RowKind::Delete, TableRole::Master, RawRow::Values(row.clone()))
            .unwrap();

        assert_eq!(event, ChangeEvent::new(ChangeAction::Delete, row));
    }

    #[test]
    fn test_satellite_delete_nulls_all_but_identifier() {
        let row = values(&[
            ("order_id", Cell::I64(7)),
            ("sku", Cell::from("X")),
            ("quantity", Cell::U64(3)),
        ]);

        let event = mapper()
            .map(RowKind::Delete, TableRole::Satellite, RawRow::Values(row))
            .unwrap();

        assert_eq!(event.action, ChangeAction::Update);
        assert_eq!(
            serde_json::to_value(&event.doc).unwrap(),
            json!({"order_id": 7, "sku": null, "quantity": null})
        );
        assert!(
            event
                .doc
                .iter()
                .filter(|(column, _)| *column != "order_id")
                .all(|(_, value)| value.is_null())
        );
    }

    #[test]
    fn test_satellite_delete_without_identifier_nulls_everything() {
        let row = values(&[("sku", Cell::from("X"))]);

        let event = mapper()
            .map(RowKind::Delete, TableRole::Satellite, RawRow::Values(row))
            .unwrap();

        assert_eq!(event.doc.get("sku"), Some(&Cell::Null));
    }

    #[test]
    fn test_update_uses_after_image_for_any_role() {
        let before = values(&[("id", Cell::I64(42)), ("status", Cell::from("new"))]);
        let after = values(&[("id", Cell::I64(42)), ("status", Cell::from("paid"))]);

        for role in [TableRole::Master, TableRole::Satellite] {
            let event = mapper()
                .map(
                    RowKind::Update,
                    role,
                    RawRow::Changed {
                        before: before.clone(),
                        after: after.clone(),
                    },
                )
                .unwrap();

            assert_eq!(event, ChangeEvent::new(ChangeAction::Update, after.clone()));
        }
    }

    #[test]
    fn test_mismatched_shapes_are_protocol_violations() {
        let mapper = mapper();
        let row = values(&[("id", Cell::I64(1))]);

        let err = mapper
            .map(RowKind::Update, TableRole::Master, RawRow::Values(row.clone()))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);

        let err = mapper
            .map(
                RowKind::Insert,
                TableRole::Satellite,
                RawRow::Changed {
                    before: row.clone(),
                    after: row,
                },
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }

    #[test]
    fn test_map_rows_preserves_order() {
        let rows = (0..5)
            .map(|id| RawRow::Values(values(&[("id", Cell::I64(id))])))
            .collect();
        let event = RowsEvent {
            kind: RowKind::Insert,
            table: "orders".to_string(),
            rows,
        };

        let events = mapper().map_rows(event).unwrap();

        let ids: Vec<_> = events
            .iter()
            .map(|event| event.doc.get("id").cloned())
            .collect();
        assert_eq!(
            ids,
            (0..5).map(|id| Some(Cell::I64(id))).collect::<Vec<_>>()
        );
    }

    #[test]
    fn test_map_rows_rejects_untracked_table() {
        let event = RowsEvent {
            kind: RowKind::Insert,
            table: "customers".to_string(),
            rows: vec![],
        };

        let err = mapper().map_rows(event).unwrap_err();

        assert_eq!(err.kind(), ErrorKind::ProtocolViolation);
    }
}
