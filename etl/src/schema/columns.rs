use sqlx::{MySqlPool, Row};

use crate::bail;
use crate::error::{ErrorKind, EtlResult};

/// Name and type of a single table column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    /// Lowercase `DATA_TYPE` of the column, for example `varchar` or `datetime`.
    pub data_type: String,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into().to_lowercase(),
        }
    }
}

/// Columns of a table in ordinal order, matching the order of values in binlog rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema {
    pub name: String,
    pub columns: Vec<ColumnSchema>,
}

impl TableSchema {
    pub fn new(name: impl Into<String>, columns: Vec<ColumnSchema>) -> Self {
        Self {
            name: name.into(),
            columns,
        }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column.name == name)
    }
}

/// Loads the columns of `database`.`table` from `information_schema.columns`.
///
/// Fails with [`ErrorKind::SourceSchemaError`] when the table has no columns, which means it
/// does not exist or is not visible to the replication user.
pub async fn get_table_schema(
    pool: &MySqlPool,
    database: &str,
    table: &str,
) -> EtlResult<TableSchema> {
    let query = r#"
        SELECT
            c.column_name AS column_name,
            c.data_type AS data_type
        FROM information_schema.columns c
        WHERE c.table_schema = ?
        AND c.table_name = ?
        ORDER BY c.ordinal_position
    "#;

    let rows = sqlx::query(query)
        .bind(database)
        .bind(table)
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        let column_name: String = row.try_get("column_name")?;
        let data_type: String = row.try_get("data_type")?;

        columns.push(ColumnSchema::new(column_name, data_type));
    }

    if columns.is_empty() {
        bail!(
            ErrorKind::SourceSchemaError,
            "Table not found",
            format!("Table '{database}.{table}' has no visible columns")
        );
    }

    Ok(TableSchema::new(table, columns))
}
