use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::schema::TableSchema;

#[derive(Debug, Default)]
struct Inner {
    table_schemas: HashMap<String, Arc<TableSchema>>,
}

/// Shared cache of [`TableSchema`]s keyed by table name.
///
/// Schemas are replaced when the source reports a different column count for a table,
/// which happens after a schema change.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    inner: Arc<Mutex<Inner>>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a table schema, replacing any schema cached for the same table.
    pub async fn add_table_schema(&self, table_schema: TableSchema) -> Arc<TableSchema> {
        let table_schema = Arc::new(table_schema);
        let mut inner = self.inner.lock().await;
        inner
            .table_schemas
            .insert(table_schema.name.clone(), table_schema.clone());

        table_schema
    }

    pub async fn get_table_schema(&self, table: &str) -> Option<Arc<TableSchema>> {
        let inner = self.inner.lock().await;
        inner.table_schemas.get(table).cloned()
    }

    pub async fn remove_table_schema(&self, table: &str) {
        let mut inner = self.inner.lock().await;
        inner.table_schemas.remove(table);
    }
}
