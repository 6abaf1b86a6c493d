use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::shared::ValidationError;

const fn default_server_id() -> u32 {
    PipelineConfig::DEFAULT_SERVER_ID
}

/// Tables tracked by the replicator and how their changes fold into the master.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Ordered list of tracked tables. The first entry is the master table, every
    /// other entry is a satellite table.
    pub tables: Vec<String>,
    /// Column preserved when a satellite row is deleted.
    ///
    /// Must name a column present in every satellite table.
    pub identifier_column: String,
    /// Replica server id announced to the source when streaming the binlog.
    ///
    /// Must be unique among all replicas of the source server.
    #[serde(default = "default_server_id")]
    pub server_id: u32,
}

impl PipelineConfig {
    pub const DEFAULT_SERVER_ID: u32 = 1001;

    /// Returns the master table, if any table is configured.
    pub fn master_table(&self) -> Option<&str> {
        self.tables.first().map(String::as_str)
    }

    /// Returns the satellite tables in configuration order.
    pub fn satellite_tables(&self) -> impl Iterator<Item = &str> {
        self.tables.iter().skip(1).map(String::as_str)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.tables.is_empty() {
            return Err(ValidationError::NoTables);
        }

        let mut seen = HashSet::with_capacity(self.tables.len());
        for table in &self.tables {
            if table.trim().is_empty() {
                return Err(ValidationError::EmptyField("pipeline.tables"));
            }

            if !seen.insert(table.as_str()) {
                return Err(ValidationError::DuplicateTable(table.clone()));
            }
        }

        if self.identifier_column.trim().is_empty() {
            return Err(ValidationError::EmptyField("pipeline.identifier_column"));
        }

        if self.server_id == 0 {
            return Err(ValidationError::ServerIdZero);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_config(tables: &[&str]) -> PipelineConfig {
        PipelineConfig {
            tables: tables.iter().map(|table| table.to_string()).collect(),
            identifier_column: "order_id".to_string(),
            server_id: 101,
        }
    }

    #[test]
    fn test_master_and_satellites() {
        let config = pipeline_config(&["orders", "order_items", "shipments"]);

        assert_eq!(config.master_table(), Some("orders"));
        assert_eq!(
            config.satellite_tables().collect::<Vec<_>>(),
            vec!["order_items", "shipments"]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_tables() {
        let config = pipeline_config(&[]);

        assert_eq!(config.master_table(), None);
        assert_eq!(config.validate(), Err(ValidationError::NoTables));
    }

    #[test]
    fn test_validate_rejects_duplicate_tables() {
        let config = pipeline_config(&["orders", "order_items", "orders"]);

        assert_eq!(
            config.validate(),
            Err(ValidationError::DuplicateTable("orders".to_string()))
        );
    }

    #[test]
    fn test_validate_rejects_empty_identifier_column() {
        let mut config = pipeline_config(&["orders"]);
        config.identifier_column = String::new();

        assert_eq!(
            config.validate(),
            Err(ValidationError::EmptyField("pipeline.identifier_column"))
        );
    }

    #[test]
    fn test_validate_rejects_zero_server_id() {
        let mut config = pipeline_config(&["orders"]);
        config.server_id = 0;

        assert_eq!(config.validate(), Err(ValidationError::ServerIdZero));
    }

    #[test]
    fn test_defaults() {
        let config: PipelineConfig =
            serde_json::from_str(r#"{"tables": ["orders"], "identifier_column": "order_id"}"#)
                .unwrap();

        assert_eq!(config.identifier_column, "order_id");
        assert_eq!(config.server_id, PipelineConfig::DEFAULT_SERVER_ID);
    }

    #[test]
    fn test_missing_identifier_column_is_rejected() {
        let result = serde_json::from_str::<PipelineConfig>(r#"{"tables": ["orders", "order_items"]}"#);

        let err = result.unwrap_err();
        assert!(err.to_string().contains("identifier_column"));
    }
}
