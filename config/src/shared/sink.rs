use serde::{Deserialize, Serialize};

/// Where change events are delivered.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SinkConfig {
    /// One JSON document per line on standard output.
    #[default]
    Stdout,
    /// Kept in memory, only useful for development.
    Memory,
}
