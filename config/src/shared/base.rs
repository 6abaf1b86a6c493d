use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// A required string field is empty.
    #[error("`{0}` cannot be empty")]
    EmptyField(&'static str),
    /// The replication server id must be a positive number.
    #[error("`server_id` cannot be zero")]
    ServerIdZero,
    /// At least one table (the master) must be configured.
    #[error("`tables` must contain at least the master table")]
    NoTables,
    /// The same table is listed more than once.
    #[error("table `{0}` is listed more than once in `tables`")]
    DuplicateTable(String),
}
