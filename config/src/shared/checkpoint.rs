use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::shared::ValidationError;

/// Location of the durable binlog checkpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointConfig {
    /// Path of the file holding the last saved `log_file` and `log_position`.
    ///
    /// The parent directory must be writable since saves go through a sibling
    /// temporary file.
    pub path: PathBuf,
}

impl CheckpointConfig {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.path.as_os_str().is_empty() {
            return Err(ValidationError::EmptyField("checkpoint.path"));
        }

        Ok(())
    }
}
