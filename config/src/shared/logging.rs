use serde::{Deserialize, Serialize};
use std::path::PathBuf;

fn default_file_prefix() -> String {
    LoggingConfig::DEFAULT_FILE_PREFIX.to_string()
}

/// File logging settings.
///
/// When absent from the configuration, logs are written to stderr.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Directory in which daily rotated log files are created.
    pub dir: PathBuf,
    /// File name prefix of the rotated log files.
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

impl LoggingConfig {
    pub const DEFAULT_FILE_PREFIX: &'static str = "replicator.log";
}
