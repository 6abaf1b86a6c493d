use serde::{Deserialize, Serialize};

use crate::Config;
use crate::shared::{
    CheckpointConfig, LoggingConfig, MySqlConnectionConfig, MySqlConnectionConfigWithoutSecrets,
    PipelineConfig, SinkConfig, ValidationError,
};

/// Complete configuration for the binlog replicator.
///
/// Aggregates the source connection, the tracked tables, the checkpoint location,
/// logging and the sink that receives change events. Loaded once at startup.
///
/// This intentionally does not implement [`Serialize`] to avoid accidentally
/// leaking secrets in the config into serialized forms.
#[derive(Debug, Clone, Deserialize)]
pub struct ReplicatorConfig {
    /// Connection to the MySQL server whose binlog is consumed.
    pub source: MySqlConnectionConfig,
    /// Tracked tables and master/satellite mapping.
    pub pipeline: PipelineConfig,
    /// Durable checkpoint location.
    pub checkpoint: CheckpointConfig,
    /// Optional file logging.
    ///
    /// If `None`, logs are written to stderr.
    #[serde(default)]
    pub logging: Option<LoggingConfig>,
    /// Sink for emitted change events.
    #[serde(default)]
    pub sink: SinkConfig,
}

impl ReplicatorConfig {
    /// Validates the complete replicator configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.source.validate()?;
        self.pipeline.validate()?;
        self.checkpoint.validate()?;

        Ok(())
    }
}

impl Config for ReplicatorConfig {
    const LIST_PARSE_KEYS: &'static [&'static str] = &["pipeline.tables"];
}

/// Same as [`ReplicatorConfig`] but without secrets.
///
/// This type implements [`Serialize`] because it does not contain secrets.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplicatorConfigWithoutSecrets {
    pub source: MySqlConnectionConfigWithoutSecrets,
    pub pipeline: PipelineConfig,
    pub checkpoint: CheckpointConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
    pub sink: SinkConfig,
}

impl From<ReplicatorConfig> for ReplicatorConfigWithoutSecrets {
    fn from(value: ReplicatorConfig) -> Self {
        ReplicatorConfigWithoutSecrets {
            source: value.source.into(),
            pipeline: value.pipeline,
            checkpoint: value.checkpoint,
            logging: value.logging,
            sink: value.sink,
        }
    }
}
