use config::shared::PipelineConfig;

use crate::checkpoint::CheckpointStore;
use crate::pipeline::Pipeline;
use crate::replication::stream::ReplicationSource;
use crate::sink::Sink;

/// Master table used by test pipelines.
pub const TEST_MASTER_TABLE: &str = "orders";

/// Satellite tables used by test pipelines.
pub const TEST_SATELLITE_TABLES: [&str; 2] = ["order_items", "shipments"];

/// Identifier column shared by the master and satellite test tables.
pub const TEST_IDENTIFIER_COLUMN: &str = "order_id";

/// Builds a [`PipelineConfig`] tracking the test master and satellite tables.
pub fn test_pipeline_config() -> PipelineConfig {
    let tables = std::iter::once(TEST_MASTER_TABLE)
        .chain(TEST_SATELLITE_TABLES)
        .map(str::to_string)
        .collect();

    PipelineConfig {
        tables,
        identifier_column: TEST_IDENTIFIER_COLUMN.to_string(),
        server_id: PipelineConfig::DEFAULT_SERVER_ID,
    }
}

/// Builder for test pipelines. Every option has a default, so tests only set what
/// they care about.
pub struct PipelineBuilder<C, R, K> {
    config: PipelineConfig,
    checkpoint_store: C,
    source: R,
    sink: K,
}

impl<C, R, K> PipelineBuilder<C, R, K>
where
    C: CheckpointStore + Clone + Send + Sync + 'static,
    R: ReplicationSource + Clone + Send + Sync + 'static,
    K: Sink + Clone + Send + Sync + 'static,
{
    pub fn new(checkpoint_store: C, source: R, sink: K) -> Self {
        Self {
            config: test_pipeline_config(),
            checkpoint_store,
            source,
            sink,
        }
    }

    pub fn with_tables(mut self, tables: &[&str]) -> Self {
        self.config.tables = tables.iter().map(|table| table.to_string()).collect();
        self
    }

    pub fn with_identifier_column(mut self, identifier_column: &str) -> Self {
        self.config.identifier_column = identifier_column.to_string();
        self
    }

    pub fn build(self) -> Pipeline<C, R, K> {
        Pipeline::new(self.config, self.checkpoint_store, self.source, self.sink)
    }
}

/// Creates a pipeline over the test tables.
pub fn create_pipeline<C, R, K>(checkpoint_store: C, source: R, sink: K) -> Pipeline<C, R, K>
where
    C: CheckpointStore + Clone + Send + Sync + 'static,
    R: ReplicationSource + Clone + Send + Sync + 'static,
    K: Sink + Clone + Send + Sync + 'static,
{
    PipelineBuilder::new(checkpoint_store, source, sink).build()
}
