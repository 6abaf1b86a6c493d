use config::shared::PipelineConfig;
use std::collections::BTreeSet;
use std::future::Future;

use crate::error::EtlResult;
use crate::types::{BinlogEvent, BinlogPosition, Checkpoint};

/// Parameters used to open a replication stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamRequest {
    /// Whether streaming continues from `position` or starts from the oldest retained binlog.
    pub resume: bool,
    pub position: Option<BinlogPosition>,
    /// Tables whose row events are delivered. Row events on other tables are dropped.
    pub tables: BTreeSet<String>,
    /// Subset of `tables` whose rows enrich the master table.
    pub satellite_tables: BTreeSet<String>,
    /// Column every satellite table must carry to link its rows to the master.
    pub identifier_column: String,
    /// Server id announced to the source. It must be unique among its replicas.
    pub server_id: u32,
}

impl StreamRequest {
    /// Builds a request for the tables of `config`, resuming from `checkpoint` when one
    /// exists and from the head otherwise.
    pub fn new(checkpoint: Option<Checkpoint>, config: &PipelineConfig) -> Self {
        Self {
            resume: checkpoint.is_some(),
            position: checkpoint,
            tables: config.tables.iter().cloned().collect(),
            satellite_tables: config.satellite_tables().map(str::to_string).collect(),
            identifier_column: config.identifier_column.clone(),
            server_id: config.server_id,
        }
    }

    /// Returns the position to resume from, or [`None`] when streaming from the head.
    pub fn resume_position(&self) -> Option<&BinlogPosition> {
        if self.resume {
            self.position.as_ref()
        } else {
            None
        }
    }
}

/// Source of binlog events.
///
/// A source opens one stream per run. A stream is never reopened after it failed, since a
/// correct resume requires reloading the last saved checkpoint.
pub trait ReplicationSource {
    type Stream: ReplicationStream + Send;

    fn open(&self, request: StreamRequest) -> impl Future<Output = EtlResult<Self::Stream>> + Send;
}

/// Ordered stream of binlog events.
pub trait ReplicationStream {
    /// Waits for the next event.
    ///
    /// Returns [`None`] once the stream is exhausted, which for a live binlog connection
    /// means the source closed it. The returned future must be cancel safe: dropping it
    /// before completion must not lose an event.
    fn next_event(&mut self) -> impl Future<Output = Option<EtlResult<BinlogEvent>>> + Send;

    /// Returns the position right after the last event yielded, if known.
    fn position(&self) -> Option<BinlogPosition>;

    /// Returns whether the underlying connection is known to be closed.
    fn is_closed(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline_config() -> PipelineConfig {
        PipelineConfig {
            tables: vec![
                "orders".to_string(),
                "order_items".to_string(),
                "shipments".to_string(),
            ],
            identifier_column: "order_id".to_string(),
            server_id: 7,
        }
    }

    #[test]
    fn test_request_resumes_only_with_checkpoint() {
        let config = pipeline_config();

        let request = StreamRequest::new(None, &config);
        assert!(!request.resume);
        assert_eq!(request.resume_position(), None);

        let checkpoint = Checkpoint::new("bin.000003", 120);
        let request = StreamRequest::new(Some(checkpoint.clone()), &config);
        assert!(request.resume);
        assert_eq!(request.resume_position(), Some(&checkpoint));
    }

    #[test]
    fn test_request_splits_master_and_satellites() {
        let request = StreamRequest::new(None, &pipeline_config());

        assert_eq!(request.tables.len(), 3);
        assert_eq!(
            request.satellite_tables.iter().collect::<Vec<_>>(),
            vec!["order_items", "shipments"]
        );
        assert!(!request.satellite_tables.contains("orders"));
        assert_eq!(request.identifier_column, "order_id");
        assert_eq!(request.server_id, 7);
    }
}
