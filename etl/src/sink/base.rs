use std::future::Future;

use crate::error::EtlResult;
use crate::types::ChangeEvent;

/// Receiver of the change events produced by the pipeline.
///
/// Events are delivered in binlog order, which is the commit order of the source. A sink
/// that is slow stalls the whole pipeline, there is no buffering in between.
///
/// Events may be delivered again after a restart, since the checkpoint is only saved on
/// binlog rotations and on shutdown. Sinks should therefore apply them idempotently,
/// keyed by the row identifier. Updates may also target documents that were never created,
/// and should be applied as upserts.
pub trait Sink {
    /// Returns the name of the sink.
    fn name() -> &'static str;

    /// Writes change events, in the order given.
    fn write_events(&self, events: Vec<ChangeEvent>) -> impl Future<Output = EtlResult<()>> + Send;

    /// Called when the source committed the transaction the last written events belong to.
    ///
    /// The default implementation is a no-op.
    fn commit(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }

    /// Propagates the shutdown of the pipeline to the sink.
    ///
    /// Called once after the final checkpoint was saved. The default implementation is a
    /// no-op.
    fn shutdown(&self) -> impl Future<Output = EtlResult<()>> + Send {
        async { Ok(()) }
    }
}
