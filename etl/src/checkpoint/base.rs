use std::future::Future;

use crate::error::EtlResult;
use crate::types::Checkpoint;

/// Durable storage of the binlog position from which streaming resumes.
///
/// A checkpoint always holds both the file and the offset. Implementations must never
/// expose a state where only one of the two was updated.
pub trait CheckpointStore {
    /// Loads the last saved checkpoint.
    ///
    /// Returns [`None`] when no progress was recorded yet. Implementations backed by
    /// storage that can be damaged should also return [`None`] for unreadable content,
    /// so the replicator starts from the oldest retained binlog instead of failing.
    fn load(&self) -> impl Future<Output = EtlResult<Option<Checkpoint>>> + Send;

    /// Atomically replaces the stored checkpoint with `checkpoint`.
    fn save(&self, checkpoint: &Checkpoint) -> impl Future<Output = EtlResult<()>> + Send;
}
