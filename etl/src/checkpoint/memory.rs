use std::sync::Arc;
use tokio::sync::Mutex;

use crate::checkpoint::CheckpointStore;
use crate::error::EtlResult;
use crate::types::Checkpoint;

#[derive(Debug, Default)]
struct Inner {
    current: Option<Checkpoint>,
    saves: Vec<Checkpoint>,
}

/// In-memory [`CheckpointStore`] that also records every save.
///
/// Clones share the same state, which lets tests keep a handle on the store given to a
/// pipeline and inspect what was saved.
#[derive(Debug, Clone, Default)]
pub struct MemoryCheckpointStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `checkpoint`, as if saved by a previous run.
    pub fn with_checkpoint(checkpoint: Checkpoint) -> Self {
        let inner = Inner {
            current: Some(checkpoint),
            saves: Vec::new(),
        };

        Self {
            inner: Arc::new(Mutex::new(inner)),
        }
    }

    /// Returns the checkpoint that a new run would load.
    pub async fn current(&self) -> Option<Checkpoint> {
        self.inner.lock().await.current.clone()
    }

    /// Returns every checkpoint saved through this store, oldest first.
    pub async fn saves(&self) -> Vec<Checkpoint> {
        self.inner.lock().await.saves.clone()
    }
}

impl CheckpointStore for MemoryCheckpointStore {
    async fn load(&self) -> EtlResult<Option<Checkpoint>> {
        Ok(self.current().await)
    }

    async fn save(&self, checkpoint: &Checkpoint) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;
        inner.current = Some(checkpoint.clone());
        inner.saves.push(checkpoint.clone());

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_saves_are_recorded_and_shared_between_clones() {
        let store = MemoryCheckpointStore::new();
        let handle = store.clone();

        assert_eq!(store.load().await.unwrap(), None);

        store.save(&Checkpoint::new("bin.000001", 4)).await.unwrap();
        store
            .save(&Checkpoint::new("bin.000002", 4))
            .await
            .unwrap();

        assert_eq!(
            handle.load().await.unwrap(),
            Some(Checkpoint::new("bin.000002", 4))
        );
        assert_eq!(handle.saves().await.len(), 2);
    }
}
