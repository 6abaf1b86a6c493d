use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::checkpoint::CheckpointStore;
use crate::error::EtlResult;
use crate::test_utils::notify::TimedNotify;
use crate::types::Checkpoint;

type SaveCondition = Box<dyn Fn(&Checkpoint) -> bool + Send + Sync>;

struct Inner {
    saves: Vec<Checkpoint>,
    save_conditions: Vec<(SaveCondition, Arc<Notify>)>,
}

impl Inner {
    fn check_conditions(&mut self, saved: &Checkpoint) {
        self.save_conditions.retain(|(condition, notify)| {
            let should_retain = !condition(saved);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// [`CheckpointStore`] wrapper notifying the test when specific checkpoints are saved.
#[derive(Clone)]
pub struct NotifyingCheckpointStore<C> {
    store: C,
    inner: Arc<RwLock<Inner>>,
}

impl<C> std::fmt::Debug for NotifyingCheckpointStore<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyingCheckpointStore")
            .finish_non_exhaustive()
    }
}

impl<C> NotifyingCheckpointStore<C> {
    pub fn wrap(store: C) -> Self {
        Self {
            store,
            inner: Arc::new(RwLock::new(Inner {
                saves: Vec::new(),
                save_conditions: Vec::new(),
            })),
        }
    }

    /// Returns every checkpoint saved through this wrapper, oldest first.
    pub async fn saves(&self) -> Vec<Checkpoint> {
        self.inner.read().await.saves.clone()
    }

    /// Registers a notification that fires once `checkpoint` is saved.
    pub async fn notify_on_save(&self, checkpoint: Checkpoint) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;

        if inner.saves.contains(&checkpoint) {
            notify.notify_one();
        } else {
            inner
                .save_conditions
                .push((Box::new(move |saved| *saved == checkpoint), notify.clone()));
        }

        TimedNotify::new(notify)
    }
}

impl<C> CheckpointStore for NotifyingCheckpointStore<C>
where
    C: CheckpointStore + Send + Sync,
{
    async fn load(&self) -> EtlResult<Option<Checkpoint>> {
        self.store.load().await
    }

    async fn save(&self, checkpoint: &Checkpoint) -> EtlResult<()> {
        self.store.save(checkpoint).await?;

        let mut inner = self.inner.write().await;
        inner.saves.push(checkpoint.clone());
        inner.check_conditions(checkpoint);

        Ok(())
    }
}
