use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::EtlResult;
use crate::sink::Sink;
use crate::types::ChangeEvent;

#[derive(Debug, Default)]
struct Inner {
    events: Vec<ChangeEvent>,
    commits: usize,
    shutdown: bool,
}

/// In-memory sink keeping every event it received.
///
/// Clones share the same storage, so a handle kept outside the pipeline sees everything
/// written by it.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    inner: Arc<Mutex<Inner>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all events written so far.
    pub async fn events(&self) -> Vec<ChangeEvent> {
        let inner = self.inner.lock().await;
        inner.events.clone()
    }

    /// Returns how many transaction commits were signaled.
    pub async fn commits(&self) -> usize {
        self.inner.lock().await.commits
    }

    pub async fn is_shutdown(&self) -> bool {
        self.inner.lock().await.shutdown
    }

    pub async fn clear(&self) {
        let mut inner = self.inner.lock().await;
        inner.events.clear();
        inner.commits = 0;
    }
}

impl Sink for MemorySink {
    fn name() -> &'static str {
        "memory"
    }

    async fn write_events(&self, events: Vec<ChangeEvent>) -> EtlResult<()> {
        let mut inner = self.inner.lock().await;

        info!("writing a batch of {} change events", events.len());
        inner.events.extend(events);

        Ok(())
    }

    async fn commit(&self) -> EtlResult<()> {
        self.inner.lock().await.commits += 1;

        Ok(())
    }

    async fn shutdown(&self) -> EtlResult<()> {
        self.inner.lock().await.shutdown = true;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Cell, ChangeAction, RowValues};

    #[tokio::test]
    async fn test_events_are_kept_in_order() {
        let sink = MemorySink::new();
        let handle = sink.clone();

        let events: Vec<_> = (0..3)
            .map(|id| {
                ChangeEvent::new(
                    ChangeAction::Create,
                    RowValues::from_iter([("id", Cell::I64(id))]),
                )
            })
            .collect();
        sink.write_events(events.clone()).await.unwrap();
        sink.commit().await.unwrap();

        assert_eq!(handle.events().await, events);
        assert_eq!(handle.commits().await, 1);

        handle.clear().await;
        assert!(sink.events().await.is_empty());
    }
}
