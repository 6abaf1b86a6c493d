use std::fmt;
use std::sync::Arc;
use tokio::sync::{Notify, RwLock};

use crate::error::EtlResult;
use crate::sink::Sink;
use crate::test_utils::notify::TimedNotify;
use crate::types::ChangeEvent;

type EventCondition = Box<dyn Fn(&[ChangeEvent]) -> bool + Send + Sync>;

struct Inner<K> {
    wrapped_sink: K,
    events: Vec<ChangeEvent>,
    commits: u64,
    event_conditions: Vec<(EventCondition, Arc<Notify>)>,
    shutdown_notifiers: Vec<Arc<Notify>>,
    shutdown_called: bool,
}

impl<K> Inner<K> {
    fn check_conditions(&mut self) {
        let events = &self.events;
        self.event_conditions.retain(|(condition, notify)| {
            let should_retain = !condition(events);
            if !should_retain {
                notify.notify_one();
            }
            should_retain
        });
    }
}

/// Test wrapper recording everything written to a [`Sink`].
///
/// Tests register conditions on the recorded events and wait for them with a
/// [`TimedNotify`].
#[derive(Clone)]
pub struct TestSinkWrapper<K> {
    inner: Arc<RwLock<Inner<K>>>,
}

impl<K> fmt::Debug for TestSinkWrapper<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSinkWrapper").finish_non_exhaustive()
    }
}

impl<K> TestSinkWrapper<K> {
    pub fn wrap(sink: K) -> Self {
        let inner = Inner {
            wrapped_sink: sink,
            events: Vec::new(),
            commits: 0,
            event_conditions: Vec::new(),
            shutdown_notifiers: Vec::new(),
            shutdown_called: false,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
        }
    }

    /// Returns all change events written so far.
    pub async fn get_events(&self) -> Vec<ChangeEvent> {
        self.inner.read().await.events.clone()
    }

    pub async fn commits(&self) -> u64 {
        self.inner.read().await.commits
    }

    /// Registers a notification that fires once the written events match `condition`.
    pub async fn notify_on_events<F>(&self, condition: F) -> TimedNotify
    where
        F: Fn(&[ChangeEvent]) -> bool + Send + Sync + 'static,
    {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;
        inner
            .event_conditions
            .push((Box::new(condition), notify.clone()));

        // The condition may already hold.
        inner.check_conditions();

        TimedNotify::new(notify)
    }

    /// Registers a notification that fires once at least `count` events were written.
    pub async fn wait_for_events_count(&self, count: usize) -> TimedNotify {
        self.notify_on_events(move |events| events.len() >= count)
            .await
    }

    /// Registers a notification that fires once the sink was shut down.
    pub async fn wait_for_shutdown(&self) -> TimedNotify {
        let notify = Arc::new(Notify::new());
        let mut inner = self.inner.write().await;
        if inner.shutdown_called {
            notify.notify_one();
        } else {
            inner.shutdown_notifiers.push(notify.clone());
        }

        TimedNotify::new(notify)
    }

    /// Returns whether the shutdown method was called on the sink.
    pub async fn shutdown_called(&self) -> bool {
        self.inner.read().await.shutdown_called
    }
}

impl<K> Sink for TestSinkWrapper<K>
where
    K: Sink + Clone + Send + Sync,
{
    fn name() -> &'static str {
        "wrapper"
    }

    async fn write_events(&self, events: Vec<ChangeEvent>) -> EtlResult<()> {
        let sink = {
            let inner = self.inner.read().await;
            inner.wrapped_sink.clone()
        };

        let result = sink.write_events(events.clone()).await;

        {
            let mut inner = self.inner.write().await;
            if result.is_ok() {
                inner.events.extend(events);
            }

            inner.check_conditions();
        }

        result
    }

    async fn commit(&self) -> EtlResult<()> {
        let sink = {
            let inner = self.inner.read().await;
            inner.wrapped_sink.clone()
        };

        let result = sink.commit().await;

        if result.is_ok() {
            self.inner.write().await.commits += 1;
        }

        result
    }

    async fn shutdown(&self) -> EtlResult<()> {
        let sink = {
            let inner = self.inner.read().await;
            inner.wrapped_sink.clone()
        };

        let result = sink.shutdown().await;

        {
            let mut inner = self.inner.write().await;
            inner.shutdown_called = true;
            for notify in inner.shutdown_notifiers.drain(..) {
                notify.notify_one();
            }
        }

        result
    }
}
