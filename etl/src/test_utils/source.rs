use std::sync::Arc;
use tokio::sync::{Mutex, mpsc};

use crate::bail;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::replication::stream::{ReplicationSource, ReplicationStream, StreamRequest};
use crate::types::{BinlogEvent, BinlogPosition};

#[derive(Debug)]
enum ScriptedItem {
    Event {
        event: BinlogEvent,
        position: Option<BinlogPosition>,
    },
    Error(EtlError),
}

#[derive(Debug)]
struct Inner {
    receiver: Option<mpsc::UnboundedReceiver<ScriptedItem>>,
    requests: Vec<StreamRequest>,
}

/// [`ReplicationSource`] yielding the events pushed through its [`ScriptedSourceHandle`].
///
/// The stream waits for new items like an idle binlog connection, and ends once the
/// handle is closed or dropped.
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    inner: Arc<Mutex<Inner>>,
}

/// Feeds events into a [`ScriptedSource`].
#[derive(Debug)]
pub struct ScriptedSourceHandle {
    sender: Option<mpsc::UnboundedSender<ScriptedItem>>,
    source: ScriptedSource,
}

/// Creates a scripted source together with the handle feeding it.
pub fn create_scripted_source() -> (ScriptedSource, ScriptedSourceHandle) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let source = ScriptedSource {
        inner: Arc::new(Mutex::new(Inner {
            receiver: Some(receiver),
            requests: Vec::new(),
        })),
    };
    let handle = ScriptedSourceHandle {
        sender: Some(sender),
        source: source.clone(),
    };

    (source, handle)
}

impl ScriptedSourceHandle {
    /// Pushes an event. The stream reports `position` once the event was yielded.
    ///
    /// Without a position, rotations report their own position and other events keep the
    /// previous one.
    pub fn push(&self, event: BinlogEvent, position: Option<BinlogPosition>) {
        self.send(ScriptedItem::Event { event, position });
    }

    /// Pushes an event located right before `log_position` in the current binlog file.
    pub fn push_at(&self, event: BinlogEvent, log_file: &str, log_position: u64) {
        self.push(event, Some(BinlogPosition::new(log_file, log_position)));
    }

    /// Pushes an error, as yielded by a stream whose connection failed.
    pub fn push_error(&self, err: EtlError) {
        self.send(ScriptedItem::Error(err));
    }

    /// Ends the stream once every pushed item was consumed.
    pub fn close(&mut self) {
        self.sender.take();
    }

    /// Returns the requests the source was opened with.
    pub async fn requests(&self) -> Vec<StreamRequest> {
        self.source.inner.lock().await.requests.clone()
    }

    fn send(&self, item: ScriptedItem) {
        if let Some(sender) = &self.sender {
            // The stream may already be gone after a failure, items are dropped then.
            let _ = sender.send(item);
        }
    }
}

impl ReplicationSource for ScriptedSource {
    type Stream = ScriptedStream;

    async fn open(&self, request: StreamRequest) -> EtlResult<ScriptedStream> {
        let mut inner = self.inner.lock().await;
        let Some(receiver) = inner.receiver.take() else {
            bail!(
                ErrorKind::InvalidState,
                "Scripted source already opened",
                "A scripted source can only be opened once"
            );
        };

        let position = request.resume_position().cloned();
        inner.requests.push(request);

        Ok(ScriptedStream {
            receiver,
            position,
            closed: false,
        })
    }
}

#[derive(Debug)]
pub struct ScriptedStream {
    receiver: mpsc::UnboundedReceiver<ScriptedItem>,
    position: Option<BinlogPosition>,
    closed: bool,
}

impl ReplicationStream for ScriptedStream {
    async fn next_event(&mut self) -> Option<EtlResult<BinlogEvent>> {
        match self.receiver.recv().await {
            Some(ScriptedItem::Event { event, position }) => {
                if let Some(position) = position {
                    self.position = Some(position);
                } else if let BinlogEvent::Rotation(position) = &event {
                    self.position = Some(position.clone());
                }

                Some(Ok(event))
            }
            Some(ScriptedItem::Error(err)) => {
                self.closed = true;
                Some(Err(err))
            }
            None => {
                self.closed = true;
                None
            }
        }
    }

    fn position(&self) -> Option<BinlogPosition> {
        self.position.clone()
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
