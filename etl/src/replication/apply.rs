use config::shared::PipelineConfig;
use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::bail;
use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::ShutdownRx;
use crate::conversions::ChangeEventMapper;
use crate::error::{ErrorKind, EtlResult};
use crate::replication::position::{FlushOutcome, PositionTracker};
use crate::replication::stream::{ReplicationSource, ReplicationStream, StreamRequest};
use crate::sink::Sink;
use crate::types::{BinlogEvent, Checkpoint, RowsEvent};

/// Phase of the apply loop, published while it runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopPhase {
    /// Loading the checkpoint and deciding where to resume.
    Starting,
    /// Opening the replication stream.
    Resuming,
    /// Consuming events from the replication stream.
    Streaming,
    /// Flushing the checkpoint after a shutdown request.
    ShuttingDown,
    /// Terminated with an error. The process must be restarted to resume.
    Failed,
}

impl fmt::Display for LoopPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoopPhase::Starting => write!(f, "starting"),
            LoopPhase::Resuming => write!(f, "resuming"),
            LoopPhase::Streaming => write!(f, "streaming"),
            LoopPhase::ShuttingDown => write!(f, "shutting_down"),
            LoopPhase::Failed => write!(f, "failed"),
        }
    }
}

pub type LoopPhaseTx = watch::Sender<LoopPhase>;

pub type LoopPhaseRx = watch::Receiver<LoopPhase>;

pub fn create_phase_channel() -> (LoopPhaseTx, LoopPhaseRx) {
    watch::channel(LoopPhase::Starting)
}

/// Result of an apply loop that terminated without errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyLoopResult {
    /// The loop stopped after a shutdown request.
    ///
    /// `checkpoint` is the last checkpoint known to be saved, if any.
    Shutdown { checkpoint: Option<Checkpoint> },
}

/// Sequential consumer of the replication stream.
///
/// The loop owns the [`PositionTracker`], so the in-memory position and the checkpoint are
/// never mutated concurrently. Events are handled one at a time and shutdown requests are
/// only observed between events.
#[derive(Debug)]
pub struct ApplyLoop<C, K> {
    config: Arc<PipelineConfig>,
    checkpoint_store: C,
    sink: K,
    mapper: ChangeEventMapper,
    tracker: PositionTracker,
    shutdown_rx: ShutdownRx,
    phase_tx: LoopPhaseTx,
    /// Change events written to the sink since the last commit was delivered.
    uncommitted_events: usize,
}

impl<C, K> ApplyLoop<C, K>
where
    C: CheckpointStore + Send + Sync,
    K: Sink + Send + Sync,
{
    /// Runs the apply loop until shutdown or failure.
    ///
    /// On failure the phase is set to [`LoopPhase::Failed`] and no checkpoint is saved, so that
    /// a restart resumes from the last checkpoint saved on a rotation or shutdown.
    pub async fn start<R>(
        config: Arc<PipelineConfig>,
        checkpoint_store: C,
        source: R,
        sink: K,
        shutdown_rx: ShutdownRx,
        phase_tx: LoopPhaseTx,
    ) -> EtlResult<ApplyLoopResult>
    where
        R: ReplicationSource + Send + Sync,
    {
        phase_tx.send_replace(LoopPhase::Starting);
        info!(
            master_table = config.master_table().unwrap_or_default(),
            tables = config.tables.len(),
            sink = K::name(),
            "starting apply loop"
        );

        let mapper = match ChangeEventMapper::from_config(&config) {
            Ok(mapper) => mapper,
            Err(err) => {
                phase_tx.send_replace(LoopPhase::Failed);
                return Err(err);
            }
        };

        let mut apply_loop = Self {
            config,
            checkpoint_store,
            sink,
            mapper,
            tracker: PositionTracker::new(None),
            shutdown_rx,
            phase_tx,
            uncommitted_events: 0,
        };

        let result = apply_loop.run(&source).await;
        if let Err(err) = &result {
            apply_loop.set_phase(LoopPhase::Failed);
            error!(
                error = %err,
                position = ?apply_loop.tracker.current(),
                last_saved = ?apply_loop.tracker.last_saved(),
                "apply loop failed"
            );
        }

        result
    }

    async fn run<R>(&mut self, source: &R) -> EtlResult<ApplyLoopResult>
    where
        R: ReplicationSource + Send + Sync,
    {
        let checkpoint = self.checkpoint_store.load().await?;
        let request = StreamRequest::new(checkpoint.clone(), &self.config);
        match &checkpoint {
            Some(checkpoint) => info!(%checkpoint, "resuming from checkpoint"),
            None => info!("no checkpoint found, streaming from the oldest retained binlog"),
        }
        self.tracker = PositionTracker::new(checkpoint);

        self.set_phase(LoopPhase::Resuming);
        let mut stream = tokio::select! {
            biased;

            _ = self.shutdown_rx.changed() => {
                info!("shutdown requested while opening the replication stream");
                return self.shutdown().await;
            }

            stream = source.open(request) => stream?,
        };

        let mut streaming = false;
        loop {
            let event = tokio::select! {
                biased;

                // Shutdown takes priority over pending events.
                _ = self.shutdown_rx.changed() => {
                    info!("shutting down apply loop");
                    return self.shutdown().await;
                }

                event = stream.next_event() => event,
            };

            let Some(event) = event else {
                if stream.is_closed() {
                    warn!("replication stream ended due to closed mysql connection");
                    bail!(
                        ErrorKind::SourceConnectionFailed,
                        "MySQL connection has been closed during the apply loop"
                    )
                } else {
                    warn!("replication stream ended unexpectedly");
                    bail!(
                        ErrorKind::SourceConnectionFailed,
                        "Replication stream ended unexpectedly during the apply loop"
                    )
                }
            };
            let event = event?;

            if !streaming {
                streaming = true;
                self.set_phase(LoopPhase::Streaming);
                info!("streaming binlog events");
            }

            if let Some(position) = stream.position() {
                self.tracker.observe(position);
            }

            self.handle_event(event).await?;
        }
    }

    async fn handle_event(&mut self, event: BinlogEvent) -> EtlResult<()> {
        match event {
            BinlogEvent::Rotation(position) => {
                debug!(%position, "received binlog rotation");
                self.tracker.observe(position);
                self.tracker.on_rotation(&self.checkpoint_store).await?;
            }
            BinlogEvent::TransactionCommit { xid } => {
                self.deliver_commit(xid).await?;
            }
            BinlogEvent::Rows(rows) => {
                self.handle_rows(rows).await?;
            }
        }

        Ok(())
    }

    async fn handle_rows(&mut self, rows: RowsEvent) -> EtlResult<()> {
        let table = rows.table.clone();
        let kind = rows.kind;
        let row_count = rows.rows.len();

        let events = self.mapper.map_rows(rows).inspect_err(|err| {
            error!(
                %table,
                %kind,
                row_count,
                position = ?self.tracker.current(),
                error = %err,
                "failed to map rows event"
            );
        })?;

        if events.is_empty() {
            return Ok(());
        }

        debug!(%table, %kind, events = events.len(), "forwarding change events to sink");
        self.uncommitted_events += events.len();
        self.sink.write_events(events).await
    }

    /// Signals a commit to the sink when change events were written since the last one.
    async fn deliver_commit(&mut self, xid: u64) -> EtlResult<()> {
        if self.uncommitted_events == 0 {
            debug!(xid, "transaction touched no tracked table, skipping sink commit");
            return Ok(());
        }

        self.sink.commit().await?;
        debug!(xid, events = self.uncommitted_events, "committed transaction to sink");
        self.uncommitted_events = 0;

        Ok(())
    }

    async fn shutdown(&mut self) -> EtlResult<ApplyLoopResult> {
        self.set_phase(LoopPhase::ShuttingDown);

        if let FlushOutcome::NothingToSave = self.tracker.flush(&self.checkpoint_store).await? {
            info!("no binlog position observed, no checkpoint saved on shutdown");
        }

        self.sink.shutdown().await?;

        Ok(ApplyLoopResult::Shutdown {
            checkpoint: self.tracker.last_saved().cloned(),
        })
    }

    fn set_phase(&self, phase: LoopPhase) {
        let previous = self.phase_tx.send_replace(phase);
        if previous != phase {
            debug!(%previous, %phase, "apply loop phase changed");
        }
    }
}
