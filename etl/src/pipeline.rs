use config::shared::PipelineConfig;
use std::sync::Arc;
use tracing::{error, info};

use crate::bail;
use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::{ShutdownTx, create_shutdown_channel};
use crate::error::{ErrorKind, EtlResult};
use crate::replication::apply::{ApplyLoopResult, LoopPhase, LoopPhaseRx};
use crate::replication::stream::ReplicationSource;
use crate::sink::Sink;
use crate::workers::apply::{ApplyWorker, ApplyWorkerHandle};
use crate::workers::base::{Worker, WorkerHandle};

#[derive(Debug)]
enum PipelineState {
    NotStarted,
    Started { apply_worker: ApplyWorkerHandle },
}

/// Binlog to sink replication pipeline.
///
/// Wires a [`CheckpointStore`], a [`ReplicationSource`] and a [`Sink`] together and runs the
/// apply loop in a background worker.
#[derive(Debug)]
pub struct Pipeline<C, R, K> {
    config: Arc<PipelineConfig>,
    checkpoint_store: C,
    source: R,
    sink: K,
    state: PipelineState,
    shutdown_tx: ShutdownTx,
}

impl<C, R, K> Pipeline<C, R, K>
where
    C: CheckpointStore + Clone + Send + Sync + 'static,
    R: ReplicationSource + Clone + Send + Sync + 'static,
    K: Sink + Clone + Send + Sync + 'static,
{
    pub fn new(config: PipelineConfig, checkpoint_store: C, source: R, sink: K) -> Self {
        // Receivers are created from the sender with `subscribe` when workers start.
        let (shutdown_tx, _) = create_shutdown_channel();

        Self {
            config: Arc::new(config),
            checkpoint_store,
            source,
            sink,
            state: PipelineState::NotStarted,
            shutdown_tx,
        }
    }

    pub fn shutdown_tx(&self) -> ShutdownTx {
        self.shutdown_tx.clone()
    }

    /// Returns a receiver of the apply loop phase, once the pipeline was started.
    pub fn phase_rx(&self) -> Option<LoopPhaseRx> {
        match &self.state {
            PipelineState::NotStarted => None,
            PipelineState::Started { apply_worker } => Some(apply_worker.state()),
        }
    }

    /// Returns the current phase of the apply loop, once the pipeline was started.
    pub fn phase(&self) -> Option<LoopPhase> {
        self.phase_rx().map(|phase_rx| *phase_rx.borrow())
    }

    pub async fn start(&mut self) -> EtlResult<()> {
        if let PipelineState::Started { .. } = self.state {
            bail!(
                ErrorKind::InvalidState,
                "Pipeline already started",
                "A pipeline can only be started once"
            );
        }

        self.config.validate()?;

        info!(
            master_table = self.config.master_table().unwrap_or_default(),
            satellite_tables = ?self.config.satellite_tables().collect::<Vec<_>>(),
            sink = K::name(),
            "starting pipeline"
        );

        let apply_worker = ApplyWorker::new(
            self.config.clone(),
            self.checkpoint_store.clone(),
            self.source.clone(),
            self.sink.clone(),
            self.shutdown_tx.subscribe(),
        )
        .start()
        .await?;

        self.state = PipelineState::Started { apply_worker };

        Ok(())
    }

    /// Waits for the pipeline to terminate.
    ///
    /// Returns [`None`] if the pipeline was never started.
    pub async fn wait(self) -> EtlResult<Option<ApplyLoopResult>> {
        let PipelineState::Started { apply_worker } = self.state else {
            info!("pipeline was not started, nothing to wait for");

            return Ok(None);
        };

        info!("waiting for apply worker to complete");

        let result = apply_worker.wait_for_result().await?;

        info!("pipeline completed successfully");

        Ok(result)
    }

    /// Requests a graceful shutdown.
    ///
    /// The apply loop stops after the event it is processing, saves the current position as
    /// checkpoint and shuts the sink down.
    pub fn shutdown(&self) {
        info!("trying to shut down the pipeline");

        if let Err(err) = self.shutdown_tx.shutdown() {
            error!("failed to send shutdown signal to the pipeline: {}", err);
            return;
        }

        info!("shut down signal successfully sent to all workers");
    }

    pub async fn shutdown_and_wait(self) -> EtlResult<Option<ApplyLoopResult>> {
        self.shutdown();
        self.wait().await
    }
}
