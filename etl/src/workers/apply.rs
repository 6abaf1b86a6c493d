use config::shared::PipelineConfig;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{Instrument, info};

use crate::checkpoint::CheckpointStore;
use crate::concurrency::shutdown::ShutdownRx;
use crate::error::{ErrorKind, EtlError, EtlResult};
use crate::etl_error;
use crate::replication::apply::{ApplyLoop, ApplyLoopResult, LoopPhaseRx, create_phase_channel};
use crate::replication::stream::ReplicationSource;
use crate::sink::Sink;
use crate::workers::base::{Worker, WorkerHandle};

/// Handle of the apply worker.
///
/// Exposes the phase of the apply loop and waits for the worker to terminate.
#[derive(Debug)]
pub struct ApplyWorkerHandle {
    handle: Option<JoinHandle<EtlResult<ApplyLoopResult>>>,
    phase_rx: LoopPhaseRx,
}

impl ApplyWorkerHandle {
    /// Waits for the apply worker and returns how the apply loop terminated.
    ///
    /// A panic in the worker is reported as [`ErrorKind::ApplyWorkerPanic`].
    pub async fn wait_for_result(mut self) -> EtlResult<Option<ApplyLoopResult>> {
        let Some(handle) = self.handle.take() else {
            return Ok(None);
        };

        let result = handle.await.map_err(|err| {
            etl_error!(ErrorKind::ApplyWorkerPanic, "Apply worker panicked", err)
        })??;

        Ok(Some(result))
    }
}

impl WorkerHandle<LoopPhaseRx> for ApplyWorkerHandle {
    fn state(&self) -> LoopPhaseRx {
        self.phase_rx.clone()
    }

    async fn wait(self) -> EtlResult<()> {
        self.wait_for_result().await?;

        Ok(())
    }
}

/// Worker running the [`ApplyLoop`] on the tokio runtime.
#[derive(Debug)]
pub struct ApplyWorker<C, R, K> {
    config: Arc<PipelineConfig>,
    checkpoint_store: C,
    source: R,
    sink: K,
    shutdown_rx: ShutdownRx,
}

impl<C, R, K> ApplyWorker<C, R, K> {
    pub fn new(
        config: Arc<PipelineConfig>,
        checkpoint_store: C,
        source: R,
        sink: K,
        shutdown_rx: ShutdownRx,
    ) -> Self {
        Self {
            config,
            checkpoint_store,
            source,
            sink,
            shutdown_rx,
        }
    }
}

impl<C, R, K> Worker<ApplyWorkerHandle, LoopPhaseRx> for ApplyWorker<C, R, K>
where
    C: CheckpointStore + Send + Sync + 'static,
    R: ReplicationSource + Send + Sync + 'static,
    K: Sink + Send + Sync + 'static,
{
    type Error = EtlError;

    async fn start(self) -> EtlResult<ApplyWorkerHandle> {
        info!("starting apply worker");

        let (phase_tx, phase_rx) = create_phase_channel();

        let apply_worker_span = tracing::info_span!(
            "apply_worker",
            master_table = self.config.master_table().unwrap_or_default(),
            server_id = self.config.server_id
        );
        let apply_worker = async move {
            let result = ApplyLoop::start(
                self.config,
                self.checkpoint_store,
                self.source,
                self.sink,
                self.shutdown_rx,
                phase_tx,
            )
            .await?;

            info!("apply worker completed successfully");

            Ok(result)
        }
        .instrument(apply_worker_span.or_current());

        let handle = tokio::spawn(apply_worker);

        Ok(ApplyWorkerHandle {
            handle: Some(handle),
            phase_rx,
        })
    }
}
