use config::shared::{ReplicatorConfig, ReplicatorConfigWithoutSecrets, SinkConfig};
use etl::checkpoint::file::FileCheckpointStore;
use etl::pipeline::Pipeline;
use etl::replication::apply::ApplyLoopResult;
use etl::replication::mysql::MySqlReplicationSource;
use etl::sink::Sink;
use etl::sink::memory::MemorySink;
use etl::sink::stdout::StdoutSink;
use tokio::signal::unix::{SignalKind, signal};
use tracing::{info, warn};

use crate::error::ReplicatorResult;

/// Starts the replicator with the provided configuration.
///
/// Wires the file checkpoint store, the MySQL binlog source and the configured sink into a
/// pipeline, then runs it until a shutdown signal or a failure.
pub async fn start_replicator_with_config(
    replicator_config: ReplicatorConfig,
) -> ReplicatorResult<()> {
    info!("starting replicator service");

    log_config(&replicator_config);

    let checkpoint_store = FileCheckpointStore::new(&replicator_config.checkpoint.path);
    let source = MySqlReplicationSource::new(replicator_config.source.clone());

    // Sinks are dispatched statically, each variant builds its own pipeline type.
    match replicator_config.sink {
        SinkConfig::Stdout => {
            let pipeline = Pipeline::new(
                replicator_config.pipeline,
                checkpoint_store,
                source,
                StdoutSink::stdout(),
            );
            start_pipeline(pipeline).await?;
        }
        SinkConfig::Memory => {
            let pipeline = Pipeline::new(
                replicator_config.pipeline,
                checkpoint_store,
                source,
                MemorySink::new(),
            );
            start_pipeline(pipeline).await?;
        }
    }

    info!("replicator service completed");

    Ok(())
}

fn log_config(config: &ReplicatorConfig) {
    let config = ReplicatorConfigWithoutSecrets::from(config.clone());

    info!(
        host = %config.source.host,
        port = config.source.port,
        dbname = %config.source.name,
        username = %config.source.username,
        "source config"
    );
    info!(
        master_table = config.pipeline.master_table().unwrap_or_default(),
        satellite_tables = ?config.pipeline.satellite_tables().collect::<Vec<_>>(),
        identifier_column = %config.pipeline.identifier_column,
        server_id = config.pipeline.server_id,
        "pipeline config"
    );
    info!(
        path = %config.checkpoint.path.display(),
        sink = ?config.sink,
        "checkpoint and sink config"
    );
}

/// Starts a pipeline and handles graceful shutdown signals.
///
/// SIGINT and SIGTERM request a shutdown, after which the pipeline saves its current binlog
/// position and shuts the sink down.
#[tracing::instrument(skip(pipeline))]
async fn start_pipeline<K>(
    mut pipeline: Pipeline<FileCheckpointStore, MySqlReplicationSource, K>,
) -> ReplicatorResult<()>
where
    K: Sink + Clone + Send + Sync + 'static,
{
    // Handlers are registered before starting, so an early signal is not lost.
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    pipeline.start().await?;

    let shutdown_tx = pipeline.shutdown_tx();
    let shutdown_handle = tokio::spawn(async move {
        tokio::select! {
            _ = sigint.recv() => {
                info!("sigint (ctrl+c) received, shutting down pipeline");
            }
            _ = sigterm.recv() => {
                info!("sigterm received, shutting down pipeline");
            }
        }

        if let Err(err) = shutdown_tx.shutdown() {
            warn!(error = ?err, "failed to send shutdown signal");
            return;
        }

        info!("shutdown signal sent to the pipeline");
    });

    let result = pipeline.wait().await;

    // The pipeline may have failed before any signal arrived.
    shutdown_handle.abort();
    let _ = shutdown_handle.await;

    match result? {
        Some(ApplyLoopResult::Shutdown { checkpoint }) => match checkpoint {
            Some(checkpoint) => info!(%checkpoint, "pipeline stopped"),
            None => info!("pipeline stopped without saving a checkpoint"),
        },
        None => info!("pipeline was not running"),
    }

    Ok(())
}
