use std::future::Future;

use crate::error::EtlResult;

/// Background worker started by the pipeline.
///
/// `H` is the handle returned once the worker runs and `S` the state exposed by it.
pub trait Worker<H, S>
where
    H: WorkerHandle<S>,
{
    /// Error type returned when worker startup fails.
    type Error;

    /// Starts the worker and returns a handle for monitoring its execution.
    fn start(self) -> impl Future<Output = Result<H, Self::Error>> + Send;
}

/// Handle of a running worker.
///
/// The handle stays valid after the worker completed, so its state can still be inspected.
pub trait WorkerHandle<S> {
    /// Returns the current state of the worker.
    fn state(&self) -> S;

    /// Waits for the worker to complete and returns its result.
    fn wait(self) -> impl Future<Output = EtlResult<()>> + Send;
}
