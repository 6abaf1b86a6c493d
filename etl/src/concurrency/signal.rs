//! Payload-less signals built on tokio watch channels.

use tokio::sync::watch;

/// Transmitter side of a signal channel.
pub type SignalTx = watch::Sender<()>;

/// Receiver side of a signal channel.
///
/// Every receiver observes each signal, so one transmitter can notify several tasks.
pub type SignalRx = watch::Receiver<()>;

/// Creates a new signal channel.
///
/// The initial value counts as already seen, so [`watch::Receiver::changed`] only resolves
/// once a signal is sent.
pub fn create_signal() -> (SignalTx, SignalRx) {
    watch::channel(())
}
