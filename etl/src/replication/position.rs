use tracing::{info, warn};

use crate::checkpoint::CheckpointStore;
use crate::error::EtlResult;
use crate::types::{BinlogPosition, Checkpoint};

/// Outcome of a checkpoint flush attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The position was written to the checkpoint store.
    Saved(Checkpoint),
    /// Nothing was observed yet, so there is nothing to save.
    NothingToSave,
    /// The current position is behind the last saved checkpoint and was not written.
    Regressed {
        current: BinlogPosition,
        last_saved: Checkpoint,
    },
}

/// In-memory mirror of the replication stream position.
///
/// The tracker is owned by the apply loop. It is updated after every event read from the
/// stream and writes the checkpoint on rotation boundaries and on shutdown. Saved
/// checkpoints never move backwards within one run.
#[derive(Debug, Default)]
pub struct PositionTracker {
    current: Option<BinlogPosition>,
    last_saved: Option<Checkpoint>,
}

impl PositionTracker {
    /// Creates a tracker starting at `initial`, usually the checkpoint loaded at startup.
    pub fn new(initial: Option<Checkpoint>) -> Self {
        Self {
            current: initial.clone(),
            last_saved: initial,
        }
    }

    /// Records the position reported by the stream after an event was read.
    pub fn observe(&mut self, position: BinlogPosition) {
        self.current = Some(position);
    }

    pub fn current(&self) -> Option<&BinlogPosition> {
        self.current.as_ref()
    }

    pub fn last_saved(&self) -> Option<&Checkpoint> {
        self.last_saved.as_ref()
    }

    /// Saves the current position after a rotation boundary.
    pub async fn on_rotation<S>(&mut self, store: &S) -> EtlResult<FlushOutcome>
    where
        S: CheckpointStore,
    {
        let outcome = self.save(store).await?;
        if let FlushOutcome::Saved(checkpoint) = &outcome {
            info!(%checkpoint, "saved checkpoint on binlog rotation");
        }

        Ok(outcome)
    }

    /// Saves the current position before the loop terminates gracefully.
    pub async fn flush<S>(&mut self, store: &S) -> EtlResult<FlushOutcome>
    where
        S: CheckpointStore,
    {
        let outcome = self.save(store).await?;
        if let FlushOutcome::Saved(checkpoint) = &outcome {
            info!(%checkpoint, "flushed checkpoint on shutdown");
        }

        Ok(outcome)
    }

    async fn save<S>(&mut self, store: &S) -> EtlResult<FlushOutcome>
    where
        S: CheckpointStore,
    {
        let Some(current) = self.current.clone() else {
            return Ok(FlushOutcome::NothingToSave);
        };

        if let Some(last_saved) = &self.last_saved
            && current < *last_saved
        {
            warn!(
                %current,
                %last_saved,
                "current binlog position is behind the saved checkpoint, skipping save"
            );

            return Ok(FlushOutcome::Regressed {
                current,
                last_saved: last_saved.clone(),
            });
        }

        store.save(&current).await?;
        self.last_saved = Some(current.clone());

        Ok(FlushOutcome::Saved(current))
    }
}
