//! Collaborator interfaces the channel hands finished batches to.

use std::io;

use thiserror::Error;

use crate::Batch;

#[derive(Debug, Error)]
pub enum SendError {
    #[error("sender is unavailable")]
    Unavailable,
    #[error("delivery rejected: {0}")]
    Rejected(String),
    #[error("delivery I/O failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store is full ({capacity} batches pending)")]
    Full { capacity: usize },
    #[error("stored batch is corrupt: {0}")]
    Corrupt(String),
    #[error("store I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// Outbound delivery of a finished batch.
///
/// Called from the channel's flush worker, never from a producer thread.
/// Implementations should bound their own attempt; a failed send is not
/// retried, the batch goes to the store instead.
pub trait BatchSender: Send + Sync {
    fn send(&self, batch: &Batch) -> Result<(), SendError>;

    /// A sender that reports itself unavailable is skipped and the batch is
    /// stored directly.
    fn is_available(&self) -> bool {
        true
    }
}

/// Overflow and recovery storage for batches that could not be sent.
pub trait BatchStore: Send + Sync {
    fn store(&self, batch: Batch) -> Result<(), StoreError>;

    /// Removes and returns every stored batch, oldest first.
    fn drain_stored(&self) -> Result<Vec<Batch>, StoreError>;
}
