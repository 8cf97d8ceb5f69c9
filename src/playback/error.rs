use thiserror::Error;

use crate::storage::error::StorageError;

#[derive(Debug, Error)]
pub enum PlaybackError {
    /// Nothing pending in the queue when the play list ran out
    #[error("the queue is empty, nothing to play")]
    EmptyQueue,

    /// Navigation before the start of the play list
    #[error("no earlier track")]
    BoundaryReached,

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl PlaybackError {
    /// Non-fatal conditions leave the player untouched and only need reporting
    pub fn is_fatal(&self) -> bool {
        matches!(self, PlaybackError::Storage(_))
    }
}
