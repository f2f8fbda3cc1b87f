//! Replication log store errors.

use thiserror::Error;

use dogma_coordination::CoordinationError;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),

    /// The concatenated block payload length did not match the metadata's
    /// declared size — durable corruption, not a transient fault.
    #[error("log {sequence} corrupt: expected {expected} bytes, got {actual}")]
    SizeMismatch {
        sequence: u64,
        expected: u64,
        actual: usize,
    },
}

pub type LogStoreResult<T> = Result<T, LogStoreError>;
