//! The unified error taxonomy surfaced to callers (`spec.md` §7).

use thiserror::Error;

use crate::repository::ExecutionPath;
use crate::revision::Revision;

/// Errors surfaced by the replicated core to its callers.
#[derive(Debug, Error)]
pub enum DogmaError {
    /// The caller's revision is not known to this replica. A candidate for
    /// retry by the lag-tolerant client proxy (C6).
    #[error("revision not found: {0}")]
    RevisionNotFound(Revision),

    #[error("entry not found: {0}")]
    EntryNotFound(String),

    #[error("repository not found: {0}")]
    RepositoryNotFound(String),

    #[error("project not found: {0}")]
    ProjectNotFound(String),

    /// The commit cannot be applied cleanly (conflicting write, rename onto
    /// an existing path, removal of a non-existent path, ...).
    #[error("change conflict: {0}")]
    ChangeConflict(String),

    /// The commit's net effect against the base revision is empty.
    #[error("redundant change: commit has no net effect")]
    RedundantChange,

    /// Write-quota exhausted for this execution path.
    #[error("too many requests on {execution_path}: quota is {permits_per_second}/s")]
    TooManyRequests {
        execution_path: String,
        permits_per_second: u32,
    },

    /// The replica has entered read-only mode after a fatal coordination or
    /// replication error.
    #[error("replica is read-only")]
    ReadOnly,

    /// The request arrived while the replica is draining.
    #[error("replica is shutting down")]
    ShuttingDown,

    /// The watch future was cancelled by the caller.
    #[error("watch was cancelled")]
    Cancelled,

    /// A lock-acquisition attempt exceeded its deadline.
    #[error("lock acquisition on {0} timed out")]
    LockTimeout(ExecutionPath),

    /// The coordination service is unreachable past its configured session
    /// timeout. Fatal: triggers the executor's transition to read-only.
    #[error("coordination service unreachable: {0}")]
    CoordinationUnavailable(String),

    /// A replayed log's result did not match the locally computed result.
    /// Unrecoverable: the replica enters read-only and refuses further
    /// writes (`spec.md` §4.3 "replay").
    #[error("replay mismatch at sequence {sequence}: {detail}")]
    ReplayMismatch { sequence: u64, detail: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

impl DogmaError {
    /// True for errors the lag-tolerant client proxy is allowed to retry
    /// (`spec.md` §4.6, §7 "Client-side, C6 retries only `RevisionNotFound`").
    pub fn is_retryable_by_proxy(&self) -> bool {
        matches!(self, DogmaError::RevisionNotFound(_))
    }
}

pub type DogmaResult<T> = Result<T, DogmaError>;
