//! Maps the lower-level crate error types onto the unified
//! [`dogma_types::DogmaError`] taxonomy the executor surfaces to callers
//! (`spec.md` §7). Kept as free functions rather than blanket `From` impls
//! because the right `DogmaError` variant depends on *which* operation
//! failed (e.g. a `CoordinationError::DeadlineExceeded` during mutex
//! acquisition is a `LockTimeout`, but the same error during catch-up replay
//! is `CoordinationUnavailable`).

use dogma_coordination::CoordinationError;
use dogma_replog::LogStoreError;
use dogma_quota::QuotaError;
use dogma_types::{DogmaError, ExecutionPath};

pub(crate) fn mutex_error(path: &ExecutionPath, err: CoordinationError) -> DogmaError {
    match err {
        CoordinationError::DeadlineExceeded(_) => DogmaError::LockTimeout(path.clone()),
        other => DogmaError::CoordinationUnavailable(other.to_string()),
    }
}

pub(crate) fn coordination_error(err: CoordinationError) -> DogmaError {
    DogmaError::CoordinationUnavailable(err.to_string())
}

pub(crate) fn quota_error(err: QuotaError) -> DogmaError {
    match err {
        QuotaError::TooManyRequests {
            execution_path,
            permits_per_second,
        } => DogmaError::TooManyRequests {
            execution_path: execution_path.to_string(),
            permits_per_second,
        },
        QuotaError::Coordination(e) => coordination_error(e),
    }
}

pub(crate) fn log_store_error(sequence: u64, err: LogStoreError) -> DogmaError {
    match err {
        LogStoreError::Coordination(e) => coordination_error(e),
        LogStoreError::Serialization(e) => DogmaError::Serialization(e),
        LogStoreError::SizeMismatch { expected, actual, .. } => DogmaError::ReplayMismatch {
            sequence,
            detail: format!("log block payload corrupt: expected {expected} bytes, got {actual}"),
        },
    }
}
