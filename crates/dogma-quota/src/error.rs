//! Write-quota limiter errors.

use thiserror::Error;

use dogma_coordination::CoordinationError;
use dogma_types::ExecutionPath;

#[derive(Debug, Error)]
pub enum QuotaError {
    #[error(transparent)]
    Coordination(#[from] CoordinationError),

    /// The shared-count semaphore did not grant a permit within its 200 ms
    /// acquisition timeout (`spec.md` §4.4).
    #[error("too many requests on {execution_path}: quota is {permits_per_second}/s")]
    TooManyRequests {
        execution_path: ExecutionPath,
        permits_per_second: u32,
    },
}

pub type QuotaResult<T> = Result<T, QuotaError>;
