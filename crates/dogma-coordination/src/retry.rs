//! The shared transient-retry loop used by every coordination primitive
//! (`spec.md` §4.1: "transient errors are retried indefinitely with a fixed
//! 500 ms interval").

use std::time::Duration;

use tokio::time::{Instant, sleep};

use crate::error::CoordinationError;

/// The fixed retry interval for transient coordination-service faults.
pub const RETRY_INTERVAL: Duration = Duration::from_millis(500);

/// The outcome of a single attempt at a coordination operation.
pub enum Attempt<T> {
    /// The operation succeeded.
    Ready(T),
    /// A transient fault occurred; retry after [`RETRY_INTERVAL`].
    Transient,
    /// A fatal fault occurred; stop retrying and surface it.
    Fatal(CoordinationError),
}

/// Retries `op` until it reports [`Attempt::Ready`] or [`Attempt::Fatal`],
/// sleeping [`RETRY_INTERVAL`] between transient attempts, bounded by
/// `deadline`. Passing `None` retries indefinitely (used for primitives with
/// no intrinsic deadline, e.g. node creation); a `Some` deadline is used by
/// callers with an explicit timeout (mutex acquisition, permit acquisition).
pub async fn retry_transient<T, F, Fut>(
    deadline: Option<Duration>,
    mut op: F,
) -> Result<T, CoordinationError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Attempt<T>>,
{
    let started = Instant::now();
    loop {
        match op().await {
            Attempt::Ready(value) => return Ok(value),
            Attempt::Fatal(err) => return Err(err),
            Attempt::Transient => {
                if let Some(deadline) = deadline {
                    if started.elapsed() >= deadline {
                        return Err(CoordinationError::DeadlineExceeded(
                            "transient retry loop".to_string(),
                        ));
                    }
                }
                tracing::warn!("transient coordination fault, retrying in {RETRY_INTERVAL:?}");
                sleep(RETRY_INTERVAL).await;
            }
        }
    }
}
