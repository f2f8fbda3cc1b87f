//! `RevisionNotFound`-only retry policy (`spec.md` §4.6): if the proxy's
//! revision cache says the requested revision should already be known,
//! retry after `retryIntervalMillis` up to `maxRetries` times instead of
//! immediately failing the caller.

use std::future::Future;
use std::time::Duration;

use dogma_types::{DogmaError, DogmaResult, RepositoryId, Revision};

use crate::cache::RevisionCache;

/// Tunables mirroring `spec.md` §6's `maxRetries`/`retryIntervalMillis`.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub retry_interval: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval: Duration::from_millis(500),
        }
    }
}

/// True if a `RevisionNotFound(requested)` is worth retrying given
/// `cached_highest`, the proxy's best-known revision for the repository in
/// question: for an absolute `requested`, the cache must already claim a
/// revision at least that high; for a relative `requested` (e.g. `HEAD`),
/// its major plus the cached major must be non-negative.
pub fn retry_eligible(requested: Revision, cached_highest: Option<Revision>) -> bool {
    let Some(highest) = cached_highest else {
        return false;
    };
    if requested.is_absolute() {
        highest >= requested
    } else {
        requested.major().saturating_add(highest.major()) >= 0
    }
}

/// Runs `op` until it succeeds, fails with something other than
/// `RevisionNotFound`, or a `RevisionNotFound` is not worth retrying (either
/// `cache` has no opinion, or `config.max_retries` attempts are exhausted).
/// Mirrors `dogma_coordination::retry_transient`'s bounded-retry-with-sleep
/// shape, bounded by an attempt count rather than a deadline since this
/// policy is specified as `maxRetries`, not a timeout.
pub async fn retry_on_revision_not_found<T, F, Fut>(
    config: &RetryConfig,
    cache: &RevisionCache,
    repo: &RepositoryId,
    mut op: F,
) -> DogmaResult<T>
where
    T: Send,
    F: FnMut() -> Fut + Send,
    Fut: Future<Output = DogmaResult<T>> + Send,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(DogmaError::RevisionNotFound(requested))
                if attempt < config.max_retries && retry_eligible(requested, cache.highest(repo)) =>
            {
                attempt += 1;
                tracing::info!(%repo, %requested, attempt, "revision not found, retrying");
                tokio::time::sleep(config.retry_interval).await;
            }
            Err(err) => return Err(err),
        }
    }
}
