//! Executor tunables (`spec.md` §6 "Tunable configuration").

use std::time::Duration;

/// Default `lockTimeoutMillis` (`spec.md` §6).
pub const DEFAULT_LOCK_TIMEOUT_MILLIS: u64 = 60_000;

/// How often the leader polls [`dogma_replog::LogStore::prune`]. Not part of
/// the wire contract; an internal scheduling detail of this implementation.
pub const PRUNE_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Size of the bounded worker pool executing `execute()` calls.
    pub num_workers: usize,
    /// Deadline for the per-execution-path distributed mutex.
    pub lock_timeout: Duration,
    /// Pruning threshold: keep at most this many logs...
    pub max_log_count: usize,
    /// ...unless younger than this age.
    pub min_log_age_millis: i64,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            num_workers: 4,
            lock_timeout: Duration::from_millis(DEFAULT_LOCK_TIMEOUT_MILLIS),
            max_log_count: 10_000,
            min_log_age_millis: 60_000,
        }
    }
}
