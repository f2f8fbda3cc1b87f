//! The last-replayed cursor: a small piece of per-replica durable state
//! (`spec.md` §3 "Last-replayed cursor", §6 "a `last_revision` text file").

use dogma_types::LogSequence;

/// Persists the greatest log sequence this replica has applied to its local
/// storage. A real deployment backs this with the `last_revision` file
/// named in `spec.md` §6; [`InMemoryCursorStore`] is the reference
/// implementation for tests and single-process runs.
pub trait CursorStore: Send + Sync + 'static {
    /// Loads the persisted cursor, or `None` if this replica has never
    /// replayed a log.
    fn load(&self) -> impl Future<Output = Option<LogSequence>> + Send;

    /// Atomically replaces the persisted cursor. Called only after a
    /// successful local apply (`spec.md` §3 invariant: "Last-replayed
    /// cursor... updated after local apply succeeds").
    fn store(&self, sequence: LogSequence) -> impl Future<Output = ()> + Send;
}

/// An in-memory [`CursorStore`], suitable for tests and for a
/// single-replica deployment with no durable cursor requirement.
#[derive(Default)]
pub struct InMemoryCursorStore {
    cursor: std::sync::atomic::AtomicU64,
    has_value: std::sync::atomic::AtomicBool,
}

impl InMemoryCursorStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CursorStore for InMemoryCursorStore {
    async fn load(&self) -> Option<LogSequence> {
        if self.has_value.load(std::sync::atomic::Ordering::Acquire) {
            Some(LogSequence(self.cursor.load(std::sync::atomic::Ordering::Acquire)))
        } else {
            None
        }
    }

    async fn store(&self, sequence: LogSequence) {
        self.cursor.store(sequence.0, std::sync::atomic::Ordering::Release);
        self.has_value.store(true, std::sync::atomic::Ordering::Release);
    }
}
