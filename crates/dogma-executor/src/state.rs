//! The per-replica executor state machine (`spec.md` §4.3).

/// The executor's lifecycle state. Transitions only move forward along the
/// paths drawn in `spec.md` §4.3: `Created -> Starting -> Started ->
/// (ReadOnly) -> Stopped`. A stopped executor cannot be restarted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutorState {
    Created,
    Starting,
    Started,
    ReadOnly,
    Stopped,
}

impl ExecutorState {
    /// True if the executor accepts mutating commands.
    pub fn is_writable(self) -> bool {
        matches!(self, ExecutorState::Started)
    }

    /// True if the executor is between `start()` and `stop()`.
    pub fn is_started(self) -> bool {
        matches!(self, ExecutorState::Started | ExecutorState::ReadOnly)
    }
}
