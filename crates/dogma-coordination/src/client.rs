//! The [`CoordinationClient`] trait: a thin adapter over the ensemble
//! primitives (`spec.md` §4.1).

use tokio::sync::{mpsc, watch};

use crate::error::CoordinationError;

/// A held distributed mutex. Dropping it without calling
/// [`CoordinationClient::release_mutex`] is a caller bug (the lock leaks
/// until the session drops it); the executor always releases explicitly.
#[derive(Debug)]
pub struct MutexHandle {
    pub path: String,
    pub(crate) token: u64,
}

/// A held write-quota permit lease.
#[derive(Debug)]
pub struct LeaseHandle {
    pub path: String,
    pub(crate) token: u64,
}

/// A live leader-election participation. `leadership` transitions `true`
/// when this client becomes leader and `false` when it loses leadership
/// (REDESIGN FLAGS, `spec.md` §9: a channel/condvar-based wait is equivalent
/// to the source's monitor `wait`/`notify`).
pub struct LeaderElection {
    pub leadership: watch::Receiver<bool>,
}

impl LeaderElection {
    /// True if this client currently holds leadership.
    pub fn is_leader(&self) -> bool {
        *self.leadership.borrow()
    }

    /// Waits until the leadership flag changes value, returning the new
    /// value. Used by the leader-selector listener to wake "whenever a new
    /// log child is observed" is a separate mechanism
    /// ([`CoordinationClient::watch_children`]); this only tracks
    /// acquire/release of the `<root>/leader` node itself.
    pub async fn changed(&mut self) -> bool {
        let _ = self.leadership.changed().await;
        *self.leadership.borrow()
    }
}

/// A thin adapter over the coordination ensemble's primitives: sequential
/// node creation, child watches, a distributed mutex, a shared-count
/// semaphore, and leader election (`spec.md` §4.1).
///
/// Implementations are responsible for retrying transient faults internally
/// (see [`crate::retry::retry_transient`]) and only returning
/// [`CoordinationError::Unavailable`] once a fault is judged fatal.
pub trait CoordinationClient: Send + Sync + 'static {
    /// Creates a persistent node at `path` if it does not already exist.
    /// Idempotent.
    fn create_persistent(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;

    /// Creates a sequential child node under `path` with the given payload,
    /// returning the assigned sequence number.
    fn create_sequential(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<u64, CoordinationError>> + Send;

    /// Reads the payload stored at `path`.
    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, CoordinationError>> + Send;

    /// Lists the names of `path`'s direct children.
    fn list_children(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<String>, CoordinationError>> + Send;

    /// Deletes every path in `paths`. Missing paths are not an error.
    fn delete_batch(
        &self,
        paths: &[String],
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;

    /// Acquires the distributed mutex at `path`, waiting up to `timeout`.
    fn acquire_mutex(
        &self,
        path: &str,
        timeout: std::time::Duration,
    ) -> impl Future<Output = Result<MutexHandle, CoordinationError>> + Send;

    /// Releases a previously acquired mutex.
    fn release_mutex(
        &self,
        handle: MutexHandle,
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;

    /// Attempts to acquire one permit from the shared-count semaphore at
    /// `path` (current known count `current_count`), waiting up to
    /// `timeout`.
    fn acquire_shared_count_permit(
        &self,
        path: &str,
        current_count: u32,
        timeout: std::time::Duration,
    ) -> impl Future<Output = Result<Option<LeaseHandle>, CoordinationError>> + Send;

    /// Returns a previously acquired permit lease to the semaphore.
    fn return_permit(
        &self,
        handle: LeaseHandle,
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;

    /// Sets the total permit count of the shared-count semaphore at `path`.
    fn set_shared_count(
        &self,
        path: &str,
        n: u32,
    ) -> impl Future<Output = Result<(), CoordinationError>> + Send;

    /// Joins leader election at `path`, returning a handle that tracks
    /// leadership transitions.
    fn elect_leader(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<LeaderElection, CoordinationError>> + Send;

    /// Subscribes to child-added notifications under `path`. The returned
    /// channel delivers the name of every new child as it is observed; it
    /// may deliver children out of order relative to their sequence numbers,
    /// matching the coordination service's own delivery guarantees
    /// (`spec.md` §4.3 "Watcher callback").
    fn watch_children(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<mpsc::Receiver<String>, CoordinationError>> + Send;
}

/// Lets a single coordination client be shared across collaborators (the
/// replication log store, the quota limiter, and the executor's own mutex
/// calls) without requiring `C: Clone`.
impl<T: CoordinationClient> CoordinationClient for std::sync::Arc<T> {
    fn create_persistent(&self, path: &str) -> impl Future<Output = Result<(), CoordinationError>> + Send {
        T::create_persistent(self, path)
    }

    fn create_sequential(
        &self,
        path: &str,
        bytes: Vec<u8>,
    ) -> impl Future<Output = Result<u64, CoordinationError>> + Send {
        T::create_sequential(self, path, bytes)
    }

    fn read(&self, path: &str) -> impl Future<Output = Result<Vec<u8>, CoordinationError>> + Send {
        T::read(self, path)
    }

    fn list_children(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<Vec<String>, CoordinationError>> + Send {
        T::list_children(self, path)
    }

    fn delete_batch(&self, paths: &[String]) -> impl Future<Output = Result<(), CoordinationError>> + Send {
        T::delete_batch(self, paths)
    }

    fn acquire_mutex(
        &self,
        path: &str,
        timeout: std::time::Duration,
    ) -> impl Future<Output = Result<MutexHandle, CoordinationError>> + Send {
        T::acquire_mutex(self, path, timeout)
    }

    fn release_mutex(&self, handle: MutexHandle) -> impl Future<Output = Result<(), CoordinationError>> + Send {
        T::release_mutex(self, handle)
    }

    fn acquire_shared_count_permit(
        &self,
        path: &str,
        current_count: u32,
        timeout: std::time::Duration,
    ) -> impl Future<Output = Result<Option<LeaseHandle>, CoordinationError>> + Send {
        T::acquire_shared_count_permit(self, path, current_count, timeout)
    }

    fn return_permit(&self, handle: LeaseHandle) -> impl Future<Output = Result<(), CoordinationError>> + Send {
        T::return_permit(self, handle)
    }

    fn set_shared_count(&self, path: &str, n: u32) -> impl Future<Output = Result<(), CoordinationError>> + Send {
        T::set_shared_count(self, path, n)
    }

    fn elect_leader(&self, path: &str) -> impl Future<Output = Result<LeaderElection, CoordinationError>> + Send {
        T::elect_leader(self, path)
    }

    fn watch_children(
        &self,
        path: &str,
    ) -> impl Future<Output = Result<mpsc::Receiver<String>, CoordinationError>> + Send {
        T::watch_children(self, path)
    }
}
