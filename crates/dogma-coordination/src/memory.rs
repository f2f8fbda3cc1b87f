//! An in-process [`CoordinationClient`] used by tests and by single-node
//! deployments. Real deployments plug in an adapter over an actual ensemble;
//! this implementation has no network and therefore never produces a
//! transient fault on its own, but still exercises the exact contract
//! (sequential numbering, mutex exclusivity, child-watch delivery).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};

use crate::client::{CoordinationClient, LeaderElection, LeaseHandle, MutexHandle};
use crate::error::CoordinationError;

struct SemaphoreState {
    sem: Arc<Semaphore>,
    total: u32,
}

#[derive(Default)]
struct Inner {
    nodes: HashMap<String, Vec<u8>>,
    children: HashMap<String, Vec<String>>,
    seq_counters: HashMap<String, u64>,
    locks: HashMap<String, Arc<Semaphore>>,
    semaphores: HashMap<String, SemaphoreState>,
    leaders: HashMap<String, watch::Sender<bool>>,
    watchers: HashMap<String, Vec<mpsc::Sender<String>>>,
}

/// An in-memory [`CoordinationClient`], suitable for single-process tests
/// and for a single-replica deployment with no external ensemble.
pub struct InMemoryCoordinationClient {
    inner: StdMutex<Inner>,
    next_token: AtomicU64,
}

impl Default for InMemoryCoordinationClient {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryCoordinationClient {
    pub fn new() -> Self {
        Self {
            inner: StdMutex::new(Inner::default()),
            next_token: AtomicU64::new(1),
        }
    }

    fn lock_for(&self, path: &str) -> Arc<Semaphore> {
        let mut inner = self.inner.lock().unwrap();
        inner
            .locks
            .entry(path.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    fn announce_child(&self, parent: &str, name: &str) {
        let senders = {
            let inner = self.inner.lock().unwrap();
            inner.watchers.get(parent).cloned().unwrap_or_default()
        };
        for tx in senders {
            let _ = tx.try_send(name.to_string());
        }
    }
}

impl CoordinationClient for InMemoryCoordinationClient {
    async fn create_persistent(&self, path: &str) -> Result<(), CoordinationError> {
        let mut inner = self.inner.lock().unwrap();
        inner.nodes.entry(path.to_string()).or_default();
        inner.children.entry(path.to_string()).or_default();
        Ok(())
    }

    async fn create_sequential(&self, path: &str, bytes: Vec<u8>) -> Result<u64, CoordinationError> {
        let seq = {
            let mut inner = self.inner.lock().unwrap();
            let counter = inner.seq_counters.entry(path.to_string()).or_insert(0);
            let seq = *counter;
            *counter += 1;
            let child_name = format!("{seq:010}");
            inner.nodes.insert(format!("{path}/{child_name}"), bytes);
            inner
                .children
                .entry(path.to_string())
                .or_default()
                .push(child_name.clone());
            seq
        };
        self.announce_child(path, &format!("{seq:010}"));
        Ok(seq)
    }

    async fn read(&self, path: &str) -> Result<Vec<u8>, CoordinationError> {
        let inner = self.inner.lock().unwrap();
        inner
            .nodes
            .get(path)
            .cloned()
            .ok_or_else(|| CoordinationError::NoNode(path.to_string()))
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, CoordinationError> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.children.get(path).cloned().unwrap_or_default())
    }

    async fn delete_batch(&self, paths: &[String]) -> Result<(), CoordinationError> {
        let mut inner = self.inner.lock().unwrap();
        for path in paths {
            inner.nodes.remove(path);
            if let Some((parent, child)) = path.rsplit_once('/') {
                if let Some(children) = inner.children.get_mut(parent) {
                    children.retain(|c| c != child);
                }
            }
        }
        Ok(())
    }

    async fn acquire_mutex(
        &self,
        path: &str,
        timeout: Duration,
    ) -> Result<MutexHandle, CoordinationError> {
        let sem = self.lock_for(path);
        match tokio::time::timeout(timeout, sem.acquire_owned()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok(MutexHandle {
                    path: path.to_string(),
                    token: self.next_token.fetch_add(1, Ordering::SeqCst),
                })
            }
            Ok(Err(_)) => Err(CoordinationError::Unavailable(path.to_string())),
            Err(_) => Err(CoordinationError::DeadlineExceeded(path.to_string())),
        }
    }

    async fn release_mutex(&self, handle: MutexHandle) -> Result<(), CoordinationError> {
        let sem = self.lock_for(&handle.path);
        sem.add_permits(1);
        Ok(())
    }

    async fn acquire_shared_count_permit(
        &self,
        path: &str,
        current_count: u32,
        timeout: Duration,
    ) -> Result<Option<LeaseHandle>, CoordinationError> {
        let sem = {
            let mut inner = self.inner.lock().unwrap();
            inner
                .semaphores
                .entry(path.to_string())
                .or_insert_with(|| SemaphoreState {
                    sem: Arc::new(Semaphore::new(current_count as usize)),
                    total: current_count,
                })
                .sem
                .clone()
        };
        match tokio::time::timeout(timeout, sem.acquire_owned()).await {
            Ok(Ok(permit)) => {
                permit.forget();
                Ok(Some(LeaseHandle {
                    path: path.to_string(),
                    token: self.next_token.fetch_add(1, Ordering::SeqCst),
                }))
            }
            Ok(Err(_)) => Err(CoordinationError::Unavailable(path.to_string())),
            Err(_) => Ok(None),
        }
    }

    async fn return_permit(&self, handle: LeaseHandle) -> Result<(), CoordinationError> {
        let sem = {
            let inner = self.inner.lock().unwrap();
            inner.semaphores.get(&handle.path).map(|s| s.sem.clone())
        };
        if let Some(sem) = sem {
            sem.add_permits(1);
        }
        Ok(())
    }

    async fn set_shared_count(&self, path: &str, n: u32) -> Result<(), CoordinationError> {
        let mut inner = self.inner.lock().unwrap();
        let entry = inner
            .semaphores
            .entry(path.to_string())
            .or_insert_with(|| SemaphoreState {
                sem: Arc::new(Semaphore::new(n as usize)),
                total: n,
            });
        if n > entry.total {
            entry.sem.add_permits((n - entry.total) as usize);
        } else if n < entry.total {
            entry.sem.forget_permits((entry.total - n) as usize);
        }
        entry.total = n;
        Ok(())
    }

    async fn elect_leader(&self, path: &str) -> Result<LeaderElection, CoordinationError> {
        let mut inner = self.inner.lock().unwrap();
        let tx = inner
            .leaders
            .entry(path.to_string())
            .or_insert_with(|| {
                let (tx, _) = watch::channel(false);
                tx
            });
        // First caller to subscribe while nobody else holds it wins leadership.
        if !*tx.borrow() {
            let _ = tx.send(true);
        }
        Ok(LeaderElection {
            leadership: tx.subscribe(),
        })
    }

    async fn watch_children(&self, path: &str) -> Result<mpsc::Receiver<String>, CoordinationError> {
        let (tx, rx) = mpsc::channel(256);
        let mut inner = self.inner.lock().unwrap();
        inner.watchers.entry(path.to_string()).or_default().push(tx);
        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn sequential_nodes_are_dense_and_monotonic() {
        let client = InMemoryCoordinationClient::new();
        client.create_persistent("/logs").await.unwrap();
        let a = client.create_sequential("/logs", b"a".to_vec()).await.unwrap();
        let b = client.create_sequential("/logs", b"b".to_vec()).await.unwrap();
        let c = client.create_sequential("/logs", b"c".to_vec()).await.unwrap();
        assert_eq!([a, b, c], [0, 1, 2]);
        let children = client.list_children("/logs").await.unwrap();
        assert_eq!(children.len(), 3);
    }

    #[tokio::test]
    async fn mutex_is_exclusive() {
        let client = Arc::new(InMemoryCoordinationClient::new());
        let handle = client
            .acquire_mutex("/lock/a", Duration::from_millis(50))
            .await
            .unwrap();
        // A second acquire should time out while the first is held.
        let second = client.acquire_mutex("/lock/a", Duration::from_millis(50)).await;
        assert!(matches!(second, Err(CoordinationError::DeadlineExceeded(_))));

        client.release_mutex(handle).await.unwrap();
        let third = client.acquire_mutex("/lock/a", Duration::from_millis(50)).await;
        assert!(third.is_ok());
    }

    #[tokio::test]
    async fn shared_count_bounds_concurrent_permits() {
        let client = InMemoryCoordinationClient::new();
        client.set_shared_count("/quota/a", 2).await.unwrap();

        let p1 = client
            .acquire_shared_count_permit("/quota/a", 2, Duration::from_millis(20))
            .await
            .unwrap();
        let p2 = client
            .acquire_shared_count_permit("/quota/a", 2, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(p1.is_some());
        assert!(p2.is_some());

        let p3 = client
            .acquire_shared_count_permit("/quota/a", 2, Duration::from_millis(20))
            .await
            .unwrap();
        assert!(p3.is_none(), "third permit should not be granted within quota");
    }

    #[tokio::test]
    async fn child_watch_delivers_new_names() {
        let client = InMemoryCoordinationClient::new();
        client.create_persistent("/logs").await.unwrap();
        let mut rx = client.watch_children("/logs").await.unwrap();
        client.create_sequential("/logs", b"x".to_vec()).await.unwrap();
        let name = rx.recv().await.unwrap();
        assert_eq!(name, "0000000000");
    }

    #[tokio::test]
    async fn leader_election_grants_first_subscriber() {
        let client = InMemoryCoordinationClient::new();
        let election = client.elect_leader("/leader").await.unwrap();
        assert!(election.is_leader());
    }
}
