//! A single in-process replica wiring every foundation crate together
//! behind one call, for embedding and for tests. It shares one
//! [`InMemoryStorage`] between the executor and the watch server via
//! [`Arc`], so a watch armed through [`Replica::watch`] sees exactly the
//! state [`Replica::execute`] just committed.
//!
//! Production deployments wire their own [`LocalStorage`] and
//! [`CoordinationClient`] implementations directly through
//! [`dogma_executor::Executor`] and [`dogma_watch::WatchServer`] instead of
//! this convenience type.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use dogma_config::DogmaConfig;
use dogma_coordination::InMemoryCoordinationClient;
use dogma_executor::{Executor, ExecutorConfig, InMemoryCursorStore};
use dogma_quota::{InMemoryMetadataService, QuotaConfig};
use dogma_storage::InMemoryStorage;
use dogma_types::{Command, CommandResult, Content, DogmaResult, RepositoryId, ReplicaId, Revision};
use dogma_watch::{Query, WatchServer};

/// The concrete executor type a [`Replica`] wires up.
pub type InMemoryExecutor =
    Executor<InMemoryCoordinationClient, Arc<InMemoryStorage>, InMemoryMetadataService, InMemoryCursorStore>;

/// The concrete watch server type a [`Replica`] wires up.
pub type InMemoryWatchServer = WatchServer<Arc<InMemoryStorage>>;

/// An in-memory replica: an [`Executor`](dogma_executor::Executor) and a
/// [`WatchServer`] sharing one storage instance.
pub struct Replica {
    executor: Arc<InMemoryExecutor>,
    watch: Arc<InMemoryWatchServer>,
}

impl Replica {
    /// Builds and starts a replica rooted at `execution_path`, using the
    /// in-memory coordination, storage, and metadata reference doubles.
    pub async fn start(
        execution_path: impl Into<String>,
        replica_id: ReplicaId,
        config: &DogmaConfig,
    ) -> DogmaResult<Self> {
        let storage = Arc::new(InMemoryStorage::new());
        let executor_config = ExecutorConfig {
            num_workers: config.executor.num_workers as usize,
            lock_timeout: Duration::from_millis(config.lock_timeout_millis.0),
            max_log_count: config.replog.max_log_count as usize,
            min_log_age_millis: config.replog.min_log_age_millis as i64,
        };

        let executor = Arc::new(Executor::new(
            InMemoryCoordinationClient::new(),
            Arc::clone(&storage),
            InMemoryMetadataService::new(),
            InMemoryCursorStore::new(),
            execution_path,
            replica_id,
            executor_config,
        ));
        executor.start(|| {}, || {}).await?;

        let watch = Arc::new(WatchServer::new(storage));
        Ok(Self { executor, watch })
    }

    /// Direct access to the executor, for callers that need its full API
    /// (e.g. `set_write_quota`, `is_writable`).
    pub fn executor(&self) -> &Arc<InMemoryExecutor> {
        &self.executor
    }

    /// Direct access to the watch server, for callers that want
    /// [`WatchServer::watch_query`] rather than the plain pattern watch
    /// exposed here.
    pub fn watch_server(&self) -> &Arc<InMemoryWatchServer> {
        &self.watch
    }

    pub async fn execute(&self, cmd: Command) -> DogmaResult<CommandResult> {
        self.executor.execute(cmd).await
    }

    pub async fn set_write_quota(&self, repo: &RepositoryId, quota: Option<QuotaConfig>) -> DogmaResult<()> {
        self.executor.set_write_quota(repo, quota).await
    }

    /// Suspends until a commit after `last_known` touches `pattern`.
    pub async fn watch(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        pattern: &str,
        cancel: &mut oneshot::Receiver<()>,
    ) -> DogmaResult<Revision> {
        self.watch.watch(repo, last_known, pattern, cancel).await
    }

    /// Suspends until `query`'s projected value changes.
    pub async fn watch_query(
        &self,
        repo: &RepositoryId,
        last_known: Revision,
        query: &Query,
        previous_value: Option<Content>,
        cancel: oneshot::Receiver<()>,
    ) -> DogmaResult<(Revision, Content)> {
        self.watch.watch_query(repo, last_known, query, previous_value, cancel).await
    }

    pub async fn stop(&self) {
        self.executor.stop().await;
    }
}
