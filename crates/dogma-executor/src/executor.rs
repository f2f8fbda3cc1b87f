//! The replicated command executor (`spec.md` §4.3): the lock/catch-up/
//! quota/delegate/log-append pipeline and the per-replica state machine.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex, RwLock as StdRwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::{Mutex as AsyncMutex, Semaphore};
use tokio::task::JoinHandle;

use dogma_coordination::{CoordinationClient, MutexHandle};
use dogma_quota::{MetadataService, QuotaConfig, QuotaLimiter};
use dogma_replog::LogStore;
use dogma_storage::LocalStorage;
use dogma_types::{
    Command, CommandResult, DogmaError, DogmaResult, ExecutionPath, LogSequence, ReplicaId,
    ReplicationLog, RepositoryId, ServerStatus,
};

use crate::config::{ExecutorConfig, PRUNE_INTERVAL};
use crate::cursor::CursorStore;
use crate::errors;
use crate::state::ExecutorState;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock before epoch")
        .as_millis() as i64
}

/// The replicated command executor (C3). Generic over the coordination
/// client, the local storage delegate, the write-quota metadata service, and
/// the cursor store, so a single process can plug in in-memory doubles for
/// tests or durable adapters for production.
pub struct Executor<C, S, M, K> {
    client: Arc<C>,
    storage: S,
    log_store: LogStore<Arc<C>>,
    quota: QuotaLimiter<Arc<C>, M>,
    cursor_store: K,
    root: String,
    replica_id: ReplicaId,
    config: ExecutorConfig,

    state: StdRwLock<ExecutorState>,
    server_status: StdRwLock<ServerStatus>,
    /// Serializes catch-up replay and guards the in-memory mirror of the
    /// last-replayed cursor (`spec.md` §3 "Last-replayed cursor"). Held for
    /// the duration of a whole catch-up pass so two concurrent `execute()`
    /// calls (different execution paths) can't interleave replay of the
    /// same sequence twice.
    cursor_state: AsyncMutex<Option<LogSequence>>,
    worker_permits: Arc<Semaphore>,
    tasks: StdMutex<Vec<JoinHandle<()>>>,
    stopping: AtomicBool,
}

impl<C, S, M, K> Executor<C, S, M, K>
where
    C: CoordinationClient,
    S: LocalStorage,
    M: MetadataService,
    K: CursorStore,
{
    pub fn new(
        client: C,
        storage: S,
        metadata: M,
        cursor_store: K,
        root: impl Into<String>,
        replica_id: ReplicaId,
        config: ExecutorConfig,
    ) -> Self {
        let root = root.into();
        let client = Arc::new(client);
        let log_store = LogStore::new(Arc::clone(&client), root.clone(), replica_id);
        let quota = QuotaLimiter::new(Arc::clone(&client), metadata, root.clone());
        let num_workers = config.num_workers.max(1);

        Self {
            client,
            storage,
            log_store,
            quota,
            cursor_store,
            root,
            replica_id,
            config,
            state: StdRwLock::new(ExecutorState::Created),
            server_status: StdRwLock::new(ServerStatus::writable()),
            cursor_state: AsyncMutex::new(None),
            worker_permits: Arc::new(Semaphore::new(num_workers)),
            tasks: StdMutex::new(Vec::new()),
            stopping: AtomicBool::new(false),
        }
    }

    pub fn replica_id(&self) -> ReplicaId {
        self.replica_id
    }

    pub fn state(&self) -> ExecutorState {
        *self.state.read().unwrap()
    }

    pub fn is_writable(&self) -> bool {
        self.state() == ExecutorState::Started && self.server_status.read().unwrap().writable
    }

    pub fn is_started(&self) -> bool {
        self.state().is_started()
    }

    /// The local storage delegate, for callers that need direct read access
    /// (the watch subsystem's `find_latest_revision`/`get_file` primitives
    /// bypass the executor entirely and hold their own reference instead;
    /// this accessor exists for tests that assert on replicated state).
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Sets (or clears) a repository's write-quota configuration, per the
    /// public `setWriteQuota` operation (`spec.md` §4 "C3 public contract").
    pub async fn set_write_quota(&self, repo: &RepositoryId, quota: Option<QuotaConfig>) -> DogmaResult<()> {
        self.quota.set_write_quota(repo, quota).await.map_err(errors::quota_error)
    }

    /// Brings the executor up: creates the coordination layout, loads the
    /// persisted cursor, replays any logs not yet applied, then starts the
    /// background log watcher and leader-election loop. `on_take_leadership`
    /// and `on_release_leadership` fire whenever this replica's leadership
    /// status flips (`spec.md` §4.3, leader-only pruning).
    pub async fn start<F1, F2>(self: &Arc<Self>, on_take_leadership: F1, on_release_leadership: F2) -> DogmaResult<()>
    where
        F1: Fn() + Send + Sync + 'static,
        F2: Fn() + Send + Sync + 'static,
    {
        {
            let mut state = self.state.write().unwrap();
            if *state != ExecutorState::Created {
                return Err(DogmaError::ShuttingDown);
            }
            *state = ExecutorState::Starting;
        }

        self.ensure_initialized().await?;

        if let Some(cursor) = self.cursor_store.load().await {
            *self.cursor_state.lock().await = Some(cursor);
        }
        self.catch_up().await?;

        *self.state.write().unwrap() = ExecutorState::Started;
        tracing::info!(replica = self.replica_id.0, "executor started");

        self.spawn_log_watcher();
        self.spawn_leader_election(on_take_leadership, on_release_leadership);

        Ok(())
    }

    /// Stops the executor. A stopped executor cannot be restarted; callers
    /// must construct a new one.
    pub async fn stop(&self) {
        self.stopping.store(true, Ordering::SeqCst);
        {
            let mut state = self.state.write().unwrap();
            if *state == ExecutorState::Stopped {
                return;
            }
            *state = ExecutorState::Stopped;
        }
        for handle in self.tasks.lock().unwrap().drain(..) {
            handle.abort();
        }
        tracing::info!(replica = self.replica_id.0, "executor stopped");
    }

    async fn ensure_initialized(&self) -> DogmaResult<()> {
        self.client
            .create_persistent(&self.root)
            .await
            .map_err(errors::coordination_error)?;
        self.log_store.ensure_initialized().await.map_err(|e| errors::log_store_error(0, e))?;
        Ok(())
    }

    /// Runs a command through the full pipeline (`spec.md` §4.3 steps 1-10).
    pub async fn execute(self: &Arc<Self>, cmd: Command) -> DogmaResult<CommandResult> {
        // Step 1: a server-status command that turns off replication is
        // submitted on a detached task rather than the bounded worker pool,
        // so it can't be starved by the very commands it is meant to pause.
        if let Command::UpdateServerStatus { status } = &cmd {
            if !status.replicating {
                let this = Arc::clone(self);
                return tokio::spawn(async move { this.execute_inner(cmd).await })
                    .await
                    .unwrap_or_else(|_| {
                        Err(DogmaError::CoordinationUnavailable(
                            "detached executor task panicked".to_string(),
                        ))
                    });
            }
        }

        let _permit = self
            .worker_permits
            .clone()
            .acquire_owned()
            .await
            .expect("worker semaphore is never closed");
        self.execute_inner(cmd).await
    }

    async fn execute_inner(&self, cmd: Command) -> DogmaResult<CommandResult> {
        self.ensure_initialized().await?;

        match self.state() {
            ExecutorState::Stopped => return Err(DogmaError::ShuttingDown),
            ExecutorState::ReadOnly if !matches!(cmd, Command::UpdateServerStatus { .. }) => {
                return Err(DogmaError::ReadOnly);
            }
            _ => {}
        }

        let path = cmd.execution_path();
        let mutex = self.acquire_execution_mutex(&path).await?;

        let repo_id = cmd.repository_id();
        if cmd.requires_quota() {
            if let Some(repo) = &repo_id {
                if let Err(err) = self.quota.acquire(repo).await {
                    let _ = self.client.release_mutex(mutex).await;
                    return Err(errors::quota_error(err));
                }
            }
        }
        if let Command::RemoveRepository { project, repository } = &cmd {
            self.quota.forget(&RepositoryId::new(project.clone(), repository.clone()));
        }

        if let Err(err) = self.catch_up().await {
            // Best-effort release; a failed release just leaks the lock
            // until the coordination session expires.
            let _ = self.client.release_mutex(mutex).await;
            return Err(err);
        }

        let result = match self.storage.execute(&cmd).await {
            Ok(result) => result,
            Err(err) => {
                // A delegate domain error (conflict, not-found, ...) fails
                // only this command; it is not appended to the log and does
                // not affect executor state.
                let _ = self.client.release_mutex(mutex).await;
                return Err(err);
            }
        };

        let resolved_cmd = resolve_for_log(cmd, &result);

        let now = now_millis();
        let record = ReplicationLog {
            replica_id: self.replica_id,
            command: resolved_cmd.clone(),
            result: result.clone(),
        };
        match self.log_store.store_log(&record, now).await {
            Ok(_sequence) => {}
            Err(err) => {
                self.enter_read_only();
                let _ = self.client.release_mutex(mutex).await;
                return Err(errors::log_store_error(0, err));
            }
        }

        if let Command::UpdateServerStatus { status } = &resolved_cmd {
            self.apply_server_status(*status);
        }

        let _ = self.client.release_mutex(mutex).await;
        Ok(result)
    }

    async fn acquire_execution_mutex(&self, path: &ExecutionPath) -> DogmaResult<MutexHandle> {
        // A production adapter over a real ensemble should retry transient
        // faults (`CoordinationError::Unavailable`) within this same
        // deadline via `dogma_coordination::retry_transient`; the in-memory
        // reference client never produces one.
        match self.client.acquire_mutex(&format!("{}/lock{}", self.root, path.as_str()), self.config.lock_timeout).await {
            Ok(handle) => Ok(handle),
            Err(err) => {
                self.enter_read_only();
                Err(errors::mutex_error(path, err))
            }
        }
    }

    /// Replays every log beyond the current cursor, in ascending order. A
    /// same-replica log is skipped (it was already applied locally when it
    /// was first produced) but still advances the cursor. A fatal mismatch
    /// trips the replica into read-only and leaves the cursor at the last
    /// successfully replayed sequence (`spec.md` §4.3 "replay").
    async fn catch_up(&self) -> DogmaResult<()> {
        let mut cursor_guard = self.cursor_state.lock().await;
        let sequences = self
            .log_store
            .list_sequences()
            .await
            .map_err(|e| errors::log_store_error(0, e))?;

        for seq in sequences {
            if cursor_guard.is_some_and(|c| seq <= c) {
                continue;
            }
            self.replay_one(seq).await?;
            *cursor_guard = Some(seq);
        }
        Ok(())
    }

    async fn replay_one(&self, seq: LogSequence) -> DogmaResult<()> {
        let loaded = self
            .log_store
            .load_log(seq, true)
            .await
            .map_err(|e| errors::log_store_error(seq.0, e))?;

        let Some(record) = loaded else {
            self.cursor_store.store(seq).await;
            return Ok(());
        };

        match self.storage.execute(&record.command).await {
            Ok(actual) if actual == record.result => {}
            Ok(_) => {
                self.enter_read_only();
                return Err(DogmaError::ReplayMismatch {
                    sequence: seq.0,
                    detail: "locally computed result differs from the logged result".to_string(),
                });
            }
            Err(err) => {
                self.enter_read_only();
                return Err(DogmaError::ReplayMismatch {
                    sequence: seq.0,
                    detail: format!("replay raised {err}"),
                });
            }
        }

        self.cursor_store.store(seq).await;
        Ok(())
    }

    fn enter_read_only(&self) {
        let mut state = self.state.write().unwrap();
        if *state == ExecutorState::Started {
            *state = ExecutorState::ReadOnly;
            tracing::error!(replica = self.replica_id.0, "replica entering read-only mode");
        }
    }

    fn apply_server_status(&self, status: ServerStatus) {
        *self.server_status.write().unwrap() = status;
        let mut state = self.state.write().unwrap();
        if !status.replicating && *state == ExecutorState::Started {
            *state = ExecutorState::ReadOnly;
            tracing::warn!(replica = self.replica_id.0, "replica set read-only via UpdateServerStatus");
        } else if status.replicating && *state == ExecutorState::ReadOnly {
            *state = ExecutorState::Started;
            tracing::info!(replica = self.replica_id.0, "replica restored to writable via UpdateServerStatus");
        }
    }

    fn spawn_log_watcher(self: &Arc<Self>) {
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut rx = match this.log_store.watch_new_logs().await {
                Ok(rx) => rx,
                Err(err) => {
                    tracing::error!(%err, "failed to subscribe to the log watcher");
                    return;
                }
            };
            while let Some(_child) = rx.recv().await {
                if this.stopping.load(Ordering::SeqCst) {
                    break;
                }
                if let Err(err) = this.catch_up().await {
                    tracing::error!(%err, "catch-up replay failed");
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }

    fn spawn_leader_election<F1, F2>(self: &Arc<Self>, on_take: F1, on_release: F2)
    where
        F1: Fn() + Send + Sync + 'static,
        F2: Fn() + Send + Sync + 'static,
    {
        let this = Arc::clone(self);
        let leader_path = format!("{}/leader", self.root);
        let handle = tokio::spawn(async move {
            let mut election = match this.client.elect_leader(&leader_path).await {
                Ok(e) => e,
                Err(err) => {
                    tracing::error!(%err, "failed to join leader election");
                    return;
                }
            };

            let mut is_leader = election.is_leader();
            if is_leader {
                on_take();
            }

            loop {
                tokio::select! {
                    now_leader = election.changed() => {
                        if now_leader && !is_leader {
                            on_take();
                        } else if !now_leader && is_leader {
                            on_release();
                        }
                        is_leader = now_leader;
                    }
                    _ = tokio::time::sleep(PRUNE_INTERVAL), if is_leader => {
                        let pruned = this.log_store.prune(
                            this.config.max_log_count,
                            this.config.min_log_age_millis,
                            now_millis(),
                        ).await;
                        if let Err(err) = pruned {
                            tracing::warn!(%err, "log prune failed");
                        }
                    }
                }
            }
        });
        self.tasks.lock().unwrap().push(handle);
    }
}

/// Rewrites a resolved [`Command::NormalizingPush`] (optionally wrapped in
/// [`Command::ForcePush`]) into its [`Command::Push`] form before logging
/// (`spec.md` §4.3 step 7). Any other command passes through unchanged.
fn resolve_for_log(cmd: Command, result: &CommandResult) -> Command {
    let needs_resolution = matches!(cmd, Command::NormalizingPush(_) | Command::ForcePush { .. });
    if !needs_resolution {
        return cmd;
    }
    let revision = match result {
        CommandResult::CommitResult { revision, .. } => *revision,
        CommandResult::Revision(revision) => *revision,
        CommandResult::Void => return cmd,
    };
    cmd.resolve_push(revision, now_millis())
}
